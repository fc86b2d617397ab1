use super::RemoteError;
use super::fetcher::{DownloadToLocalRequest, FilerClient};
use crate::domain::RemoteConf;
use async_trait::async_trait;
use serde::Serialize;

/// Reaches an out-of-process coordinator over HTTP.
///
/// The coordinator has to write the hydrated chunks into the same meta store
/// the filer reads, so this fits deployments built on a shared [`MetaStore`]
/// implementation. The bundled server keeps metadata in memory and always
/// hydrates through the in-process
/// [`Coordinator`](super::coordinator::Coordinator).
///
/// [`MetaStore`]: crate::storage::MetaStore
#[derive(Clone, Debug)]
pub struct HttpFilerClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct DownloadBody<'a> {
    remote_conf: &'a RemoteConf,
    #[serde(flatten)]
    request: DownloadToLocalRequest,
}

impl HttpFilerClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn download_url(&self) -> String {
        format!("{}/remote/download", self.base_url)
    }
}

#[async_trait]
impl FilerClient for HttpFilerClient {
    async fn download_to_local(
        &self,
        remote_conf: &RemoteConf,
        request: DownloadToLocalRequest,
    ) -> Result<(), RemoteError> {
        let url = self.download_url();
        let resp = self
            .client
            .post(&url)
            .json(&DownloadBody {
                remote_conf,
                request,
            })
            .send()
            .await
            .map_err(|e| RemoteError::Rpc(format!("POST {url}: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let message = resp.text().await.unwrap_or_default();
        tracing::warn!("coordinator answered {} for {}: {}", status, url, message);
        Err(RemoteError::Status {
            code: status.as_u16(),
            message,
        })
    }
}
