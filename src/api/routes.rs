//! Method dispatch as data.
//!
//! Each row maps a method and the presence of the `tagging` query marker to a
//! handler and says whether the request goes through admission control. The
//! read-only table is the GET/HEAD/OPTIONS subset of the full one.

use axum::extract::Query;
use axum::http::{Method, Uri};
use std::collections::HashMap;

pub const PROXY_PREFIX: &str = "/?proxyChunkId=";
pub const TAGGING_MARKER: &str = "tagging";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Head,
    Put,
    Post,
    Delete,
    Options,
}

impl Verb {
    pub fn from_method(method: &Method) -> Option<Self> {
        Some(match *method {
            Method::GET => Self::Get,
            Method::HEAD => Self::Head,
            Method::PUT => Self::Put,
            Method::POST => Self::Post,
            Method::DELETE => Self::Delete,
            Method::OPTIONS => Self::Options,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Any,
    Present,
    Absent,
}

impl Marker {
    fn matches(self, present: bool) -> bool {
        match self {
            Self::Any => true,
            Self::Present => present,
            Self::Absent => !present,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    GetOrHead,
    PutTagging,
    Post,
    DeleteTagging,
    Delete,
    Options,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub verb: Verb,
    pub tagging: Marker,
    pub handler: Handler,
    pub admission: bool,
}

const fn route(verb: Verb, tagging: Marker, handler: Handler, admission: bool) -> Route {
    Route {
        verb,
        tagging,
        handler,
        admission,
    }
}

pub const FULL_ROUTES: &[Route] = &[
    route(Verb::Get, Marker::Any, Handler::GetOrHead, false),
    route(Verb::Head, Marker::Any, Handler::GetOrHead, false),
    route(Verb::Put, Marker::Present, Handler::PutTagging, true),
    route(Verb::Put, Marker::Absent, Handler::Post, true),
    route(Verb::Post, Marker::Any, Handler::Post, true),
    route(Verb::Delete, Marker::Present, Handler::DeleteTagging, false),
    route(Verb::Delete, Marker::Absent, Handler::Delete, false),
    route(Verb::Options, Marker::Any, Handler::Options, false),
];

pub const READ_ONLY_ROUTES: &[Route] = &[
    route(Verb::Get, Marker::Any, Handler::GetOrHead, false),
    route(Verb::Head, Marker::Any, Handler::GetOrHead, false),
    route(Verb::Options, Marker::Any, Handler::Options, false),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Forward to the volume server holding this chunk id.
    Proxy(String),
    Route(Route),
    MethodNotAllowed,
}

#[derive(Debug, Clone, Copy)]
pub struct RouteTable {
    pub read_only: bool,
    routes: &'static [Route],
}

impl RouteTable {
    pub const fn new(read_only: bool) -> Self {
        let routes = if read_only {
            READ_ONLY_ROUTES
        } else {
            FULL_ROUTES
        };
        Self { read_only, routes }
    }

    pub fn routes(&self) -> &'static [Route] {
        self.routes
    }

    pub fn resolve(&self, method: &Method, uri: &Uri) -> Resolved {
        if !self.read_only {
            if let Some(id) = proxy_chunk_id(uri) {
                return Resolved::Proxy(id.to_string());
            }
        }
        let Some(verb) = Verb::from_method(method) else {
            return Resolved::MethodNotAllowed;
        };
        let tagging = query_params(uri).contains_key(TAGGING_MARKER);
        self.routes
            .iter()
            .find(|r| r.verb == verb && r.tagging.matches(tagging))
            .map(|r| Resolved::Route(*r))
            .unwrap_or(Resolved::MethodNotAllowed)
    }

    pub fn allow_methods(&self) -> &'static str {
        if self.read_only {
            "GET, OPTIONS"
        } else {
            "PUT, POST, GET, DELETE, OPTIONS"
        }
    }
}

/// Everything after `/?proxyChunkId=`, verbatim. Empty ids do not count.
pub fn proxy_chunk_id(uri: &Uri) -> Option<&str> {
    uri.path_and_query()
        .and_then(|pq| pq.as_str().strip_prefix(PROXY_PREFIX))
        .filter(|id| !id.is_empty())
}

/// Form-decoded query parameters. A bare key maps to an empty value and a
/// repeated key keeps its last value.
pub fn query_params(uri: &Uri) -> HashMap<String, String> {
    Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(params)| params)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(table: RouteTable, method: Method, uri: &str) -> Resolved {
        table.resolve(&method, &uri.parse().unwrap())
    }

    fn handler(table: RouteTable, method: Method, uri: &str) -> Handler {
        match resolve(table, method, uri) {
            Resolved::Route(r) => r.handler,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_full_table() {
        let t = RouteTable::new(false);
        assert_eq!(handler(t, Method::GET, "/a"), Handler::GetOrHead);
        assert_eq!(handler(t, Method::HEAD, "/a?tagging"), Handler::GetOrHead);
        assert_eq!(handler(t, Method::PUT, "/a?tagging"), Handler::PutTagging);
        assert_eq!(handler(t, Method::PUT, "/a?tagging="), Handler::PutTagging);
        assert_eq!(handler(t, Method::PUT, "/a"), Handler::Post);
        assert_eq!(handler(t, Method::POST, "/a?tagging"), Handler::Post);
        assert_eq!(handler(t, Method::DELETE, "/a?x=1&tagging=k"), Handler::DeleteTagging);
        assert_eq!(handler(t, Method::DELETE, "/a?taggingx=1"), Handler::Delete);
        assert_eq!(handler(t, Method::OPTIONS, "/"), Handler::Options);
        assert_eq!(resolve(t, Method::PATCH, "/a"), Resolved::MethodNotAllowed);
    }

    #[test]
    fn test_admission_only_on_writes() {
        for r in FULL_ROUTES {
            let expected = matches!(r.verb, Verb::Put | Verb::Post);
            assert_eq!(r.admission, expected, "{r:?}");
        }
        assert!(READ_ONLY_ROUTES.iter().all(|r| !r.admission));
    }

    #[test]
    fn test_read_only_table() {
        let t = RouteTable::new(true);
        assert_eq!(handler(t, Method::GET, "/a"), Handler::GetOrHead);
        assert_eq!(handler(t, Method::OPTIONS, "/a"), Handler::Options);
        for m in [Method::PUT, Method::POST, Method::DELETE] {
            assert_eq!(resolve(t, m, "/a"), Resolved::MethodNotAllowed);
        }
        // the chunk proxy is only served in full mode
        assert_eq!(handler(t, Method::GET, "/?proxyChunkId=3,01637037d6"), Handler::GetOrHead);
    }

    #[test]
    fn test_proxy_bypasses_table() {
        let t = RouteTable::new(false);
        assert_eq!(
            resolve(t, Method::PATCH, "/?proxyChunkId=3,01637037d6"),
            Resolved::Proxy("3,01637037d6".into())
        );
        assert_eq!(handler(t, Method::GET, "/?proxyChunkId="), Handler::GetOrHead);
        assert_eq!(handler(t, Method::GET, "/a?proxyChunkId=1"), Handler::GetOrHead);
    }

    #[test]
    fn test_allow_methods() {
        assert_eq!(RouteTable::new(true).allow_methods(), "GET, OPTIONS");
        assert_eq!(
            RouteTable::new(false).allow_methods(),
            "PUT, POST, GET, DELETE, OPTIONS"
        );
    }

    #[test]
    fn test_query_params() {
        let uri: Uri = "/d?recursive=true&tagging=a,b".parse().unwrap();
        let params = query_params(&uri);
        assert_eq!(params["recursive"], "true");
        assert_eq!(params["tagging"], "a,b");
        assert!(!params.contains_key("missing"));

        let uri: Uri = "/d?tagging=a%2Cb&name=my+tag".parse().unwrap();
        let params = query_params(&uri);
        assert_eq!(params["tagging"], "a,b");
        assert_eq!(params["name"], "my tag");

        let uri: Uri = "/d?tagging".parse().unwrap();
        assert_eq!(query_params(&uri)["tagging"], "");
        assert!(query_params(&"/d".parse().unwrap()).is_empty());
    }

    #[test]
    fn test_encoded_marker_selects_tagging() {
        let t = RouteTable::new(false);
        assert_eq!(handler(t, Method::DELETE, "/a?tagging=a%2Cb"), Handler::DeleteTagging);
        assert_eq!(handler(t, Method::PUT, "/a?taggin%67"), Handler::PutTagging);
    }
}
