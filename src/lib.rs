//! An HTTP filer front end with upload admission control and on-demand
//! hydration of files mirrored from remote storage.
pub mod admission;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod remote;
pub mod service;
pub mod storage;
pub mod utils;
