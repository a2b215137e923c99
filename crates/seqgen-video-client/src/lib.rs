//! Client for the remote video-generation service.
//!
//! This crate provides:
//! - The [`VideoService`] seam (create, remix, retrieve, content)
//! - An HTTP implementation against the `/videos` API
//! - A [`Downloader`] that waits for a remote job and streams the MP4 to disk
//! - API key loading and persistence

pub mod client;
pub mod config;
pub mod downloader;
pub mod error;
pub mod keys;
pub mod types;

pub use client::{HttpVideoClient, VideoService};
pub use config::VideoClientConfig;
pub use downloader::{Downloader, PollingDownloader, ProgressCallback};
pub use error::{VideoClientError, VideoClientResult};
pub use keys::{ApiKeyStore, KeyStatus, API_KEY_PLACEHOLDER};
pub use types::{CreateVideoParams, DownloadedVideo, RemoteStatus, VideoJob, VideoJobStatus};
