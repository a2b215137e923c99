//! Job registry and progress channels.
//!
//! This crate provides:
//! - A pluggable [`ResultStore`] for terminal job results (in-memory or Redis)
//! - Single-consumer progress channels with an end-of-stream sentinel
//!   and keepalive ticks
//! - [`JobRegistry`], which ties both together and is shared by the
//!   submission and streaming handlers

pub mod channel;
pub mod config;
pub mod error;
pub mod registry;
pub mod store;

pub use channel::{ChannelRegistry, ProgressSender, ProgressSubscription, StreamItem};
pub use config::{QueueConfig, StoreBackend};
pub use error::{QueueError, QueueResult};
pub use registry::JobRegistry;
pub use store::{InMemoryResultStore, RedisResultStore, ResultStore};
