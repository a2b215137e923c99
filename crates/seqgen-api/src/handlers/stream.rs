//! Server-sent progress stream.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use futures_util::stream::{self, Stream};
use tracing::{info, warn};

use seqgen_models::JobId;
use seqgen_queue::{ProgressSubscription, StreamItem};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::is_valid_sequence_id;
use crate::state::AppState;

/// Keeps the open-streams gauge in step with the response body's lifetime.
struct OpenStream;

impl OpenStream {
    fn new() -> Self {
        metrics::record_stream_opened();
        Self
    }
}

impl Drop for OpenStream {
    fn drop(&mut self) {
        metrics::record_stream_closed();
    }
}

/// GET /api/stream/:job_id
///
/// One `data:` frame per progress event, `: keepalive` comments while the
/// job is quiet. The response ends after the job's end sentinel. A reader
/// that disconnects early leaves the channel for the next subscriber.
pub async fn stream_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if !is_valid_sequence_id(&job_id) {
        return Err(ApiError::bad_request("Invalid job ID"));
    }
    let job_id = JobId::from_string(job_id);

    let subscription = state.registry.subscribe(&job_id, state.config.stream_keepalive)?;
    info!(job_id = %job_id, "Progress stream opened");

    Ok(Sse::new(event_stream(subscription)))
}

fn event_stream(subscription: ProgressSubscription) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((subscription, OpenStream::new()), |(mut subscription, open)| async move {
        let frame = match subscription.next().await? {
            StreamItem::Event(event) => {
                metrics::record_stream_event(event.event_type().as_str());
                Event::default().json_data(&event).unwrap_or_else(|e| {
                    warn!(job_id = %subscription.job_id(), "Failed to encode progress event: {}", e);
                    Event::default().comment("encode error")
                })
            }
            StreamItem::Keepalive => Event::default().comment("keepalive"),
        };
        Some((Ok(frame), (subscription, open)))
    })
}
