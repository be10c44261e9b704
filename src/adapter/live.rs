//! Live shape: chunks are produced while the agent runs.

use futures::{Stream, StreamExt};

use crate::agent::AgentEventStream;

use super::classify::{EventClassifier, SummaryMarker};

/// Lazily classify `events`, yielding each chunk as soon as it exists.
///
/// A failure yields one final `"Error: {message}"` chunk and ends the stream.
/// Dropping the returned stream (client disconnect) drops the agent run.
pub fn live_chunks(mut events: AgentEventStream) -> impl Stream<Item = String> + Send + 'static {
    async_stream::stream! {
        let mut classifier = EventClassifier::new(SummaryMarker::Newline);

        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    if let Some(chunk) = classifier.classify(&event) {
                        yield chunk;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, phase = ?classifier.phase(), "Agent failed mid-stream");
                    classifier.fail();
                    yield format!("Error: {e}");
                    return;
                }
            }
        }

        classifier.finish();
        tracing::debug!(phase = ?classifier.phase(), "Live stream finished");
    }
}
