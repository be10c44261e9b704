//! Buffered shape: collect everything, then replay.
//!
//! The whole agent run is executed on a dedicated single-threaded runtime on
//! a blocking worker, collected into an ordered buffer, and only then turned
//! into chunks. The response is chunked on the wire but the first byte
//! arrives only after the run has finished.

use futures::{Stream, TryStreamExt};

use crate::agent::{AgentError, AgentEvent, AgentEventStream};

use super::classify::{EventClassifier, SummaryMarker};

/// Prefix of the single chunk sent when collection fails.
pub const COLLECTION_ERROR_PREFIX: &str = "\n\nError during streaming agent processing: ";

/// Run `events` to completion in a fresh, isolated runtime.
///
/// The runtime is created for this call only and torn down before returning.
/// The run cannot be cancelled once started.
pub async fn collect_isolated(events: AgentEventStream) -> Result<Vec<AgentEvent>, AgentError> {
    let worker = tokio::task::spawn_blocking(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AgentError::Isolation(e.to_string()))?;
        runtime.block_on(events.try_collect::<Vec<_>>())
    });

    worker
        .await
        .map_err(|e| AgentError::Isolation(e.to_string()))?
}

/// Turn a collected run into chunks.
///
/// A failed collection produces exactly one error chunk and no partial replay.
pub fn replay(collected: Result<Vec<AgentEvent>, AgentError>) -> Vec<String> {
    match collected {
        Ok(events) => {
            let mut classifier = EventClassifier::new(SummaryMarker::Banner);
            let chunks = events.iter().filter_map(|e| classifier.classify(e)).collect();
            classifier.finish();
            chunks
        }
        Err(e) => {
            tracing::warn!(error = %e, "Buffered agent collection failed");
            vec![format!("{COLLECTION_ERROR_PREFIX}{e}")]
        }
    }
}

/// Collect `events` in isolation, then yield the replayed chunks.
pub fn buffered_chunks(events: AgentEventStream) -> impl Stream<Item = String> + Send + 'static {
    async_stream::stream! {
        let collected = collect_isolated(events).await;
        tracing::debug!(
            ok = collected.is_ok(),
            events = collected.as_ref().map_or(0, Vec::len),
            "Buffered collection finished"
        );
        for chunk in replay(collected) {
            yield chunk;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::classify::SUMMARY_BANNER;
    use crate::agent::tools::READY_TO_SUMMARIZE;
    use futures::StreamExt;

    fn events(items: Vec<Result<AgentEvent, AgentError>>) -> AgentEventStream {
        Box::pin(futures::stream::iter(items))
    }

    #[tokio::test]
    async fn test_collect_runs_on_its_own_runtime() {
        let outer = std::thread::current().id();
        let source: AgentEventStream = Box::pin(async_stream::stream! {
            let inner = std::thread::current().id();
            yield Ok(AgentEvent::data(if inner == outer { "shared" } else { "isolated" }));
        });

        let collected = collect_isolated(source).await.unwrap();
        assert_eq!(collected, vec![AgentEvent::data("isolated")]);
    }

    #[tokio::test]
    async fn test_collect_reports_failure() {
        let err = collect_isolated(events(vec![
            Ok(AgentEvent::data("partial")),
            Err(AgentError::Stream("boom".to_string())),
        ]))
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_replay_scenario_uses_banner() {
        let chunks = replay(Ok(vec![
            AgentEvent::tool_use("http_request"),
            AgentEvent::data("Hello "),
            AgentEvent::tool_use(READY_TO_SUMMARIZE),
            AgentEvent::data("World"),
        ]));
        assert_eq!(
            chunks,
            vec!["\n\n🔧 Using tool: http_request", "Hello ", SUMMARY_BANNER, "World"]
        );
    }

    #[test]
    fn test_replay_banner_for_each_signal() {
        let chunks = replay(Ok(vec![
            AgentEvent::tool_use(READY_TO_SUMMARIZE),
            AgentEvent::data("A"),
            AgentEvent::tool_use(READY_TO_SUMMARIZE),
            AgentEvent::data("B"),
        ]));
        assert_eq!(chunks, vec![SUMMARY_BANNER, "A", SUMMARY_BANNER, "B"]);
    }

    #[test]
    fn test_replay_failure_has_no_partial_output() {
        let chunks = replay(Err(AgentError::Stream("upstream unavailable".to_string())));
        assert_eq!(
            chunks,
            vec!["\n\nError during streaming agent processing: upstream unavailable"]
        );
    }

    #[tokio::test]
    async fn test_buffered_chunks_end_to_end() {
        let chunks: Vec<String> = buffered_chunks(events(vec![
            Ok(AgentEvent::data("a")),
            Ok(AgentEvent::other("result")),
            Ok(AgentEvent::data("b")),
        ]))
        .collect()
        .await;
        assert_eq!(chunks, vec!["a", "b"]);
    }
}
