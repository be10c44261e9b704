//! Agent output to HTTP body adapters.
//!
//! # Architecture
//!
//! - [`complete`]: a finished [`AgentResult`](crate::agent::AgentResult) to a
//!   plain-text body
//! - [`classify`]: per-event classification and the [`StreamPhase`] it drives
//! - [`live`]: chunks flushed while the agent runs
//! - [`buffered`]: run collected on an isolated runtime, then replayed
//!
//! Both streaming shapes classify events identically; they differ in when
//! bytes leave the server, in error text, and in the summary marker
//! (`"\n"` live, a labelled banner buffered).

pub mod buffered;
pub mod classify;
pub mod complete;
pub mod live;
pub mod phase;

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

pub use buffered::{buffered_chunks, collect_isolated, replay};
pub use classify::{EventClassifier, SummaryMarker};
pub use complete::render_result;
pub use live::live_chunks;
pub use phase::StreamPhase;

use crate::agent::AgentEventStream;

/// Boxed stream of body chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Deployment shape of the streaming endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StreamingMode {
    /// Chunks flushed as produced.
    #[default]
    Live,
    /// Whole run collected first, then replayed.
    Buffered,
}

impl StreamingMode {
    /// Chunk stream for `events` in this shape.
    pub fn chunks(self, events: AgentEventStream) -> ChunkStream {
        match self {
            Self::Live => Box::pin(live_chunks(events)),
            Self::Buffered => Box::pin(buffered_chunks(events)),
        }
    }
}

impl std::fmt::Display for StreamingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Live => "live",
            Self::Buffered => "buffered",
        })
    }
}
