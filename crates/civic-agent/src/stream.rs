//! Producer side of the event stream.
//!
//! Each research run is a spawned task writing into a bounded channel. When
//! the consumer drops the receiver the task notices the closed channel and
//! drops the run future, abandoning any in-flight call.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, Instrument};

use civic_core::{defaults, AgentEvent};

use crate::orchestrator::{ResearchAgent, ResearchRequest};

/// Events of one research run, in order.
pub type EventStream = ReceiverStream<AgentEvent>;

/// Spawn a research run with the default channel capacity.
pub fn spawn_research(agent: Arc<ResearchAgent>, request: ResearchRequest) -> EventStream {
    spawn_research_with_capacity(agent, request, defaults::EVENT_CHANNEL_CAPACITY)
}

pub fn spawn_research_with_capacity(
    agent: Arc<ResearchAgent>,
    request: ResearchRequest,
    capacity: usize,
) -> EventStream {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let span = tracing::Span::current();

    tokio::spawn(
        async move {
            let watcher = tx.clone();
            tokio::select! {
                _ = watcher.closed() => {
                    debug!("Client disconnected; research cancelled");
                }
                _ = agent.run(request, tx) => {}
            }
        }
        .instrument(span),
    );

    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;
    use civic_inference::mock::ScriptedBackend;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_ends_after_done() {
        let backend = ScriptedBackend::new().with_answer(["Nothing ", "found."]);
        let agent = Arc::new(ResearchAgent::new(Arc::new(backend), ToolRegistry::new()));

        let events: Vec<AgentEvent> = spawn_research(agent, ResearchRequest::new("Why?"))
            .collect()
            .await;

        assert!(events.last().map_or(false, AgentEvent::is_terminal));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }
}
