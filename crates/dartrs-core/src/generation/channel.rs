//! Async streaming over a bounded channel
//!
//! Runs a [`GenerationStream`](super::pipeline::GenerationStream) on tokio's
//! blocking pool and forwards fragments to a receiver. Dropping the receiver
//! stops generation at the next fragment and releases the model state.

use super::pipeline::TextGenerator;
use super::{GenerationConfig, GenerationResult};
use crate::model::Model;
use crate::CoreError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Event delivered to the consumer of a spawned generation
#[derive(Debug)]
pub enum StreamEvent {
    /// Decoded text of one sampled token, special tokens skipped
    Fragment(String),
    /// Generation completed; no more events follow
    Finished(GenerationResult),
    /// Generation aborted; no more events follow
    Failed(CoreError),
}

/// Start generating on the blocking pool. Must be called inside a tokio runtime.
pub fn spawn_generation<M>(
    generator: TextGenerator<M>,
    config: GenerationConfig,
    buffer: usize,
) -> (mpsc::Receiver<StreamEvent>, JoinHandle<()>)
where
    M: Model + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));

    let handle = tokio::task::spawn_blocking(move || {
        let mut stream = match generator.generate_stream(&config) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = tx.blocking_send(StreamEvent::Failed(e));
                return;
            }
        };

        let generation_id = stream.generation_id().to_string();
        for item in stream.by_ref() {
            let event = match item {
                Ok(fragment) => StreamEvent::Fragment(fragment),
                Err(e) => {
                    let _ = tx.blocking_send(StreamEvent::Failed(e));
                    return;
                }
            };
            if tx.blocking_send(event).is_err() {
                debug!(
                    generation_id = %generation_id,
                    "receiver dropped; cancelling generation"
                );
                return;
            }
        }

        let event = match stream.finish() {
            Ok(result) => StreamEvent::Finished(result),
            Err(e) => StreamEvent::Failed(e),
        };
        let _ = tx.blocking_send(event);
    });

    (rx, handle)
}
