//! WebSocket message processing for a single render.
//!
//! Reads frames from a ComfyUI WebSocket connection until the awaited
//! prompt finishes or fails. Messages for other prompts and status
//! broadcasts are logged and skipped.

use futures::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use blockreel_core::render::RenderError;

use crate::messages::{parse_message, ComfyUIMessage, PromptOutcome};

/// Wait for `prompt_id` to finish executing.
///
/// Returns `Ok(())` on completion, [`RenderError::Failed`] when ComfyUI
/// reports an execution error, and [`RenderError::Unavailable`] when the
/// socket closes or errors first.
pub async fn wait_for_completion<S>(ws_stream: &mut S, prompt_id: &str) -> Result<(), RenderError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg_result) = ws_stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match handle_text_message(&text, prompt_id) {
                PromptOutcome::Pending => {}
                PromptOutcome::Finished => return Ok(()),
                PromptOutcome::Failed(reason) => return Err(RenderError::Failed(reason)),
            },
            Ok(Message::Binary(_)) => {
                // Preview images; not used.
                tracing::trace!(prompt_id, "Ignoring binary message (preview image)");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(frame)) => {
                tracing::warn!(prompt_id, ?frame, "ComfyUI WebSocket closed mid-render");
                break;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                return Err(RenderError::Unavailable(format!(
                    "WebSocket receive error: {e}"
                )));
            }
        }
    }

    Err(RenderError::Unavailable(
        "WebSocket closed before the prompt finished".into(),
    ))
}

fn handle_text_message(text: &str, prompt_id: &str) -> PromptOutcome {
    match parse_message(text) {
        Ok(msg) => {
            match &msg {
                ComfyUIMessage::Progress(data) => {
                    tracing::trace!(prompt_id, value = data.value, max = data.max, "Sampler progress");
                }
                ComfyUIMessage::Status(data) => {
                    tracing::trace!(
                        queue_remaining = data.status.exec_info.queue_remaining,
                        "ComfyUI queue status",
                    );
                }
                ComfyUIMessage::ExecutionError(data) => {
                    tracing::error!(
                        prompt_id = %data.prompt_id,
                        node_id = %data.node_id,
                        error = %data.exception_message,
                        "ComfyUI execution error",
                    );
                }
                _ => {}
            }
            msg.outcome_for(prompt_id)
        }
        Err(e) => {
            tracing::debug!(error = %e, raw_message = %text, "Skipping unrecognised ComfyUI message");
            PromptOutcome::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use futures::stream;

    use super::*;

    fn text(s: &str) -> Result<Message, WsError> {
        Ok(Message::Text(s.to_string()))
    }

    #[tokio::test]
    async fn completes_on_null_node_for_own_prompt() {
        let mut frames = stream::iter(vec![
            text(r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":1}}}}"#),
            text(r#"{"type":"executing","data":{"node":null,"prompt_id":"other"}}"#),
            text(r#"{"type":"progress","data":{"value":3,"max":20}}"#),
            Ok(Message::Binary(vec![1, 2, 3])),
            text(r#"{"type":"executing","data":{"node":null,"prompt_id":"mine"}}"#),
        ]);

        assert!(wait_for_completion(&mut frames, "mine").await.is_ok());
    }

    #[tokio::test]
    async fn execution_error_is_render_failure() {
        let mut frames = stream::iter(vec![text(
            r#"{"type":"execution_error","data":{"prompt_id":"mine","node_id":"3","exception_message":"OOM","exception_type":"RuntimeError"}}"#,
        )]);

        assert_matches!(
            wait_for_completion(&mut frames, "mine").await,
            Err(RenderError::Failed(msg)) if msg.contains("OOM")
        );
    }

    #[tokio::test]
    async fn closed_stream_is_unavailable() {
        let mut frames = stream::iter(vec![
            text("not json"),
            Ok(Message::Close(None)),
            text(r#"{"type":"executing","data":{"node":null,"prompt_id":"mine"}}"#),
        ]);

        assert_matches!(
            wait_for_completion(&mut frames, "mine").await,
            Err(RenderError::Unavailable(_))
        );
    }

    #[tokio::test]
    async fn exhausted_stream_is_unavailable() {
        let mut frames = stream::iter(Vec::<Result<Message, WsError>>::new());
        assert_matches!(
            wait_for_completion(&mut frames, "mine").await,
            Err(RenderError::Unavailable(_))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_prompt_is_awaited_without_deadline() {
        let started = tokio::time::Instant::now();
        let mut frames = Box::pin(
            stream::iter(vec![
                text(r#"{"type":"progress","data":{"value":1,"max":20,"prompt_id":"mine"}}"#),
                text(r#"{"type":"progress","data":{"value":20,"max":20,"prompt_id":"mine"}}"#),
                text(r#"{"type":"executing","data":{"node":null,"prompt_id":"mine"}}"#),
            ])
            .then(|frame| async move {
                tokio::time::sleep(Duration::from_secs(15 * 60)).await;
                frame
            }),
        );

        assert!(wait_for_completion(&mut frames, "mine").await.is_ok());
        assert!(started.elapsed() >= Duration::from_secs(45 * 60));
    }
}
