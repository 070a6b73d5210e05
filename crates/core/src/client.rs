use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use signalforge_model::{
    CompletionEvent, CompletionProvider, CompletionProviderError,
    CompletionRequest, CompletionResponse, FinishReason,
};
use tracing::Instrument;

type SendRequestResult =
    Result<CompletionOutput, Box<dyn CompletionProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(CompletionRequest, Box<dyn Fn(&str) + Send + 'static>)
        -> BoxedSendRequestFuture + Send + Sync
>;

/// A wrapper around a completion provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct CompletionClient {
    handler_fn: HandlerFn,
}

impl CompletionClient {
    /// Wraps the given provider, erasing its concrete type.
    #[inline]
    pub fn new<P: CompletionProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `CompletionClient` doesn't
        // have a generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_delta| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_delta).await
                }
                .instrument(trace_span!("completion client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and aggregates the response into its full text,
    /// invoking `on_delta` for every received fragment.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: CompletionRequest,
        on_delta: impl Fn(&str) + Send + 'static,
    ) -> Result<CompletionOutput, Box<dyn CompletionProviderError>> {
        (self.handler_fn)(req, Box::new(on_delta)).await
    }
}

/// A completely received response from the completion client.
#[derive(Clone, Debug)]
pub struct CompletionOutput {
    /// The full aggregated response text.
    pub text: String,
    /// The reason the model finished generating.
    pub finish_reason: Option<FinishReason>,
}

async fn handle_response<P: CompletionProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_delta: Box<dyn Fn(&str) + Send + 'static>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut text = String::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            CompletionEvent::TextDelta(delta) => {
                on_delta(&delta);
                text.push_str(&delta);
            }
            CompletionEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(CompletionOutput {
        text,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use signalforge_model::{ModelParameters, PromptMessage};
    use signalforge_test_model::{PresetReply, ScriptedProvider};

    use super::*;

    #[tokio::test]
    async fn test_send_request() {
        let provider = ScriptedProvider::default();
        provider.add_reply(PresetReply::with_deltas(["How ", "are ", "you?"]));

        let client = CompletionClient::new(provider);

        let delta_count = Arc::new(AtomicUsize::new(0));
        let resp = client
            .send_request(
                CompletionRequest {
                    messages: vec![PromptMessage::User("Hi".to_owned())],
                    params: ModelParameters::default(),
                },
                {
                    let delta_count = Arc::clone(&delta_count);
                    move |_| {
                        delta_count.fetch_add(1, Ordering::Relaxed);
                    }
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.text, "How are you?");
        assert_eq!(resp.finish_reason, Some(FinishReason::Stop));
        assert_eq!(delta_count.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_error_handling() {
        let provider = ScriptedProvider::default();
        let client = CompletionClient::new(provider);
        let resp_or_err = client
            .send_request(
                CompletionRequest {
                    messages: vec![PromptMessage::User("Hi".to_owned())],
                    params: ModelParameters::default(),
                },
                |_| {},
            )
            .await;
        assert!(matches!(resp_or_err, Err(_)));
    }
}
