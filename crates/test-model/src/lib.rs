//! A local scripted completion provider for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use signalforge_model::{
    CompletionEvent, CompletionProvider, CompletionProviderError,
    CompletionRequest, CompletionResponse, ErrorKind, FinishReason,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl CompletionProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Debug)]
pub struct ScriptedResponse {
    events: VecDeque<CompletionEvent>,
    failure: Option<ErrorKind>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl CompletionResponse for ScriptedResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<CompletionEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            if let Some(kind) = this.failure.take() {
                return Poll::Ready(Err(Error {
                    message: "scripted failure",
                    kind,
                }));
            }

            return Poll::Ready(Ok(this.events.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

/// A local scripted completion provider for testing purpose.
///
/// Before sending requests, you need to set up the reply script, which
/// is how the model should respond to each request. Replies are
/// consumed in order, one per `send_request` call. When the script is
/// exhausted, requests fail with an error.
///
/// Every request is recorded and can be inspected afterwards, so tests
/// can assert on the prompts and the conversation history the caller
/// actually sent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy
/// memory copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<PresetReply>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    /// Appends a reply to the script.
    #[inline]
    pub fn add_reply(&self, reply: PresetReply) {
        self.script.lock().unwrap().push_back(reply);
    }

    /// Sets an artificial delay before each response event.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far.
    #[inline]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl CompletionProvider for ScriptedProvider {
    type Error = crate::Error;
    type Response = ScriptedResponse;

    fn send_request(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.requests.lock().unwrap().push(req.clone());

        let reply = self.script.lock().unwrap().pop_front();
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        let result = match reply {
            Some(reply) => {
                let mut events: VecDeque<_> = reply
                    .deltas
                    .into_iter()
                    .map(CompletionEvent::TextDelta)
                    .collect();
                if reply.failure.is_none() {
                    events.push_back(CompletionEvent::Completed(
                        FinishReason::Stop,
                    ));
                }
                Ok(ScriptedResponse {
                    events,
                    failure: reply.failure,
                    delay,
                    sleep: None,
                })
            }
            None => Err(Error {
                message: "reply script exhausted",
                kind: ErrorKind::RateLimitExceeded,
            }),
        };
        ready(result)
    }
}
