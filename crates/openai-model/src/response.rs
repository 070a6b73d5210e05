use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use signalforge_model::{
    CompletionEvent, CompletionResponse, ErrorKind, FinishReason,
};

use crate::Error;
use crate::io::Sse;
use crate::proto::{self, ChatCompletion, ChatCompletionChunk};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    // This field will be cleared after the response returns the complete
    // event.
    pending_finish_reason: Option<FinishReason>,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<CompletionEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        // Events already in hand, emitted before polling the stream. The
        // non-streaming mode is implemented entirely with this buffer.
        buffered: VecDeque<CompletionEvent>,
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            pending_finish_reason: None,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            buffered: VecDeque::new(),
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }

    pub fn from_completion(completion: ChatCompletion) -> Result<Self, Error> {
        let Some(choice) = completion.choices.into_iter().next() else {
            return Err(Error::new(
                "response contains no choices",
                ErrorKind::Other,
            ));
        };
        let finish_reason =
            proto::map_finish_reason(choice.finish_reason.as_deref());
        let mut buffered = VecDeque::new();
        if let Some(content) = choice.message.content {
            buffered.push_back(CompletionEvent::TextDelta(content));
        }
        buffered.push_back(CompletionEvent::Completed(finish_reason));
        Ok(Self {
            buffered,
            next_event_fut: None,
        })
    }
}

impl CompletionResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<CompletionEvent>, Self::Error>> {
        let this = self.project();
        if let Some(event) = this.buffered.pop_front() {
            return Poll::Ready(Ok(Some(event)));
        }

        let Some(next_event_fut) = this.next_event_fut else {
            // The stream has been exhausted.
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future
        // for the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<CompletionEvent>, PartialState), Error> {
    let sse = &mut partial_state.sse;
    let mut text_delta = None;

    loop {
        let sse_event = match sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Other));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            break;
        }

        let mut chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        };

        let Some(choice) = chunk.choices.pop() else {
            break;
        };

        if let Some(finish_reason) = choice.finish_reason {
            partial_state.pending_finish_reason =
                Some(proto::map_finish_reason(Some(&finish_reason)));
            break;
        }

        if let Some(content) = choice.delta.content {
            text_delta = Some(content);
            break;
        }
    }

    if let Some(text_delta) = text_delta {
        return Ok((
            Some(CompletionEvent::TextDelta(text_delta)),
            partial_state,
        ));
    }

    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        return Ok((
            Some(CompletionEvent::Completed(finish_reason)),
            partial_state,
        ));
    }

    Ok((None, partial_state))
}
