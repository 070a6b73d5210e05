//! Reading server-sent events off a streaming response body.
//!
//! The chat-completions stream is a bare sequence of `data:` fields
//! separated by blank lines and closed by a `data: [DONE]` marker.
//! Comments, event names, ids and retry fields never appear, so the
//! reader rejects anything that is not a `data` field instead of
//! implementing the full protocol.

#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// The error type for the event reader.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The underlying HTTP stream failed.
    Transport,
    /// The stream contained a non-`data` field or non-UTF-8 bytes.
    InvalidPayload,
}

enum Body {
    Http(Response),
    #[cfg(test)]
    Scripted(VecDeque<Bytes>),
}

/// Incrementally decodes `data:` events from a chunked response body.
///
/// Chunk boundaries carry no meaning; an event may span several chunks
/// and a chunk may carry several events, so incoming bytes are buffered
/// until a complete `data` field is available.
pub struct Sse {
    buf: String,
    body: Body,
}

impl Sse {
    /// Creates a reader over a streaming HTTP response body.
    #[inline]
    pub fn from_response(response: Response) -> Self {
        Self {
            buf: String::new(),
            body: Body::Http(response),
        }
    }

    #[cfg(test)]
    pub fn from_chunks(chunks: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            buf: String::new(),
            body: Body::Scripted(chunks.into_iter().collect()),
        }
    }

    /// Returns the next event's data, or `None` once the body ends.
    ///
    /// A trailing partial event at the end of the body is dropped, the
    /// same way an aborted upstream response would lose it.
    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(data) = self.take_buffered_event()? {
                return Ok(Some(data));
            }
            let Some(bytes) = self.next_chunk().await? else {
                return Ok(None);
            };
            let Ok(text) = str::from_utf8(&bytes) else {
                return Err(Error::InvalidPayload);
            };
            self.buf.push_str(text);
        }
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match &mut self.body {
            Body::Http(response) => {
                response.chunk().await.map_err(|_| Error::Transport)
            }
            #[cfg(test)]
            Body::Scripted(chunks) => Ok(chunks.pop_front()),
        }
    }

    fn take_buffered_event(&mut self) -> Result<Option<String>, Error> {
        let Some(end_idx) = self.buf.find("\n\n") else {
            return Ok(None);
        };
        let field = &self.buf[..end_idx];
        let Some(data) = field.strip_prefix("data:") else {
            return Err(Error::InvalidPayload);
        };
        // The space after the colon is optional per the wire format.
        let data = data.strip_prefix(' ').unwrap_or(data).to_owned();
        self.buf.drain(..end_idx + 2);
        Ok(Some(data))
    }
}
