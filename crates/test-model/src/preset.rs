use signalforge_model::ErrorKind;

/// A scripted reply for one completion request.
///
/// A reply either streams its text fragments followed by a completed
/// event, or fails with the configured error kind before producing any
/// event.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PresetReply {
    /// The text fragments to stream, in order.
    pub deltas: Vec<String>,
    /// If set, the response fails with this kind instead of streaming.
    pub failure: Option<ErrorKind>,
}

impl PresetReply {
    /// Creates a reply that streams the given text as a single delta.
    #[inline]
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            deltas: vec![text.into()],
            failure: None,
        }
    }

    /// Creates a reply that streams the given fragments one by one.
    #[inline]
    pub fn with_deltas<S: Into<String>>(
        deltas: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            deltas: deltas.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    /// Creates a reply that fails with the given error kind.
    #[inline]
    pub fn with_failure(kind: ErrorKind) -> Self {
        Self {
            deltas: Vec::new(),
            failure: Some(kind),
        }
    }
}
