use serde::{Deserialize, Serialize};

/// Sampling parameters for a single completion call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// The maximum number of tokens the model may generate.
    pub max_tokens: u32,
    /// The sampling temperature.
    pub temperature: f32,
    /// The nucleus sampling probability mass.
    pub top_p: f32,
}

impl Default for ModelParameters {
    #[inline]
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 1.0,
            top_p: 1.0,
        }
    }
}

/// A request to be sent to the completion provider.
///
/// The messages carry the accumulated conversation history followed by
/// the prompt for the current turn. Providers must not reorder them.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    /// The input messages.
    pub messages: Vec<PromptMessage>,
    /// Sampling parameters for this request.
    pub params: ModelParameters,
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PromptMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
}
