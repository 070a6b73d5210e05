//! The conversational generator: a prompt template, sampling
//! parameters and dialogue memory around one completion provider.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use signalforge_model::{
    CompletionProvider, CompletionProviderError, CompletionRequest,
    ModelParameters, PromptMessage,
};

use crate::client::CompletionClient;
use crate::conversation::{Conversation, MemoryPolicy, Turn};
use crate::template::{PromptTemplate, TemplateError};

/// The error type for a single `predict` call.
#[derive(Debug)]
pub enum GeneratorError {
    /// The prompt template could not be filled.
    Template(TemplateError),
    /// The remote completion call failed. Transient failures are not
    /// retried here; they propagate to the caller unchanged.
    Provider(Box<dyn CompletionProviderError>),
}

impl Display for GeneratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::Template(err) => write!(f, "template: {err}"),
            GeneratorError::Provider(err) => write!(f, "provider: {err}"),
        }
    }
}

impl Error for GeneratorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GeneratorError::Template(err) => Some(err),
            GeneratorError::Provider(_) => None,
        }
    }
}

impl From<TemplateError> for GeneratorError {
    fn from(err: TemplateError) -> Self {
        GeneratorError::Template(err)
    }
}

type DeltaCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Builder for [`Generator`].
pub struct GeneratorBuilder {
    client: CompletionClient,
    template: PromptTemplate,
    params: ModelParameters,
    memory: MemoryPolicy,
    on_delta: Option<DeltaCallback>,
}

impl GeneratorBuilder {
    /// Creates a builder over the given provider and prompt template.
    pub fn new<P: CompletionProvider + 'static>(
        provider: P,
        template: PromptTemplate,
    ) -> Self {
        Self {
            client: CompletionClient::new(provider),
            template,
            params: ModelParameters::default(),
            memory: MemoryPolicy::default(),
            on_delta: None,
        }
    }

    /// Sets the sampling parameters for every `predict` call.
    #[inline]
    pub fn with_params(mut self, params: ModelParameters) -> Self {
        self.params = params;
        self
    }

    /// Sets the dialogue memory policy.
    #[inline]
    pub fn with_memory_policy(mut self, memory: MemoryPolicy) -> Self {
        self.memory = memory;
        self
    }

    /// Attaches a callback invoked for every streamed text fragment.
    #[inline]
    pub fn on_delta(
        mut self,
        on_delta: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_delta = Some(Arc::new(on_delta));
        self
    }

    /// Builds the generator.
    pub fn build(self) -> Generator {
        Generator {
            client: self.client,
            template: self.template,
            params: self.params,
            conversation: Conversation::new(self.memory),
            on_delta: self.on_delta,
        }
    }
}

/// A stateful wrapper around a remote completion capability.
///
/// Every `predict` call fills the current template, sends the
/// accumulated dialogue plus the filled prompt to the provider, appends
/// the new turn to memory and returns the raw response text. The
/// template and the memory are independent axes of state: swapping the
/// template does not clear the conversation.
pub struct Generator {
    client: CompletionClient,
    template: PromptTemplate,
    params: ModelParameters,
    conversation: Conversation,
    on_delta: Option<DeltaCallback>,
}

impl Generator {
    /// Fills the current template with the supplied named variables and
    /// sends it, together with the dialogue so far, to the provider.
    ///
    /// Returns the raw response text. The call mutates the conversation
    /// memory and performs one remote round trip; no retry is done
    /// here.
    pub async fn predict(
        &mut self,
        variables: &[(&str, &str)],
    ) -> Result<String, GeneratorError> {
        let prompt = self.template.fill(variables)?;

        let mut messages =
            Vec::with_capacity(self.conversation.len() * 2 + 1);
        for turn in self.conversation.turns() {
            messages.push(PromptMessage::User(turn.input.clone()));
            messages.push(PromptMessage::Assistant(turn.output.clone()));
        }
        messages.push(PromptMessage::User(prompt.clone()));

        let req = CompletionRequest {
            messages,
            params: self.params,
        };
        let on_delta = self.on_delta.clone();
        let output = self
            .client
            .send_request(req, move |delta| {
                if let Some(on_delta) = &on_delta {
                    on_delta(delta);
                }
            })
            .await
            .map_err(GeneratorError::Provider)?;

        debug!(
            turns = self.conversation.len(),
            finish_reason = ?output.finish_reason,
            "completed a predict call"
        );

        self.conversation.push(Turn {
            input: prompt,
            output: output.text.clone(),
        });
        Ok(output.text)
    }

    /// Swaps the prompt template. The conversation memory is kept;
    /// template and memory are deliberately independent.
    #[inline]
    pub fn set_template(&mut self, template: PromptTemplate) {
        self.template = template;
    }

    /// Returns the accumulated conversation.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }
}

#[cfg(test)]
mod tests {
    use signalforge_model::ErrorKind;
    use signalforge_test_model::{PresetReply, ScriptedProvider};

    use super::*;

    fn template(text: &str, vars: &[&str]) -> PromptTemplate {
        PromptTemplate::new(text, vars).unwrap()
    }

    #[tokio::test]
    async fn test_predict_replays_history() {
        let provider = ScriptedProvider::default();
        provider.add_reply(PresetReply::with_text("first reply"));
        provider.add_reply(PresetReply::with_text("second reply"));

        let mut generator = GeneratorBuilder::new(
            provider.clone(),
            template("say {word}", &["word"]),
        )
        .build();

        let first = generator.predict(&[("word", "hi")]).await.unwrap();
        assert_eq!(first, "first reply");
        let second = generator.predict(&[("word", "bye")]).await.unwrap();
        assert_eq!(second, "second reply");

        let requests = provider.requests();
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(
            requests[1].messages,
            vec![
                PromptMessage::User("say hi".to_owned()),
                PromptMessage::Assistant("first reply".to_owned()),
                PromptMessage::User("say bye".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_set_template_keeps_memory() {
        let provider = ScriptedProvider::default();
        provider.add_reply(PresetReply::with_text("reply one"));
        provider.add_reply(PresetReply::with_text("reply two"));

        let mut generator = GeneratorBuilder::new(
            provider.clone(),
            template("list {n} items", &["n"]),
        )
        .build();
        generator.predict(&[("n", "3")]).await.unwrap();

        generator.set_template(template("code for {topic}", &["topic"]));
        generator.predict(&[("topic", "lathe")]).await.unwrap();

        assert_eq!(generator.conversation().len(), 2);
        let requests = provider.requests();
        assert_eq!(
            requests[1].messages,
            vec![
                PromptMessage::User("list 3 items".to_owned()),
                PromptMessage::Assistant("reply one".to_owned()),
                PromptMessage::User("code for lathe".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_window_policy_evicts() {
        let provider = ScriptedProvider::default();
        for n in 0..3 {
            provider.add_reply(PresetReply::with_text(format!("reply {n}")));
        }

        let mut generator = GeneratorBuilder::new(
            provider.clone(),
            template("turn {n}", &["n"]),
        )
        .with_memory_policy(MemoryPolicy::Window(1))
        .build();
        for n in 0..3 {
            generator.predict(&[("n", &n.to_string())]).await.unwrap();
        }

        // Only the single retained turn is replayed.
        let requests = provider.requests();
        assert_eq!(
            requests[2].messages,
            vec![
                PromptMessage::User("turn 1".to_owned()),
                PromptMessage::Assistant("reply 1".to_owned()),
                PromptMessage::User("turn 2".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_variable_skips_provider() {
        let provider = ScriptedProvider::default();
        let mut generator = GeneratorBuilder::new(
            provider.clone(),
            template("say {word}", &["word"]),
        )
        .build();

        let err = generator.predict(&[("other", "x")]).await.unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::Template(TemplateError::MissingVariable(_))
        ));
        assert!(provider.requests().is_empty());
        assert!(generator.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = ScriptedProvider::default();
        provider.add_reply(PresetReply::with_failure(
            ErrorKind::RateLimitExceeded,
        ));

        let mut generator =
            GeneratorBuilder::new(provider, template("hello", &[])).build();
        let err = generator.predict(&[]).await.unwrap_err();
        let GeneratorError::Provider(err) = err else {
            panic!("expected a provider error");
        };
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    }
}
