//! The intake stage: generate the item list for an owner and flag the
//! work record ready for the batch pipeline.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use signalforge_model::{CompletionProvider, ModelParameters};

use crate::conversation::MemoryPolicy;
use crate::extract::{self, ExtractError};
use crate::generator::{GeneratorBuilder, GeneratorError};
use crate::prompt;
use crate::store::{PipelineTrigger, RecordStore, StoreError, WorkRecord};

/// The error type for the intake stage.
#[derive(Debug)]
pub enum IntakeError {
    /// The list generation call failed.
    Generator(GeneratorError),
    /// The model response contained no usable list.
    Extract(ExtractError),
    /// The work record could not be written.
    Store(StoreError),
}

impl Display for IntakeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IntakeError::Generator(err) => write!(f, "generator: {err}"),
            IntakeError::Extract(err) => write!(f, "extract: {err}"),
            IntakeError::Store(err) => write!(f, "store: {err}"),
        }
    }
}

impl Error for IntakeError {}

impl From<GeneratorError> for IntakeError {
    fn from(err: GeneratorError) -> Self {
        IntakeError::Generator(err)
    }
}

impl From<ExtractError> for IntakeError {
    fn from(err: ExtractError) -> Self {
        IntakeError::Extract(err)
    }
}

impl From<StoreError> for IntakeError {
    fn from(err: StoreError) -> Self {
        IntakeError::Store(err)
    }
}

/// Configuration for one intake request.
#[derive(Clone, Debug)]
pub struct IntakeConfig {
    /// How many items to ask for.
    pub number: u32,
    /// The industry the items belong to.
    pub industry: String,
    /// The downstream pipeline to trigger once the record is ready.
    pub pipeline: String,
    /// Sampling parameters for the list call.
    pub params: ModelParameters,
    /// Dialogue memory policy for the list generator.
    pub memory: MemoryPolicy,
}

impl IntakeConfig {
    /// Creates a config with the stage's default sampling parameters:
    /// list generation wants determinism, so temperature and top-p are
    /// zero.
    pub fn new(
        number: u32,
        industry: impl Into<String>,
        pipeline: impl Into<String>,
    ) -> Self {
        Self {
            number,
            industry: industry.into(),
            pipeline: pipeline.into(),
            params: ModelParameters {
                max_tokens: 1000,
                temperature: 0.0,
                top_p: 0.0,
            },
            memory: MemoryPolicy::default(),
        }
    }
}

/// Generates the item list for `owner_id`, writes a ready work record
/// and fires the downstream pipeline trigger.
///
/// Returns the extracted display names in model output order.
pub async fn request_items<P: CompletionProvider + 'static>(
    provider: P,
    owner_id: &str,
    config: &IntakeConfig,
    records: &dyn RecordStore,
    trigger: &dyn PipelineTrigger,
) -> Result<Vec<String>, IntakeError> {
    let mut generator =
        GeneratorBuilder::new(provider, prompt::list_template())
            .with_params(config.params)
            .with_memory_policy(config.memory)
            .build();

    let number = config.number.to_string();
    let raw = generator
        .predict(&[
            ("number", number.as_str()),
            ("industry", config.industry.as_str()),
        ])
        .await?;
    let items = extract::extract_list(&raw)?;
    info!(owner_id, count = items.len(), "extracted item list");

    records
        .put(WorkRecord::new(owner_id, items.clone()), None)
        .await?;
    trigger.start(&config.pipeline).await;

    Ok(items)
}

#[cfg(test)]
mod tests {
    use signalforge_model::PromptMessage;
    use signalforge_test_model::{PresetReply, ScriptedProvider};

    use super::*;
    use crate::store::memory::{MemoryRecordStore, RecordingTrigger};

    #[tokio::test]
    async fn test_request_items() {
        let provider = ScriptedProvider::default();
        provider.add_reply(PresetReply::with_text(
            "Sure!\n```\n1. Alpha: desc\n- Beta - note\n3. Gamma\n```",
        ));
        let records = MemoryRecordStore::new();
        let trigger = RecordingTrigger::new();
        let config = IntakeConfig::new(3, "automotive", "artifact-build");

        let items = request_items(
            provider.clone(),
            "alice",
            &config,
            &records,
            &trigger,
        )
        .await
        .unwrap();
        assert_eq!(items, vec!["Alpha", "Beta", "Gamma"]);

        let record = records.get("alice").unwrap();
        assert!(record.ready);
        assert_eq!(record.items, items);
        assert_eq!(trigger.started(), vec!["artifact-build".to_owned()]);

        // The filled prompt carries the requested count and industry.
        let requests = provider.requests();
        let PromptMessage::User(prompt) = &requests[0].messages[0] else {
            panic!("expected a user message");
        };
        assert!(prompt.contains("at least 3 different automotive"));
        assert_eq!(requests[0].params.max_tokens, 1000);
        assert_eq!(requests[0].params.temperature, 0.0);
    }

    #[tokio::test]
    async fn test_unfenced_response_writes_nothing() {
        let provider = ScriptedProvider::default();
        provider.add_reply(PresetReply::with_text("1. Alpha\n2. Beta"));
        let records = MemoryRecordStore::new();
        let trigger = RecordingTrigger::new();
        let config = IntakeConfig::new(2, "chemical", "artifact-build");

        let err = request_items(provider, "alice", &config, &records, &trigger)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IntakeError::Extract(ExtractError::NoFencedBlock)
        ));
        assert!(records.get("alice").is_none());
        assert!(trigger.started().is_empty());
    }
}
