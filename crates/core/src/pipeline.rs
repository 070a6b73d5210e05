//! The artifact batch pipeline: drive generation, extraction and
//! persistence for every item of a ready work record.

use std::collections::HashSet;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use bytes::Bytes;
use signalforge_model::{CompletionProvider, ModelParameters};
use tokio::fs;

use crate::conversation::MemoryPolicy;
use crate::deploy::DeployScript;
use crate::extract::{self, ExtractError};
use crate::generator::{Generator, GeneratorBuilder, GeneratorError};
use crate::prompt;
use crate::slug::to_slug;
use crate::store::{ObjectStore, RecordStore, StoreError, WorkRecord};

/// The target language of generated artifacts, deciding the entry file
/// extension and the deploy-script interpreter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Language {
    /// Name used in the code-generation prompt.
    pub name: String,
    /// Entry file extension.
    pub extension: String,
    /// Interpreter the deploy script invokes.
    pub runner: String,
}

impl Language {
    /// Resolves a language by name. Unknown names fall back to using
    /// the name itself as both extension and runner.
    pub fn from_name(name: &str) -> Self {
        let (extension, runner) = match name {
            "python" => ("py", "python"),
            "javascript" => ("js", "node"),
            "bash" | "shell" => ("sh", "bash"),
            other => (other, other),
        };
        Self {
            name: name.to_owned(),
            extension: extension.to_owned(),
            runner: runner.to_owned(),
        }
    }

    /// Returns the entry file name, `main.<ext>`.
    pub fn entry_file(&self) -> String {
        format!("main.{}", self.extension)
    }
}

/// Configuration for one batch run.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Expertise qualifier substituted into the code prompt.
    pub context: String,
    /// Target language of the generated artifacts.
    pub language: Language,
    /// Sampling parameters for the code calls.
    pub params: ModelParameters,
    /// Dialogue memory policy for the code generator.
    pub memory: MemoryPolicy,
    /// Local directory artifacts and the deploy script are written to.
    pub workdir: PathBuf,
    /// Locator of the data sink the deploy script uploads to.
    pub data_sink: String,
    /// Filter for artifact output files worth uploading.
    pub data_glob: String,
}

impl BatchConfig {
    /// Creates a config with the stage's defaults: a skilled python
    /// expert, generous token budget, full sampling temperature.
    pub fn new(workdir: impl Into<PathBuf>, data_sink: impl Into<String>) -> Self {
        Self {
            context: "very skilled".to_owned(),
            language: Language::from_name("python"),
            params: ModelParameters {
                max_tokens: 4000,
                temperature: 1.0,
                top_p: 1.0,
            },
            memory: MemoryPolicy::default(),
            workdir: workdir.into(),
            data_sink: data_sink.into(),
            data_glob: "*.csv".to_owned(),
        }
    }
}

/// Why a single item of a batch failed.
///
/// Item errors never abort the batch; they are reported per item in
/// the returned outcome list.
#[derive(Debug)]
pub enum ItemError {
    /// The display name normalized to an empty slug; nothing can be
    /// stored under it.
    EmptySlug,
    /// Another item in this batch already produced the same slug. The
    /// first occurrence wins; later ones are skipped before any
    /// generation traffic.
    DuplicateSlug(String),
    /// The code generation call failed.
    Generation(GeneratorError),
    /// The model response contained no usable code block.
    Extract(ExtractError),
    /// The artifact could not be written to the local workdir.
    Persist(std::io::Error),
    /// The artifact could not be uploaded to the object store.
    Upload(StoreError),
}

impl Display for ItemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ItemError::EmptySlug => {
                write!(f, "name normalizes to an empty slug")
            }
            ItemError::DuplicateSlug(slug) => {
                write!(f, "slug `{slug}` already produced by an earlier item")
            }
            ItemError::Generation(err) => write!(f, "generation: {err}"),
            ItemError::Extract(err) => write!(f, "extract: {err}"),
            ItemError::Persist(err) => write!(f, "persist: {err}"),
            ItemError::Upload(err) => write!(f, "upload: {err}"),
        }
    }
}

impl Error for ItemError {}

/// The per-item result of a batch run.
#[derive(Debug)]
pub struct ItemOutcome {
    /// The original display name.
    pub name: String,
    /// The slug the name normalized to.
    pub slug: String,
    /// The failure, if the item failed.
    pub error: Option<ItemError>,
}

impl ItemOutcome {
    /// Returns `true` if the item's artifact was persisted and
    /// uploaded.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// The error type for a whole batch invocation.
///
/// Per-item failures are never surfaced here; only the shared pieces
/// of a batch run, the work record and the deploy script, can abort it.
#[derive(Debug)]
pub enum BatchError {
    /// The work record could not be read or written back.
    Store(StoreError),
    /// The deploy script could not be written.
    Script(std::io::Error),
}

impl Display for BatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Store(err) => write!(f, "record store: {err}"),
            BatchError::Script(err) => {
                write!(f, "writing deploy script: {err}")
            }
        }
    }
}

impl Error for BatchError {}

/// Returns the first ready work record, if any.
///
/// Exactly one record is processed per batch invocation; further ready
/// records wait for the next run.
pub async fn find_ready(
    records: &dyn RecordStore,
) -> Result<Option<WorkRecord>, StoreError> {
    Ok(records.scan_ready().await?.into_iter().next())
}

/// Runs the batch for one ready work record.
///
/// For each item, in list order: normalize the name to a slug,
/// generate and extract the code, persist it under
/// `workdir/<slug>/main.<ext>` (destructively replacing any prior
/// directory of the same slug) and upload it under
/// `<owner>/<slug>/main.<ext>`. One item's failure is recorded and the
/// loop continues. After all items are attempted the deploy script is
/// synthesized over the full original item list and the record is
/// flipped to not-ready with a compare-and-swap on its revision.
pub async fn run_batch<P: CompletionProvider + 'static>(
    provider: P,
    record: &WorkRecord,
    config: &BatchConfig,
    objects: &dyn ObjectStore,
    records: &dyn RecordStore,
) -> Result<Vec<ItemOutcome>, BatchError> {
    let mut generator =
        GeneratorBuilder::new(provider, prompt::code_template())
            .with_params(config.params)
            .with_memory_policy(config.memory)
            .build();

    let mut outcomes = Vec::with_capacity(record.items.len());
    let mut seen_slugs = HashSet::new();
    for item in &record.items {
        let slug = to_slug(item);
        let error = process_item(
            &mut generator,
            item,
            &slug,
            &mut seen_slugs,
            record,
            config,
            objects,
        )
        .await
        .err();
        if let Some(error) = &error {
            warn!(
                item = item.as_str(),
                %error,
                "item failed, continuing with the batch"
            );
        }
        outcomes.push(ItemOutcome {
            name: item.clone(),
            slug,
            error,
        });
    }

    let script = DeployScript::new(
        &record.items,
        &config.data_sink,
        &record.owner_id,
    )
    .with_runner(&config.language.runner)
    .with_entry(config.language.entry_file())
    .with_data_glob(&config.data_glob)
    .render();
    fs::write(config.workdir.join("deploy.sh"), script)
        .await
        .map_err(BatchError::Script)?;

    let mut updated = record.clone();
    updated.ready = false;
    records
        .put(updated, Some(record.revision))
        .await
        .map_err(BatchError::Store)?;

    info!(
        owner_id = record.owner_id.as_str(),
        total = outcomes.len(),
        failed = outcomes.iter().filter(|o| !o.is_ok()).count(),
        "batch complete"
    );
    Ok(outcomes)
}

async fn process_item(
    generator: &mut Generator,
    item: &str,
    slug: &str,
    seen_slugs: &mut HashSet<String>,
    record: &WorkRecord,
    config: &BatchConfig,
    objects: &dyn ObjectStore,
) -> Result<(), ItemError> {
    if slug.is_empty() {
        return Err(ItemError::EmptySlug);
    }
    if !seen_slugs.insert(slug.to_owned()) {
        return Err(ItemError::DuplicateSlug(slug.to_owned()));
    }

    let raw = generator
        .predict(&[
            ("context", config.context.as_str()),
            ("topic", item),
            ("language", config.language.name.as_str()),
        ])
        .await
        .map_err(ItemError::Generation)?;
    let code = extract::extract_code(&raw).map_err(ItemError::Extract)?;

    // Replace any prior artifact of the same slug wholesale.
    let dir = config.workdir.join(slug);
    if fs::metadata(&dir).await.is_ok() {
        fs::remove_dir_all(&dir).await.map_err(ItemError::Persist)?;
    }
    fs::create_dir_all(&dir).await.map_err(ItemError::Persist)?;
    let entry = config.language.entry_file();
    fs::write(dir.join(&entry), &code)
        .await
        .map_err(ItemError::Persist)?;

    let key = format!("{}/{slug}/{entry}", record.owner_id);
    objects
        .put(&key, Bytes::from(code))
        .await
        .map_err(ItemError::Upload)?;
    info!(key = key.as_str(), "uploaded artifact");
    Ok(())
}
