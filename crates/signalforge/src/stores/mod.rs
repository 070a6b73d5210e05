//! Production store backends for the command-line front end.

mod fs;
mod records;
mod webhook;

pub use fs::FsObjectStore;
pub use records::JsonRecordStore;
pub use webhook::{NoopTrigger, WebhookTrigger};
