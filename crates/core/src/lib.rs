//! Core logic of the generation and deployment pipeline: prompt
//! templates, conversational generation, response extraction, work
//! records, the artifact batch loop and the deploy-script synthesizer.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod client;
pub mod conversation;
pub mod deploy;
pub mod extract;
pub mod generator;
pub mod intake;
pub mod pipeline;
pub mod prompt;
pub mod slug;
pub mod store;
pub mod template;

pub use client::{CompletionClient, CompletionOutput};
