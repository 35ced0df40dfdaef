//! Translation: service client, prompt template and request orchestration

mod client;
mod orchestrator;
mod prompt;

pub use client::{OllamaClient, TranslateError, TranslationService};
pub use orchestrator::{
    Orchestrator, OrchestratorClosed, OrchestratorHandle, OrchestratorSettings, Snapshot,
    TranslationRequest,
};
pub use prompt::build_prompt;

#[cfg(test)]
pub(crate) use orchestrator::Command;
