pub mod classification;
pub mod config;
pub mod extraction;
pub mod llm;
pub mod local_model;
pub mod models;
pub mod pdf;
pub mod service;
pub mod store;
pub mod tasks;
pub mod upload;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use config::ServiceConfig;
pub use llm::ChatModel;
pub use local_model::{SamplingParams, TextGenerator};
pub use models::*;
pub use pdf::TextExtractor;
pub use service::{AppState, build_router, create_app};
pub use store::{ArchiveCounts, ArchiveStore};
pub use workflow::{TriageDeps, build_triage_workflow, run_document};
