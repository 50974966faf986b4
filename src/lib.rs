pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod tasks;
pub mod tools;

pub use api::{router, AppState};
pub use cache::{InMemoryResearchStore, ResearchStore};
pub use config::Config;
pub use error::{ApiError, PipelineError};
pub use models::{QueryAnalysis, RawHit, ResearchResult, Source};
pub use pipeline::{PipelineServices, ResearchPipeline};
