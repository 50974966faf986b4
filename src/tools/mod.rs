pub mod arxiv;
pub mod brave;
pub mod llm;
pub mod metadata;
pub mod pubmed;
pub mod search;
pub mod semantic_scholar;
pub mod serper;
pub mod tavily;
pub mod text;

pub use arxiv::ArxivSearch;
pub use brave::BraveSearch;
pub use llm::{OpenAiGenerator, TextGenerator};
pub use metadata::MetadataFetcher;
pub use pubmed::PubmedSearch;
pub use search::{SearchAdapter, SearchProvider};
pub use semantic_scholar::SemanticScholarSearch;
pub use serper::SerperSearch;
pub use tavily::TavilySearch;
