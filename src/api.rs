use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

use crate::auth::{bearer_token, StaticTokenVerifier, TokenVerifier};
use crate::cache::InMemoryResearchStore;
use crate::config::{Config, ProviderKind};
use crate::error::{ApiError, PipelineError};
use crate::models::{ResearchRequest, ResearchResult};
use crate::pipeline::{PipelineServices, ResearchPipeline};
use crate::tasks::{CredibilityPolicy, SourceRanker};
use crate::tools::{
    ArxivSearch, BraveSearch, MetadataFetcher, OpenAiGenerator, PubmedSearch, SearchAdapter,
    SearchProvider, SemanticScholarSearch, SerperSearch, TavilySearch,
};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ResearchPipeline>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    /// Wires the production collaborators described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.search_timeout)
            .build()?;

        let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::new();
        for &kind in &config.provider_order {
            let provider: Arc<dyn SearchProvider> = match (kind, config.provider_key(kind)) {
                (ProviderKind::Serper, Some(key)) => Arc::new(SerperSearch::new(key, http.clone())),
                (ProviderKind::Brave, Some(key)) => Arc::new(BraveSearch::new(key, http.clone())),
                (ProviderKind::Tavily, Some(key)) => Arc::new(TavilySearch::new(key, http.clone())),
                (ProviderKind::SemanticScholar, key) => Arc::new(SemanticScholarSearch::new(
                    key.map(str::to_string),
                    http.clone(),
                )),
                (ProviderKind::Arxiv, _) => Arc::new(ArxivSearch::new(http.clone())),
                (ProviderKind::Pubmed, _) => Arc::new(PubmedSearch::new(http.clone())),
                (kind, None) => {
                    warn!("{:?} listed in SEARCH_PROVIDERS but has no API key, skipping", kind);
                    continue;
                }
            };
            providers.push(provider);
        }
        if providers.is_empty() {
            warn!("No search provider configured; every research will come back without sources");
        }

        if config.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY not set; analysis and summaries will use fallbacks");
        }
        let generator = Arc::new(OpenAiGenerator::new(
            config.openai_api_key.as_deref(),
            &config.openai_model,
            config.llm_timeout,
        ));

        let fetcher = if config.enrich_metadata {
            Some(MetadataFetcher::new(config.metadata_timeout)?)
        } else {
            None
        };

        let services = PipelineServices {
            generator,
            search: SearchAdapter::new(providers),
            fetcher,
            ranker: SourceRanker::new(CredibilityPolicy {
                allow_non_commercial: config.credibility_non_commercial,
            }),
        };
        let pipeline = ResearchPipeline::new(
            services,
            Arc::new(InMemoryResearchStore::new()),
            config.cache_ttl,
        );

        let verifier = StaticTokenVerifier::new(config.api_tokens.clone());
        if verifier.is_open() {
            warn!("RESEARCH_API_TOKENS not set; the research endpoint accepts every caller");
        }

        Ok(Self {
            pipeline: Arc::new(pipeline),
            verifier: Arc::new(verifier),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sources", get(sources))
        .route("/api/research", post(research))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Caller identity established from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .unwrap_or_default();

        state
            .verifier
            .verify(token)
            .map(AuthenticatedUser)
            .ok_or(ApiError::Unauthorized)
    }
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesResponse {
    pub providers: Vec<String>,
    pub generative: bool,
    pub metadata_enrichment: bool,
}

async fn sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        providers: state.pipeline.provider_names(),
        generative: state.pipeline.generative_enabled(),
        metadata_enrichment: state.pipeline.metadata_enrichment(),
    })
}

#[instrument(skip_all, fields(user = %user.0))]
async fn research(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::Validation(rejection.body_text()).into_response(),
    };
    info!("Research requested");

    let outcome = AssertUnwindSafe(state.pipeline.research(&request.query))
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(result)) => Json(result).into_response(),
        Ok(Err(PipelineError::EmptyQuery)) => {
            ApiError::Validation("Query is required".to_string()).into_response()
        }
        Ok(Err(e)) => {
            error!("Research failed: {}", e);
            internal_fault(&request.query)
        }
        Err(_) => {
            error!("Research panicked");
            internal_fault(&request.query)
        }
    }
}

fn internal_fault(query: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ResearchResult::apology(query.trim())),
    )
        .into_response()
}
