mod common;

use common::{pipeline, pipeline_with_sessions, FakeGenerator, FakeProvider, TrackedSessions};
use research_flow::PipelineError;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn unreachable_services_still_produce_a_result() {
    let generator = FakeGenerator::failing();
    let provider = FakeProvider::broken("primary");
    let pipeline = pipeline(generator.clone(), vec![provider.clone()], HOUR);

    let result = pipeline.research("deep sea mining impacts").await.unwrap();
    assert!(result.sources.is_empty());
    assert!(!result.response.is_empty());
    assert!(result.response.contains('0'));
    assert!(result.response.contains("deep sea mining impacts"));
    assert_eq!(result.query, "deep sea mining impacts");

    // fallback analysis searches the query verbatim
    assert_eq!(provider.queries(), vec![("deep sea mining impacts".to_string(), 5)]);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn blank_query_is_rejected_without_external_calls() {
    let generator = FakeGenerator::replying(r#"{"searchQueries": ["x"]}"#, "summary");
    let provider = FakeProvider::new("primary", "a.org", 3);
    let pipeline = pipeline(generator.clone(), vec![provider.clone()], HOUR);

    for query in ["", "   ", "\n\t"] {
        let err = pipeline.research(query).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyQuery));
    }
    assert_eq!(generator.calls(), 0);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    let generator = FakeGenerator::replying(
        r#"{"mainTopic": "solar", "searchQueries": ["solar output", "solar cost"]}"#,
        "Solar output keeps rising.",
    );
    let provider = FakeProvider::new("primary", "energy.gov", 2);
    let pipeline = pipeline(generator.clone(), vec![provider.clone()], HOUR);

    let first = pipeline.research("Solar Power Trends").await.unwrap();
    assert_eq!(first.response, "Solar output keeps rising.");
    assert_eq!(first.sources.len(), 4);
    let generator_calls = generator.calls();
    let provider_calls = provider.calls();

    let second = pipeline.research("  solar power trends ").await.unwrap();
    assert_eq!(second, first);
    assert_eq!(
        serde_json::to_string(&second).unwrap(),
        serde_json::to_string(&first).unwrap()
    );
    assert_eq!(generator.calls(), generator_calls);
    assert_eq!(provider.calls(), provider_calls);
}

#[tokio::test(start_paused = true)]
async fn expired_entries_are_recomputed() {
    let generator = FakeGenerator::failing();
    let provider = FakeProvider::new("primary", "energy.gov", 1);
    let pipeline = pipeline(generator.clone(), vec![provider.clone()], Duration::from_secs(60));

    let first = pipeline.research("wind turbines").await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    pipeline.research("wind turbines").await.unwrap();
    assert_eq!(provider.calls(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    // the paused clock only drives the cache; timestamps come from the wall clock
    std::thread::sleep(Duration::from_millis(5));
    let third = pipeline.research("wind turbines").await.unwrap();
    assert_eq!(provider.calls(), 2);
    assert_ne!(third.timestamp, first.timestamp);
}

#[tokio::test]
async fn only_three_sub_queries_and_eight_sources() {
    let generator = FakeGenerator::replying(
        r#"{"searchQueries": ["q one", "q two", "q three", "q four", "q five"]}"#,
        "summary",
    );
    let provider = FakeProvider::new("primary", "data.org", 5);
    let pipeline = pipeline(generator, vec![provider.clone()], HOUR);

    let result = pipeline.research("anything").await.unwrap();
    let searched: Vec<String> = provider.queries().into_iter().map(|(q, _)| q).collect();
    let mut sorted = searched.clone();
    sorted.sort();
    assert_eq!(sorted, vec!["q one", "q three", "q two"]);
    assert_eq!(result.sources.len(), 8);
}

#[tokio::test]
async fn empty_primary_falls_back_to_secondary() {
    let generator = FakeGenerator::failing();
    let primary = FakeProvider::new("primary", "a.org", 0);
    let secondary = FakeProvider::new("secondary", "b.org", 2);
    let pipeline = pipeline(generator, vec![primary.clone(), secondary.clone()], HOUR);

    let result = pipeline.research("ocean acidification").await.unwrap();
    assert_eq!(primary.queries(), secondary.queries());
    assert_eq!(result.sources.len(), 2);
    assert!(result.sources.iter().all(|s| s.domain == "b.org"));
    assert!(result.response.contains('2'));
}

#[tokio::test]
async fn all_commercial_hits_are_kept_unfiltered() {
    let generator = FakeGenerator::failing();
    let shop = FakeProvider::new("shop", "deals.example.com", 2);
    let pipeline = pipeline(generator, vec![shop], HOUR);

    // every hit is commercial, so the unfiltered list comes back
    let result = pipeline.research("cheap batteries").await.unwrap();
    assert_eq!(result.sources.len(), 2);
    assert_eq!(result.sources[0].domain, "deals.example.com");
}

#[tokio::test]
async fn sessions_are_dropped_after_every_run() {
    let sessions = TrackedSessions::new();
    let ok = pipeline_with_sessions(
        FakeGenerator::failing(),
        vec![FakeProvider::new("primary", "a.org", 1)],
        HOUR,
        sessions.clone(),
    );
    ok.research("tidal energy").await.unwrap();
    assert_eq!(sessions.live(), 0);

    let generator = std::sync::Arc::new(FakeGenerator {
        panic: true,
        ..Default::default()
    });
    let faulty = pipeline_with_sessions(generator, vec![], HOUR, sessions.clone());
    for _ in 0..3 {
        let err = faulty.research("tidal energy").await.unwrap_err();
        assert!(matches!(err, PipelineError::Aborted(_)));
    }
    assert_eq!(sessions.live(), 0);
}
