//! End-to-end tests for the search pipeline.
//!
//! These tests drive `Pipeline::run` with mock collaborators and check the
//! guarantees callers rely on:
//! 1. The minimum result count is met (or the response says it could not be)
//! 2. Records are sorted by relevance with unique ids
//! 3. Stage failures degrade the result instead of failing the request
//! 4. Deadlines and cancellation fall through to the fallback ladder

use std::collections::HashSet;
use std::time::Duration;

use search_pipeline::{
    testing::{MockFetchCall, MockFetcher, MockModel},
    FetchError, Pipeline, PipelineConfig, RawContent, SearchRequest, SearchResponse,
};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

fn intent(label: &str, confidence: f32) -> String {
    format!(
        r#"{{"records": [{{"intent": "{label}", "confidence": {confidence}, "reasoning": "test", "target_sources": null, "locale": null}}]}}"#
    )
}

fn card(name: &str, url: &str, niche: &str, description: &str) -> String {
    format!(
        r#"{{"name": "{name}", "platform": "YouTube", "profile_url": "{url}", "niche": "{niche}", "description": "{description}", "follower_count": null, "engagement_rate": null, "location": null, "verified": null}}"#
    )
}

fn cards(cards: &[String]) -> String {
    format!(r#"{{"records": [{}]}}"#, cards.join(", "))
}

fn three_cards() -> String {
    cards(&[
        card("MKBHD", "https://www.youtube.com/@mkbhd", "tech", "Tech reviewer"),
        card("Linus", "https://www.youtube.com/@linustechtips", "tech", "PC builds"),
        card("iJustine", "https://www.youtube.com/@ijustine", "tech", "Gadget reviews"),
    ])
}

fn snippet() -> Vec<RawContent> {
    vec![RawContent::search(
        "https://blog.example.com/best-tech-reviewers",
        "MKBHD, Linus Tech Tips and iJustine are popular tech reviewers.",
    )
    .with_title("Best tech reviewers")]
}

fn pipeline(model: MockModel, fetcher: MockFetcher) -> Pipeline<MockModel, MockFetcher> {
    assert_ok!(Pipeline::new(model, fetcher, PipelineConfig::default()))
}

fn assert_ranked(response: &SearchResponse) {
    for pair in response.records.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
    }
    let ids: HashSet<_> = response.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids.len(), response.records.len());
}

#[tokio::test]
async fn test_no_content_anywhere_generates_placeholders() {
    let model = MockModel::new().with_response("intent", intent("general_search", 0.9));
    let pipeline = pipeline(model, MockFetcher::new());

    let response = pipeline
        .run(&SearchRequest::new("obscure underwater basket weavers").with_min_results(3))
        .await;

    assert!(response.success);
    assert_eq!(response.fallback_tier, 2);
    assert_eq!(response.records.len(), 3);
    assert!(response.records.iter().all(|r| r.synthetic));
    assert_ranked(&response);
    // nothing to normalize, so no extraction call beyond classification
    assert_eq!(pipeline.model().calls_for("result_card"), 0);
}

#[tokio::test]
async fn test_enough_real_records_stay_at_tier_zero() {
    let model = MockModel::new()
        .with_response("intent", intent("general_search", 0.9))
        .with_response(
            "result_card",
            cards(&[
                card("A", "https://www.youtube.com/@a", "cooking", "Recipes"),
                card("B", "https://www.youtube.com/@b", "tech", "Tech reviewer"),
                card("C", "https://www.youtube.com/@c", "tech", "Phones"),
                card("D", "https://www.youtube.com/@d", "tech", "Laptop reviews"),
                card("E", "https://www.youtube.com/@e", "travel", "Vlogs"),
            ]),
        );
    let fetcher = MockFetcher::new().with_default_search(snippet());
    let pipeline = pipeline(model, fetcher);

    let response = pipeline
        .run(&SearchRequest::new("tech reviewers").with_min_results(3))
        .await;

    assert!(response.success);
    assert_eq!(response.fallback_tier, 0);
    assert_eq!(response.records.len(), 5);
    assert!(response.records.iter().all(|r| !r.synthetic));
    assert!(response.errors.is_empty());
    assert_ranked(&response);

    let names: Vec<_> = response
        .records
        .iter()
        .filter_map(|r| r.field("name"))
        .collect();
    // both terms, then one term, then neither; ties keep arrival order
    assert_eq!(names, vec!["B", "C", "D", "A", "E"]);
}

#[tokio::test]
async fn test_max_results_caps_the_response() {
    let model = MockModel::new()
        .with_response("intent", intent("general_search", 0.9))
        .with_response("result_card", three_cards());
    let fetcher = MockFetcher::new().with_default_search(snippet());
    let pipeline = pipeline(model, fetcher);

    let response = pipeline
        .run(
            &SearchRequest::new("tech reviewers")
                .with_min_results(1)
                .with_max_results(2),
        )
        .await;

    assert_eq!(response.records.len(), 2);
    assert_eq!(response.fallback_tier, 0);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_search_recovers_after_backoff() {
    let query = "tech reviewers";
    let blocked = || FetchError::Blocked {
        target: "search".into(),
        status: 429,
    };
    let model = MockModel::new()
        .with_response("intent", intent("general_search", 0.9))
        .with_response("result_card", three_cards());
    let fetcher = MockFetcher::new()
        .with_search_errors(query, vec![blocked(), blocked()])
        .with_search_results(query, snippet());
    let pipeline = pipeline(model, fetcher);

    let started = tokio::time::Instant::now();
    let response = pipeline
        .run(&SearchRequest::new(query).with_min_results(3))
        .await;

    assert!(response.success);
    assert!(response.errors.is_empty());
    assert_eq!(response.fallback_tier, 0);
    assert_eq!(pipeline.fetcher().search_queries().len(), 3);
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_classifier_timeout_falls_back_to_search() {
    let model = MockModel::new()
        .with_response("intent", intent("influencer_search", 0.99))
        .with_delay(Duration::from_secs(2));
    let fetcher = MockFetcher::new().with_default_search(snippet());
    let config = PipelineConfig::default().with_extractor_timeout(Duration::from_secs(1));
    let pipeline = assert_ok!(Pipeline::new(model, fetcher, config));

    let response = pipeline
        .run(&SearchRequest::new("tech reviewers on youtube").with_min_results(2))
        .await;

    assert!(response.success);
    assert_eq!(response.intent, "unknown");
    assert!(response.errors["intent"].contains("timed out"));
    assert_eq!(
        pipeline.fetcher().calls(),
        vec![MockFetchCall::Search {
            query: "tech reviewers on youtube".into(),
            locale: "en-US".into(),
        }]
    );
    assert_eq!(response.records.len(), 2);
}

#[tokio::test]
async fn test_zero_minimum_returns_nothing_without_fallback() {
    let pipeline = pipeline(MockModel::new(), MockFetcher::new());

    let response = pipeline
        .run(&SearchRequest::new("anything at all").with_min_results(0))
        .await;

    assert!(response.success);
    assert_eq!(response.fallback_tier, 0);
    assert!(response.records.is_empty());
}

#[tokio::test]
async fn test_incomplete_records_are_used_at_tier_one() {
    let model = MockModel::new()
        .with_response("intent", intent("general_search", 0.9))
        .with_response(
            "result_card",
            r#"{"records": [
                {"name": "MKBHD", "platform": "YouTube", "profile_url": "https://www.youtube.com/@mkbhd", "niche": "tech", "description": "Tech reviewer"},
                {"name": "Linus", "platform": "YouTube", "profile_url": "https://www.youtube.com/@linustechtips", "niche": "tech", "description": null}
            ]}"#,
        );
    let fetcher = MockFetcher::new().with_default_search(snippet());
    let pipeline = pipeline(model, fetcher);

    let response = pipeline
        .run(&SearchRequest::new("tech reviewers").with_min_results(2))
        .await;

    assert!(response.success);
    assert_eq!(response.fallback_tier, 1);
    assert_eq!(response.records.len(), 2);
    assert_eq!(response.records[1].missing_fields, vec!["description"]);
    // relaxing reuses the extracted candidates
    assert_eq!(pipeline.model().calls_for("result_card"), 1);
}

#[tokio::test]
async fn test_both_plan_merges_search_before_scrape() {
    let query = "tech reviewers on youtube";
    let model = MockModel::new()
        .with_response("intent", intent("influencer_search", 0.9))
        .with_response("result_card", three_cards());
    let fetcher = MockFetcher::new()
        .with_search_results(query, snippet())
        .with_search_results(
            format!("{query} site:youtube.com"),
            vec![RawContent::search("https://www.youtube.com/@mkbhd", "MKBHD channel snippet")],
        )
        .with_page("https://www.youtube.com/@mkbhd", "MKBHD full channel page")
        .with_delay(Duration::from_millis(5));
    let pipeline = pipeline(model, fetcher);

    let response = pipeline
        .run(&SearchRequest::new(query).with_min_results(3))
        .await;
    assert!(response.success);
    assert_eq!(pipeline.fetcher().url_calls("https://www.youtube.com/@mkbhd"), 1);

    let calls = pipeline.model().calls();
    let prompt = &calls
        .iter()
        .find(|c| c.schema_name == "result_card")
        .expect("normalization ran")
        .user;
    let search_at = prompt.find("blog.example.com").expect("search item present");
    let scrape_at = prompt.find("full channel page").expect("scraped page present");
    assert!(search_at < scrape_at);
    assert!(!prompt.contains("channel snippet"));
}

#[tokio::test]
async fn test_explicit_url_is_scraped_without_search() {
    let model = MockModel::new()
        .with_response("intent", intent("web_scraping", 0.95))
        .with_response(
            "result_card",
            cards(&[card("Acme", "https://example.com/team", "widgets", "Widget makers")]),
        );
    let fetcher = MockFetcher::new().with_page("https://example.com/team", "Acme team page");
    let pipeline = pipeline(model, fetcher);

    let response = pipeline
        .run(&SearchRequest::new("extract the team from https://example.com/team").with_min_results(1))
        .await;

    assert!(response.success);
    assert_eq!(
        pipeline.fetcher().calls(),
        vec![MockFetchCall::Url {
            url: "https://example.com/team".into()
        }]
    );
    assert_eq!(response.records[0].primary_url, "https://example.com/team");
}

#[tokio::test]
async fn test_failed_stages_are_recorded_not_thrown() {
    let model = MockModel::new()
        .with_failure("intent", "provider down")
        .with_failure("result_card", "provider down");
    let fetcher = MockFetcher::new()
        .with_default_search(snippet())
        .with_search_errors(
            "tech reviewers",
            vec![FetchError::unreachable("search", "connection reset")],
        );
    let pipeline = pipeline(model, fetcher);

    let response = pipeline
        .run(&SearchRequest::new("tech reviewers").with_min_results(2))
        .await;

    assert!(response.success);
    assert_eq!(response.intent, "unknown");
    assert!(response.errors.contains_key("intent"));
    assert!(response.errors["search"].contains("connection reset"));
    assert_eq!(response.fallback_tier, 2);
    assert_eq!(response.records.len(), 2);
}

#[tokio::test]
async fn test_unreachable_minimum_fails_the_request() {
    let config = PipelineConfig::default().with_max_synthetic(2);
    let pipeline = assert_ok!(Pipeline::new(MockModel::new(), MockFetcher::new(), config));

    let response = pipeline
        .run(&SearchRequest::new("tech reviewers").with_min_results(10))
        .await;

    assert!(!response.success);
    assert_eq!(response.fallback_tier, 2);
    assert!(response.errors["fallback"].contains("required 10"));
    assert!(response.records.len() < 10);
}

#[tokio::test]
async fn test_cache_does_not_change_output() {
    let build = || {
        let model = MockModel::new()
            .with_response("intent", intent("general_search", 0.9))
            .with_response("result_card", three_cards());
        let fetcher = MockFetcher::new().with_default_search(snippet());
        pipeline(model, fetcher)
    };
    let request = SearchRequest::new("tech reviewers").with_min_results(3);

    let cached = build();
    let first = cached.run(&request).await;
    let second = cached.run(&request).await;
    let uncached = build().without_cache();
    let third = uncached.run(&request).await;

    assert_eq!(first, second);
    assert_eq!(first, third);
    assert_eq!(cached.model().calls_for("intent"), 1);
    assert_eq!(cached.cache().map(|c| c.len()), Some(1));
}

#[tokio::test]
async fn test_cache_distinguishes_query_case() {
    let build = || {
        let model = MockModel::new().with_handler("intent", |request| {
            let label = if request.user.contains("Apple") {
                "product_search"
            } else {
                "general_search"
            };
            Ok(intent(label, 0.9))
        });
        pipeline(model, MockFetcher::new())
    };

    let cached = build();
    cached.run(&SearchRequest::new("apple reviews")).await;
    let with_cache = cached.run(&SearchRequest::new("Apple reviews")).await;
    let without_cache = build()
        .without_cache()
        .run(&SearchRequest::new("Apple reviews"))
        .await;

    assert_eq!(with_cache.intent, "product_search");
    assert_eq!(with_cache.intent, without_cache.intent);
    assert_eq!(cached.model().calls_for("intent"), 2);
    assert_eq!(cached.cache().map(|c| c.len()), Some(2));
}

#[tokio::test]
async fn test_cancelled_request_still_meets_minimum() {
    let model = MockModel::new().with_response("intent", intent("general_search", 0.9));
    let pipeline = pipeline(model, MockFetcher::new().with_default_search(snippet()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let response = pipeline
        .run_with_cancel(&SearchRequest::new("tech reviewers").with_min_results(3), cancel)
        .await;

    assert!(response.success);
    assert_eq!(response.errors["intent"], "request cancelled");
    assert!(pipeline.fetcher().calls().is_empty());
    assert_eq!(response.records.len(), 3);
    assert!(response.records.iter().all(|r| r.synthetic));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_keeps_partial_progress() {
    let model = MockModel::new()
        .with_response("intent", intent("general_search", 0.9))
        .with_response("result_card", three_cards())
        .with_delay(Duration::from_secs(3));
    let config = PipelineConfig::default().with_request_deadline(Duration::from_secs(5));
    let pipeline = assert_ok!(Pipeline::new(
        model,
        MockFetcher::new().with_default_search(snippet()),
        config
    ));

    let response = pipeline
        .run(&SearchRequest::new("tech reviewers").with_min_results(2))
        .await;

    // classification finished in time; normalization was cut off
    assert!(response.success);
    assert_eq!(response.intent, "general_search");
    assert!(response.errors["normalize"].contains("request deadline exceeded"));
    assert_eq!(pipeline.fetcher().search_queries(), vec!["tech reviewers"]);
    assert_eq!(response.fallback_tier, 2);
    assert_eq!(response.records.len(), 2);
}

#[tokio::test]
async fn test_blank_query_is_rejected() {
    let pipeline = pipeline(MockModel::new(), MockFetcher::new());
    let response = pipeline.run(&SearchRequest::new("  ")).await;

    assert!(!response.success);
    assert!(response.records.is_empty());
    assert!(response.errors.contains_key("request"));
}

#[tokio::test]
async fn test_minimum_above_maximum_is_rejected() {
    let pipeline = pipeline(MockModel::new(), MockFetcher::new());
    let request = SearchRequest::new("tech reviewers")
        .with_min_results(5)
        .with_max_results(2);

    let response = pipeline.run(&request).await;

    assert!(!response.success);
    assert!(response.records.is_empty());
    assert!(response.errors["request"].contains("exceeds maxResults"));
    assert!(pipeline.model().calls().is_empty());
    assert!(pipeline.fetcher().calls().is_empty());
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = PipelineConfig::default().with_confidence_threshold(1.5);
    assert_err!(Pipeline::new(MockModel::new(), MockFetcher::new(), config));
}
