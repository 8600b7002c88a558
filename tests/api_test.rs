//! Query API contract tests: pagination semantics, tier derivation,
//! error envelopes, and the RSS view.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tower::ServiceExt;

use common::{memory_store, seed_event};
use news_verification_backend::models::event::Category;
use news_verification_backend::{create_router, AppConfig, AppState, EventStore, Scorer};

fn test_config() -> AppConfig {
    AppConfig::from_env().expect("test config")
}

async fn app_with_store(store: Arc<EventStore>) -> axum::Router {
    let state = AppState {
        store,
        scorer: Arc::new(Scorer::default()),
        config: Arc::new(test_config()),
        scheduler: None,
    };
    create_router(state)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get_text(app: &axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

/// Conflict filtering happens before pagination: two consecutive pages
/// cover 40 distinct conflicted events with no overlap and no leakage.
#[tokio::test]
async fn test_conflicts_filter_before_paginate() {
    let store = memory_store().await;
    let now = Utc::now();

    for i in 0..45 {
        seed_event(
            &store,
            i,
            80.0,
            50.0 + i as f64,
            Category::Other,
            true,
            now - Duration::minutes(i),
        )
        .await;
    }
    for i in 45..75 {
        seed_event(
            &store,
            i,
            80.0,
            50.0,
            Category::Other,
            false,
            now - Duration::minutes(i),
        )
        .await;
    }

    let app = app_with_store(store).await;

    let (status, first) = get_json(&app, "/events/conflicts?limit=20&offset=0").await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = get_json(&app, "/events/conflicts?limit=20&offset=20").await;

    assert_eq!(first["total"], 45);
    assert_eq!(second["total"], 45);

    let mut seen: HashSet<i64> = HashSet::new();
    for page in [&first, &second] {
        let results = page["results"].as_array().unwrap();
        assert_eq!(results.len(), 20);
        for event in results {
            assert_eq!(event["has_conflict"], true);
            assert!(seen.insert(event["id"].as_i64().unwrap()), "event repeated across pages");
        }
    }
    assert_eq!(seen.len(), 40);
}

/// The confidence tier in every response equals the threshold function of
/// the truth score.
#[tokio::test]
async fn test_confidence_tier_derivation() {
    let store = memory_store().await;
    let now = Utc::now();

    for (i, truth) in [95.0, 75.0, 74.9, 40.0, 60.0].into_iter().enumerate() {
        seed_event(&store, i as i64, truth, 50.0, Category::Other, false, now).await;
    }

    let app = app_with_store(store).await;
    let (status, page) = get_json(&app, "/events?status=all&limit=50").await;
    assert_eq!(status, StatusCode::OK);

    let results = page["results"].as_array().unwrap();
    assert_eq!(results.len(), 5);
    for event in results {
        let truth = event["truth_score"].as_f64().unwrap();
        let expected = if truth >= 75.0 {
            "confirmed"
        } else if truth >= 40.0 {
            "developing"
        } else {
            "unverified"
        };
        assert_eq!(event["confidence_tier"], expected);
    }

    let (_, confirmed) = get_json(&app, "/events?status=confirmed").await;
    for event in confirmed["results"].as_array().unwrap() {
        assert!(event["truth_score"].as_f64().unwrap() >= 75.0);
    }

    let (_, developing) = get_json(&app, "/events?status=developing").await;
    for event in developing["results"].as_array().unwrap() {
        let truth = event["truth_score"].as_f64().unwrap();
        assert!((40.0..75.0).contains(&truth));
    }
}

/// Unverified events are hidden from the default surface.
#[tokio::test]
async fn test_unverified_events_hidden() {
    let store = memory_store().await;
    let now = Utc::now();
    seed_event(&store, 0, 20.0, 50.0, Category::Other, false, now).await;
    seed_event(&store, 1, 80.0, 50.0, Category::Other, false, now).await;

    let app = app_with_store(store).await;
    let (_, page) = get_json(&app, "/events?status=all").await;
    let results = page["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["confidence_tier"], "confirmed");
}

/// Ranking diversity: a politics-heavy pool still surfaces the minority
/// categories in the top ten.
#[tokio::test]
async fn test_ranking_diversity_in_top_ten() {
    let store = memory_store().await;
    let now = Utc::now();

    let mut index = 0;
    for _ in 0..8 {
        seed_event(
            &store,
            index,
            85.0,
            70.0 - index as f64,
            Category::Politics,
            false,
            now - Duration::hours(1),
        )
        .await;
        index += 1;
    }
    for _ in 0..2 {
        seed_event(&store, index, 85.0, 61.0, Category::Health, false, now - Duration::hours(1)).await;
        index += 1;
    }
    seed_event(&store, index, 85.0, 60.5, Category::Science, false, now - Duration::hours(1)).await;
    index += 1;
    seed_event(&store, index, 85.0, 60.0, Category::Other, false, now - Duration::hours(1)).await;

    let app = app_with_store(store).await;
    let (_, page) = get_json(&app, "/events?status=all&limit=10").await;
    let results = page["results"].as_array().unwrap();
    assert_eq!(results.len(), 10);

    let politics = results
        .iter()
        .filter(|e| e["category"] == "politics")
        .count();
    assert!(politics <= 6, "top ten carried {politics} politics events");
    assert!(results.iter().any(|e| e["category"] == "science"));
    assert!(results.iter().any(|e| e["category"] == "other"));
}

#[tokio::test]
async fn test_event_detail_and_not_found() {
    let store = memory_store().await;
    let now = Utc::now();
    let event_id = seed_event(&store, 0, 80.0, 50.0, Category::Other, false, now).await;

    let app = app_with_store(store).await;

    let (status, detail) = get_json(&app, &format!("/events/{event_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["id"].as_i64().unwrap(), event_id);
    assert_eq!(detail["confidence_tier"], "confirmed");
    assert_eq!(detail["articles"].as_array().unwrap().len(), 1);
    assert!(detail["scoring_breakdown"]["source_diversity"]["weight"].is_number());
    assert!(detail["scoring_breakdown"]["official_match"]["explanation"].is_string());

    let (status, body) = get_json(&app, "/events/999999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("event 999999"));
}

#[tokio::test]
async fn test_bad_request_envelopes() {
    let store = memory_store().await;
    let app = app_with_store(store).await;

    let (status, body) = get_json(&app, "/events?status=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("bogus"));

    let (status, body) = get_json(&app, "/events/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("'q'"));

    let (status, _) = get_json(&app, "/events/flagged?severity=nonsense").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_matches_summary_substring() {
    let store = memory_store().await;
    let now = Utc::now();
    seed_event(&store, 7, 80.0, 50.0, Category::Other, false, now).await;

    let app = app_with_store(store).await;
    let (status, page) = get_json(&app, "/events/search?q=number+7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);

    let (_, empty) = get_json(&app, "/events/search?q=zebra").await;
    assert_eq!(empty["total"], 0);
    assert_eq!(empty["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_limit_is_clamped_to_100() {
    let store = memory_store().await;
    let now = Utc::now();
    seed_event(&store, 0, 80.0, 50.0, Category::Other, false, now).await;

    let app = app_with_store(store).await;
    let (_, page) = get_json(&app, "/events?limit=5000").await;
    assert_eq!(page["limit"], 100);
}

#[tokio::test]
async fn test_stats_summary_counts() {
    let store = memory_store().await;
    let now = Utc::now();
    seed_event(&store, 0, 90.0, 50.0, Category::Other, false, now).await;
    seed_event(&store, 1, 50.0, 50.0, Category::Other, true, now).await;
    seed_event(&store, 2, 10.0, 50.0, Category::Other, false, now).await;

    let app = app_with_store(store).await;
    let (status, stats) = get_json(&app, "/events/stats/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_events"], 3);
    assert_eq!(stats["confirmed_events"], 1);
    assert_eq!(stats["developing_events"], 1);
    assert_eq!(stats["unverified_events"], 1);
    assert_eq!(stats["conflicted_events"], 1);
    assert_eq!(stats["total_articles"], 3);
    assert!(stats["last_ingestion"].is_string());
}

#[tokio::test]
async fn test_health_endpoint() {
    let store = memory_store().await;
    store
        .set_worker_last_run("tier1", Utc::now())
        .await
        .unwrap();

    let app = app_with_store(store).await;
    let (status, health) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["database"], "connected");
    assert!(health["worker_last_run"].is_string());
    assert_eq!(health["total_events"], 0);
}

/// RSS view: parses as RSS 2.0, lastBuildDate equals the max item
/// pubDate, links are absolute HTTPS, unverified events excluded.
#[tokio::test]
async fn test_rss_feed_well_formed() {
    let store = memory_store().await;
    let now = Utc::now();
    seed_event(&store, 0, 90.0, 50.0, Category::Other, false, now - Duration::hours(1)).await;
    seed_event(&store, 1, 55.0, 50.0, Category::Other, false, now - Duration::hours(5)).await;
    seed_event(&store, 2, 10.0, 50.0, Category::Other, false, now - Duration::hours(2)).await;
    // Outside the 48-hour window entirely.
    seed_event(&store, 3, 90.0, 50.0, Category::Other, false, now - Duration::hours(60)).await;

    let app = app_with_store(store).await;
    let (status, xml) = get_text(&app, "/feeds/verified.xml").await;
    assert_eq!(status, StatusCode::OK);

    let channel = rss::Channel::read_from(xml.as_bytes()).expect("valid RSS 2.0");
    assert_eq!(channel.items().len(), 2);

    let max_pub_date: DateTime<chrono::FixedOffset> = channel
        .items()
        .iter()
        .filter_map(|item| item.pub_date())
        .map(|date| DateTime::parse_from_rfc2822(date).unwrap())
        .max()
        .unwrap();
    assert_eq!(
        channel.last_build_date(),
        Some(max_pub_date.to_rfc2822().as_str())
    );

    for item in channel.items() {
        let link = item.link().expect("link");
        assert!(link.starts_with("https://"), "link {link} must be absolute https");
        assert!(item.guid().unwrap().is_permalink());
        let description = item.description().unwrap();
        assert!(description.contains("sources including"));
        let category = &item.categories()[0];
        assert!(category.name() == "Confirmed" || category.name() == "Developing");
    }
}
