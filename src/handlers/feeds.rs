//! RSS syndication view
//!
//! RSS 2.0 feed of the last 48 hours of confirmed and developing events.
//! The envelope carries an atom self-link; item dates are RFC 822;
//! `lastBuildDate` is the maximum item `pubDate`.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use rss::extension::atom::{AtomExtensionBuilder, Link};
use rss::{CategoryBuilder, ChannelBuilder, GuidBuilder, ItemBuilder};
use std::collections::HashMap;

use crate::error::ApiResult;
use crate::models::event::{ConfidenceTier, Event};
use crate::services::store::EventFilter;
use crate::AppState;

/// `GET /feeds/verified.xml`
pub async fn rss_verified(State(state): State<AppState>) -> ApiResult<Response> {
    let now = Utc::now();
    let filter = EventFilter {
        min_truth: Some(40.0),
        last_seen_after: Some(now - Duration::hours(48)),
        ..Default::default()
    };
    let events = state.store.query_events(&filter).await?;

    // Top source per event for the item description.
    let mut top_sources: HashMap<i64, String> = HashMap::new();
    for event in &events {
        let articles = state.store.articles_for_event(event.id).await?;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for article in &articles {
            *counts.entry(article.source_domain.as_str()).or_default() += 1;
        }
        let top = counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(domain, _)| domain.to_string())
            .unwrap_or_default();
        top_sources.insert(event.id, top);
    }

    let xml = build_feed(&state.config.public_base_url, &events, &top_sources);

    Ok((
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        xml,
    )
        .into_response())
}

/// Render the feed. Pure over its inputs so tests can exercise the exact
/// wire format.
pub fn build_feed(
    base_url: &str,
    events: &[Event],
    top_sources: &HashMap<i64, String>,
) -> String {
    let self_url = format!("{base_url}/feeds/verified.xml");

    let mut items = Vec::with_capacity(events.len());
    let mut last_build: Option<DateTime<Utc>> = None;

    for event in events {
        let tier = match event.confidence_tier() {
            ConfidenceTier::Confirmed => "Confirmed",
            ConfidenceTier::Developing => "Developing",
            ConfidenceTier::Unverified => continue,
        };

        let link = format!("{base_url}/events/{}", event.id);
        let top_source = top_sources
            .get(&event.id)
            .cloned()
            .unwrap_or_default();
        let description = format!(
            "Event verified with confidence score {:.0} from {} sources including {}",
            event.truth_score, event.unique_sources, top_source
        );
        let pub_date = event.last_seen;
        last_build = Some(last_build.map_or(pub_date, |current| current.max(pub_date)));

        items.push(
            ItemBuilder::default()
                .title(Some(event.summary.clone()))
                .link(Some(link.clone()))
                .description(Some(description))
                .pub_date(Some(pub_date.to_rfc2822()))
                .guid(Some(
                    GuidBuilder::default().value(link).permalink(true).build(),
                ))
                .categories(vec![CategoryBuilder::default().name(tier).build()])
                .build(),
        );
    }

    let channel = ChannelBuilder::default()
        .title("Verified News Events")
        .link(base_url.to_string())
        .description("Confirmed and developing events from the last 48 hours")
        .last_build_date(last_build.map(|date| date.to_rfc2822()))
        .atom_ext(Some(
            AtomExtensionBuilder::default()
                .links(vec![Link {
                    href: self_url,
                    rel: "self".to_string(),
                    mime_type: Some("application/rss+xml".to_string()),
                    ..Link::default()
                }])
                .build(),
        ))
        .items(items)
        .build();

    channel.to_string()
}
