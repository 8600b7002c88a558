//! Event query endpoints

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{clamp_limit, Page};
use crate::error::{ApiError, ApiResult};
use crate::models::article::Article;
use crate::models::event::{Event, ScoringBreakdown};
use crate::services::ranking::{Ranker, Section};
use crate::services::scheduler::PipelineStats;
use crate::services::scoring::is_underreported;
use crate::services::store::{EventFilter, PolarizingSource, StatsSummary};
use crate::AppState;

/// Event plus its read-time confidence tier.
#[derive(Debug, Serialize)]
pub struct EventView {
    pub confidence_tier: &'static str,
    #[serde(flatten)]
    pub event: Event,
}

impl From<Event> for EventView {
    fn from(event: Event) -> Self {
        Self {
            confidence_tier: event.confidence_tier().as_str(),
            event,
        }
    }
}

/// Full event detail for the single-event endpoint.
#[derive(Debug, Serialize)]
pub struct EventDetail {
    pub confidence_tier: &'static str,
    pub underreported: bool,
    pub scoring_breakdown: ScoringBreakdown,
    pub articles: Vec<Article>,
    #[serde(flatten)]
    pub event: Event,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub politics_only: Option<bool>,
}

/// `GET /events` — ranked listing of confirmed/developing events.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> ApiResult<Json<Page<EventView>>> {
    // The listing surface only reaches back over the analysis window.
    let window_start =
        Utc::now() - Duration::hours(state.config.scheduler.analysis_window_hours);

    let status = query.status.as_deref().unwrap_or("all");
    let (filter, section) = match status {
        "confirmed" => (
            EventFilter {
                min_truth: Some(75.0),
                politics_only: query.politics_only.unwrap_or(false),
                last_seen_after: Some(window_start),
                ..Default::default()
            },
            Section::Confirmed,
        ),
        "developing" => (
            EventFilter {
                min_truth: Some(40.0),
                max_truth: Some(75.0),
                politics_only: query.politics_only.unwrap_or(false),
                last_seen_after: Some(window_start),
                ..Default::default()
            },
            Section::Developing,
        ),
        // Unverified events stay off the default surface.
        "all" => (
            EventFilter {
                min_truth: Some(40.0),
                politics_only: query.politics_only.unwrap_or(false),
                last_seen_after: Some(window_start),
                ..Default::default()
            },
            Section::All,
        ),
        other => {
            return Err(ApiError::BadRequest(format!(
                "unknown status '{other}', expected confirmed, developing or all"
            )))
        }
    };

    let candidates = state.store.query_events(&filter).await?;
    Ok(Json(paginate_ranked(
        candidates,
        section,
        clamp_limit(query.limit, 20),
        query.offset.unwrap_or(0).max(0),
    )))
}

/// `GET /events/conflicts` — conflicted events ranked with the conflicts
/// weighting. The conflict filter applies before pagination.
pub async fn list_conflicts(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> ApiResult<Json<Page<EventView>>> {
    let filter = EventFilter {
        has_conflict: Some(true),
        politics_only: query.politics_only.unwrap_or(false),
        ..Default::default()
    };
    let candidates = state.store.query_events(&filter).await?;
    Ok(Json(paginate_ranked(
        candidates,
        Section::Conflicts,
        clamp_limit(query.limit, 20),
        query.offset.unwrap_or(0).max(0),
    )))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub politics_only: Option<bool>,
}

/// `GET /events/search` — case-insensitive substring over summary and
/// member entities.
pub async fn search_events(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Page<EventView>>> {
    let needle = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("query parameter 'q' is required".to_string()))?;

    let filter = EventFilter {
        search: Some(needle.to_string()),
        politics_only: query.politics_only.unwrap_or(false),
        ..Default::default()
    };
    let candidates = state.store.query_events(&filter).await?;

    let total = candidates.len() as i64;
    let limit = clamp_limit(query.limit, 20);
    let offset = query.offset.unwrap_or(0).max(0);
    let results = candidates
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .map(EventView::from)
        .collect();

    Ok(Json(Page {
        total,
        limit,
        offset,
        results,
    }))
}

/// `GET /events/{id}` — full detail with member articles and the truth
/// score breakdown.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> ApiResult<Json<EventDetail>> {
    let event = state.store.get_event(event_id).await?;
    let articles = state.store.articles_for_event(event_id).await?;
    let scoring_breakdown = state.scorer.truth_breakdown(&articles);
    let now = Utc::now();

    Ok(Json(EventDetail {
        confidence_tier: event.confidence_tier().as_str(),
        underreported: is_underreported(&articles, event.first_seen, now),
        scoring_breakdown,
        articles,
        event,
    }))
}

/// Stats payload: store aggregates plus pipeline counters when the
/// scheduler is running.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub summary: StatsSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineStats>,
}

/// `GET /events/stats/summary`
pub async fn stats_summary(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let summary = state.store.stats_summary().await?;
    let pipeline = match &state.scheduler {
        Some(scheduler) => Some(scheduler.stats().await),
        None => None,
    };
    Ok(Json(StatsResponse { summary, pipeline }))
}

#[derive(Debug, Deserialize)]
pub struct FlaggedQuery {
    pub severity: Option<String>,
    pub source: Option<String>,
    pub days: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /events/flagged` — articles whose fact-check produced a verdict.
pub async fn flagged_articles(
    State(state): State<AppState>,
    Query(query): Query<FlaggedQuery>,
) -> ApiResult<Json<Page<Article>>> {
    let statuses: Vec<&str> = match query.severity.as_deref() {
        None => vec!["disputed", "false", "unverifiable"],
        Some("disputed") => vec!["disputed"],
        Some("false") => vec!["false"],
        Some("unverifiable") => vec!["unverifiable"],
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "unknown severity '{other}', expected disputed, false or unverifiable"
            )))
        }
    };

    let since = query
        .days
        .map(|days| Utc::now() - Duration::days(days.max(0)));
    let limit = clamp_limit(query.limit, 20);
    let offset = query.offset.unwrap_or(0).max(0);

    let (total, results) = state
        .store
        .flagged_articles(&statuses, query.source.as_deref(), since, limit, offset)
        .await?;

    Ok(Json(Page {
        total,
        limit,
        offset,
        results,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PolarizingQuery {
    pub min_articles: Option<i64>,
    pub limit: Option<i64>,
}

/// `GET /events/polarizing-sources` — sources ranked by how often their
/// coverage sits inside conflicted events.
pub async fn polarizing_sources(
    State(state): State<AppState>,
    Query(query): Query<PolarizingQuery>,
) -> ApiResult<Json<Vec<PolarizingSource>>> {
    let min_articles = query.min_articles.unwrap_or(3).max(1);
    let limit = clamp_limit(query.limit, 20);
    let sources = state.store.polarizing_sources(min_articles, limit).await?;
    Ok(Json(sources))
}

/// Rank, then slice. Total reflects the filtered candidate set, so two
/// consecutive pages never overlap and never drop a matching event.
fn paginate_ranked(
    candidates: Vec<Event>,
    section: Section,
    limit: i64,
    offset: i64,
) -> Page<EventView> {
    let total = candidates.len() as i64;
    let ranked = Ranker.rank(candidates, section, Utc::now());
    let results = ranked
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .map(EventView::from)
        .collect();
    Page {
        total,
        limit,
        offset,
        results,
    }
}
