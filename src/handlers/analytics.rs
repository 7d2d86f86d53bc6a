//! Personal analytics over the decision journal.
//!
//! Every metric derives from at most the 100 most recent decisions, which
//! bounds the query cost regardless of journal size.

use axum::{extract::State, Extension, Json};
use chrono::{Datelike, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, ApiError, ApiResult},
    schema::decisions,
    AppState,
};

pub const ANALYTICS_WINDOW: i64 = 100;
pub const MAX_STREAK_WEEKS: u32 = 52;
pub const TOP_TAG_COUNT: usize = 5;

/// The slice of a decision row the analytics need.
#[derive(Debug, Clone, Queryable)]
pub struct DecisionSample {
    pub created_at: NaiveDateTime,
    pub tags: Vec<String>,
    pub confidence_level: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TagCount {
    #[schema(example = "architecture")]
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PersonalAnalytics {
    pub total_decisions: usize,
    pub decisions_this_month: usize,
    pub decisions_last_month: usize,
    /// Month-over-month change in percent.
    pub month_over_month_change: f64,
    /// Consecutive weeks with at least one decision, newest first.
    pub weekly_streak: u32,
    pub top_tags: Vec<TagCount>,
    pub average_confidence: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/api/analytics/personal",
    tag = "Analytics",
    responses(
        (status = 200, description = "Personal decision analytics", body = PersonalAnalytics),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn personal_analytics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<PersonalAnalytics>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let mut conn = get_db_conn(&state.db_pool)?;

    let samples: Vec<DecisionSample> = decisions::table
        .filter(decisions::user_id.eq(user_id))
        .order(decisions::created_at.desc())
        .limit(ANALYTICS_WINDOW)
        .select((
            decisions::created_at,
            decisions::tags,
            decisions::confidence_level,
        ))
        .load(&mut conn)
        .map_err(|_| ApiError::db_error())?;

    Ok(Json(compute_analytics(&samples, Utc::now().naive_utc())))
}

pub fn compute_analytics(samples: &[DecisionSample], now: NaiveDateTime) -> PersonalAnalytics {
    let this_month = (now.year(), now.month());
    let last_month = previous_month(this_month);

    let decisions_this_month = samples
        .iter()
        .filter(|s| (s.created_at.year(), s.created_at.month()) == this_month)
        .count();
    let decisions_last_month = samples
        .iter()
        .filter(|s| (s.created_at.year(), s.created_at.month()) == last_month)
        .count();

    PersonalAnalytics {
        total_decisions: samples.len(),
        decisions_this_month,
        decisions_last_month,
        month_over_month_change: month_over_month_change(
            decisions_this_month,
            decisions_last_month,
        ),
        weekly_streak: weekly_streak(samples, now),
        top_tags: top_tags(samples),
        average_confidence: average_confidence(samples),
    }
}

fn previous_month((year, month): (i32, u32)) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn month_over_month_change(this_month: usize, last_month: usize) -> f64 {
    if last_month == 0 {
        if this_month > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        (this_month as f64 - last_month as f64) / last_month as f64 * 100.0
    }
}

/// Walks backward in 7-day buckets from `now` until the first empty week,
/// capped at [`MAX_STREAK_WEEKS`].
pub fn weekly_streak(samples: &[DecisionSample], now: NaiveDateTime) -> u32 {
    let buckets: HashSet<u64> = samples
        .iter()
        .filter_map(|s| {
            let days = (now - s.created_at).num_days();
            if days < 0 {
                // Clock skew can put a row slightly in the future; count it
                // toward the current week.
                Some(0)
            } else {
                Some(days as u64 / 7)
            }
        })
        .collect();

    let mut streak = 0u32;
    while streak < MAX_STREAK_WEEKS && buckets.contains(&u64::from(streak)) {
        streak += 1;
    }
    streak
}

fn top_tags(samples: &[DecisionSample]) -> Vec<TagCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for sample in samples {
        for tag in &sample.tags {
            *counts.entry(tag.as_str()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // Frequency first, then alphabetical for a stable order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(TOP_TAG_COUNT)
        .map(|(tag, count)| TagCount {
            tag: tag.to_string(),
            count,
        })
        .collect()
}

fn average_confidence(samples: &[DecisionSample]) -> Option<f64> {
    let values: Vec<i32> = samples.iter().filter_map(|s| s.confidence_level).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(now: NaiveDateTime, days_ago: i64) -> NaiveDateTime {
        now - Duration::days(days_ago)
    }

    fn sample(created_at: NaiveDateTime) -> DecisionSample {
        DecisionSample {
            created_at,
            tags: vec![],
            confidence_level: None,
        }
    }

    fn tagged(created_at: NaiveDateTime, tags: &[&str], confidence: Option<i32>) -> DecisionSample {
        DecisionSample {
            created_at,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            confidence_level: confidence,
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_streak_three_consecutive_weeks() {
        let now = now();
        // W0, W-1, W-2 populated; W-3 empty.
        let samples = vec![
            sample(at(now, 1)),
            sample(at(now, 8)),
            sample(at(now, 15)),
            sample(at(now, 30)),
        ];
        assert_eq!(weekly_streak(&samples, now), 3);
    }

    #[test]
    fn test_streak_zero_when_current_week_empty() {
        let now = now();
        let samples = vec![sample(at(now, 8)), sample(at(now, 15))];
        assert_eq!(weekly_streak(&samples, now), 0);
    }

    #[test]
    fn test_streak_caps_at_fifty_two() {
        let now = now();
        let samples: Vec<DecisionSample> =
            (0..60).map(|w| sample(at(now, w * 7 + 1))).collect();
        assert_eq!(weekly_streak(&samples, now), MAX_STREAK_WEEKS);
    }

    #[test]
    fn test_streak_counts_future_rows_in_current_week() {
        let now = now();
        let samples = vec![sample(at(now, -1))];
        assert_eq!(weekly_streak(&samples, now), 1);
    }

    #[test]
    fn test_month_counts_and_change() {
        let now = now(); // 2024-06-15
        let samples = vec![
            sample(at(now, 1)),  // June
            sample(at(now, 5)),  // June
            sample(at(now, 20)), // May
            sample(at(now, 25)), // May
            sample(at(now, 28)), // May
            sample(at(now, 70)), // April
        ];
        let analytics = compute_analytics(&samples, now);
        assert_eq!(analytics.total_decisions, 6);
        assert_eq!(analytics.decisions_this_month, 2);
        assert_eq!(analytics.decisions_last_month, 3);
        assert!((analytics.month_over_month_change - (-33.333)).abs() < 0.01);
    }

    #[test]
    fn test_change_with_empty_last_month() {
        assert_eq!(month_over_month_change(3, 0), 100.0);
        assert_eq!(month_over_month_change(0, 0), 0.0);
    }

    #[test]
    fn test_previous_month_wraps_january() {
        assert_eq!(previous_month((2024, 1)), (2023, 12));
        assert_eq!(previous_month((2024, 6)), (2024, 5));
    }

    #[test]
    fn test_top_tags_ranked_by_frequency_then_name() {
        let now = now();
        let samples = vec![
            tagged(at(now, 1), &["rust", "api"], None),
            tagged(at(now, 2), &["rust", "db"], None),
            tagged(at(now, 3), &["rust", "api", "ops"], None),
            tagged(at(now, 4), &["db", "hiring", "process"], None),
        ];
        let tags = top_tags(&samples);
        assert_eq!(tags.len(), TOP_TAG_COUNT);
        assert_eq!(tags[0].tag, "rust");
        assert_eq!(tags[0].count, 3);
        assert_eq!(tags[1].tag, "api");
        assert_eq!(tags[2].tag, "db");
        // Single-count tags fall back to alphabetical order.
        assert_eq!(tags[3].tag, "hiring");
        assert_eq!(tags[4].tag, "ops");
    }

    #[test]
    fn test_average_confidence() {
        let now = now();
        let samples = vec![
            tagged(at(now, 1), &[], Some(6)),
            tagged(at(now, 2), &[], Some(8)),
            tagged(at(now, 3), &[], None),
        ];
        assert_eq!(average_confidence(&samples), Some(7.0));
        assert_eq!(average_confidence(&[]), None);
    }

    #[test]
    fn test_empty_journal() {
        let analytics = compute_analytics(&[], now());
        assert_eq!(analytics.total_decisions, 0);
        assert_eq!(analytics.weekly_streak, 0);
        assert!(analytics.top_tags.is_empty());
        assert!(analytics.average_confidence.is_none());
        assert_eq!(analytics.month_over_month_change, 0.0);
    }
}
