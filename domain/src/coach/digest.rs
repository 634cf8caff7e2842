//! Daily progress digest for one trainee: yesterday's sessions, the day-over-day
//! score trend, the practice streak and a suggested next action.

use crate::directory::Directory;
use crate::error::Error;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use entity_api::{scenario_attempts, Id};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Average-score swing, in points, that counts as a trend.
pub const TREND_THRESHOLD: f64 = 3.0;

const STREAK_LOOKBACK_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestTrend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraineeDigest {
    /// Completed attempts in the last 24 hours
    pub attempts: usize,
    /// Rounded average of those attempts' scores
    pub avg_score: Option<f64>,
    pub trend: DigestTrend,
    pub worst_dimension: Option<String>,
    pub streak: u32,
    pub no_recent_activity: bool,
    pub next_actions: Vec<String>,
}

fn average(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

fn scores_between(
    attempts: &[scenario_attempts::Model],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<f64> {
    attempts
        .iter()
        .filter(|a| a.started_at >= from && a.started_at < to)
        .filter_map(|a| a.score)
        .collect()
}

fn trend(avg_score: Option<f64>, previous_avg: Option<f64>) -> DigestTrend {
    match (avg_score, previous_avg) {
        (Some(current), Some(previous)) => {
            let diff = current - previous;
            if diff > TREND_THRESHOLD {
                DigestTrend::Improving
            } else if diff < -TREND_THRESHOLD {
                DigestTrend::Declining
            } else {
                DigestTrend::Stable
            }
        }
        _ => DigestTrend::InsufficientData,
    }
}

/// Consecutive UTC days with a completed attempt, counting back from today.
/// A day without practice so far today does not break the streak.
pub fn streak_days(attempts: &[scenario_attempts::Model], now: DateTime<Utc>) -> u32 {
    let days: HashSet<NaiveDate> = attempts
        .iter()
        .map(|a| a.started_at.with_timezone(&Utc).date_naive())
        .collect();
    let today = now.date_naive();

    let mut streak = 0;
    for offset in 0..STREAK_LOOKBACK_DAYS {
        let day = today - Duration::days(offset);
        if days.contains(&day) {
            streak += 1;
        } else if offset > 0 {
            break;
        }
    }
    streak
}

fn label(dimension: &str) -> String {
    dimension.replace('_', " ")
}

pub fn next_actions(has_recent_activity: bool, worst_dimension: Option<&str>) -> Vec<String> {
    let action = match (has_recent_activity, worst_dimension) {
        (false, Some(dimension)) => format!(
            "Try a session focused on {} to strengthen this skill.",
            label(dimension)
        ),
        (false, None) => "Complete a practice session to build momentum.".to_string(),
        (true, Some(dimension)) => {
            format!("Strengthen {} with focused practice.", label(dimension))
        }
        (true, None) => "Complete another session to keep building your skills.".to_string(),
    };
    vec![action]
}

/// Builds the digest from completed attempts (any order) and the weakness
/// profile ordered weakest first.
pub fn build_digest(
    attempts: &[scenario_attempts::Model],
    weakest_first: &[String],
    now: DateTime<Utc>,
) -> TraineeDigest {
    let day_ago = now - Duration::hours(24);
    let two_days_ago = now - Duration::hours(48);

    let current: Vec<&scenario_attempts::Model> = attempts
        .iter()
        .filter(|a| a.started_at >= day_ago && a.started_at < now)
        .collect();
    let avg_score = average(&scores_between(attempts, day_ago, now)).map(f64::round);
    let previous_avg = average(&scores_between(attempts, two_days_ago, day_ago));

    let no_recent_activity = current.is_empty();
    let worst_dimension = weakest_first.first().cloned();

    TraineeDigest {
        attempts: current.len(),
        avg_score,
        trend: trend(avg_score, previous_avg),
        streak: streak_days(attempts, now),
        no_recent_activity,
        next_actions: next_actions(!no_recent_activity, worst_dimension.as_deref()),
        worst_dimension,
    }
}

pub async fn generate_trainee_digest(
    directory: &dyn Directory,
    org_id: Id,
    user_id: Id,
    now: DateTime<Utc>,
) -> Result<TraineeDigest, Error> {
    let since = now - Duration::days(STREAK_LOOKBACK_DAYS);
    let attempts = directory
        .completed_attempts_since(org_id, user_id, since)
        .await?;
    let weakest_first: Vec<String> = directory
        .weaknesses(org_id, user_id)
        .await?
        .into_iter()
        .map(|memory| memory.key)
        .collect();

    Ok(build_digest(&attempts, &weakest_first, now))
}

fn plural(count: u64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

pub fn format_digest_message(digest: &TraineeDigest) -> String {
    let next_action = digest.next_actions.first().cloned().unwrap_or_default();

    if digest.no_recent_activity {
        let mut message = "No practice sessions in the last 24 hours.".to_string();
        if digest.streak > 0 {
            message.push_str(&format!(
                " You have a {}-day streak, don't lose it!",
                digest.streak
            ));
        }
        if !next_action.is_empty() {
            message.push(' ');
            message.push_str(&next_action);
        }
        return message;
    }

    let mut parts = Vec::new();
    let sessions = plural(digest.attempts as u64, "practice session", "practice sessions");
    parts.push(match digest.avg_score {
        Some(avg) => format!("You completed {sessions} yesterday with an average score of {avg}%."),
        None => format!("You completed {sessions} yesterday."),
    });

    match digest.trend {
        DigestTrend::Improving => parts.push("Your scores are trending upward.".to_string()),
        DigestTrend::Declining => {
            parts.push("Your scores dipped compared to the previous day.".to_string())
        }
        DigestTrend::Stable | DigestTrend::InsufficientData => {}
    }

    if digest.streak > 0 {
        parts.push(format!(
            "Current streak: {}.",
            plural(u64::from(digest.streak), "day", "days")
        ));
    }
    if !next_action.is_empty() {
        parts.push(next_action);
    }

    parts.join(" ")
}
