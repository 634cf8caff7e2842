//! Coaching Analytics: deterministic skill-gap ranking, next-scenario
//! recommendation and pre-call briefings, plus the subscribers that turn them
//! into `coach.recommendation.ready` events and trainee notifications. Two
//! cron-driven subscribers sweep for inactive trainees and send the daily
//! progress digest.
//!
//! Skill gaps are read from the `user_memories` weakness profile, which is
//! maintained outside this pipeline.

pub mod briefing;
pub mod digest;
pub mod recommender;
pub mod rubric;
pub mod scheduled;
pub mod skill_gap;
pub mod subscribers;

pub use briefing::{generate_pre_call_briefing, PreCallBriefing};
pub use digest::{format_digest_message, generate_trainee_digest, DigestTrend, TraineeDigest};
pub use recommender::{
    recommend_next_scenario, recommend_scenario, RecommendationResult, ScenarioRecommendation,
};
pub use scheduled::{DetectInactiveUsers, SendDailyDigest};
pub use skill_gap::{analyze_skill_gaps, SkillGap, SkillGapAnalysis, Trend};
pub use subscribers::{DispatchCoachNotification, OnAttemptScored, OnUserInactive};

use crate::directory::Directory;
use crate::error::Error;
use entity_api::Id;
use serde::Serialize;

/// Gap analysis together with the scenario it leads to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingSnapshot {
    pub skill_gaps: SkillGapAnalysis,
    pub recommendation: RecommendationResult,
}

/// Current gaps and recommendation for one trainee, computed on demand.
pub async fn coaching_snapshot(
    directory: &dyn Directory,
    org_id: Id,
    user_id: Id,
) -> Result<CoachingSnapshot, Error> {
    let weaknesses = directory.weaknesses(org_id, user_id).await?;
    let skill_gaps = analyze_skill_gaps(weaknesses.iter().map(SkillGap::from).collect());
    let recommendation =
        recommend_next_scenario(directory, org_id, user_id, skill_gaps.top_gaps()).await?;

    Ok(CoachingSnapshot {
        skill_gaps,
        recommendation,
    })
}
