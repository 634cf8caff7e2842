use super::rubric::{RubricField, ScenarioRubric};
use super::skill_gap::{humanize, SkillGap};
use crate::directory::Directory;
use crate::error::Error;
use chrono::{Duration, Utc};
use entity_api::{scenarios, Id};
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Trailing window for over-practice detection.
pub const RECENT_DAYS: i64 = 7;
/// Attempts inside the window that exclude a scenario.
pub const RECENT_ATTEMPT_THRESHOLD: u32 = 3;

const RUBRIC_MATCH_POINTS: u32 = 10;
const EASY_CONFIDENCE_POINTS: u32 = 6;
const QUALITY_POINTS: u32 = 4;

const CONFIDENCE_GAPS: [&str; 3] = ["confidence", "professionalism", "clarity"];
const QUALITY_GAPS: [&str; 5] = [
    "clarity",
    "professionalism",
    "empathy",
    "talk_listen_balance",
    "filler_words",
];

fn rubric_field_for(gap_key: &str) -> Option<RubricField> {
    match gap_key {
        "objection_handling" => Some(RubricField::ObjectionsHandled),
        "question_handling" => Some(RubricField::OpenQuestions),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRecommendation {
    pub scenario_id: Id,
    pub scenario_title: String,
    pub reason: String,
    pub difficulty: Option<String>,
}

/// `recommendation` is `None` when nothing fits; `reason` always says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResult {
    pub recommendation: Option<ScenarioRecommendation>,
    pub reason: String,
}

impl RecommendationResult {
    fn none(reason: &str) -> Self {
        Self {
            recommendation: None,
            reason: reason.to_string(),
        }
    }
}

struct Candidate<'a> {
    scenario: &'a scenarios::Model,
    rubric: Option<ScenarioRubric>,
}

impl Candidate<'_> {
    fn is_easy(&self) -> bool {
        self.scenario.difficulty.as_deref() == Some("easy")
    }

    fn covers(&self, gap_key: &str) -> bool {
        match (&self.rubric, rubric_field_for(gap_key)) {
            (Some(rubric), Some(field)) => rubric.has(field),
            _ => false,
        }
    }

    fn tracks_quality(&self, gap_key: &str) -> bool {
        QUALITY_GAPS.contains(&gap_key)
            && self
                .rubric
                .as_ref()
                .is_some_and(|r| r.conversation_quality.is_some())
    }

    /// Earlier gaps weigh more: `weight = gap_count - index`.
    fn score(&self, gaps: &[SkillGap]) -> u32 {
        let count = gaps.len();
        gaps.iter()
            .enumerate()
            .map(|(index, gap)| {
                let weight = u32::try_from(count - index).unwrap_or(u32::MAX);
                let mut points = 0;
                if self.covers(&gap.key) {
                    points += RUBRIC_MATCH_POINTS * weight;
                }
                if CONFIDENCE_GAPS.contains(&gap.key.as_str()) && self.is_easy() {
                    points += EASY_CONFIDENCE_POINTS * weight;
                }
                if self.tracks_quality(&gap.key) {
                    points += QUALITY_POINTS * weight;
                }
                points
            })
            .sum()
    }

    fn reason(&self, gaps: &[SkillGap]) -> String {
        let matched: Vec<String> = gaps
            .iter()
            .filter(|gap| self.covers(&gap.key) || self.tracks_quality(&gap.key))
            .map(|gap| humanize(&gap.key))
            .collect();

        if !matched.is_empty() {
            return format!(
                "This scenario targets your weakest areas: {}.",
                matched.join(", ")
            );
        }

        match gaps.first() {
            Some(first) if CONFIDENCE_GAPS.contains(&first.key.as_str()) && self.is_easy() => {
                format!("An easier scenario to help rebuild {}.", humanize(&first.key))
            }
            _ => "Recommended based on your current skill gaps.".to_string(),
        }
    }
}

/// Picks the scenario that best addresses `gaps`, skipping over-practiced ones.
///
/// Ties go to the scenario listed first.
pub fn recommend_scenario(
    gaps: &[SkillGap],
    scenarios: &[scenarios::Model],
    recent_counts: &HashMap<Id, u32>,
) -> RecommendationResult {
    if gaps.is_empty() {
        return RecommendationResult::none("No skill gaps identified yet.");
    }
    if scenarios.is_empty() {
        return RecommendationResult::none("No active scenarios available for this organization.");
    }

    let candidates: Vec<Candidate> = scenarios
        .iter()
        .filter(|scenario| {
            recent_counts.get(&scenario.id).copied().unwrap_or(0) < RECENT_ATTEMPT_THRESHOLD
        })
        .map(|scenario| Candidate {
            scenario,
            rubric: ScenarioRubric::from_json(scenario.rubric.as_ref()),
        })
        .collect();

    if candidates.is_empty() {
        return RecommendationResult::none(
            "All matching scenarios have been practiced 3+ times in the last 7 days.",
        );
    }

    let mut best: Option<(&Candidate, u32)> = None;
    for candidate in &candidates {
        let score = candidate.score(gaps);
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((candidate, score));
        }
    }

    match best {
        Some((candidate, score)) if score > 0 => {
            let reason = candidate.reason(gaps);
            RecommendationResult {
                recommendation: Some(ScenarioRecommendation {
                    scenario_id: candidate.scenario.id,
                    scenario_title: candidate.scenario.title.clone(),
                    reason: reason.clone(),
                    difficulty: candidate.scenario.difficulty.clone(),
                }),
                reason,
            }
        }
        _ => RecommendationResult::none("No scenarios match the identified skill gaps."),
    }
}

/// Loads the org's active scenarios and the user's trailing attempt counts, then recommends.
pub async fn recommend_next_scenario(
    directory: &dyn Directory,
    org_id: Id,
    user_id: Id,
    gaps: &[SkillGap],
) -> Result<RecommendationResult, Error> {
    if gaps.is_empty() {
        return Ok(RecommendationResult::none("No skill gaps identified yet."));
    }

    let since = Utc::now() - Duration::days(RECENT_DAYS);
    let (scenarios, recent_counts) = tokio::try_join!(
        directory.active_scenarios(org_id),
        directory.attempt_counts_since(org_id, user_id, since),
    )?;

    let result = recommend_scenario(gaps, &scenarios, &recent_counts);
    debug!(
        "Recommendation for user {user_id}: {:?} ({})",
        result.recommendation.as_ref().map(|r| r.scenario_id),
        result.reason
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::skill_gap::Trend;
    use crate::test_support::scenario_model;
    use serde_json::json;

    fn gap(key: &str) -> SkillGap {
        SkillGap {
            key: key.to_string(),
            score: 40.0,
            trend: Trend::Declining,
            evidence_count: 2,
        }
    }

    #[test]
    fn rubric_match_outweighs_easy_difficulty() {
        let objections = scenario_model(
            None,
            "Price pushback",
            Some("hard"),
            Some(json!({"objections_handled": {"objection_types": ["price"]}})),
        );
        let easy = scenario_model(None, "Warm intro", Some("easy"), None);
        let gaps = vec![gap("objection_handling"), gap("confidence")];

        let result = recommend_scenario(&gaps, &[easy, objections.clone()], &HashMap::new());
        let recommendation = result.recommendation.unwrap();

        // objection_handling: 10 * 2 = 20, confidence on easy: 6 * 1 = 6
        assert_eq!(recommendation.scenario_id, objections.id);
        assert_eq!(
            recommendation.reason,
            "This scenario targets your weakest areas: objection handling."
        );
    }

    #[test]
    fn easy_scenario_rebuilds_confidence() {
        let easy = scenario_model(None, "Warm intro", Some("easy"), None);
        let hard = scenario_model(None, "Board pitch", Some("hard"), None);

        let result = recommend_scenario(&[gap("confidence")], &[hard, easy.clone()], &HashMap::new());
        let recommendation = result.recommendation.unwrap();

        assert_eq!(recommendation.scenario_id, easy.id);
        assert_eq!(recommendation.reason, "An easier scenario to help rebuild confidence.");
    }

    #[test]
    fn quality_gaps_need_conversation_quality() {
        let tracked = scenario_model(
            None,
            "Discovery",
            Some("medium"),
            Some(json!({"conversation_quality": {"metrics": ["filler_words"]}})),
        );
        let untracked = scenario_model(None, "Demo", Some("medium"), Some(json!({})));

        let result =
            recommend_scenario(&[gap("filler_words")], &[untracked, tracked.clone()], &HashMap::new());
        assert_eq!(result.recommendation.unwrap().scenario_id, tracked.id);
    }

    #[test]
    fn over_practiced_scenarios_are_excluded() {
        let favourite = scenario_model(
            None,
            "Price pushback",
            None,
            Some(json!({"objections_handled": {}})),
        );
        let fallback = scenario_model(None, "Warm intro", Some("easy"), None);
        let gaps = [gap("objection_handling"), gap("clarity")];

        let fresh = recommend_scenario(
            &gaps,
            &[favourite.clone(), fallback.clone()],
            &HashMap::new(),
        );
        assert_eq!(fresh.recommendation.unwrap().scenario_id, favourite.id);

        let counts = HashMap::from([(favourite.id, 3)]);
        let result = recommend_scenario(&gaps, &[favourite, fallback.clone()], &counts);
        let recommendation = result.recommendation.unwrap();
        assert_eq!(recommendation.scenario_id, fallback.id);
        assert_eq!(recommendation.scenario_title, "Warm intro");
    }

    #[test]
    fn every_scenario_over_practiced_is_explicit() {
        let only = scenario_model(
            None,
            "Price pushback",
            None,
            Some(json!({"objections_handled": {}})),
        );
        let counts = HashMap::from([(only.id, 3)]);

        let result = recommend_scenario(&[gap("objection_handling")], &[only], &counts);
        assert!(result.recommendation.is_none());
        assert!(result.reason.contains("3+ times"));
    }

    #[test]
    fn no_match_is_explicit() {
        let plain = scenario_model(None, "Demo", Some("medium"), None);
        let result = recommend_scenario(&[gap("rapport_building")], &[plain], &HashMap::new());
        assert!(result.recommendation.is_none());
        assert_eq!(result.reason, "No scenarios match the identified skill gaps.");
    }

    #[test]
    fn ties_go_to_the_first_scenario() {
        let first = scenario_model(None, "A", Some("easy"), None);
        let second = scenario_model(None, "B", Some("easy"), None);

        let result =
            recommend_scenario(&[gap("clarity")], &[first.clone(), second], &HashMap::new());
        assert_eq!(result.recommendation.unwrap().scenario_id, first.id);
    }

    #[test]
    fn no_gaps_short_circuits() {
        let result = recommend_scenario(&[], &[], &HashMap::new());
        assert_eq!(result.reason, "No skill gaps identified yet.");
    }
}
