//! Pre-call briefing shown to a trainee right before a practice call.
//!
//! Focus areas and tips are derived deterministically from the trainee's
//! weakness profile and the scenario rubric. Only the motivational note goes
//! through the text generator, and it falls back to a fixed line on failure.

use super::rubric::ScenarioRubric;
use super::skill_gap::{rank_gaps, SkillGap};
use crate::directory::Directory;
use crate::error::Error;
use crate::gateway::TextGenerator;
use chrono::{DateTime, FixedOffset};
use entity_api::{scenario_attempts, scenarios, Id};
use log::*;
use serde::{Deserialize, Serialize};

const MAX_FOCUS_AREAS: usize = 3;
const MAX_TIPS: usize = 3;
const MAX_PREVIOUS_ATTEMPTS: u64 = 3;
const MOTIVATIONAL_NOTE_TOKENS: u32 = 150;

pub const FALLBACK_MOTIVATIONAL_NOTE: &str =
    "You've got this. Focus on your key areas and give it your best shot.";

const DEFAULT_FOCUS_AREAS: [&str; 3] = [
    "Focus on clear communication",
    "Listen actively to the prospect",
    "Ask open-ended questions",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousAttempt {
    pub attempt_id: Id,
    pub score: Option<f64>,
    pub started_at: DateTime<FixedOffset>,
    pub duration_seconds: Option<i32>,
}

impl From<scenario_attempts::Model> for PreviousAttempt {
    fn from(attempt: scenario_attempts::Model) -> Self {
        Self {
            attempt_id: attempt.id,
            score: attempt.score,
            started_at: attempt.started_at,
            duration_seconds: attempt.duration_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreCallBriefing {
    pub focus_areas: Vec<String>,
    pub scenario_tips: Vec<String>,
    pub previous_attempts: Vec<PreviousAttempt>,
    pub motivational_note: String,
    /// easy | medium | hard | unknown
    pub estimated_difficulty: String,
}

fn focus_area_for(key: &str, rubric: Option<&ScenarioRubric>) -> Option<String> {
    if key == "objection_handling" {
        if let Some(types) = rubric.map(|r| r.objection_types()).filter(|t| !t.is_empty()) {
            let named = types.iter().take(2).cloned().collect::<Vec<_>>().join(" and ");
            return Some(format!(
                "Listen for {named} objections and use feel-felt-found technique"
            ));
        }
    }

    let text = match key {
        "objection_handling" => "Listen for objections and address them with empathy",
        "question_handling" => "Prepare thoughtful open-ended questions",
        "clarity" => "Speak clearly and avoid jargon",
        "professionalism" => "Maintain a professional and confident tone",
        "empathy" => "Show genuine understanding of the prospect's situation",
        "talk_listen_balance" => "Let the prospect speak: aim for a balanced conversation",
        "filler_words" => "Reduce filler words (um, uh, like)",
        "confidence" => "Project confidence in your product knowledge",
        "goal_achievement" => "Stay focused on the call objective",
        "rapport_building" => "Build rapport early in the conversation",
        _ => return None,
    };
    Some(text.to_string())
}

/// Up to three focus areas from the weakest skills, topped up with generic ones.
pub fn build_focus_areas(gaps: &[SkillGap], rubric: Option<&ScenarioRubric>) -> Vec<String> {
    let mut areas: Vec<String> = gaps
        .iter()
        .filter_map(|gap| focus_area_for(&gap.key, rubric))
        .take(MAX_FOCUS_AREAS)
        .collect();

    for fallback in DEFAULT_FOCUS_AREAS {
        if areas.len() >= MAX_FOCUS_AREAS {
            break;
        }
        if !areas.iter().any(|area| area == fallback) {
            areas.push(fallback.to_string());
        }
    }
    areas
}

fn plural(count: usize) -> &'static str {
    if count > 1 {
        "s"
    } else {
        ""
    }
}

/// Up to three tips describing what the rubric will grade.
pub fn build_scenario_tips(rubric: Option<&ScenarioRubric>) -> Vec<String> {
    let Some(rubric) = rubric else {
        return vec!["Review the scenario description before starting".to_string()];
    };

    let mut tips = Vec::new();

    if let Some(goal) = &rubric.goal_achievement {
        tips.push(if goal.required {
            "Achieving the call goal is required: stay focused on the objective".to_string()
        } else {
            "Try to achieve the call goal for maximum points".to_string()
        });
    }

    if let Some(phrases) = rubric.required_phrases.as_ref().filter(|p| !p.phrases.is_empty()) {
        let count = phrases.phrases.len();
        tips.push(format!(
            "Include {count} required phrase{} during the conversation",
            plural(count)
        ));
    }

    if let Some(questions) = &rubric.open_questions {
        let count = questions.minimum_count as usize;
        tips.push(format!(
            "Ask at least {count} open-ended question{}",
            plural(count)
        ));
    }

    let objections = rubric.objection_types();
    if !objections.is_empty() {
        tips.push(format!(
            "Be ready to handle objections: {}",
            objections.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        ));
    }

    if let Some(quality) = rubric
        .conversation_quality
        .as_ref()
        .filter(|q| !q.metrics.is_empty())
    {
        tips.push(format!(
            "Quality metrics tracked: {}",
            quality.metrics.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        ));
    }

    tips.truncate(MAX_TIPS);
    tips
}

fn normalize_difficulty(difficulty: Option<&str>) -> String {
    match difficulty {
        Some(level @ ("easy" | "medium" | "hard")) => level.to_string(),
        _ => "unknown".to_string(),
    }
}

fn motivational_prompt(
    scenario_title: &str,
    focus_areas: &[String],
    previous_attempts: &[PreviousAttempt],
) -> String {
    let attempt_context = match previous_attempts.first() {
        Some(latest) => format!(
            "They have {} previous attempt(s) on this scenario, latest score: {}.",
            previous_attempts.len(),
            latest
                .score
                .map(|score| score.to_string())
                .unwrap_or_else(|| "unscored".to_string())
        ),
        None => "This is their first time attempting this scenario.".to_string(),
    };

    format!(
        "You are a supportive sales coach. Write a brief (1-2 sentence) motivational note for a \
         trainee about to practice \"{scenario_title}\". {attempt_context} Their focus areas are: \
         {}. Be encouraging but specific. Do not use emojis.",
        focus_areas.join(", ")
    )
}

async fn motivational_note(
    generator: &dyn TextGenerator,
    scenario_title: &str,
    focus_areas: &[String],
    previous_attempts: &[PreviousAttempt],
) -> String {
    let prompt = motivational_prompt(scenario_title, focus_areas, previous_attempts);
    match generator.generate(&prompt, MOTIVATIONAL_NOTE_TOKENS).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!("Text generator returned an empty motivational note");
            FALLBACK_MOTIVATIONAL_NOTE.to_string()
        }
        Err(err) => {
            warn!("Failed to generate motivational note: {err}");
            FALLBACK_MOTIVATIONAL_NOTE.to_string()
        }
    }
}

fn visible_to(scenario: &scenarios::Model, org_id: Id) -> bool {
    scenario.org_id.map_or(true, |owner| owner == org_id) || scenario.visibility == "universal"
}

/// Builds the briefing for `user_id` about to practice `scenario_id`.
///
/// Scenarios owned by another org are reported as not found.
pub async fn generate_pre_call_briefing(
    directory: &dyn Directory,
    generator: &dyn TextGenerator,
    org_id: Id,
    user_id: Id,
    scenario_id: Id,
) -> Result<PreCallBriefing, Error> {
    let (scenario, weaknesses, attempts) = tokio::try_join!(
        directory.scenario(scenario_id),
        directory.weaknesses(org_id, user_id),
        directory.recent_attempts(org_id, user_id, scenario_id, MAX_PREVIOUS_ATTEMPTS),
    )?;

    if !visible_to(&scenario, org_id) {
        debug!("Scenario {scenario_id} is not visible to org {org_id}");
        return Err(Error::not_found());
    }

    let rubric = ScenarioRubric::from_json(scenario.rubric.as_ref());
    let gaps = rank_gaps(weaknesses.iter().map(SkillGap::from).collect());

    let focus_areas = build_focus_areas(&gaps, rubric.as_ref());
    let scenario_tips = build_scenario_tips(rubric.as_ref());
    let previous_attempts: Vec<PreviousAttempt> = attempts
        .into_iter()
        .take(MAX_PREVIOUS_ATTEMPTS as usize)
        .map(PreviousAttempt::from)
        .collect();

    let motivational_note =
        motivational_note(generator, &scenario.title, &focus_areas, &previous_attempts).await;

    Ok(PreCallBriefing {
        focus_areas,
        scenario_tips,
        previous_attempts,
        motivational_note,
        estimated_difficulty: normalize_difficulty(scenario.difficulty.as_deref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::skill_gap::Trend;
    use crate::test_support::{FixtureDirectory, RecordingText};
    use entity_api::role::Role;
    use serde_json::json;

    fn gap(key: &str) -> SkillGap {
        SkillGap {
            key: key.to_string(),
            score: 35.0,
            trend: Trend::Declining,
            evidence_count: 4,
        }
    }

    #[test]
    fn objection_focus_names_rubric_objection_types() {
        let rubric = ScenarioRubric::from_json(Some(&json!({
            "objections_handled": {"objection_types": ["price", "timing", "authority"]}
        })));

        let areas = build_focus_areas(&[gap("objection_handling")], rubric.as_ref());
        assert_eq!(
            areas,
            vec![
                "Listen for price and timing objections and use feel-felt-found technique",
                "Focus on clear communication",
                "Listen actively to the prospect",
            ]
        );
    }

    #[test]
    fn unknown_gap_keys_fall_back_to_generic_focus_areas() {
        let areas = build_focus_areas(&[gap("mystery_skill")], None);
        assert_eq!(areas, DEFAULT_FOCUS_AREAS.map(String::from).to_vec());
    }

    #[test]
    fn tips_follow_rubric_sections_and_cap_at_three() {
        let rubric = ScenarioRubric::from_json(Some(&json!({
            "goal_achievement": {"required": true},
            "required_phrases": {"phrases": ["next steps"]},
            "open_questions": {"minimum_count": 2},
            "objections_handled": {"objection_types": ["price"]}
        })));

        let tips = build_scenario_tips(rubric.as_ref());
        assert_eq!(
            tips,
            vec![
                "Achieving the call goal is required: stay focused on the objective",
                "Include 1 required phrase during the conversation",
                "Ask at least 2 open-ended questions",
            ]
        );
        assert_eq!(
            build_scenario_tips(None),
            vec!["Review the scenario description before starting"]
        );
    }

    #[tokio::test]
    async fn briefing_uses_generated_note_and_recent_attempts() {
        let directory = FixtureDirectory::default();
        let org = directory.add_org("Acme");
        let user = directory.add_user(org.id, Role::Trainee, Some("Dana"));
        let scenario = directory.add_scenario(Some(org.id), "Renewal call", Some("hard"), None);
        directory.add_attempt(user.id, scenario.id, Some(72.0));
        directory.add_attempt(user.id, scenario.id, Some(64.0));
        let text = RecordingText::replying("  Keep your questions open.  ");

        let briefing =
            generate_pre_call_briefing(&directory, &text, org.id, user.id, scenario.id)
                .await
                .unwrap();

        assert_eq!(briefing.motivational_note, "Keep your questions open.");
        assert_eq!(briefing.estimated_difficulty, "hard");
        assert_eq!(briefing.previous_attempts.len(), 2);
        assert_eq!(briefing.previous_attempts[0].score, Some(64.0));

        let prompts = text.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("\"Renewal call\""));
        assert!(prompts[0].contains("2 previous attempt(s)"));
    }

    #[tokio::test]
    async fn generator_failure_uses_fallback_note() {
        let directory = FixtureDirectory::default();
        let org = directory.add_org("Acme");
        let user = directory.add_user(org.id, Role::Trainee, None);
        let scenario = directory.add_scenario(None, "Cold call", None, None);

        let briefing = generate_pre_call_briefing(
            &directory,
            &RecordingText::failing(),
            org.id,
            user.id,
            scenario.id,
        )
        .await
        .unwrap();

        assert_eq!(briefing.motivational_note, FALLBACK_MOTIVATIONAL_NOTE);
        assert_eq!(briefing.estimated_difficulty, "unknown");
        assert!(briefing.previous_attempts.is_empty());
    }

    #[tokio::test]
    async fn scenarios_of_other_orgs_are_not_found() {
        let directory = FixtureDirectory::default();
        let org = directory.add_org("Acme");
        let other = directory.add_org("Globex");
        let user = directory.add_user(org.id, Role::Trainee, None);
        let private = directory.add_scenario(Some(other.id), "Internal only", None, None);

        let err = generate_pre_call_briefing(
            &directory,
            &RecordingText::replying("unused"),
            org.id,
            user.id,
            private.id,
        )
        .await
        .unwrap_err();

        assert!(err.is_not_found());
    }
}
