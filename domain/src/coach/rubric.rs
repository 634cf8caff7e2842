//! Scenario grading rubric as stored in `scenarios.rubric`.

use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalAchievement {
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequiredPhrases {
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub phrases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenQuestions {
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub minimum_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectionsHandled {
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub objection_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationQuality {
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub metrics: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRubric {
    #[serde(default)]
    pub goal_achievement: Option<GoalAchievement>,
    #[serde(default)]
    pub required_phrases: Option<RequiredPhrases>,
    #[serde(default)]
    pub open_questions: Option<OpenQuestions>,
    #[serde(default)]
    pub objections_handled: Option<ObjectionsHandled>,
    #[serde(default)]
    pub conversation_quality: Option<ConversationQuality>,
}

/// Rubric sections a skill gap can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RubricField {
    ObjectionsHandled,
    OpenQuestions,
}

impl ScenarioRubric {
    /// Parses a stored rubric. Malformed rubrics are treated as absent.
    pub fn from_json(value: Option<&Value>) -> Option<Self> {
        let value = value.filter(|v| !v.is_null())?;
        match serde_json::from_value(value.clone()) {
            Ok(rubric) => Some(rubric),
            Err(err) => {
                warn!("Ignoring malformed scenario rubric: {err}");
                None
            }
        }
    }

    pub fn has(&self, field: RubricField) -> bool {
        match field {
            RubricField::ObjectionsHandled => self.objections_handled.is_some(),
            RubricField::OpenQuestions => self.open_questions.is_some(),
        }
    }

    pub fn objection_types(&self) -> &[String] {
        self.objections_handled
            .as_ref()
            .map(|o| o.objection_types.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_partial_rubrics() {
        let rubric = ScenarioRubric::from_json(Some(&json!({
            "open_questions": {"weight": 20, "minimum_count": 2},
            "objections_handled": {"weight": 30, "objection_types": ["price", "timing"]}
        })))
        .unwrap();

        assert!(rubric.has(RubricField::OpenQuestions));
        assert!(rubric.has(RubricField::ObjectionsHandled));
        assert!(rubric.goal_achievement.is_none());
        assert_eq!(rubric.objection_types(), ["price", "timing"]);
    }

    #[test]
    fn malformed_or_missing_rubrics_are_absent() {
        assert!(ScenarioRubric::from_json(None).is_none());
        assert!(ScenarioRubric::from_json(Some(&Value::Null)).is_none());
        assert!(ScenarioRubric::from_json(Some(&json!({"open_questions": "lots"}))).is_none());
    }
}
