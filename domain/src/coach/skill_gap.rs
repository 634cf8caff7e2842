use entity_api::user_memories;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const MAX_TOP_GAPS: usize = 3;

const NOT_ENOUGH_DATA: &str =
    "No weaknesses identified yet: not enough data to analyze skill gaps.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Declining,
    Stable,
    New,
    Improving,
}

impl Trend {
    /// Lower is more urgent.
    pub fn priority(&self) -> u8 {
        match self {
            Trend::Declining => 0,
            Trend::Stable => 1,
            Trend::New => 2,
            Trend::Improving => 3,
        }
    }

    /// Unknown or missing trends count as new.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("declining") => Trend::Declining,
            Some("stable") => Trend::Stable,
            Some("improving") => Trend::Improving,
            _ => Trend::New,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Trend::Declining => "declining",
            Trend::Stable => "not improving",
            Trend::New => "newly identified",
            Trend::Improving => "improving",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillGap {
    pub key: String,
    pub score: f64,
    pub trend: Trend,
    pub evidence_count: i32,
}

impl From<&user_memories::Model> for SkillGap {
    fn from(memory: &user_memories::Model) -> Self {
        Self {
            key: memory.key.clone(),
            score: memory.score.unwrap_or(0.0),
            trend: Trend::parse(memory.trend.as_deref()),
            evidence_count: memory.evidence_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SkillGapAnalysis {
    NotEnoughData {
        reasoning: String,
    },
    #[serde(rename_all = "camelCase")]
    Ranked {
        top_gaps: Vec<SkillGap>,
        focus_area: String,
        reasoning: String,
    },
}

impl SkillGapAnalysis {
    pub fn top_gaps(&self) -> &[SkillGap] {
        match self {
            SkillGapAnalysis::NotEnoughData { .. } => &[],
            SkillGapAnalysis::Ranked { top_gaps, .. } => top_gaps,
        }
    }

    pub fn reasoning(&self) -> &str {
        match self {
            SkillGapAnalysis::NotEnoughData { reasoning } => reasoning,
            SkillGapAnalysis::Ranked { reasoning, .. } => reasoning,
        }
    }
}

/// Orders gaps by trend urgency, then lowest score, then least evidence.
pub fn rank_gaps(mut gaps: Vec<SkillGap>) -> Vec<SkillGap> {
    gaps.sort_by(|a, b| {
        a.trend
            .priority()
            .cmp(&b.trend.priority())
            .then_with(|| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal))
            .then_with(|| a.evidence_count.cmp(&b.evidence_count))
    });
    gaps
}

pub fn analyze_skill_gaps(weaknesses: Vec<SkillGap>) -> SkillGapAnalysis {
    let mut ranked = rank_gaps(weaknesses);
    ranked.truncate(MAX_TOP_GAPS);

    let Some(focus) = ranked.first() else {
        return SkillGapAnalysis::NotEnoughData {
            reasoning: NOT_ENOUGH_DATA.to_string(),
        };
    };

    let focus_area = focus.key.clone();
    let parts: Vec<String> = ranked
        .iter()
        .map(|gap| {
            format!(
                "{} at {}% ({})",
                humanize(&gap.key),
                gap.score,
                gap.trend.label()
            )
        })
        .collect();

    SkillGapAnalysis::Ranked {
        reasoning: format!("Top gaps: {}.", parts.join(", ")),
        top_gaps: ranked,
        focus_area,
    }
}

/// `talk_listen_balance` -> `talk listen balance`
pub(crate) fn humanize(key: &str) -> String {
    key.replace('_', " ")
}
