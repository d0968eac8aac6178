//! Pure scaling policy

use super::preset::{Preset, PresetSlot};
use crate::config::PresetRule;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failures in 24h above which a scale-up is held back
pub const FAILURE_OVERRIDE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    ScaleUp,
    Hold,
    ScaleDown,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScaleUp => write!(f, "scale_up"),
            Self::Hold => write!(f, "hold"),
            Self::ScaleDown => write!(f, "scale_down"),
        }
    }
}

/// Observed load used by [`decide`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleInputs {
    /// Pending plus blocked tasks
    pub queue_depth: usize,
    pub in_progress: usize,
    pub active_members: usize,
    pub budget_pct: f64,
    pub failure_rate_24h: usize,
    pub restart_rate_24h: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleDecision {
    pub decision: Decision,
    pub target: Option<Preset>,
    pub reason: String,
    pub inputs: ScaleInputs,
}

/// Apply the queue/budget table and the failure override
pub fn decide(inputs: ScaleInputs) -> ScaleDecision {
    let q = inputs.queue_depth;
    let pct = inputs.budget_pct;

    let (decision, target, mut reason) = if q > 10 {
        if pct < 50.0 {
            (Decision::ScaleUp, Some(Preset::Heavy), format!("queue {} > 10 with budget {:.1}% < 50%", q, pct))
        } else if pct < 80.0 {
            (Decision::ScaleUp, Some(Preset::Standard), format!("queue {} > 10 with budget {:.1}% < 80%", q, pct))
        } else {
            (Decision::Hold, None, format!("queue {} > 10 but budget {:.1}% is constrained", q, pct))
        }
    } else if q >= 5 {
        if pct < 50.0 {
            (Decision::Hold, Some(Preset::Standard), format!("moderate queue {} with budget headroom", q))
        } else if pct >= 80.0 {
            (Decision::ScaleDown, Some(Preset::Lite), format!("moderate queue {} with budget {:.1}% high", q, pct))
        } else {
            (Decision::Hold, None, format!("moderate queue {} with budget {:.1}% moderate", q, pct))
        }
    } else if pct >= 50.0 {
        (Decision::ScaleDown, Some(Preset::Lite), format!("low queue {} with budget {:.1}% >= 50%", q, pct))
    } else {
        (Decision::Hold, None, format!("low queue {} with budget headroom", q))
    };

    let (decision, target) =
        if decision == Decision::ScaleUp && inputs.failure_rate_24h > FAILURE_OVERRIDE {
            reason = format!(
                "{}; held: {} failures in 24h",
                reason, inputs.failure_rate_24h
            );
            (Decision::Hold, None)
        } else {
            (decision, target)
        };

    ScaleDecision {
        decision,
        target,
        reason,
        inputs,
    }
}

/// Bootstrap preset from budget alone: first rule whose `max_pct` covers the
/// spend wins, `fallback` when none does, `no_budget` without a snapshot.
pub fn select_bootstrap_preset(
    budget_pct: Option<f64>,
    rules: &[PresetRule],
    fallback: Preset,
    no_budget: Preset,
) -> (Preset, String) {
    let Some(pct) = budget_pct else {
        return (no_budget, "no_budget_configured".to_string());
    };
    rules
        .iter()
        .find(|rule| pct <= rule.max_pct)
        .map(|rule| (rule.preset, format!("budget_pct<={}", rule.max_pct)))
        .unwrap_or((fallback, "no_rule_match".to_string()))
}

/// Signals for [`recommend_preset`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendInputs {
    /// Explicit daily budget; wins over `budget_pct`
    pub daily_budget_usd: Option<f64>,
    /// Current spend against the team's limit
    pub budget_pct: Option<f64>,
    /// build, feature, bugfix, refactor, research or docs
    pub work_type: String,
    /// Files in the repository, `.git` excluded
    pub repo_files: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub preset: Preset,
    /// Budget, work type and repository votes, in that order
    pub votes: [Preset; 3],
    pub reasoning: Vec<String>,
    pub composition: &'static [PresetSlot],
}

fn budget_vote(inputs: &RecommendInputs, reasoning: &mut Vec<String>) -> Preset {
    if let Some(usd) = inputs.daily_budget_usd {
        let (preset, verb) = if usd >= 10.0 {
            (Preset::Heavy, "supports")
        } else if usd >= 3.0 {
            (Preset::Standard, "supports")
        } else {
            (Preset::Lite, "suggests")
        };
        reasoning.push(format!("budget ${:.2}/day {} {}", usd, verb, preset));
        return preset;
    }
    match inputs.budget_pct {
        Some(pct) => {
            let preset = if pct < 50.0 {
                Preset::Heavy
            } else if pct < 80.0 {
                Preset::Standard
            } else {
                Preset::Lite
            };
            reasoning.push(format!("budget at {:.1}% suggests {}", pct, preset));
            preset
        }
        None => {
            reasoning.push("no budget information, assuming standard".to_string());
            Preset::Standard
        }
    }
}

fn work_type_vote(work_type: &str) -> Preset {
    match work_type.to_ascii_lowercase().as_str() {
        "build" | "feature" => Preset::Heavy,
        "research" | "docs" => Preset::Lite,
        _ => Preset::Standard,
    }
}

fn repo_vote(files: usize) -> Preset {
    if files > 500 {
        Preset::Heavy
    } else if files > 100 {
        Preset::Standard
    } else {
        Preset::Lite
    }
}

/// Median of the budget, work type and repository size votes. Without a
/// repository the budget vote counts twice.
pub fn recommend_preset(inputs: &RecommendInputs) -> Recommendation {
    let mut reasoning = Vec::new();
    let budget = budget_vote(inputs, &mut reasoning);

    let work = work_type_vote(&inputs.work_type);
    reasoning.push(format!("work type '{}' suggests {}", inputs.work_type, work));

    let repo = match inputs.repo_files {
        Some(files) => {
            let preset = repo_vote(files);
            reasoning.push(format!("repository has {} files, suggests {}", files, preset));
            preset
        }
        None => budget,
    };

    let votes = [budget, work, repo];
    let mut sorted = votes;
    sorted.sort();
    let preset = sorted[1];
    reasoning.push(format!(
        "recommending {} (median of {}, {}, {})",
        preset, budget, work, repo
    ));

    Recommendation {
        preset,
        votes,
        reasoning,
        composition: preset.composition(),
    }
}
