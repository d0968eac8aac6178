//! Budget-aware autoscaling and preset application

use super::budget::BudgetSnapshot;
use super::decision::{
    Decision, RecommendInputs, Recommendation, ScaleDecision, ScaleInputs, decide,
    recommend_preset, select_bootstrap_preset,
};
use super::preset::Preset;
use crate::error::FleetResult;
use crate::events::{Event, EventKind};
use crate::lifecycle::{NewMember, SpawnOptions};
use crate::tasks::TaskStatus;
use crate::team::{MemberKind, MemberStatus, TeamScope};
use chrono::Duration;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Preset requested at bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapChoice {
    /// Pick from budget pressure
    Auto,
    Fixed(Preset),
}

impl FromStr for BootstrapChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            s.parse().map(Self::Fixed)
        }
    }
}

impl fmt::Display for BootstrapChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Fixed(preset) => write!(f, "{}", preset),
        }
    }
}

/// Membership changes made by [`Autoscaler::scale_to_preset`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetOutcome {
    pub preset: Preset,
    pub added: Vec<String>,
    pub paused: Vec<String>,
    pub stopped: Vec<String>,
    pub resumed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscaleOutcome {
    #[serde(flatten)]
    pub decision: ScaleDecision,
    pub applied: Option<PresetOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapOutcome {
    pub preset: Preset,
    /// How the preset was chosen
    pub source: String,
    pub budget_pct: Option<f64>,
    pub applied: PresetOutcome,
}

pub(crate) fn is_failure(event: &Event) -> bool {
    match event.event_type.as_str() {
        "TaskClaimExpired" | "AutoRecoverFailed" => true,
        "TaskWorkerFinished" => event.str_field("status") != Some("completed"),
        other => event.kind().is_none() && other.to_lowercase().contains("fail"),
    }
}

pub(crate) fn is_restart(event: &Event) -> bool {
    matches!(event.event_type.as_str(), "TeammateRestarted" | "TeammateHealed")
}

/// Regular files under `root`, not descending into `.git`
pub fn count_repo_files(root: &Path) -> usize {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .count()
}

/// Scaling control loop of one team
pub struct Autoscaler<'a> {
    scope: &'a TeamScope<'a>,
}

impl<'a> Autoscaler<'a> {
    pub fn new(scope: &'a TeamScope<'a>) -> Self {
        Self { scope }
    }

    /// Current budget pressure; unavailable accounting counts as no budget
    pub fn budget(&self) -> Option<BudgetSnapshot> {
        let costs = self.scope.fleet().costs()?;
        match costs.snapshot(self.scope.id()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Budget snapshot for {} unavailable: {}", self.scope.id(), e);
                None
            }
        }
    }

    pub fn inputs(&self) -> FleetResult<ScaleInputs> {
        let board = self.scope.tasks().board();
        let team = self.scope.load_team()?;
        let since = self.scope.now() - Duration::hours(24);
        let recent = self.scope.events().since_time(since);

        Ok(ScaleInputs {
            queue_depth: board.count(TaskStatus::Pending) + board.count(TaskStatus::Blocked),
            in_progress: board.count(TaskStatus::InProgress),
            active_members: team.members.iter().filter(|m| !m.is_dormant()).count(),
            budget_pct: self.budget().map(|b| b.pct).unwrap_or(0.0),
            failure_rate_24h: recent.iter().filter(|e| is_failure(e)).count(),
            restart_rate_24h: recent.iter().filter(|e| is_restart(e)).count(),
        })
    }

    /// Decide without side effects
    pub fn evaluate(&self) -> FleetResult<ScaleDecision> {
        Ok(decide(self.inputs()?))
    }

    /// Record a decision and, when `apply` is set, move the team to its target.
    /// A dry run neither records nor applies.
    pub fn autoscale(&self, apply: bool, dry_run: bool) -> FleetResult<AutoscaleOutcome> {
        let decision = self.evaluate()?;
        if dry_run {
            return Ok(AutoscaleOutcome {
                decision,
                applied: None,
            });
        }

        let applied = match (decision.decision, decision.target) {
            (Decision::ScaleUp | Decision::ScaleDown, Some(target)) if apply => {
                Some(self.scale_to_preset(target, false, true)?)
            }
            _ => None,
        };

        self.scope.emit(EventKind::AutoScaleDecision {
            decision: decision.decision,
            target: decision.target,
            reason: decision.reason.clone(),
            queue_depth: decision.inputs.queue_depth,
            budget_pct: decision.inputs.budget_pct,
            failure_rate_24h: decision.inputs.failure_rate_24h,
            applied: applied.is_some(),
        })?;
        info!(
            "Autoscale {} for team {}: {}",
            decision.decision,
            self.scope.id(),
            decision.reason
        );
        Ok(AutoscaleOutcome { decision, applied })
    }

    /// Converge teammates on a preset composition; the lead is never touched
    pub fn scale_to_preset(&self, preset: Preset, hard: bool, spawn: bool) -> FleetResult<PresetOutcome> {
        let lifecycle = self.scope.members();
        let team = self.scope.load_team()?;
        let mut outcome = PresetOutcome {
            preset,
            added: Vec::new(),
            paused: Vec::new(),
            stopped: Vec::new(),
            resumed: Vec::new(),
        };

        for slot in preset.composition() {
            if team.is_lead(slot.member_id) {
                continue;
            }
            match team.member(slot.member_id) {
                Some(member) => {
                    if matches!(member.status, MemberStatus::Paused | MemberStatus::Stopped) {
                        lifecycle.resume(slot.member_id)?;
                        outcome.resumed.push(slot.member_id.to_string());
                    }
                }
                None if spawn => {
                    lifecycle.spawn(
                        slot.member_id,
                        SpawnOptions {
                            agent_type: Some(slot.agent_type.to_string()),
                            model: Some(slot.model.to_string()),
                            ..Default::default()
                        },
                    )?;
                    outcome.added.push(slot.member_id.to_string());
                }
                None => {
                    let mut new = NewMember::teammate(slot.member_id, MemberKind::Pane);
                    new.agent_type = Some(slot.agent_type.to_string());
                    new.model = Some(slot.model.to_string());
                    lifecycle.add_member(new)?;
                    outcome.added.push(slot.member_id.to_string());
                }
            }
        }

        for member in team.teammates().filter(|m| !preset.contains(&m.member_id)) {
            match (hard, member.status) {
                (_, MemberStatus::Stopped | MemberStatus::Replaced) => {}
                (true, _) => {
                    lifecycle.stop(&member.member_id, true)?;
                    outcome.stopped.push(member.member_id.clone());
                }
                (false, MemberStatus::Paused) => {}
                (false, _) => {
                    lifecycle.pause(&member.member_id)?;
                    outcome.paused.push(member.member_id.clone());
                }
            }
        }

        self.scope.emit(EventKind::PresetApplied {
            preset,
            added: outcome.added.clone(),
            paused: outcome.paused.clone(),
            stopped: outcome.stopped.clone(),
            resumed: outcome.resumed.clone(),
        })?;
        info!("Applied preset {} to team {}", preset, self.scope.id());
        Ok(outcome)
    }

    /// Recommend a preset from this team's budget pressure, the kind of work
    /// and the size of the repository. Nothing is applied.
    pub fn recommend(
        &self,
        daily_budget_usd: Option<f64>,
        work_type: &str,
        repo: Option<&Path>,
    ) -> Recommendation {
        let repo_files = repo.filter(|path| path.is_dir()).map(count_repo_files);
        recommend_preset(&RecommendInputs {
            daily_budget_usd,
            budget_pct: self.budget().map(|b| b.pct),
            work_type: work_type.to_string(),
            repo_files,
        })
    }

    /// Pick the initial preset (from budget when `Auto`) and apply it
    pub fn bootstrap(&self, choice: BootstrapChoice, spawn: bool) -> FleetResult<BootstrapOutcome> {
        let budget_pct = self.budget().map(|b| b.pct);
        let (preset, source) = match choice {
            BootstrapChoice::Fixed(preset) => (preset, "explicit".to_string()),
            BootstrapChoice::Auto => {
                let config = self.scope.fleet().config();
                select_bootstrap_preset(
                    budget_pct,
                    &config.preset_profile,
                    config.profile_fallback,
                    config.default_preset,
                )
            }
        };

        let applied = self.scale_to_preset(preset, false, spawn)?;
        self.scope.emit(EventKind::TeamBootstrapped {
            preset,
            source: source.clone(),
            budget_pct,
        })?;
        Ok(BootstrapOutcome {
            preset,
            source,
            budget_pct,
            applied,
        })
    }
}
