//! Autoscaler, preset selection and budget pressure

mod autoscaler;
mod budget;
mod decision;
mod preset;

pub(crate) use autoscaler::{is_failure, is_restart};
pub use autoscaler::{
    AutoscaleOutcome, Autoscaler, BootstrapChoice, BootstrapOutcome, PresetOutcome,
    count_repo_files,
};
#[cfg(test)]
pub use budget::MockCostAccounting;
pub use budget::{BudgetLevel, BudgetSnapshot, CostAccounting, FileCostAccounting};
pub use decision::{
    Decision, FAILURE_OVERRIDE, Recommendation, RecommendInputs, ScaleDecision, ScaleInputs,
    decide, recommend_preset, select_bootstrap_preset,
};
pub use preset::{Preset, PresetSlot};
