//! Budget pressure source

use crate::error::FleetResult;
use crate::paths::{BUDGETS, SPEND};
use fleet_store::{DocumentStore, StoreExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetLevel {
    Ok,
    Warn,
    Critical,
}

impl BudgetLevel {
    pub fn from_pct(pct: f64) -> Self {
        if pct < 75.0 {
            Self::Ok
        } else if pct < 90.0 {
            Self::Warn
        } else {
            Self::Critical
        }
    }
}

/// Spend against limit for one scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSnapshot {
    pub current_usd: f64,
    pub limit_usd: f64,
    pub pct: f64,
    pub level: BudgetLevel,
}

impl BudgetSnapshot {
    pub fn new(current_usd: f64, limit_usd: f64) -> Self {
        let pct = if limit_usd > 0.0 {
            (current_usd / limit_usd * 1000.0).round() / 10.0
        } else {
            0.0
        };
        Self {
            current_usd,
            limit_usd,
            pct,
            level: BudgetLevel::from_pct(pct),
        }
    }
}

/// Cost-accounting collaborator
#[cfg_attr(test, mockall::automock)]
pub trait CostAccounting: Send + Sync {
    /// `None` when no budget applies to the team
    fn snapshot(&self, team_id: &str) -> FleetResult<Option<BudgetSnapshot>>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Limit {
    limit_usd: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct BudgetsDoc {
    #[serde(default)]
    teams: HashMap<String, Limit>,
    #[serde(default)]
    global: Option<Limit>,
}

#[derive(Debug, Default, Deserialize)]
struct SpendDoc {
    #[serde(default)]
    teams: HashMap<String, f64>,
    #[serde(default)]
    global: Option<f64>,
}

/// Reads `budgets.json` and `spend.json` from the state root
pub struct FileCostAccounting {
    store: Arc<dyn DocumentStore>,
}

impl FileCostAccounting {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl CostAccounting for FileCostAccounting {
    fn snapshot(&self, team_id: &str) -> FleetResult<Option<BudgetSnapshot>> {
        let budgets: BudgetsDoc = match self.store.try_load_json(BUDGETS) {
            Ok(Some(doc)) => doc,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Unreadable {}: {}", BUDGETS, e);
                return Ok(None);
            }
        };
        let team_limit = budgets.teams.get(team_id).and_then(|l| l.limit_usd);
        let limit = match team_limit.or(budgets.global.and_then(|g| g.limit_usd)) {
            Some(limit) if limit > 0.0 => limit,
            _ => return Ok(None),
        };

        let spend: SpendDoc = self.store.load_json(SPEND);
        let current = if team_limit.is_some() {
            spend.teams.get(team_id).copied().unwrap_or(0.0)
        } else {
            spend.global.unwrap_or(0.0)
        };
        Ok(Some(BudgetSnapshot::new(current, limit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_store::MemoryDocumentStore;

    fn source(budgets: &str, spend: &str) -> FileCostAccounting {
        let store = Arc::new(MemoryDocumentStore::new());
        if !budgets.is_empty() {
            store.write_atomic(BUDGETS, budgets).unwrap();
        }
        if !spend.is_empty() {
            store.write_atomic(SPEND, spend).unwrap();
        }
        FileCostAccounting::new(store)
    }

    #[test]
    fn test_team_budget() {
        let costs = source(
            r#"{"teams":{"alpha":{"limitUsd":20.0}}}"#,
            r#"{"teams":{"alpha":17.0}}"#,
        );
        let snap = costs.snapshot("alpha").unwrap().unwrap();
        assert_eq!(snap.pct, 85.0);
        assert_eq!(snap.level, BudgetLevel::Warn);
    }

    #[test]
    fn test_global_budget_fallback() {
        let costs = source(r#"{"global":{"limitUsd":100.0}}"#, r#"{"global":10.0}"#);
        let snap = costs.snapshot("beta").unwrap().unwrap();
        assert_eq!(snap.pct, 10.0);
        assert_eq!(snap.level, BudgetLevel::Ok);
    }

    #[test]
    fn test_missing_or_corrupt_budget_is_none() {
        assert!(source("", "").snapshot("alpha").unwrap().is_none());
        assert!(source("{not json", "").snapshot("alpha").unwrap().is_none());
        assert!(source(r#"{"teams":{"alpha":{"limitUsd":0}}}"#, "").snapshot("alpha").unwrap().is_none());
    }

    #[test]
    fn test_levels() {
        assert_eq!(BudgetLevel::from_pct(74.9), BudgetLevel::Ok);
        assert_eq!(BudgetLevel::from_pct(89.0), BudgetLevel::Warn);
        assert_eq!(BudgetLevel::from_pct(90.0), BudgetLevel::Critical);
    }
}
