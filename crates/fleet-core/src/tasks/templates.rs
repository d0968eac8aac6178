//! Goal decomposition into dependency-chained tasks

use super::ledger::{NewTask, TaskLedger};
use super::model::Task;
use crate::error::{FleetError, FleetResult};
use crate::messaging::Priority;
use std::fmt;
use std::str::FromStr;

/// Built-in decomposition templates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Feature,
    Bugfix,
    Refactor,
}

impl Template {
    /// (suffix, title prefix) of each step, in dependency order
    fn steps(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Feature => &[
                ("design", "Design"),
                ("implement", "Implement"),
                ("test", "Test"),
                ("review", "Review"),
            ],
            Self::Bugfix => &[
                ("reproduce", "Reproduce"),
                ("fix", "Fix"),
                ("verify", "Verify fix for"),
            ],
            Self::Refactor => &[
                ("analyze", "Analyze"),
                ("refactor", "Refactor"),
                ("verify", "Verify behavior of"),
            ],
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feature => write!(f, "feature"),
            Self::Bugfix => write!(f, "bugfix"),
            Self::Refactor => write!(f, "refactor"),
        }
    }
}

impl FromStr for Template {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feature" => Ok(Self::Feature),
            "bugfix" => Ok(Self::Bugfix),
            "refactor" => Ok(Self::Refactor),
            other => Err(format!("unknown template: {}", other)),
        }
    }
}

impl TaskLedger<'_> {
    /// Add one task per template step, each depending on the previous one.
    ///
    /// Ids are `<prefix>-<step>`; the first step is pending, the rest blocked.
    pub fn decompose(
        &self,
        goal: &str,
        template: Template,
        prefix: &str,
        created_by: Option<&str>,
    ) -> FleetResult<Vec<Task>> {
        if goal.trim().is_empty() {
            return Err(FleetError::validation_field("Goal must not be empty", "goal"));
        }

        let mut created: Vec<Task> = Vec::new();
        for (suffix, verb) in template.steps() {
            let depends_on = created
                .last()
                .map(|t| vec![t.task_id.clone()])
                .unwrap_or_default();
            let task = self.add(NewTask {
                task_id: Some(format!("{}-{}", prefix, suffix)),
                title: format!("{} {}", verb, goal.trim()),
                description: format!("{} step of {} for: {}", suffix, template, goal.trim()),
                depends_on,
                files: Vec::new(),
                priority: Priority::Normal,
                created_by: created_by.map(str::to_string),
            })?;
            created.push(task);
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_names() {
        assert_eq!("bugfix".parse::<Template>().unwrap(), Template::Bugfix);
        assert!("epic".parse::<Template>().is_err());
        assert_eq!(Template::Feature.steps().len(), 4);
        assert_eq!(Template::Refactor.to_string(), "refactor");
    }
}
