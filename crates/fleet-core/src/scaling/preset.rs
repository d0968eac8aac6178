//! Named team compositions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target team size and model mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Lite,
    #[default]
    Standard,
    Heavy,
}

/// One member slot of a preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetSlot {
    pub member_id: &'static str,
    pub agent_type: &'static str,
    pub model: &'static str,
}

const fn slot(member_id: &'static str, agent_type: &'static str, model: &'static str) -> PresetSlot {
    PresetSlot {
        member_id,
        agent_type,
        model,
    }
}

const LITE: &[PresetSlot] = &[
    slot("coder-1", "coder", "haiku"),
    slot("reviewer-1", "reviewer", "haiku"),
];

const STANDARD: &[PresetSlot] = &[
    slot("coder-1", "coder", "sonnet"),
    slot("reviewer-1", "reviewer", "haiku"),
    slot("research-1", "researcher", "haiku"),
];

const HEAVY: &[PresetSlot] = &[
    slot("planner-1", "planner", "sonnet"),
    slot("coder-1", "coder", "sonnet"),
    slot("coder-2", "coder", "sonnet"),
    slot("reviewer-1", "reviewer", "sonnet"),
    slot("research-1", "researcher", "haiku"),
];

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Lite, Preset::Standard, Preset::Heavy];

    /// Teammates (never the lead) that make up this preset
    pub fn composition(&self) -> &'static [PresetSlot] {
        match self {
            Self::Lite => LITE,
            Self::Standard => STANDARD,
            Self::Heavy => HEAVY,
        }
    }

    pub fn contains(&self, member_id: &str) -> bool {
        self.composition().iter().any(|s| s.member_id == member_id)
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lite => write!(f, "lite"),
            Self::Standard => write!(f, "standard"),
            Self::Heavy => write!(f, "heavy"),
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lite" => Ok(Self::Lite),
            "standard" => Ok(Self::Standard),
            "heavy" => Ok(Self::Heavy),
            other => Err(format!("unknown preset: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compositions_grow_with_preset() {
        assert!(Preset::Lite.composition().len() < Preset::Standard.composition().len());
        assert!(Preset::Standard.composition().len() < Preset::Heavy.composition().len());
        assert!(Preset::Heavy.contains("coder-2"));
        assert!(!Preset::Lite.contains("research-1"));
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("Heavy".parse::<Preset>().unwrap(), Preset::Heavy);
        assert!("huge".parse::<Preset>().is_err());
        assert_eq!(Preset::Lite.to_string(), "lite");
    }
}
