use serde::{Deserialize, Serialize};

/// How a world turns a requested component-id list into a family cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyKeyMode {
    /// Sort and deduplicate the ids; the same set in any order shares one family.
    #[default]
    Canonical,
    /// Key on the ids exactly as requested; each distinct ordering gets its own family.
    Literal,
}

/// World configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Family cache keying policy
    pub family_keys: FamilyKeyMode,
}
