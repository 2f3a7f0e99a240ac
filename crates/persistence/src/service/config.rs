//! Write path configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sync::DEFAULT_BATCH_SIZE;
use crate::types::DEFAULT_PAGE_SIZE;

/// What the write path does with a reference to an entity that does not
/// exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceResolution {
    /// Reject the write with `ReferenceError::Unresolved`.
    #[default]
    Strict,
    /// Keep the dangling id and log a warning.
    Lenient,
}

impl FromStr for ReferenceResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(ReferenceResolution::Strict),
            "lenient" => Ok(ReferenceResolution::Lenient),
            other => Err(format!(
                "unknown reference resolution '{other}': expected 'strict' or 'lenient'"
            )),
        }
    }
}

impl fmt::Display for ReferenceResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceResolution::Strict => write!(f, "strict"),
            ReferenceResolution::Lenient => write!(f, "lenient"),
        }
    }
}

/// Configuration for [`PersonnelService`](super::PersonnelService).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Handling of references to missing entities.
    #[serde(default)]
    pub reference_resolution: ReferenceResolution,

    /// Page size used when a caller does not ask for one.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Entities loaded per batch by the index rebuild.
    #[serde(default = "default_rebuild_batch_size")]
    pub rebuild_batch_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_rebuild_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            reference_resolution: ReferenceResolution::default(),
            default_page_size: default_page_size(),
            rebuild_batch_size: default_rebuild_batch_size(),
        }
    }
}

impl ServiceConfig {
    pub fn lenient() -> Self {
        Self {
            reference_resolution: ReferenceResolution::Lenient,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: ServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.reference_resolution, ReferenceResolution::Strict);
        assert_eq!(config.default_page_size, 20);
    }

    #[test]
    fn test_reference_resolution_parse() {
        assert_eq!(
            "LENIENT".parse::<ReferenceResolution>().unwrap(),
            ReferenceResolution::Lenient
        );
        assert!("loose".parse::<ReferenceResolution>().is_err());

        let config: ServiceConfig =
            serde_json::from_str(r#"{"reference_resolution": "lenient"}"#).unwrap();
        assert_eq!(config, ServiceConfig::lenient());
    }
}
