//! Engine configuration, loadable from XML.

use std::path::PathBuf;

use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::knots::KnotTolerance;
use crate::units::UnitSystem;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How long converted geometry is kept for reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// No hashing, no caching.
    Disabled,
    /// Entries unhit during a keep-alive region become collectible when it ends.
    #[default]
    Performance,
    /// Entries stay pinned for the lifetime of the cache.
    Extreme,
}

/// Thresholds for rebuilding ngons from decoded triangle meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NgonConfig {
    #[serde(rename = "@min_vertex_count")]
    pub min_vertex_count: usize,
    #[serde(rename = "@min_face_count")]
    pub min_face_count: usize,
}

impl Default for NgonConfig {
    fn default() -> Self {
        Self {
            min_vertex_count: 4,
            min_face_count: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(rename = "@cache_policy")]
    pub cache_policy: CachePolicy,
    #[serde(rename = "@model_units")]
    pub model_units: UnitSystem,
    #[serde(rename = "@page_units")]
    pub page_units: UnitSystem,
    /// Retry failed solids through the neutral interchange file.
    #[serde(rename = "@interchange_fallback")]
    pub interchange_fallback: bool,
    /// Refinement passes when lowering SubD cages.
    #[serde(rename = "@subd_levels")]
    pub subd_levels: usize,
    /// Where interchange files are written; the system temp dir otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interchange_dir: Option<PathBuf>,
    pub knot_tolerance: KnotTolerance,
    pub ngon: NgonConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_policy: CachePolicy::default(),
            model_units: UnitSystem::HOST,
            page_units: UnitSystem::HOST,
            interchange_fallback: true,
            subd_levels: 2,
            interchange_dir: None,
            knot_tolerance: KnotTolerance::DEFAULT,
            ngon: NgonConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_xml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_xml_string(&self) -> Result<String, ConfigError> {
        Ok(quick_xml::se::to_string_with_root("engine", self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let KnotTolerance { absolute, relative } = self.knot_tolerance;
        if !(absolute.is_finite() && absolute >= 0.0 && relative.is_finite() && relative >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "knot tolerance must be finite and non-negative, got {absolute} / {relative}"
            )));
        }
        if self.subd_levels == 0 {
            return Err(ConfigError::Invalid("subd_levels must be at least 1".to_owned()));
        }
        if self.ngon.min_vertex_count < 3 {
            return Err(ConfigError::Invalid("ngons need at least 3 vertices".to_owned()));
        }
        Ok(())
    }
}
