//! Registry of named effects. Each effect is a plain config struct plus a
//! builder that lays out paths, scenes and bindings on a fresh stage.

mod binarypath;
mod errorcorrect;
mod expand;
mod spotlights;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub use binarypath::BinaryPathConfig;
pub use errorcorrect::ErrorCorrectConfig;
pub use expand::ExpandConfig;
pub use spotlights::SpotlightsConfig;

use crate::canvas::{Canvas, IngestOptions};
use crate::color::ColorMode;
use crate::engine::EffectIterator;
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum EffectSpec {
    Expand(ExpandConfig),
    #[serde(rename = "errorcorrect")]
    ErrorCorrect(ErrorCorrectConfig),
    #[serde(rename = "binarypath")]
    BinaryPath(BinaryPathConfig),
    Spotlights(SpotlightsConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectInfo {
    pub name: &'static str,
    pub description: &'static str,
}

pub const EFFECTS: [EffectInfo; 4] = [
    EffectInfo {
        name: "expand",
        description: "Characters expand from the center of the canvas to their positions.",
    },
    EffectInfo {
        name: "errorcorrect",
        description: "Swapped character pairs flash an error, then move back into place.",
    },
    EffectInfo {
        name: "binarypath",
        description: "Binary digits travel in right angles and collapse into each character.",
    },
    EffectInfo {
        name: "spotlights",
        description: "Spotlights search the text, converge on the center and widen until all is lit.",
    },
];

/// Everything an effect builder needs besides its own config.
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    pub input: &'a str,
    pub canvas: Canvas,
    pub ingest: IngestOptions,
    pub color_mode: ColorMode,
    pub seed: u64,
}

impl EffectSpec {
    pub fn from_name(name: &str) -> Result<Self, EngineError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "expand" => Ok(Self::Expand(ExpandConfig::default())),
            "errorcorrect" => Ok(Self::ErrorCorrect(ErrorCorrectConfig::default())),
            "binarypath" => Ok(Self::BinaryPath(BinaryPathConfig::default())),
            "spotlights" => Ok(Self::Spotlights(SpotlightsConfig::default())),
            _ => Err(EngineError::UnknownEffect(name.to_owned())),
        }
    }

    /// Loads `name`'s config from a YAML file. The `effect` key may be omitted;
    /// when present it must name the same effect.
    pub fn load(name: &str, path: &Path) -> Result<Self> {
        let default = Self::from_name(name)?;
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read effect config {}", path.display()))?;
        let mut value: serde_yaml::Value = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse yaml in {}", path.display()))?;
        if value.is_null() {
            return Ok(default);
        }

        let Some(mapping) = value.as_mapping_mut() else {
            bail!("effect config {} must be a mapping", path.display());
        };
        let key = serde_yaml::Value::from("effect");
        match mapping.get(&key).and_then(serde_yaml::Value::as_str) {
            Some(declared) if declared != default.name() => bail!(
                "effect config {} is for '{}', not '{}'",
                path.display(),
                declared,
                default.name()
            ),
            Some(_) => {}
            None => {
                mapping.insert(key, serde_yaml::Value::from(default.name()));
            }
        }
        let spec: Self = serde_yaml::from_value(value)
            .with_context(|| format!("invalid effect config {}", path.display()))?;
        Ok(spec)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Expand(_) => "expand",
            Self::ErrorCorrect(_) => "errorcorrect",
            Self::BinaryPath(_) => "binarypath",
            Self::Spotlights(_) => "spotlights",
        }
    }

    pub fn build(&self, context: &BuildContext<'_>) -> Result<EffectIterator, EngineError> {
        match self {
            Self::Expand(config) => expand::build(config, context),
            Self::ErrorCorrect(config) => errorcorrect::build(config, context),
            Self::BinaryPath(config) => binarypath::build(config, context),
            Self::Spotlights(config) => spotlights::build(config, context),
        }
    }
}

fn check_ratio(effect: &'static str, field: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidEffectConfig {
            effect,
            message: format!("{field} must be in (0, 1], got {value}"),
        })
    }
}
