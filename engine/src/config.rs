use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dice::Dice;
use crate::formula::DiceFormula;

/// Engine settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EngineConfig {
    /// Fixed seed for replayable sessions; entropy when absent.
    pub seed: Option<u64>,
    /// Rolled in place of chat input that is not a dice formula.
    pub fallback_formula: DiceFormula,
    pub death_save_dc: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            fallback_formula: DiceFormula::d20(),
            death_save_dc: 10,
        }
    }
}

impl EngineConfig {
    /// Reads YAML (`.yaml`/`.yml`) or JSON (anything else).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        let cfg = if yaml {
            serde_yaml::from_str(&text)
                .with_context(|| format!("failed to parse config YAML: {}", path.display()))?
        } else {
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse config JSON: {}", path.display()))?
        };
        Ok(cfg)
    }

    pub fn dice(&self) -> Dice {
        match self.seed {
            Some(seed) => Dice::from_seed(seed),
            None => Dice::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_and_json_fill_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("engine.yaml");
        fs::write(&yaml, "seed: 7\nfallback_formula: 1d20+2\n").unwrap();
        let cfg = EngineConfig::load(&yaml).unwrap();
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.fallback_formula.to_string(), "1d20+2");
        assert_eq!(cfg.death_save_dc, 10);

        let json = dir.path().join("engine.json");
        fs::write(&json, "{}").unwrap();
        assert_eq!(EngineConfig::load(&json).unwrap(), EngineConfig::default());
    }

    #[test]
    fn bad_formula_in_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{"fallback_formula": "1d7"}"#).unwrap();
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("d7"));
    }
}
