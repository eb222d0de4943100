use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AdMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Blinded,
    Charmed,
    Deafened,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,
}

impl Condition {
    /// Conditions that leave a creature unable to take actions.
    pub fn prevents_action(self) -> bool {
        matches!(
            self,
            Condition::Incapacitated
                | Condition::Paralyzed
                | Condition::Petrified
                | Condition::Stunned
                | Condition::Unconscious
        )
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Condition::*;
        match s.trim().to_lowercase().as_str() {
            "blinded" | "blind" => Ok(Blinded),
            "charmed" => Ok(Charmed),
            "deafened" | "deaf" => Ok(Deafened),
            "frightened" | "afraid" => Ok(Frightened),
            "grappled" => Ok(Grappled),
            "incapacitated" => Ok(Incapacitated),
            "invisible" => Ok(Invisible),
            "paralyzed" => Ok(Paralyzed),
            "petrified" => Ok(Petrified),
            "poisoned" => Ok(Poisoned),
            "prone" => Ok(Prone),
            "restrained" => Ok(Restrained),
            "stunned" => Ok(Stunned),
            "unconscious" => Ok(Unconscious),
            other => Err(format!("unknown condition: {}", other)),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Whether the attack is melee or ranged (used for prone interactions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackStyle {
    #[default]
    Melee,
    Ranged,
}

/// Net advantage for an attack roll from the requested mode plus the
/// attacker's and target's conditions.
pub fn attack_mode(
    requested: AdMode,
    attacker: &BTreeSet<Condition>,
    target: Option<&BTreeSet<Condition>>,
    style: AttackStyle,
) -> AdMode {
    use Condition::*;

    let mut advantage = requested == AdMode::Advantage;
    let mut disadvantage = requested == AdMode::Disadvantage;

    for c in attacker {
        match c {
            Blinded | Frightened | Poisoned | Prone | Restrained => disadvantage = true,
            Invisible => advantage = true,
            _ => {}
        }
    }

    for c in target.into_iter().flatten() {
        match c {
            Blinded | Paralyzed | Petrified | Restrained | Stunned | Unconscious => {
                advantage = true
            }
            Invisible => disadvantage = true,
            Prone => match style {
                AttackStyle::Melee => advantage = true,
                AttackStyle::Ranged => disadvantage = true,
            },
            _ => {}
        }
    }

    AdMode::from_sources(advantage, disadvantage)
}
