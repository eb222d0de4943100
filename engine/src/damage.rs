//! Damage types and resistance/immunity adjustment.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::effects::{ActiveEffect, EffectKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Acid,
    Bludgeoning,
    Cold,
    Fire,
    Force,
    Lightning,
    Necrotic,
    Piercing,
    Poison,
    Psychic,
    Radiant,
    Slashing,
    Thunder,
}

impl FromStr for DamageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use DamageType::*;
        match s.trim().to_lowercase().as_str() {
            "acid" => Ok(Acid),
            "bludgeoning" => Ok(Bludgeoning),
            "cold" => Ok(Cold),
            "fire" => Ok(Fire),
            "force" => Ok(Force),
            "lightning" => Ok(Lightning),
            "necrotic" => Ok(Necrotic),
            "piercing" => Ok(Piercing),
            "poison" => Ok(Poison),
            "psychic" => Ok(Psychic),
            "radiant" => Ok(Radiant),
            "slashing" => Ok(Slashing),
            "thunder" => Ok(Thunder),
            other => Err(format!("unknown damage type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageAdjustment {
    Full,
    Resisted,
    Immune,
}

/// Apply the target's resistance and immunity effects to incoming damage.
///
/// An effect without a damage type covers every type, including untyped
/// damage; a typed effect only covers damage of that type. Immunity wins
/// over resistance, and resistance halves (rounding down) once no matter how
/// many sources grant it.
pub fn adjust_damage<'a>(
    amount: u32,
    damage_type: Option<DamageType>,
    target_effects: impl IntoIterator<Item = &'a ActiveEffect>,
) -> (u32, DamageAdjustment) {
    let mut resisted = false;
    for effect in target_effects {
        let covers = effect.damage_type.is_none() || effect.damage_type == damage_type;
        if !covers {
            continue;
        }
        match effect.kind {
            EffectKind::Immunity => return (0, DamageAdjustment::Immune),
            EffectKind::Resistance => resisted = true,
            _ => {}
        }
    }
    if resisted {
        (amount / 2, DamageAdjustment::Resisted)
    } else {
        (amount, DamageAdjustment::Full)
    }
}
