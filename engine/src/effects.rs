//! Active effects and the modifier stacking rules.
//!
//! Bonuses add, penalties subtract, and `Set` modifiers establish a base:
//! overlapping sets do not stack (the largest wins) but ordinary bonuses
//! still stack on top of it.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::conditions::Condition;
use crate::damage::DamageType;
use crate::dice::Dice;
use crate::formula::DiceFormula;
use crate::roll::{execute, RollResult};
use crate::AdMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Str,
    Dex,
    Con,
    Int,
    Wis,
    Cha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    ArmorClass,
    Speed,
    AttackBonus,
    SaveDc,
    Ability(Ability),
    MaxHp,
    TempHp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    Bonus,
    Penalty,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatModifier {
    pub stat: Stat,
    pub value: i32,
    pub kind: ModifierKind,
}

impl StatModifier {
    pub fn bonus(stat: Stat, value: i32) -> Self {
        Self {
            stat,
            value,
            kind: ModifierKind::Bonus,
        }
    }

    /// `value` is the amount subtracted.
    pub fn penalty(stat: Stat, value: i32) -> Self {
        Self {
            stat,
            value,
            kind: ModifierKind::Penalty,
        }
    }

    pub fn set(stat: Stat, value: i32) -> Self {
        Self {
            stat,
            value,
            kind: ModifierKind::Set,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Buff,
    Debuff,
    HealingOverTime,
    DamageOverTime,
    Condition,
    Resistance,
    Immunity,
}

/// Which rolls a bonus-dice effect (Bless, Bane, Divine Favor) adds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusUsage {
    Attacks,
    SavingThrows,
    Damage,
    Healing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Duration {
    /// Combat rounds remaining.
    Rounds(u32),
    #[default]
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub target: String,
    pub source: String,
    pub kind: EffectKind,
    #[serde(default)]
    pub modifiers: Vec<StatModifier>,
    #[serde(default)]
    pub bonus_dice: BTreeMap<BonusUsage, DiceFormula>,
    #[serde(default)]
    pub duration: Duration,
    /// The effect ends when this combatant's concentration ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concentration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_type: Option<DamageType>,
    /// Rolled at the start of each of the target's turns (damage or healing
    /// over time).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodic: Option<DiceFormula>,
}

impl ActiveEffect {
    pub fn new(
        id: impl Into<String>,
        kind: EffectKind,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            target: target.into(),
            source: source.into(),
            kind,
            modifiers: Vec::new(),
            bonus_dice: BTreeMap::new(),
            duration: Duration::Permanent,
            concentration: None,
            condition: None,
            damage_type: None,
            periodic: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_modifier(mut self, modifier: StatModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_bonus_dice(mut self, usage: BonusUsage, formula: DiceFormula) -> Self {
        self.bonus_dice.insert(usage, formula);
        self
    }

    pub fn lasting(mut self, rounds: u32) -> Self {
        self.duration = Duration::Rounds(rounds);
        self
    }

    pub fn concentration(mut self, holder: impl Into<String>) -> Self {
        self.concentration = Some(holder.into());
        self
    }

    pub fn granting(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn against(mut self, damage_type: DamageType) -> Self {
        self.damage_type = Some(damage_type);
        self
    }

    pub fn every_turn(mut self, formula: DiceFormula) -> Self {
        self.periodic = Some(formula);
        self
    }
}

/// Modifiers for one stat, partitioned by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatResolution {
    /// Largest `Set` value, if any.
    pub set: Option<i32>,
    pub bonus: i32,
    pub penalty: i32,
}

impl StatResolution {
    /// `max_set + bonuses - penalties`, or `bonuses - penalties` when no set
    /// modifier applies.
    pub fn value(&self) -> i32 {
        self.apply_to(self.set.unwrap_or(0))
    }

    /// The stat's final value given the combatant's own `base`; a set
    /// modifier replaces the base.
    pub fn apply_to(&self, base: i32) -> i32 {
        self.set
            .unwrap_or(base)
            .saturating_add(self.bonus)
            .saturating_sub(self.penalty)
    }
}

pub fn resolve_stat<'a>(
    effects: impl IntoIterator<Item = &'a ActiveEffect>,
    stat: Stat,
) -> StatResolution {
    let mut resolution = StatResolution::default();
    for m in effects
        .into_iter()
        .flat_map(|e| &e.modifiers)
        .filter(|m| m.stat == stat)
    {
        match m.kind {
            ModifierKind::Bonus => resolution.bonus = resolution.bonus.saturating_add(m.value),
            ModifierKind::Penalty => {
                resolution.penalty = resolution.penalty.saturating_add(m.value)
            }
            // Strictly greater, so the first of equal sets is the one kept.
            ModifierKind::Set => match resolution.set {
                Some(current) if current >= m.value => {}
                _ => resolution.set = Some(m.value),
            },
        }
    }
    resolution
}

pub fn resolve<'a>(effects: impl IntoIterator<Item = &'a ActiveEffect>, stat: Stat) -> i32 {
    resolve_stat(effects, stat).value()
}

/// [`resolve_stat`] restricted to the effects on one target.
pub fn resolve_for<'a>(
    effects: impl IntoIterator<Item = &'a ActiveEffect>,
    target: &str,
    stat: Stat,
) -> StatResolution {
    resolve_stat(effects.into_iter().filter(|e| e.target == target), stat)
}

/// Bonus dice rolled for one usage, each formula on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BonusDiceRoll {
    /// `(effect id, roll)` in effect order.
    pub rolls: Vec<(String, RollResult)>,
    pub total: i32,
}

pub fn roll_bonus_dice<'a>(
    effects: impl IntoIterator<Item = &'a ActiveEffect>,
    usage: BonusUsage,
    dice: &mut Dice,
) -> BonusDiceRoll {
    let mut bonus = BonusDiceRoll::default();
    for effect in effects {
        if let Some(formula) = effect.bonus_dice.get(&usage) {
            let roll = execute(formula, AdMode::Normal, dice);
            bonus.total = bonus.total.saturating_add(roll.grand_total());
            bonus.rolls.push((effect.id.clone(), roll));
        }
    }
    bonus
}

/// Why an effect left the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Expired,
    Dismissed,
    ConcentrationBroken,
    TargetRemoved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectEnded {
    pub effect_id: String,
    pub name: String,
    pub target: String,
    pub reason: EndReason,
}

impl EffectEnded {
    fn new(effect: &ActiveEffect, reason: EndReason) -> Self {
        Self {
            effect_id: effect.id.clone(),
            name: effect.name.clone(),
            target: effect.target.clone(),
            reason,
        }
    }
}

/// Every active effect in the session, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectLedger {
    effects: IndexMap<String, ActiveEffect>,
}

impl EffectLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Adds an effect, replacing (in place) any effect with the same id.
    pub fn add(&mut self, effect: ActiveEffect) -> Option<ActiveEffect> {
        self.effects.insert(effect.id.clone(), effect)
    }

    pub fn get(&self, id: &str) -> Option<&ActiveEffect> {
        self.effects.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveEffect> {
        self.effects.values()
    }

    pub fn for_target<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a ActiveEffect> + 'a {
        self.effects.values().filter(move |e| e.target == target)
    }

    pub fn dismiss(&mut self, id: &str) -> Option<EffectEnded> {
        self.effects
            .shift_remove(id)
            .map(|e| EffectEnded::new(&e, EndReason::Dismissed))
    }

    /// Ends every effect sustained by `holder`'s concentration.
    pub fn break_concentration(&mut self, holder: &str) -> Vec<EffectEnded> {
        self.remove_where(EndReason::ConcentrationBroken, |e| {
            e.concentration.as_deref() == Some(holder)
        })
    }

    /// Drops every effect on a combatant leaving the session.
    pub fn remove_target(&mut self, target: &str) -> Vec<EffectEnded> {
        self.remove_where(EndReason::TargetRemoved, |e| e.target == target)
    }

    /// Round boundary: timed effects lose a round, those reaching zero end.
    pub fn end_round(&mut self) -> Vec<EffectEnded> {
        let mut ended = Vec::new();
        self.effects.retain(|_, effect| {
            let Duration::Rounds(left) = &mut effect.duration else {
                return true;
            };
            *left = left.saturating_sub(1);
            if *left > 0 {
                return true;
            }
            info!(effect = %effect.id, combatant = %effect.target, "effect expired");
            ended.push(EffectEnded::new(effect, EndReason::Expired));
            false
        });
        ended
    }

    /// Conditions granted by `Condition` effects on `target`.
    pub fn conditions_for(&self, target: &str) -> BTreeSet<Condition> {
        self.for_target(target)
            .filter(|e| e.kind == EffectKind::Condition)
            .filter_map(|e| e.condition)
            .collect()
    }

    fn remove_where(
        &mut self,
        reason: EndReason,
        mut pred: impl FnMut(&ActiveEffect) -> bool,
    ) -> Vec<EffectEnded> {
        let mut ended = Vec::new();
        self.effects.retain(|_, effect| {
            if pred(&*effect) {
                ended.push(EffectEnded::new(effect, reason));
                false
            } else {
                true
            }
        });
        ended
    }
}
