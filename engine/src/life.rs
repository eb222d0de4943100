use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conditions::Condition;
use crate::dice::Dice;
use crate::CombatNotice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathSave {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeathSaves {
    pub successes: u8, // 0..=3
    pub failures: u8,  // 0..=3
}

/// Derived from hit points and death saves; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStatus {
    Conscious,
    Dying,
    Stable,
    Dead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub initiative: i32,
    pub current_hp: i32,
    pub max_hp: i32,
    #[serde(default)]
    pub temp_hp: i32,
    #[serde(default = "default_armor_class")]
    pub armor_class: i32,
    #[serde(default)]
    pub conditions: BTreeSet<Condition>,
    #[serde(default)]
    pub death_saves: DeathSaves,
}

fn default_armor_class() -> i32 {
    10
}

impl Combatant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, max_hp: i32) -> Self {
        let max_hp = max_hp.max(0);
        Self {
            id: id.into(),
            name: name.into(),
            initiative: 0,
            current_hp: max_hp,
            max_hp,
            temp_hp: 0,
            armor_class: default_armor_class(),
            conditions: BTreeSet::new(),
            death_saves: DeathSaves::default(),
        }
    }

    pub fn with_initiative(mut self, initiative: i32) -> Self {
        self.initiative = initiative;
        self
    }

    pub fn with_armor_class(mut self, armor_class: i32) -> Self {
        self.armor_class = armor_class;
        self
    }

    pub fn with_hp(mut self, current_hp: i32) -> Self {
        self.current_hp = current_hp.clamp(0, self.max_hp);
        self
    }

    pub fn with_temp_hp(mut self, temp_hp: i32) -> Self {
        self.temp_hp = temp_hp.max(0);
        self
    }

    /// Name for log lines, falling back to the id.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn status(&self) -> LifeStatus {
        if self.death_saves.failures >= 3 {
            LifeStatus::Dead
        } else if self.current_hp > 0 {
            LifeStatus::Conscious
        } else if self.death_saves.successes >= 3 {
            LifeStatus::Stable
        } else {
            LifeStatus::Dying
        }
    }

    /// Bring externally supplied values back inside the invariants:
    /// `0 <= current_hp <= max_hp`, non-negative temp HP, save tallies <= 3.
    pub fn normalized(mut self) -> Self {
        self.max_hp = self.max_hp.max(0);
        self.current_hp = self.current_hp.clamp(0, self.max_hp);
        self.temp_hp = self.temp_hp.max(0);
        self.death_saves.successes = self.death_saves.successes.min(3);
        self.death_saves.failures = self.death_saves.failures.min(3);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DamageReport {
    /// Taken by temporary hit points.
    pub absorbed: i32,
    /// Taken off current hit points.
    pub dealt: i32,
    /// Went from above 0 to 0 with this hit.
    pub dropped: bool,
}

/// Temporary HP soaks damage first; the rest comes off current HP, which
/// never goes below 0. Dropping to 0 makes the combatant unconscious.
/// Damage to the dead is ignored.
pub fn apply_damage(combatant: &mut Combatant, amount: u32) -> DamageReport {
    if combatant.status() == LifeStatus::Dead {
        return DamageReport::default();
    }
    let amount = i32::try_from(amount).unwrap_or(i32::MAX);
    let absorbed = amount.min(combatant.temp_hp);
    combatant.temp_hp -= absorbed;

    let before = combatant.current_hp;
    combatant.current_hp = before.saturating_sub(amount - absorbed).max(0);
    let dropped = before > 0 && combatant.current_hp == 0;
    if dropped {
        combatant.conditions.insert(Condition::Unconscious);
        combatant.death_saves = DeathSaves::default();
    }
    debug!(
        combatant = %combatant.id,
        absorbed,
        hp = combatant.current_hp,
        "damage applied"
    );
    DamageReport {
        absorbed,
        dealt: before - combatant.current_hp,
        dropped,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HealReport {
    pub healed: i32,
    /// Came back up from 0 HP.
    pub revived: bool,
}

/// Healing raises current HP up to the maximum and never restores temporary
/// HP. Coming up from 0 clears the death saves. The dead are not healed.
pub fn apply_healing(combatant: &mut Combatant, amount: u32) -> HealReport {
    let max_hp = combatant.max_hp;
    apply_healing_capped(combatant, amount, max_hp)
}

/// Healing against an effective maximum, e.g. one raised or lowered by
/// effects, instead of the stored one.
pub fn apply_healing_capped(combatant: &mut Combatant, amount: u32, max_hp: i32) -> HealReport {
    if combatant.status() == LifeStatus::Dead {
        return HealReport::default();
    }
    let amount = i32::try_from(amount).unwrap_or(i32::MAX);
    let before = combatant.current_hp;
    combatant.current_hp = before
        .saturating_add(amount)
        .min(max_hp.max(0))
        .max(before);
    let revived = before == 0 && combatant.current_hp > 0;
    if revived {
        combatant.death_saves = DeathSaves::default();
        combatant.conditions.remove(&Condition::Unconscious);
    }
    HealReport {
        healed: combatant.current_hp - before,
        revived,
    }
}

/// Temporary hit points don't stack: the larger pool is kept.
/// Returns whether the pool grew.
pub fn grant_temp_hp(combatant: &mut Combatant, amount: u32) -> bool {
    let amount = i32::try_from(amount).unwrap_or(i32::MAX);
    if amount > combatant.temp_hp {
        combatant.temp_hp = amount;
        true
    } else {
        false
    }
}

/// Lowering the maximum pulls current HP down with it.
pub fn set_max_hp(combatant: &mut Combatant, max_hp: u32) {
    combatant.max_hp = i32::try_from(max_hp).unwrap_or(i32::MAX);
    combatant.current_hp = combatant.current_hp.min(combatant.max_hp);
}

/// Pull current HP down to an effective maximum. Returns whether it moved.
/// Being capped to 0 knocks the combatant out like damage would.
pub fn cap_current_hp(combatant: &mut Combatant, max_hp: i32) -> bool {
    let cap = max_hp.max(0);
    if combatant.current_hp <= cap {
        return false;
    }
    combatant.current_hp = cap;
    if cap == 0 {
        combatant.conditions.insert(Condition::Unconscious);
        combatant.death_saves = DeathSaves::default();
    }
    true
}

fn ensure_dying(combatant: &Combatant) -> Result<(), CombatNotice> {
    match combatant.status() {
        LifeStatus::Dying => Ok(()),
        LifeStatus::Conscious => Err(CombatNotice::NotDying(combatant.id.clone())),
        LifeStatus::Stable => Err(CombatNotice::AlreadyStable(combatant.id.clone())),
        LifeStatus::Dead => Err(CombatNotice::AlreadyDead(combatant.id.clone())),
    }
}

/// Tally one death save. Three successes stabilize, three failures kill.
pub fn record_death_save(
    combatant: &mut Combatant,
    save: DeathSave,
) -> Result<LifeStatus, CombatNotice> {
    ensure_dying(combatant)?;
    let tally = match save {
        DeathSave::Success => &mut combatant.death_saves.successes,
        DeathSave::Failure => &mut combatant.death_saves.failures,
    };
    *tally = (*tally + 1).min(3);
    Ok(combatant.status())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeathSaveRoll {
    pub roll: u32,
    pub status: LifeStatus,
}

/// Roll a death save: `dc` or better succeeds, a natural 1 counts as two
/// failures, a natural 20 brings the combatant back with 1 HP.
pub fn roll_death_save(
    combatant: &mut Combatant,
    dice: &mut Dice,
    dc: u32,
) -> Result<DeathSaveRoll, CombatNotice> {
    ensure_dying(combatant)?;
    let roll = dice.d20();
    if roll == 20 {
        apply_healing(combatant, 1);
    } else if roll == 1 {
        combatant.death_saves.failures = (combatant.death_saves.failures + 2).min(3);
    } else if roll >= dc {
        record_death_save(combatant, DeathSave::Success)?;
    } else {
        record_death_save(combatant, DeathSave::Failure)?;
    }
    Ok(DeathSaveRoll {
        roll,
        status: combatant.status(),
    })
}
