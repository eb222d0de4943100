//! Session snapshots and the intents applied to them.
//!
//! A [`Session`] is the whole combat as the outside store keeps it: the
//! roster with its turn pointer plus every active effect. Applying an
//! [`Intent`] never mutates the snapshot it was given; it returns the next
//! snapshot together with structured events and chat-log lines.

use std::collections::BTreeSet;
use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conditions::{attack_mode, AttackStyle, Condition};
use crate::config::EngineConfig;
use crate::damage::{adjust_damage, DamageAdjustment, DamageType};
use crate::dice::Dice;
use crate::effects::{
    resolve_for, roll_bonus_dice, ActiveEffect, BonusUsage, Duration, EffectEnded, EffectKind,
    EffectLedger, EndReason, Stat,
};
use crate::formula::DiceFormula;
use crate::life::{
    apply_damage, apply_healing_capped, cap_current_hp, grant_temp_hp, record_death_save,
    roll_death_save, set_max_hp, Combatant, DeathSave, LifeStatus,
};
use crate::roll::{
    check_natural, check_natural_kept, execute, execute_critical, Natural, RollResult,
};
use crate::turn::{CombatState, TurnChange};
use crate::{AdMode, CombatNotice};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Free-form roll from chat. Text that is not a formula rolls the
    /// configured fallback instead.
    RollFormula {
        formula: String,
        #[serde(default)]
        mode: AdMode,
        #[serde(default)]
        rolled_by: Option<String>,
        /// Adds the roller's bonus dice for this kind of roll; attack rolls
        /// also pick up advantage from conditions.
        #[serde(default)]
        usage: Option<BonusUsage>,
        #[serde(default)]
        critical: bool,
        /// Attack target, for its conditions.
        #[serde(default)]
        against: Option<String>,
        #[serde(default)]
        ranged: bool,
        #[serde(default)]
        timestamp: Option<u64>,
    },
    ApplyDamage {
        target: String,
        amount: u32,
        #[serde(default)]
        damage_type: Option<DamageType>,
    },
    RollDamage {
        target: String,
        formula: String,
        #[serde(default)]
        attacker: Option<String>,
        #[serde(default)]
        critical: bool,
        #[serde(default)]
        damage_type: Option<DamageType>,
    },
    ApplyHealing {
        target: String,
        amount: u32,
    },
    RollHealing {
        target: String,
        formula: String,
        #[serde(default)]
        healer: Option<String>,
    },
    GrantTempHp {
        target: String,
        amount: u32,
    },
    SetMaxHp {
        target: String,
        max_hp: u32,
    },
    RecordDeathSave {
        target: String,
        save: DeathSave,
    },
    RollDeathSave {
        target: String,
    },
    AddCondition {
        target: String,
        condition: Condition,
    },
    RemoveCondition {
        target: String,
        condition: Condition,
    },
    AddCombatant {
        combatant: Combatant,
    },
    RemoveCombatant {
        id: String,
    },
    StartCombat,
    AdvanceTurn,
    RetreatTurn,
    ResetCombat,
    AddEffect {
        effect: ActiveEffect,
    },
    RemoveEffect {
        id: String,
    },
    BreakConcentration {
        holder: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Rolled {
        roll: RollResult,
        natural: Natural,
        /// Sum of bonus dice added on top of the roll.
        bonus: i32,
        total: i32,
    },
    Damaged {
        target: String,
        amount: u32,
        adjustment: DamageAdjustment,
        absorbed: i32,
        dealt: i32,
        hp: i32,
        dropped: bool,
    },
    Healed {
        target: String,
        healed: i32,
        hp: i32,
        revived: bool,
    },
    TempHpGranted {
        target: String,
        temp_hp: i32,
        replaced: bool,
    },
    MaxHpSet {
        target: String,
        max_hp: i32,
        hp: i32,
    },
    DeathSaveRecorded {
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        roll: Option<u32>,
        status: LifeStatus,
    },
    ConditionAdded {
        target: String,
        condition: Condition,
    },
    ConditionRemoved {
        target: String,
        condition: Condition,
    },
    CombatantAdded {
        id: String,
    },
    CombatantRemoved {
        id: String,
    },
    TurnChanged(TurnChange),
    CombatReset,
    EffectAdded {
        effect_id: String,
        target: String,
        replaced: bool,
    },
    EffectEnded(EffectEnded),
    Notice {
        notice: CombatNotice,
        message: String,
    },
}

/// Result of applying intents: the next snapshot plus what happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub session: Session,
    pub events: Vec<SessionEvent>,
    pub log: Vec<String>,
}

#[derive(Default)]
struct Record {
    events: Vec<SessionEvent>,
    log: Vec<String>,
}

impl Record {
    fn event(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    fn line(&mut self, line: String) {
        debug!("{}", line);
        self.log.push(line);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub combat: CombatState,
    #[serde(default)]
    pub effects: EffectLedger,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read session JSON: {}", path.display()))?;
        let mut session: Session = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse session JSON: {}", path.display()))?;
        session.combat.normalize();
        Ok(session)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self).context("failed to encode session")?;
        fs::write(path, text)
            .with_context(|| format!("failed to write session JSON: {}", path.display()))?;
        Ok(())
    }

    /// A JSON array of intents.
    pub fn load_intents(path: impl AsRef<Path>) -> Result<Vec<Intent>> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read intents JSON: {}", path.display()))?;
        let intents = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse intents JSON: {}", path.display()))?;
        Ok(intents)
    }

    pub fn combatant(&self, id: &str) -> Result<&Combatant, CombatNotice> {
        self.combat
            .get(id)
            .ok_or_else(|| CombatNotice::UnknownCombatant(id.to_string()))
    }

    /// Effective stat: the combatant's own value (armor class and hit points;
    /// 0 for the rest) under every modifier on it.
    pub fn stat(&self, id: &str, stat: Stat) -> Result<i32, CombatNotice> {
        let c = self.combatant(id)?;
        let base = match stat {
            Stat::ArmorClass => c.armor_class,
            Stat::MaxHp => c.max_hp,
            Stat::TempHp => c.temp_hp,
            _ => 0,
        };
        Ok(resolve_for(self.effects.iter(), id, stat).apply_to(base))
    }

    /// The combatant's own conditions plus those granted by effects.
    pub fn conditions_of(&self, id: &str) -> BTreeSet<Condition> {
        let mut conditions = self
            .combat
            .get(id)
            .map(|c| c.conditions.clone())
            .unwrap_or_default();
        conditions.extend(self.effects.conditions_for(id));
        conditions
    }

    /// Apply one intent. A rejected intent returns this snapshot unchanged
    /// with a single `Notice` event.
    pub fn apply(&self, intent: &Intent, dice: &mut Dice, config: &EngineConfig) -> Step {
        let mut next = self.clone();
        let mut record = Record::default();
        match next.dispatch(intent, dice, config, &mut record) {
            Ok(()) => {
                next.cap_to_effective_max(&mut record);
                Step {
                    session: next,
                    events: record.events,
                    log: record.log,
                }
            }
            Err(notice) => {
                warn!(%notice, "intent rejected");
                Step {
                    session: self.clone(),
                    log: vec![format!("[NOTICE] {}", notice)],
                    events: vec![SessionEvent::Notice {
                        message: notice.to_string(),
                        notice,
                    }],
                }
            }
        }
    }

    /// Apply intents in order; rejected ones are skipped with their notice.
    pub fn run<'a>(
        &self,
        intents: impl IntoIterator<Item = &'a Intent>,
        dice: &mut Dice,
        config: &EngineConfig,
    ) -> Step {
        let mut step = Step {
            session: self.clone(),
            events: Vec::new(),
            log: Vec::new(),
        };
        for intent in intents {
            let next = step.session.apply(intent, dice, config);
            step.session = next.session;
            step.events.extend(next.events);
            step.log.extend(next.log);
        }
        step
    }

    fn dispatch(
        &mut self,
        intent: &Intent,
        dice: &mut Dice,
        config: &EngineConfig,
        rec: &mut Record,
    ) -> Result<(), CombatNotice> {
        match intent {
            Intent::RollFormula {
                formula,
                mode,
                rolled_by,
                usage,
                critical,
                against,
                ranged,
                timestamp,
            } => {
                let parsed = match DiceFormula::parse(formula) {
                    Ok(f) => f,
                    Err(err) => {
                        warn!(%err, fallback = %config.fallback_formula, "not a dice formula");
                        rec.line(format!(
                            "[NOTICE] '{}' is not a dice formula; rolling {}",
                            formula.trim(),
                            config.fallback_formula
                        ));
                        config.fallback_formula.clone()
                    }
                };
                let roller = rolled_by.as_deref().filter(|id| self.combat.get(id).is_some());
                let mode = match (usage, roller) {
                    (Some(BonusUsage::Attacks), Some(attacker)) => {
                        let target = match against {
                            Some(id) => Some(self.combatant(id).map(|_| self.conditions_of(id))?),
                            None => None,
                        };
                        let style = if *ranged {
                            AttackStyle::Ranged
                        } else {
                            AttackStyle::Melee
                        };
                        attack_mode(*mode, &self.conditions_of(attacker), target.as_ref(), style)
                    }
                    _ => *mode,
                };
                let mut roll = if *critical {
                    execute_critical(&parsed, dice)
                } else {
                    execute(&parsed, mode, dice)
                };
                if let Some(who) = rolled_by {
                    roll = roll.by(who.clone());
                }
                if let Some(ts) = timestamp {
                    roll = roll.at(*ts);
                }
                let bonus = match (usage, roller) {
                    (Some(usage), Some(id)) => {
                        roll_bonus_dice(self.effects.for_target(id), *usage, dice).total
                    }
                    _ => 0,
                };
                let who = match roller {
                    Some(id) => self.label(id),
                    None => rolled_by.clone().unwrap_or_else(|| "roll".to_string()),
                };
                self.roll_line(rec, &who, &roll, bonus);
                rec.event(SessionEvent::Rolled {
                    natural: check_natural(&roll),
                    total: roll.grand_total().saturating_add(bonus),
                    bonus,
                    roll,
                });
            }
            Intent::ApplyDamage {
                target,
                amount,
                damage_type,
            } => self.damage(target, *amount, *damage_type, rec)?,
            Intent::RollDamage {
                target,
                formula,
                attacker,
                critical,
                damage_type,
            } => {
                self.combatant(target)?;
                let parsed = DiceFormula::parse(formula)?;
                let roll = if *critical {
                    execute_critical(&parsed, dice)
                } else {
                    execute(&parsed, AdMode::Normal, dice)
                };
                let bonus = self.bonus_for(attacker.as_deref(), BonusUsage::Damage, dice);
                let who = attacker
                    .as_deref()
                    .map(|id| self.label(id))
                    .unwrap_or_else(|| "damage".to_string());
                self.roll_line(rec, &who, &roll, bonus);
                let total = (roll.grand_total().saturating_add(bonus)).max(0) as u32;
                rec.event(SessionEvent::Rolled {
                    natural: Natural::Neither,
                    total: roll.grand_total().saturating_add(bonus),
                    bonus,
                    roll,
                });
                self.damage(target, total, *damage_type, rec)?;
            }
            Intent::ApplyHealing { target, amount } => self.heal(target, *amount, rec)?,
            Intent::RollHealing {
                target,
                formula,
                healer,
            } => {
                self.combatant(target)?;
                let parsed = DiceFormula::parse(formula)?;
                let roll = execute(&parsed, AdMode::Normal, dice);
                let bonus = self.bonus_for(healer.as_deref(), BonusUsage::Healing, dice);
                let who = healer
                    .as_deref()
                    .map(|id| self.label(id))
                    .unwrap_or_else(|| "healing".to_string());
                self.roll_line(rec, &who, &roll, bonus);
                let total = (roll.grand_total().saturating_add(bonus)).max(0) as u32;
                rec.event(SessionEvent::Rolled {
                    natural: Natural::Neither,
                    total: roll.grand_total().saturating_add(bonus),
                    bonus,
                    roll,
                });
                self.heal(target, total, rec)?;
            }
            Intent::GrantTempHp { target, amount } => {
                let c = self.combatant_mut(target)?;
                let replaced = grant_temp_hp(c, *amount);
                let (name, temp_hp) = (c.label().to_string(), c.temp_hp);
                if replaced {
                    rec.line(format!("[TEMP][{}] {} temporary HP", name, temp_hp));
                } else {
                    rec.line(format!(
                        "[TEMP][{}] keeps {} temporary HP (offered {})",
                        name, temp_hp, amount
                    ));
                }
                rec.event(SessionEvent::TempHpGranted {
                    target: target.clone(),
                    temp_hp,
                    replaced,
                });
            }
            Intent::SetMaxHp { target, max_hp } => {
                let c = self.combatant_mut(target)?;
                set_max_hp(c, *max_hp);
                rec.line(format!(
                    "[HP][{}] max {} ({} current)",
                    c.label(),
                    c.max_hp,
                    c.current_hp
                ));
                rec.event(SessionEvent::MaxHpSet {
                    target: target.clone(),
                    max_hp: c.max_hp,
                    hp: c.current_hp,
                });
            }
            Intent::RecordDeathSave { target, save } => {
                let c = self.combatant_mut(target)?;
                let status = record_death_save(c, *save)?;
                let outcome = match save {
                    DeathSave::Success => "success",
                    DeathSave::Failure => "failure",
                };
                let line = death_save_line(c, outcome);
                rec.line(line);
                rec.event(SessionEvent::DeathSaveRecorded {
                    target: target.clone(),
                    roll: None,
                    status,
                });
                self.after_death_save(target, status, rec);
            }
            Intent::RollDeathSave { target } => {
                let c = self.combatant_mut(target)?;
                let res = roll_death_save(c, dice, config.death_save_dc)?;
                let outcome = match res.roll {
                    20 => "d20=20 → regains 1 HP".to_string(),
                    1 => "d20=1 → two failures".to_string(),
                    r if r >= config.death_save_dc => format!("d20={} → success", r),
                    r => format!("d20={} → failure", r),
                };
                let line = death_save_line(c, &outcome);
                rec.line(line);
                rec.event(SessionEvent::DeathSaveRecorded {
                    target: target.clone(),
                    roll: Some(res.roll),
                    status: res.status,
                });
                self.after_death_save(target, res.status, rec);
            }
            Intent::AddCondition { target, condition } => {
                let c = self.combatant_mut(target)?;
                if c.conditions.insert(*condition) {
                    rec.line(format!("[COND][{}] gains {}", c.label(), condition));
                    rec.event(SessionEvent::ConditionAdded {
                        target: target.clone(),
                        condition: *condition,
                    });
                }
            }
            Intent::RemoveCondition { target, condition } => {
                let c = self.combatant_mut(target)?;
                if c.conditions.remove(condition) {
                    rec.line(format!("[COND][{}] loses {}", c.label(), condition));
                    rec.event(SessionEvent::ConditionRemoved {
                        target: target.clone(),
                        condition: *condition,
                    });
                }
            }
            Intent::AddCombatant { combatant } => {
                self.combat.add_combatant(combatant.clone())?;
                rec.line(format!(
                    "[JOIN][{}] initiative {}, HP {}/{}",
                    combatant.label(),
                    combatant.initiative,
                    combatant.current_hp,
                    combatant.max_hp
                ));
                rec.event(SessionEvent::CombatantAdded {
                    id: combatant.id.clone(),
                });
            }
            Intent::RemoveCombatant { id } => {
                let removed = self.combat.remove_combatant(id)?;
                rec.line(format!("[LEAVE][{}] leaves combat", removed.label()));
                rec.event(SessionEvent::CombatantRemoved { id: id.clone() });
                let mut ended = self.effects.remove_target(id);
                ended.extend(self.effects.break_concentration(id));
                self.effects_ended(ended, rec);
            }
            Intent::StartCombat => {
                let change = self.combat.start()?;
                self.turn_changed(change, dice, rec)?;
            }
            Intent::AdvanceTurn => {
                let change = self.combat.advance()?;
                if change.new_round {
                    let expired = self.effects.end_round();
                    self.effects_ended(expired, rec);
                }
                self.turn_changed(change, dice, rec)?;
            }
            Intent::RetreatTurn => {
                let change = self.combat.retreat()?;
                rec.line(format!(
                    "[TURN] back to round {}: {}",
                    change.round,
                    self.label(&change.combatant)
                ));
                rec.event(SessionEvent::TurnChanged(change));
            }
            Intent::ResetCombat => {
                self.combat.reset();
                rec.line("[TURN] combat reset".to_string());
                rec.event(SessionEvent::CombatReset);
            }
            Intent::AddEffect { effect } => {
                self.combatant(&effect.target)?;
                let duration = match effect.duration {
                    Duration::Rounds(n) => format!("{} rounds", n),
                    Duration::Permanent => "permanent".to_string(),
                };
                rec.line(format!(
                    "[EFFECT][{}] {} ({})",
                    self.label(&effect.target),
                    effect.name,
                    duration
                ));
                let replaced = self.effects.add(effect.clone()).is_some();
                rec.event(SessionEvent::EffectAdded {
                    effect_id: effect.id.clone(),
                    target: effect.target.clone(),
                    replaced,
                });
            }
            Intent::RemoveEffect { id } => {
                let ended = self
                    .effects
                    .dismiss(id)
                    .ok_or_else(|| CombatNotice::UnknownEffect(id.clone()))?;
                self.effects_ended(vec![ended], rec);
            }
            Intent::BreakConcentration { holder } => {
                let ended = self.effects.break_concentration(holder);
                if !ended.is_empty() {
                    rec.line(format!("[CONC][{}] loses concentration", self.label(holder)));
                }
                self.effects_ended(ended, rec);
            }
        }
        Ok(())
    }

    fn combatant_mut(&mut self, id: &str) -> Result<&mut Combatant, CombatNotice> {
        self.combat
            .get_mut(id)
            .ok_or_else(|| CombatNotice::UnknownCombatant(id.to_string()))
    }

    fn label(&self, id: &str) -> String {
        self.combat
            .get(id)
            .map(|c| c.label().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// Bonus dice of a known combatant's effects; unknown names roll none.
    fn bonus_for(&self, who: Option<&str>, usage: BonusUsage, dice: &mut Dice) -> i32 {
        match who {
            Some(id) if self.combat.get(id).is_some() => {
                roll_bonus_dice(self.effects.for_target(id), usage, dice).total
            }
            _ => 0,
        }
    }

    fn roll_line(&self, rec: &mut Record, who: &str, roll: &RollResult, bonus: i32) {
        let natural = match check_natural_kept(roll) {
            Natural::Critical => " CRIT!",
            Natural::Fumble => " NAT1",
            Natural::Neither => "",
        };
        if bonus != 0 {
            rec.line(format!(
                "[ROLL][{}] {} {:+} bonus dice = {}{}",
                who,
                roll,
                bonus,
                roll.grand_total().saturating_add(bonus),
                natural
            ));
        } else {
            rec.line(format!("[ROLL][{}] {}{}", who, roll, natural));
        }
    }

    fn damage(
        &mut self,
        target: &str,
        amount: u32,
        damage_type: Option<DamageType>,
        rec: &mut Record,
    ) -> Result<(), CombatNotice> {
        self.combatant(target)?;
        let (adjusted, adjustment) = adjust_damage(amount, damage_type, self.effects.for_target(target));
        let c = self.combatant_mut(target)?;
        let before = c.current_hp;
        let report = apply_damage(c, adjusted);
        let name = c.label().to_string();
        let after = c.current_hp;

        let mut line = format!("[DMG][{}] {} → {} (−{})", name, before, after, report.dealt);
        if report.absorbed > 0 {
            line.push_str(&format!(", temp −{}", report.absorbed));
        }
        if let Some(dt) = damage_type {
            line.push_str(&format!(" [{:?}]", dt));
        }
        match adjustment {
            DamageAdjustment::Resisted => line.push_str(" (resisted)"),
            DamageAdjustment::Immune => line.push_str(" (immune)"),
            DamageAdjustment::Full => {}
        }
        rec.line(line);
        rec.event(SessionEvent::Damaged {
            target: target.to_string(),
            amount,
            adjustment,
            absorbed: report.absorbed,
            dealt: report.dealt,
            hp: after,
            dropped: report.dropped,
        });

        if report.dropped {
            rec.line(format!("[STATE][{}] drops to 0 HP → Unconscious", name));
            let ended = self.effects.break_concentration(target);
            if !ended.is_empty() {
                rec.line(format!("[CONC][{}] loses concentration", name));
            }
            self.effects_ended(ended, rec);
        }
        Ok(())
    }

    fn heal(&mut self, target: &str, amount: u32, rec: &mut Record) -> Result<(), CombatNotice> {
        let max_hp = self.stat(target, Stat::MaxHp)?;
        let c = self.combatant_mut(target)?;
        let before = c.current_hp;
        let report = apply_healing_capped(c, amount, max_hp);
        let name = c.label().to_string();
        rec.line(format!(
            "[HEAL][{}] {} → {} (+{})",
            name, before, c.current_hp, report.healed
        ));
        rec.event(SessionEvent::Healed {
            target: target.to_string(),
            healed: report.healed,
            hp: c.current_hp,
            revived: report.revived,
        });
        if report.revived {
            rec.line(format!("[STATE][{}] regains consciousness", name));
        }
        Ok(())
    }

    /// Effects that lower max HP pull current HP down once they apply.
    fn cap_to_effective_max(&mut self, rec: &mut Record) {
        let caps: Vec<(String, i32)> = self
            .combat
            .combatants()
            .iter()
            .filter_map(|c| {
                let max_hp =
                    resolve_for(self.effects.iter(), &c.id, Stat::MaxHp).apply_to(c.max_hp);
                (c.current_hp > max_hp.max(0)).then(|| (c.id.clone(), max_hp))
            })
            .collect();
        for (id, max_hp) in caps {
            let Some(c) = self.combat.get_mut(&id) else {
                continue;
            };
            if !cap_current_hp(c, max_hp) {
                continue;
            }
            rec.line(format!(
                "[HP][{}] max {} ({} current)",
                c.label(),
                max_hp,
                c.current_hp
            ));
            rec.event(SessionEvent::MaxHpSet {
                target: id.clone(),
                max_hp,
                hp: c.current_hp,
            });
            if c.current_hp == 0 {
                let name = c.label().to_string();
                rec.line(format!("[STATE][{}] drops to 0 HP → Unconscious", name));
                let ended = self.effects.break_concentration(&id);
                if !ended.is_empty() {
                    rec.line(format!("[CONC][{}] loses concentration", name));
                }
                self.effects_ended(ended, rec);
            }
        }
    }

    fn after_death_save(&mut self, target: &str, status: LifeStatus, rec: &mut Record) {
        let name = self.label(target);
        match status {
            LifeStatus::Stable => rec.line(format!("[STATE][{}] is stabilized at 0 HP", name)),
            LifeStatus::Dead => rec.line(format!("[STATE][{}] dies", name)),
            LifeStatus::Conscious => rec.line(format!("[STATE][{}] regains consciousness", name)),
            LifeStatus::Dying => {}
        }
    }

    fn effects_ended(&self, ended: Vec<EffectEnded>, rec: &mut Record) {
        for e in ended {
            let why = match e.reason {
                EndReason::Expired => "expired",
                EndReason::Dismissed => "dismissed",
                EndReason::ConcentrationBroken => "concentration broken",
                EndReason::TargetRemoved => "target left",
            };
            rec.line(format!(
                "[EFFECT][{}] {} ends ({})",
                self.label(&e.target),
                e.name,
                why
            ));
            rec.event(SessionEvent::EffectEnded(e));
        }
    }

    /// Log the new turn and run the actor's start-of-turn effects.
    fn turn_changed(
        &mut self,
        change: TurnChange,
        dice: &mut Dice,
        rec: &mut Record,
    ) -> Result<(), CombatNotice> {
        let actor = change.combatant.clone();
        rec.line(format!(
            "[TURN] round {}: {}",
            change.round,
            self.label(&actor)
        ));
        rec.event(SessionEvent::TurnChanged(change));

        let periodic: Vec<ActiveEffect> = self
            .effects
            .for_target(&actor)
            .filter(|e| {
                matches!(
                    e.kind,
                    EffectKind::HealingOverTime | EffectKind::DamageOverTime
                )
            })
            .filter(|e| e.periodic.is_some())
            .cloned()
            .collect();
        for effect in periodic {
            let Some(formula) = &effect.periodic else {
                continue;
            };
            let roll = execute(formula, AdMode::Normal, dice);
            self.roll_line(rec, &effect.name, &roll, 0);
            let amount = roll.grand_total().max(0) as u32;
            rec.event(SessionEvent::Rolled {
                natural: Natural::Neither,
                total: roll.grand_total(),
                bonus: 0,
                roll,
            });
            match effect.kind {
                EffectKind::DamageOverTime => {
                    self.damage(&actor, amount, effect.damage_type, rec)?
                }
                _ => self.heal(&actor, amount, rec)?,
            }
        }
        Ok(())
    }
}

fn death_save_line(c: &Combatant, outcome: &str) -> String {
    format!(
        "[DEATHSAVE][{}] {} ({}✔ {}✖)",
        c.label(),
        outcome,
        c.death_saves.successes,
        c.death_saves.failures
    )
}
