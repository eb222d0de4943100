use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod conditions;
pub mod config;
pub mod damage;
pub mod dice;
pub mod effects;
pub mod formula;
pub mod life;
pub mod roll;
pub mod session;
pub mod turn;

pub use conditions::{AttackStyle, Condition};
pub use config::EngineConfig;
pub use damage::{DamageAdjustment, DamageType};
pub use dice::{Dice, DieOutcome};
pub use effects::{
    Ability, ActiveEffect, BonusUsage, Duration, EffectEnded, EffectKind, EffectLedger,
    EndReason, ModifierKind, Stat, StatModifier, StatResolution,
};
pub use formula::{parse_terms, DiceFormula, Die, Keep, ParseError, Terms};
pub use life::{Combatant, DeathSave, DeathSaves, LifeStatus};
pub use roll::{
    check_natural, check_natural_kept, execute, execute_critical, execute_terms, Natural,
    RollResult, TermsRoll,
};
pub use session::{Intent, Session, SessionEvent, Step};
pub use turn::{CombatState, TurnChange};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdMode {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl AdMode {
    /// Any source of advantage and any source of disadvantage cancel out,
    /// however many of each there are.
    pub fn from_sources(advantage: bool, disadvantage: bool) -> AdMode {
        match (advantage, disadvantage) {
            (true, false) => AdMode::Advantage,
            (false, true) => AdMode::Disadvantage,
            _ => AdMode::Normal,
        }
    }
}

/// An intent that cannot be carried out. The state it was aimed at is left
/// unchanged; callers surface the message and carry on.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "notice", content = "detail", rename_all = "snake_case")]
pub enum CombatNotice {
    #[error("combat needs at least one combatant")]
    NoCombatants,
    #[error("combat is not running")]
    NotActive,
    #[error("already at the first turn of the first round")]
    AtFirstTurn,
    #[error("no combatant with id '{0}'")]
    UnknownCombatant(String),
    #[error("combatant '{0}' is already in the roster")]
    DuplicateCombatant(String),
    #[error("no active effect with id '{0}'")]
    UnknownEffect(String),
    #[error("'{0}' is not dying")]
    NotDying(String),
    #[error("'{0}' is already stable")]
    AlreadyStable(String),
    #[error("'{0}' is already dead")]
    AlreadyDead(String),
    #[error("invalid formula: {0}")]
    InvalidFormula(#[from] ParseError),
}
