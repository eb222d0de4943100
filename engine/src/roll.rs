//! Roll execution: advantage substitution, keep/drop selection, modifiers.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::dice::{Dice, DieOutcome};
use crate::formula::{DiceFormula, Die, Keep, Terms};
use crate::AdMode;

/// The outcome of executing one formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollResult {
    formula: String,
    dice: Vec<DieOutcome>,
    kept_total: i32,
    modifier: i32,
    grand_total: i32,
    mode: AdMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    rolled_by: Option<String>,
    /// Unix milliseconds, stamped by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<u64>,
}

impl RollResult {
    fn new(formula: String, dice: Vec<DieOutcome>, modifier: i32, mode: AdMode) -> Self {
        let kept_total: i32 = dice
            .iter()
            .filter(|d| d.kept)
            .map(|d| d.result as i32)
            .fold(0, i32::saturating_add);
        Self {
            formula,
            dice,
            kept_total,
            modifier,
            grand_total: kept_total.saturating_add(modifier),
            mode,
            rolled_by: None,
            timestamp: None,
        }
    }

    pub fn by(mut self, who: impl Into<String>) -> Self {
        self.rolled_by = Some(who.into());
        self
    }

    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Every die rolled, in roll order, dropped dice included.
    pub fn dice(&self) -> &[DieOutcome] {
        &self.dice
    }

    pub fn kept(&self) -> impl Iterator<Item = &DieOutcome> {
        self.dice.iter().filter(|d| d.kept)
    }

    pub fn kept_total(&self) -> i32 {
        self.kept_total
    }

    pub fn modifier(&self) -> i32 {
        self.modifier
    }

    pub fn grand_total(&self) -> i32 {
        self.grand_total
    }

    pub fn mode(&self) -> AdMode {
        self.mode
    }

    pub fn rolled_by(&self) -> Option<&str> {
        self.rolled_by.as_deref()
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    /// `[(3), 17] + 5`: kept dice bare, dropped dice in parentheses.
    pub fn dice_display(&self) -> String {
        let shown: Vec<String> = self
            .dice
            .iter()
            .map(|d| {
                if d.kept {
                    d.result.to_string()
                } else {
                    format!("({})", d.result)
                }
            })
            .collect();
        let dice = format!("[{}]", shown.join(", "));
        if self.modifier > 0 {
            format!("{} + {}", dice, self.modifier)
        } else if self.modifier < 0 {
            format!("{} - {}", dice, self.modifier.unsigned_abs())
        } else {
            dice
        }
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} = {}",
            self.formula,
            self.dice_display(),
            self.grand_total
        )
    }
}

/// Roll `formula`. Advantage and disadvantage only change a lone `1d20`;
/// any other shape is rolled normally with the mode still recorded.
pub fn execute(formula: &DiceFormula, mode: AdMode, dice: &mut Dice) -> RollResult {
    let outcomes = if mode != AdMode::Normal && formula.is_single_d20() {
        let first = dice.roll_one(Die::D20);
        let second = dice.roll_one(Die::D20);
        let keep_first = match mode {
            AdMode::Disadvantage => first.result <= second.result,
            _ => first.result >= second.result,
        };
        vec![first.with_kept(keep_first), second.with_kept(!keep_first)]
    } else {
        if mode != AdMode::Normal {
            debug!(%formula, ?mode, "advantage needs a single d20; rolling normally");
        }
        let mut outcomes = dice.roll_many(formula.die(), formula.count());
        if let Some(keep) = formula.keep() {
            select_kept(&mut outcomes, keep);
        }
        outcomes
    };

    let result = RollResult::new(formula.to_string(), outcomes, formula.modifier(), mode);
    debug!(
        formula = result.formula(),
        total = result.grand_total(),
        "rolled"
    );
    result
}

/// Damage roll for a confirmed critical hit.
pub fn execute_critical(formula: &DiceFormula, dice: &mut Dice) -> RollResult {
    execute(&formula.critical(), AdMode::Normal, dice)
}

fn select_kept(outcomes: &mut [DieOutcome], keep: Keep) {
    let mut order: Vec<usize> = (0..outcomes.len()).collect();
    match keep {
        Keep::Highest(_) => order.sort_by(|&a, &b| outcomes[b].result.cmp(&outcomes[a].result)),
        Keep::Lowest(_) => order.sort_by_key(|&i| outcomes[i].result),
    }
    for (rank, &i) in order.iter().enumerate() {
        outcomes[i].kept = rank < keep.count() as usize;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Natural {
    Critical,
    Fumble,
    Neither,
}

/// Natural 20 / natural 1 of the first d20 in the roll's die sequence,
/// dropped dice included.
pub fn check_natural(result: &RollResult) -> Natural {
    natural_of(result.dice().iter().find(|d| d.die == Die::D20))
}

/// Like [`check_natural`], but only a d20 that counts toward the total
/// qualifies, so a 20 discarded by disadvantage is not a critical.
pub fn check_natural_kept(result: &RollResult) -> Natural {
    natural_of(result.kept().find(|d| d.die == Die::D20))
}

fn natural_of(die: Option<&DieOutcome>) -> Natural {
    match die {
        Some(d) if d.natural_max => Natural::Critical,
        Some(d) if d.natural_min => Natural::Fumble,
        _ => Natural::Neither,
    }
}

/// Rolls of a compound expression, summed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermsRoll {
    pub rolls: Vec<RollResult>,
    pub modifier: i32,
    pub total: i32,
}

/// Each formula is rolled on its own (so advantage still reaches a `1d20`
/// term) and the totals are added to the flat modifier.
pub fn execute_terms(terms: &Terms, mode: AdMode, dice: &mut Dice) -> TermsRoll {
    let rolls: Vec<RollResult> = terms
        .formulas
        .iter()
        .map(|f| execute(f, mode, dice))
        .collect();
    let total = rolls
        .iter()
        .map(RollResult::grand_total)
        .fold(terms.modifier, i32::saturating_add);
    TermsRoll {
        rolls,
        modifier: terms.modifier,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula(text: &str) -> DiceFormula {
        DiceFormula::parse(text).unwrap()
    }

    #[test]
    fn keep_highest_marks_dropped_dice() {
        let mut dice = Dice::from_scripted(vec![3, 6, 1, 4]);
        let res = execute(&formula("4d6k3"), AdMode::Normal, &mut dice);
        let kept: Vec<bool> = res.dice().iter().map(|d| d.kept).collect();
        assert_eq!(kept, vec![true, true, false, true]);
        assert_eq!(res.kept_total(), 13);
        assert_eq!(res.grand_total(), 13);
    }

    #[test]
    fn keep_lowest_prefers_earlier_ties() {
        let mut dice = Dice::from_scripted(vec![2, 2, 5]);
        let res = execute(&formula("3d6kl1+1"), AdMode::Normal, &mut dice);
        let kept: Vec<bool> = res.dice().iter().map(|d| d.kept).collect();
        assert_eq!(kept, vec![true, false, false]);
        assert_eq!(res.grand_total(), 3);
    }

    #[test]
    fn zero_dice_roll_is_just_the_modifier() {
        let mut dice = Dice::from_scripted(vec![6]);
        let res = execute(&formula("0d6+3"), AdMode::Normal, &mut dice);
        assert!(res.dice().is_empty());
        assert_eq!(res.grand_total(), 3);
    }
}
