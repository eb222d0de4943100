//! Dice notation: `[count]d<die>[k<n>|kh<n>|kl<n>][(+|-)<modifier>]`.
//!
//! A formula is a single dice term. Compound expressions such as `1d20+1d4`
//! are not formulas; split them with [`parse_terms`] and roll each term on its
//! own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on the dice a single formula may roll.
pub const MAX_DICE: u32 = 100;

/// Largest flat modifier, either sign, a formula or compound expression may carry.
pub const MAX_MODIFIER: i32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseError {
    #[error("empty dice formula")]
    Empty,
    #[error("invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("unsupported die size: d{0}")]
    UnsupportedDie(u32),
    #[error("cannot keep {keep} dice when only rolling {count}")]
    KeepExceedsCount { keep: u32, count: u32 },
    #[error("keep-highest and keep-lowest cannot be combined in {0}")]
    ConflictingKeep(String),
    #[error("too many dice: {0} (limit {})", MAX_DICE)]
    TooManyDice(u32),
    #[error("modifier out of range: {0} (limit ±{})", MAX_MODIFIER)]
    ModifierOutOfRange(i64),
}

/// Standard polyhedral dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Die {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl Die {
    pub fn sides(self) -> u32 {
        match self {
            Die::D4 => 4,
            Die::D6 => 6,
            Die::D8 => 8,
            Die::D10 => 10,
            Die::D12 => 12,
            Die::D20 => 20,
            Die::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<Die> {
        match sides {
            4 => Some(Die::D4),
            6 => Some(Die::D6),
            8 => Some(Die::D8),
            10 => Some(Die::D10),
            12 => Some(Die::D12),
            20 => Some(Die::D20),
            100 => Some(Die::D100),
            _ => None,
        }
    }
}

impl fmt::Display for Die {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// Keep/drop selection applied after rolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Keep {
    Highest(u32),
    Lowest(u32),
}

impl Keep {
    pub fn count(self) -> u32 {
        match self {
            Keep::Highest(n) | Keep::Lowest(n) => n,
        }
    }
}

/// A parsed, validated dice formula.
///
/// Serializes as its canonical notation (`"4d6k3+2"`), so anything that
/// stores formulas goes back through [`DiceFormula::parse`] when loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiceFormula {
    count: u32,
    die: Die,
    modifier: i32,
    keep: Option<Keep>,
}

impl DiceFormula {
    pub fn new(count: u32, die: Die, modifier: i32) -> Self {
        Self {
            count,
            die,
            modifier,
            keep: None,
        }
    }

    /// `1d20`, the roll used when chat input is not a formula.
    pub fn d20() -> Self {
        Self::new(1, Die::D20, 0)
    }

    pub fn with_keep(mut self, keep: Keep) -> Result<Self, ParseError> {
        if keep.count() > self.count {
            return Err(ParseError::KeepExceedsCount {
                keep: keep.count(),
                count: self.count,
            });
        }
        self.keep = Some(keep);
        Ok(self)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn die(&self) -> Die {
        self.die
    }

    pub fn modifier(&self) -> i32 {
        self.modifier
    }

    pub fn keep(&self) -> Option<Keep> {
        self.keep
    }

    /// Number of dice that count toward the total.
    pub fn kept_count(&self) -> u32 {
        self.keep.map_or(self.count, |k| k.count().min(self.count))
    }

    pub fn is_single_d20(&self) -> bool {
        self.count == 1 && self.die == Die::D20
    }

    /// The formula rolled on a confirmed critical hit: twice the dice, same
    /// modifier. A keep rule keeps twice as many dice. Both counts are capped
    /// at [`MAX_DICE`] so the result still parses from its own notation.
    pub fn critical(&self) -> Self {
        let count = self.count.saturating_mul(2).min(MAX_DICE.max(self.count));
        Self {
            count,
            die: self.die,
            modifier: self.modifier,
            keep: self.keep.map(|k| match k {
                Keep::Highest(n) => Keep::Highest(n.saturating_mul(2).min(count)),
                Keep::Lowest(n) => Keep::Lowest(n.saturating_mul(2).min(count)),
            }),
        }
    }

    pub fn min(&self) -> i32 {
        to_i32(self.kept_count()).saturating_add(self.modifier)
    }

    pub fn max(&self) -> i32 {
        to_i32(self.kept_count().saturating_mul(self.die.sides())).saturating_add(self.modifier)
    }

    /// Mean of the kept dice as if they were unselected; keep rules skew the
    /// real mean toward the extremes.
    pub fn average(&self) -> f64 {
        self.kept_count() as f64 * (self.die.sides() as f64 + 1.0) / 2.0 + self.modifier as f64
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let notation: String = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        if notation.is_empty() {
            return Err(ParseError::Empty);
        }
        let invalid = || ParseError::InvalidNotation(text.trim().to_string());

        let d_pos = notation.find('d').ok_or_else(invalid)?;
        let count = match &notation[..d_pos] {
            "" => 1,
            digits => parse_number(digits).ok_or_else(invalid)?,
        };

        let rest = &notation[d_pos + 1..];
        let (body, modifier) = match rest.find(|c: char| c == '+' || c == '-') {
            Some(pos) => (&rest[..pos], parse_signed(&rest[pos..]).ok_or_else(invalid)?),
            None => (rest, 0),
        };

        let die_end = body
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(body.len());
        let sides = parse_number(&body[..die_end]).ok_or_else(invalid)?;
        let die = Die::from_sides(sides).ok_or(ParseError::UnsupportedDie(sides))?;
        let keep = parse_keep(&body[die_end..], text)?;

        if count > MAX_DICE {
            return Err(ParseError::TooManyDice(count));
        }
        let modifier = check_modifier(modifier)?;

        let formula = Self::new(count, die, modifier);
        match keep {
            Some(keep) => formula.with_keep(keep),
            None => Ok(formula),
        }
    }
}

fn parse_number(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `+4` / `-2`; a bare sign or anything after the digits is rejected.
fn parse_signed(text: &str) -> Option<i64> {
    let (sign, digits) = text.split_at(1);
    let magnitude = i64::from(parse_number(digits)?);
    match sign {
        "+" => Some(magnitude),
        "-" => Some(-magnitude),
        _ => None,
    }
}

fn check_modifier(modifier: i64) -> Result<i32, ParseError> {
    if modifier.abs() > i64::from(MAX_MODIFIER) {
        return Err(ParseError::ModifierOutOfRange(modifier));
    }
    Ok(modifier as i32)
}

fn to_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn parse_keep(mut rest: &str, original: &str) -> Result<Option<Keep>, ParseError> {
    let invalid = || ParseError::InvalidNotation(original.trim().to_string());
    let mut rules = Vec::new();

    while !rest.is_empty() {
        let (lowest, tail) = if let Some(tail) = rest.strip_prefix("kl") {
            (true, tail)
        } else if let Some(tail) = rest.strip_prefix("kh") {
            (false, tail)
        } else if let Some(tail) = rest.strip_prefix('k') {
            (false, tail)
        } else {
            return Err(invalid());
        };
        let end = tail
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(tail.len());
        let n = parse_number(&tail[..end]).ok_or_else(invalid)?;
        rules.push(if lowest { Keep::Lowest(n) } else { Keep::Highest(n) });
        rest = &tail[end..];
    }

    match rules.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        many => {
            let mixed = many
                .iter()
                .any(|k| matches!(k, Keep::Highest(_)))
                && many.iter().any(|k| matches!(k, Keep::Lowest(_)));
            if mixed {
                Err(ParseError::ConflictingKeep(original.trim().to_string()))
            } else {
                Err(invalid())
            }
        }
    }
}

impl FromStr for DiceFormula {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceFormula::parse(s)
    }
}

impl TryFrom<String> for DiceFormula {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        DiceFormula::parse(&value)
    }
}

impl From<DiceFormula> for String {
    fn from(value: DiceFormula) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.count, self.die)?;
        match self.keep {
            Some(Keep::Highest(n)) => write!(f, "k{}", n)?,
            Some(Keep::Lowest(n)) => write!(f, "kl{}", n)?,
            None => {}
        }
        if self.modifier > 0 {
            write!(f, "+{}", self.modifier)
        } else if self.modifier < 0 {
            write!(f, "{}", self.modifier)
        } else {
            Ok(())
        }
    }
}

/// A compound expression split into independent formulas and a flat
/// modifier, e.g. `1d20+1d4+2` → `[1d20, 1d4]`, `+2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terms {
    pub formulas: Vec<DiceFormula>,
    pub modifier: i32,
}

/// Split a `+`/`-` joined expression into separately rolled formulas.
/// Subtracted dice terms (`1d20-1d4`) are rejected.
pub fn parse_terms(text: &str) -> Result<Terms, ParseError> {
    let notation: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    if notation.is_empty() {
        return Err(ParseError::Empty);
    }
    let invalid = || ParseError::InvalidNotation(text.trim().to_string());

    let mut formulas = Vec::new();
    let mut modifier: i64 = 0;
    let mut start = 0;
    let bounds = notation
        .char_indices()
        .filter(|&(i, c)| i > 0 && (c == '+' || c == '-'))
        .map(|(i, _)| i)
        .chain(std::iter::once(notation.len()));

    for end in bounds {
        let chunk = &notation[start..end];
        start = end;
        let (negative, body) = match chunk.as_bytes().first() {
            Some(b'+') => (false, &chunk[1..]),
            Some(b'-') => (true, &chunk[1..]),
            _ => (false, chunk),
        };
        if body.contains('d') {
            if negative {
                return Err(invalid());
            }
            formulas.push(DiceFormula::parse(body)?);
        } else {
            let value = i64::from(parse_number(body).ok_or_else(invalid)?);
            modifier += if negative { -value } else { value };
            check_modifier(modifier)?;
        }
    }

    if formulas.is_empty() {
        return Err(invalid());
    }
    let modifier = check_modifier(modifier)?;
    Ok(Terms { formulas, modifier })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_count_die_and_modifier() {
        let f = DiceFormula::parse("2d6+4").unwrap();
        assert_eq!(f.count(), 2);
        assert_eq!(f.die(), Die::D6);
        assert_eq!(f.modifier(), 4);
        assert_eq!(f.keep(), None);
    }

    #[test]
    fn count_defaults_to_one() {
        let f = DiceFormula::parse("d8-1").unwrap();
        assert_eq!(f.count(), 1);
        assert_eq!(f.modifier(), -1);
    }

    #[test]
    fn case_and_whitespace_are_ignored() {
        let f = DiceFormula::parse("  2D10 + 3 ").unwrap();
        assert_eq!(f, DiceFormula::new(2, Die::D10, 3));
    }

    #[test]
    fn keep_rules() {
        assert_eq!(
            DiceFormula::parse("4d6k3").unwrap().keep(),
            Some(Keep::Highest(3))
        );
        assert_eq!(
            DiceFormula::parse("4d6kh3").unwrap().keep(),
            Some(Keep::Highest(3))
        );
        assert_eq!(
            DiceFormula::parse("2d20kl1+5").unwrap().keep(),
            Some(Keep::Lowest(1))
        );
    }

    #[test]
    fn zero_dice_is_allowed() {
        let f = DiceFormula::parse("0d6+3").unwrap();
        assert_eq!(f.count(), 0);
        assert_eq!(f.min(), 3);
        assert_eq!(f.max(), 3);
    }

    #[test]
    fn rejects_malformed_input() {
        for text in ["abc", "2d", "d", "2d6+", "2d6++1", "-1d6", "2d6x", "1d20+1d4", "k3"] {
            assert!(
                matches!(DiceFormula::parse(text), Err(ParseError::InvalidNotation(_))),
                "{text} should be invalid"
            );
        }
        assert_eq!(DiceFormula::parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn rejects_unsupported_dice() {
        assert_eq!(DiceFormula::parse("1d7"), Err(ParseError::UnsupportedDie(7)));
        assert_eq!(DiceFormula::parse("2d0"), Err(ParseError::UnsupportedDie(0)));
    }

    #[test]
    fn rejects_keep_larger_than_count() {
        assert_eq!(
            DiceFormula::parse("4d6k5"),
            Err(ParseError::KeepExceedsCount { keep: 5, count: 4 })
        );
        assert!(DiceFormula::parse("4d6k4").is_ok());
    }

    #[test]
    fn both_keep_rules_are_rejected() {
        assert!(matches!(
            DiceFormula::parse("4d6k3kl1"),
            Err(ParseError::ConflictingKeep(_))
        ));
        assert!(matches!(
            DiceFormula::parse("4d6k3k2"),
            Err(ParseError::InvalidNotation(_))
        ));
    }

    #[test]
    fn caps_dice_count() {
        assert_eq!(
            DiceFormula::parse("101d6"),
            Err(ParseError::TooManyDice(101))
        );
    }

    #[test]
    fn caps_modifier() {
        assert_eq!(
            DiceFormula::parse("1d6+2147483647"),
            Err(ParseError::ModifierOutOfRange(2_147_483_647))
        );
        assert_eq!(
            DiceFormula::parse("1d6-10001"),
            Err(ParseError::ModifierOutOfRange(-10_001))
        );
        assert_eq!(DiceFormula::parse("1d6+10000").unwrap().modifier(), 10_000);
        assert!(matches!(
            parse_terms("1d20+9000+9000"),
            Err(ParseError::ModifierOutOfRange(18_000))
        ));
    }

    #[test]
    fn range_helpers_saturate() {
        let f = DiceFormula::new(1, Die::D6, i32::MAX);
        assert_eq!(f.min(), i32::MAX);
        assert_eq!(f.max(), i32::MAX);
        assert_eq!(DiceFormula::new(1, Die::D6, i32::MIN).min(), i32::MIN + 1);
    }

    #[test]
    fn display_is_canonical() {
        for text in ["2d6+4", "1d20", "4d6k3", "2d20kl1-1", "0d4+2"] {
            assert_eq!(DiceFormula::parse(text).unwrap().to_string(), text);
        }
        assert_eq!(DiceFormula::parse("D6").unwrap().to_string(), "1d6");
        assert_eq!(DiceFormula::parse("4d6kh3").unwrap().to_string(), "4d6k3");
    }

    #[test]
    fn critical_doubles_dice_not_modifier() {
        let crit = DiceFormula::parse("2d6+4").unwrap().critical();
        assert_eq!(crit, DiceFormula::new(4, Die::D6, 4));
        let crit = DiceFormula::parse("4d6k3").unwrap().critical();
        assert_eq!(crit.to_string(), "8d6k6");
    }

    #[test]
    fn critical_stays_within_dice_cap() {
        let crit = DiceFormula::parse("60d6k50").unwrap().critical();
        assert_eq!(crit.count(), MAX_DICE);
        assert_eq!(crit.keep(), Some(Keep::Highest(MAX_DICE)));
        assert_eq!(DiceFormula::parse(&crit.to_string()), Ok(crit));
    }

    #[test]
    fn range_helpers() {
        let f = DiceFormula::parse("2d6+3").unwrap();
        assert_eq!(f.min(), 5);
        assert_eq!(f.max(), 15);
        assert!((f.average() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn serde_uses_notation() {
        let f = DiceFormula::parse("4d6k3+2").unwrap();
        assert_eq!(serde_json::to_string(&f).unwrap(), "\"4d6k3+2\"");
        let back: DiceFormula = serde_json::from_str("\"1d8-1\"").unwrap();
        assert_eq!(back, DiceFormula::new(1, Die::D8, -1));
        assert!(serde_json::from_str::<DiceFormula>("\"1d7\"").is_err());
    }

    #[test]
    fn terms_split_compound_expressions() {
        let terms = parse_terms("1d20 + 1d4 + 2").unwrap();
        assert_eq!(
            terms.formulas,
            vec![DiceFormula::d20(), DiceFormula::new(1, Die::D4, 0)]
        );
        assert_eq!(terms.modifier, 2);

        let terms = parse_terms("2d6+4").unwrap();
        assert_eq!(terms.formulas, vec![DiceFormula::new(2, Die::D6, 0)]);
        assert_eq!(terms.modifier, 4);

        let terms = parse_terms("1d8-1+2").unwrap();
        assert_eq!(terms.modifier, 1);
    }

    #[test]
    fn terms_reject_subtracted_dice_and_flat_only() {
        assert!(parse_terms("1d20-1d4").is_err());
        assert!(parse_terms("5").is_err());
        assert!(parse_terms("1d20+x").is_err());
        assert_eq!(parse_terms(""), Err(ParseError::Empty));
    }
}
