use std::collections::BTreeSet;

use skirmish_engine::conditions::attack_mode;
use skirmish_engine::{AdMode, AttackStyle, Condition};

fn set(conditions: &[Condition]) -> BTreeSet<Condition> {
    conditions.iter().copied().collect()
}

#[test]
fn attacker_conditions_impose_disadvantage() {
    for c in [Condition::Blinded, Condition::Poisoned, Condition::Prone, Condition::Restrained] {
        assert_eq!(
            attack_mode(AdMode::Normal, &set(&[c]), None, AttackStyle::Melee),
            AdMode::Disadvantage,
            "{:?}",
            c
        );
    }
}

#[test]
fn helpless_targets_grant_advantage() {
    let target = set(&[Condition::Paralyzed]);
    assert_eq!(
        attack_mode(AdMode::Normal, &BTreeSet::new(), Some(&target), AttackStyle::Ranged),
        AdMode::Advantage
    );
}

#[test]
fn prone_target_depends_on_range() {
    let prone = set(&[Condition::Prone]);
    assert_eq!(
        attack_mode(AdMode::Normal, &BTreeSet::new(), Some(&prone), AttackStyle::Melee),
        AdMode::Advantage
    );
    assert_eq!(
        attack_mode(AdMode::Normal, &BTreeSet::new(), Some(&prone), AttackStyle::Ranged),
        AdMode::Disadvantage
    );
}

#[test]
fn advantage_and_disadvantage_cancel() {
    let attacker = set(&[Condition::Poisoned]);
    let target = set(&[Condition::Stunned]);
    assert_eq!(
        attack_mode(AdMode::Normal, &attacker, Some(&target), AttackStyle::Melee),
        AdMode::Normal
    );
    assert_eq!(
        attack_mode(AdMode::Advantage, &attacker, None, AttackStyle::Melee),
        AdMode::Normal
    );
    assert_eq!(AdMode::from_sources(true, true), AdMode::Normal);
}

#[test]
fn condition_names_parse_loosely() {
    assert_eq!("  Blind ".parse::<Condition>(), Ok(Condition::Blinded));
    assert_eq!("frightened".parse::<Condition>(), Ok(Condition::Frightened));
    assert!("sleepy".parse::<Condition>().is_err());
    assert!(Condition::Stunned.prevents_action());
    assert!(!Condition::Prone.prevents_action());
}
