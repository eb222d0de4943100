use skirmish_engine::life::*;
use skirmish_engine::{CombatNotice, Condition};

fn hero() -> Combatant {
    Combatant::new("hero", "Hero", 10)
}

#[test]
fn temp_hp_absorbs_first() {
    let mut c = hero().with_temp_hp(5);
    let report = apply_damage(&mut c, 8);
    assert_eq!((c.temp_hp, c.current_hp), (0, 7));
    assert_eq!((report.absorbed, report.dealt), (5, 3));

    let mut c = hero().with_temp_hp(5);
    apply_damage(&mut c, 3);
    assert_eq!((c.temp_hp, c.current_hp), (2, 10));
}

#[test]
fn damage_floors_at_zero_and_knocks_out() {
    let mut c = hero();
    let report = apply_damage(&mut c, 25);
    assert_eq!(c.current_hp, 0);
    assert_eq!(report.dealt, 10);
    assert!(report.dropped);
    assert!(c.conditions.contains(&Condition::Unconscious));
    assert_eq!(c.status(), LifeStatus::Dying);
}

#[test]
fn healing_caps_at_max_and_skips_temp() {
    let mut c = hero().with_hp(4);
    let report = apply_healing(&mut c, 20);
    assert_eq!(c.current_hp, 10);
    assert_eq!(report.healed, 6);
    assert_eq!(c.temp_hp, 0);
}

#[test]
fn healing_from_zero_resets_death_saves() {
    let mut c = hero();
    apply_damage(&mut c, 10);
    record_death_save(&mut c, DeathSave::Success).unwrap();
    record_death_save(&mut c, DeathSave::Failure).unwrap();
    let report = apply_healing(&mut c, 3);
    assert!(report.revived);
    assert_eq!(c.death_saves, DeathSaves::default());
    assert!(!c.conditions.contains(&Condition::Unconscious));
    assert_eq!(c.status(), LifeStatus::Conscious);
}

#[test]
fn three_successes_stabilize_three_failures_kill() {
    let mut c = hero().with_hp(0);
    for _ in 0..2 {
        assert_eq!(
            record_death_save(&mut c, DeathSave::Success).unwrap(),
            LifeStatus::Dying
        );
    }
    assert_eq!(
        record_death_save(&mut c, DeathSave::Success).unwrap(),
        LifeStatus::Stable
    );
    assert_eq!(
        record_death_save(&mut c, DeathSave::Failure),
        Err(CombatNotice::AlreadyStable("hero".into()))
    );

    let mut c = hero().with_hp(0);
    for _ in 0..3 {
        record_death_save(&mut c, DeathSave::Failure).unwrap();
    }
    assert_eq!(c.status(), LifeStatus::Dead);
    assert_eq!(
        record_death_save(&mut c, DeathSave::Success),
        Err(CombatNotice::AlreadyDead("hero".into()))
    );
}

#[test]
fn conscious_combatants_do_not_roll_death_saves() {
    let mut c = hero();
    assert_eq!(
        record_death_save(&mut c, DeathSave::Failure),
        Err(CombatNotice::NotDying("hero".into()))
    );
    assert_eq!(c.death_saves, DeathSaves::default());
}

#[test]
fn the_dead_stay_dead() {
    let mut c = hero().with_hp(0);
    c.death_saves.failures = 3;
    assert_eq!(apply_healing(&mut c, 5).healed, 0);
    assert_eq!(apply_damage(&mut c, 5), DamageReport::default());
    assert_eq!(c.current_hp, 0);
}

#[test]
fn temp_hp_does_not_stack() {
    let mut c = hero();
    assert!(grant_temp_hp(&mut c, 6));
    assert!(!grant_temp_hp(&mut c, 4));
    assert_eq!(c.temp_hp, 6);
    assert!(grant_temp_hp(&mut c, 9));
    assert_eq!(c.temp_hp, 9);
}

#[test]
fn lowering_max_hp_clamps_current() {
    let mut c = hero();
    set_max_hp(&mut c, 6);
    assert_eq!((c.max_hp, c.current_hp), (6, 6));
    set_max_hp(&mut c, 12);
    assert_eq!(c.current_hp, 6);
}

#[test]
fn combatant_json_fills_defaults() {
    let c: Combatant =
        serde_json::from_str(r#"{"id":"gob","current_hp":7,"max_hp":7}"#).unwrap();
    assert_eq!(c.armor_class, 10);
    assert_eq!(c.label(), "gob");
    assert!(c.conditions.is_empty());
}
