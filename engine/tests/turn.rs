use skirmish_engine::{CombatNotice, CombatState, Combatant};

fn fighter(id: &str, initiative: i32) -> Combatant {
    Combatant::new(id, id.to_uppercase(), 10).with_initiative(initiative)
}

fn order(state: &CombatState) -> Vec<&str> {
    state.combatants().iter().map(|c| c.id.as_str()).collect()
}

fn started() -> CombatState {
    let mut state = CombatState::with_combatants(vec![
        fighter("a", 10),
        fighter("b", 20),
        fighter("c", 15),
    ]);
    state.start().unwrap();
    state
}

#[test]
fn start_sorts_by_initiative() {
    let state = started();
    assert_eq!(order(&state), ["b", "c", "a"]);
    assert_eq!(state.round(), 1);
    assert_eq!(state.turn(), Some(0));
    assert_eq!(state.current().map(|c| c.id.as_str()), Some("b"));
}

#[test]
fn ties_keep_roster_order() {
    let mut state = CombatState::with_combatants(vec![fighter("x", 12), fighter("y", 12)]);
    state.start().unwrap();
    assert_eq!(order(&state), ["x", "y"]);
}

#[test]
fn three_advances_wrap_into_round_two() {
    let mut state = started();
    state.advance().unwrap();
    state.advance().unwrap();
    let change = state.advance().unwrap();
    assert!(change.new_round);
    assert_eq!((change.round, change.index), (2, 0));
    assert_eq!(change.combatant, "b");
}

#[test]
fn retreat_undoes_advance() {
    let mut state = started();
    for _ in 0..3 {
        state.advance().unwrap();
    }
    let change = state.retreat().unwrap();
    assert_eq!((change.round, change.index), (1, 2));
    state.retreat().unwrap();
    state.retreat().unwrap();
    assert_eq!(state.retreat(), Err(CombatNotice::AtFirstTurn));
    assert_eq!((state.round(), state.turn()), (1, Some(0)));
}

#[test]
fn empty_roster_cannot_start() {
    let mut state = CombatState::new();
    assert_eq!(state.start(), Err(CombatNotice::NoCombatants));
    assert!(!state.is_active());
    assert_eq!(state.advance(), Err(CombatNotice::NotActive));
}

#[test]
fn reset_keeps_roster() {
    let mut state = started();
    state.advance().unwrap();
    state.reset();
    assert!(!state.is_active());
    assert_eq!(state.round(), 1);
    assert_eq!(state.combatants().len(), 3);
    state.clear();
    assert!(state.combatants().is_empty());
}

#[test]
fn removing_before_the_current_actor_keeps_their_turn() {
    let mut state = started();
    state.advance().unwrap(); // c
    state.remove_combatant("b").unwrap();
    assert_eq!(state.current().map(|c| c.id.as_str()), Some("c"));
}

#[test]
fn removing_the_current_actor_passes_the_turn() {
    let mut state = started();
    state.advance().unwrap(); // c
    state.remove_combatant("c").unwrap();
    assert_eq!(state.current().map(|c| c.id.as_str()), Some("a"));

    state.remove_combatant("a").unwrap();
    assert_eq!(state.turn(), Some(0));
    assert_eq!(state.current().map(|c| c.id.as_str()), Some("b"));

    state.remove_combatant("b").unwrap();
    assert!(!state.is_active());
}

#[test]
fn unknown_and_duplicate_ids() {
    let mut state = started();
    assert_eq!(
        state.remove_combatant("zed").unwrap_err(),
        CombatNotice::UnknownCombatant("zed".into())
    );
    assert_eq!(
        state.add_combatant(fighter("a", 1)),
        Err(CombatNotice::DuplicateCombatant("a".into()))
    );
}

#[test]
fn joining_mid_combat_slots_by_initiative() {
    let mut state = started();
    state.advance().unwrap(); // c (15)
    state.add_combatant(fighter("d", 18)).unwrap();
    state.add_combatant(fighter("e", 15)).unwrap();
    assert_eq!(order(&state), ["b", "d", "c", "e", "a"]);
    assert_eq!(state.current().map(|c| c.id.as_str()), Some("c"));
}

#[test]
fn snapshot_round_trips_through_json() {
    let mut state = started();
    state.advance().unwrap();
    let json = serde_json::to_string(&state).unwrap();
    let mut back: CombatState = serde_json::from_str(&json).unwrap();
    back.normalize();
    assert_eq!(back, state);
}
