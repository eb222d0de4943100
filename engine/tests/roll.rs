use skirmish_engine::{
    check_natural, check_natural_kept, execute, execute_critical, execute_terms, parse_terms,
    AdMode, DiceFormula, Dice, Die, Natural,
};

fn formula(text: &str) -> DiceFormula {
    DiceFormula::parse(text).unwrap()
}

#[test]
fn advantage_keeps_the_higher_d20() {
    let mut dice = Dice::from_scripted(vec![3, 17]);
    let res = execute(&formula("1d20+5"), AdMode::Advantage, &mut dice);
    assert_eq!(res.dice().len(), 2);
    assert_eq!(res.grand_total(), 22);
    assert_eq!(res.mode(), AdMode::Advantage);
    insta::assert_snapshot!(res.to_string(), @"1d20+5: [(3), 17] + 5 = 22");
}

#[test]
fn disadvantage_keeps_the_lower_d20() {
    let mut dice = Dice::from_scripted(vec![3, 17]);
    let res = execute(&formula("1d20+5"), AdMode::Disadvantage, &mut dice);
    assert_eq!(res.grand_total(), 8);
    insta::assert_snapshot!(res.dice_display(), @"[3, (17)] + 5");
}

#[test]
fn advantage_on_other_shapes_rolls_normally() {
    let mut dice = Dice::from_scripted(vec![4, 5]);
    let res = execute(&formula("2d6"), AdMode::Advantage, &mut dice);
    assert_eq!(res.dice().len(), 2);
    assert!(res.dice().iter().all(|d| d.kept));
    assert_eq!(res.grand_total(), 9);
    assert_eq!(res.mode(), AdMode::Advantage);
}

#[test]
fn grand_total_is_kept_sum_plus_modifier() {
    let mut dice = Dice::from_scripted(vec![2, 6, 5, 1]);
    let res = execute(&formula("4d6k3-2"), AdMode::Normal, &mut dice);
    let kept: i32 = res.kept().map(|d| d.result as i32).sum();
    assert_eq!(res.kept().count(), 3);
    assert_eq!(res.kept_total(), kept);
    assert_eq!(res.grand_total(), 13 - 2);
    insta::assert_snapshot!(res.to_string(), @"4d6k3-2: [2, 6, 5, (1)] - 2 = 11");
}

#[test]
fn critical_rolls_twice_the_dice() {
    let mut dice = Dice::from_scripted(vec![1, 2, 3, 4]);
    let res = execute_critical(&formula("2d6+4"), &mut dice);
    assert_eq!(res.formula(), "4d6+4");
    assert_eq!(res.dice().len(), 4);
    assert_eq!(res.grand_total(), 14);
}

#[test]
fn naturals() {
    let mut dice = Dice::from_scripted(vec![20]);
    assert_eq!(
        check_natural(&execute(&formula("1d20+3"), AdMode::Normal, &mut dice)),
        Natural::Critical
    );
    let mut dice = Dice::from_scripted(vec![1]);
    assert_eq!(
        check_natural(&execute(&formula("1d20"), AdMode::Normal, &mut dice)),
        Natural::Fumble
    );
    let mut dice = Dice::from_scripted(vec![6]);
    assert_eq!(
        check_natural(&execute(&formula("1d6"), AdMode::Normal, &mut dice)),
        Natural::Neither
    );
}

#[test]
fn natural_reads_first_d20_even_when_dropped() {
    let mut dice = Dice::from_scripted(vec![20, 4]);
    let res = execute(&formula("1d20"), AdMode::Disadvantage, &mut dice);
    assert_eq!(res.grand_total(), 4);
    assert_eq!(check_natural(&res), Natural::Critical);
    assert_eq!(check_natural_kept(&res), Natural::Neither);

    let mut dice = Dice::from_scripted(vec![1, 15]);
    let res = execute(&formula("1d20"), AdMode::Advantage, &mut dice);
    assert_eq!(check_natural(&res), Natural::Fumble);
    assert_eq!(check_natural_kept(&res), Natural::Neither);
}

#[test]
fn caller_stamps_roller_and_time() {
    let mut dice = Dice::from_scripted(vec![9]);
    let res = execute(&formula("1d20"), AdMode::Normal, &mut dice)
        .by("Aria")
        .at(1_700_000_000_000);
    assert_eq!(res.rolled_by(), Some("Aria"));
    assert_eq!(res.timestamp(), Some(1_700_000_000_000));
}

#[test]
fn compound_terms_roll_separately() {
    let mut dice = Dice::from_scripted(vec![15, 3]);
    let terms = parse_terms("1d20+1d4+2").unwrap();
    let res = execute_terms(&terms, AdMode::Normal, &mut dice);
    assert_eq!(res.rolls.len(), 2);
    assert_eq!(res.total, 20);
}

#[test]
fn seeded_dice_replay() {
    let f = formula("8d6");
    let a = execute(&f, AdMode::Normal, &mut Dice::from_seed(42));
    let b = execute(&f, AdMode::Normal, &mut Dice::from_seed(42));
    assert_eq!(a, b);
    assert!(a.dice().iter().all(|d| d.die == Die::D6 && (1..=6).contains(&d.result)));
}
