use anyhow::Context;
use clap::Parser;
use encoding_rs::Encoding;
use skirmish_engine::{check_natural_kept, execute, AdMode, DiceFormula, Dice, Natural};
use std::{fs, path::PathBuf};

#[derive(Parser)]
#[command(name = "roll-stats")]
#[command(about = "Monte Carlo sim: roll formulas many times and compare with their expected range")]
struct Args {
    /// Formula to simulate (repeatable)
    #[arg(long = "formula")]
    formulas: Vec<String>,

    /// Text file with one formula per line (`#` starts a comment)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Number of trials per formula
    #[arg(long, default_value_t = 10_000)]
    trials: u32,

    /// RNG base seed (formula i uses seed+i)
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Advantage mode: normal | advantage | disadvantage
    #[arg(long, default_value = "normal")]
    adv: String,
}

fn to_mode(s: &str) -> AdMode {
    match s.to_lowercase().as_str() {
        "advantage" | "adv" => AdMode::Advantage,
        "disadvantage" | "dis" => AdMode::Disadvantage,
        _ => AdMode::Normal,
    }
}

fn read_text_auto(path: &std::path::Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if let Some((enc, bom_len)) = Encoding::for_bom(&bytes) {
        let (cow, _, _) = enc.decode(&bytes[bom_len..]);
        Ok(cow.into_owned())
    } else {
        Ok(String::from_utf8(bytes)?)
    }
}

fn formula_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|l| l.split('#').next().unwrap_or("").trim())
        .filter(|l| !l.is_empty())
}

struct Stats {
    min: i32,
    max: i32,
    mean: f64,
    crits: u32,
    fumbles: u32,
}

fn simulate(formula: &DiceFormula, mode: AdMode, trials: u32, seed: u64) -> Stats {
    let mut dice = Dice::from_seed(seed);
    let mut stats = Stats {
        min: i32::MAX,
        max: i32::MIN,
        mean: 0.0,
        crits: 0,
        fumbles: 0,
    };
    let mut sum = 0i64;
    for _ in 0..trials {
        let res = execute(formula, mode, &mut dice);
        let total = res.grand_total();
        stats.min = stats.min.min(total);
        stats.max = stats.max.max(total);
        sum += total as i64;
        match check_natural_kept(&res) {
            Natural::Critical => stats.crits += 1,
            Natural::Fumble => stats.fumbles += 1,
            Natural::Neither => {}
        }
    }
    if trials > 0 {
        stats.mean = sum as f64 / trials as f64;
    }
    stats
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut sources = args.formulas.clone();
    if let Some(path) = args.file.as_ref() {
        let text = read_text_auto(path)?;
        sources.extend(formula_lines(&text).map(str::to_string));
    }
    if sources.is_empty() {
        anyhow::bail!("no formulas given (use --formula or --file)");
    }

    let mut formulas = Vec::with_capacity(sources.len());
    for text in &sources {
        let f = DiceFormula::parse(text).with_context(|| format!("bad formula '{}'", text))?;
        formulas.push(f);
    }

    let mode = to_mode(&args.adv);
    println!("roll-stats results");
    println!("------------------");
    println!("trials:             {}", args.trials);
    println!("advantage:          {}", args.adv);
    for (i, f) in formulas.iter().enumerate() {
        let stats = simulate(f, mode, args.trials, args.seed.wrapping_add(i as u64));
        let trials_f = args.trials.max(1) as f64;
        println!();
        println!("formula:            {}", f);
        println!("range:              {}..={} (seen {}..={})", f.min(), f.max(), stats.min, stats.max);
        println!("mean:               {:.2} (unselected dice {:.2})", stats.mean, f.average());
        if f.die() == skirmish_engine::Die::D20 {
            println!("crit rate:          {:.1}%", stats.crits as f64 / trials_f * 100.0);
            println!("fumble rate:        {:.1}%", stats.fumbles as f64 / trials_f * 100.0);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let lines: Vec<_> = formula_lines("2d6 # greatsword\n\n# header\n1d20+5\n").collect();
        assert_eq!(lines, ["2d6", "1d20+5"]);
    }

    #[test]
    fn simulated_totals_stay_in_range() {
        let f = DiceFormula::parse("3d6+1").unwrap();
        let stats = simulate(&f, AdMode::Normal, 500, 9);
        assert!(stats.min >= f.min() && stats.max <= f.max());
        assert!((stats.mean - f.average()).abs() < 1.0);
    }
}
