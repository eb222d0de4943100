use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use skirmish_engine::{
    check_natural_kept, execute, execute_critical, execute_terms, parse_terms, ActiveEffect, AdMode,
    BonusUsage, Combatant, DamageType, DiceFormula, EffectKind, EngineConfig, Intent, Natural,
    Session,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, ValueEnum)]
enum Adv {
    Normal,
    Advantage,
    Disadvantage,
}

#[derive(Subcommand)]
enum Cmd {
    /// Roll a dice formula (`2d6+3`, `4d6k3`, `1d20+1d4+2`)
    Roll {
        formula: String,
        /// RNG seed for determinism
        #[arg(long)]
        seed: Option<u64>,
        /// Advantage mode (single d20 only)
        #[arg(long, value_enum, default_value_t = Adv::Normal)]
        adv: Adv,
        /// Roll as critical damage (double dice)
        #[arg(long, default_value_t = false)]
        crit: bool,
        /// Number of rolls
        #[arg(long, default_value_t = 1)]
        rolls: u32,
    },
    /// Apply a JSON list of intents to a session snapshot and print the log
    Apply {
        /// Session JSON to start from (empty session if omitted)
        #[arg(long)]
        session: Option<PathBuf>,
        /// JSON array of intents
        #[arg(long)]
        intents: PathBuf,
        /// RNG seed for determinism
        #[arg(long)]
        seed: Option<u64>,
        /// Where to write the resulting session
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print structured events as JSON after the log
        #[arg(long, default_value_t = false)]
        events: bool,
    },
    /// Demo: a short scripted skirmish between Aria and a goblin
    Demo {
        /// RNG seed for determinism
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}

#[derive(Parser)]
#[command(name = "skirmish")]
#[command(about = "Skirmish combat engine harness")]
struct Cli {
    /// Engine config (JSON or YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug-level engine logs on stderr (RUST_LOG overrides)
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

fn to_mode(a: Adv) -> AdMode {
    match a {
        Adv::Normal => AdMode::Normal,
        Adv::Advantage => AdMode::Advantage,
        Adv::Disadvantage => AdMode::Disadvantage,
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&PathBuf>, seed: Option<u64>) -> anyhow::Result<EngineConfig> {
    let mut cfg = match path {
        Some(p) => EngineConfig::load(p)?,
        None => EngineConfig::default(),
    };
    if seed.is_some() {
        cfg.seed = seed;
    }
    Ok(cfg)
}

fn natural_suffix(n: Natural) -> &'static str {
    match n {
        Natural::Critical => " CRIT!",
        Natural::Fumble => " NAT1",
        Natural::Neither => "",
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Cmd::Roll {
            formula,
            seed,
            adv,
            crit,
            rolls,
        } => {
            let cfg = load_config(cli.config.as_ref(), seed)?;
            let mut dice = cfg.dice();
            let mode = to_mode(adv);
            match DiceFormula::parse(&formula) {
                Ok(f) => {
                    for _ in 0..rolls {
                        let res = if crit {
                            execute_critical(&f, &mut dice)
                        } else {
                            execute(&f, mode, &mut dice)
                        };
                        println!("{}{}", res, natural_suffix(check_natural_kept(&res)));
                    }
                }
                Err(single) => {
                    let terms = match parse_terms(&formula) {
                        Ok(t) if t.formulas.len() > 1 => t,
                        _ => bail!("{}", single),
                    };
                    for _ in 0..rolls {
                        let res = execute_terms(&terms, mode, &mut dice);
                        let parts: Vec<String> = res.rolls.iter().map(|r| r.to_string()).collect();
                        println!("{} ({:+}) => {}", parts.join(" | "), res.modifier, res.total);
                    }
                }
            }
        }
        Cmd::Apply {
            session,
            intents,
            seed,
            out,
            events,
        } => {
            let cfg = load_config(cli.config.as_ref(), seed)?;
            let start = match session {
                Some(path) => Session::load(path)?,
                None => Session::new(),
            };
            let intents = Session::load_intents(&intents)?;
            tracing::debug!(count = intents.len(), "applying intents");
            let step = start.run(&intents, &mut cfg.dice(), &cfg);
            for line in &step.log {
                println!("{}", line);
            }
            if events {
                println!("{}", serde_json::to_string_pretty(&step.events)?);
            }
            if let Some(path) = out {
                step.session
                    .save(&path)
                    .with_context(|| format!("saving session to {}", path.display()))?;
            }
        }
        Cmd::Demo { seed } => {
            let cfg = load_config(cli.config.as_ref(), Some(seed))?;
            let step = Session::new().run(&demo_intents()?, &mut cfg.dice(), &cfg);
            for line in &step.log {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn demo_intents() -> anyhow::Result<Vec<Intent>> {
    let bless = ActiveEffect::new("bless", EffectKind::Buff, "aria", "aria")
        .named("Bless")
        .with_bonus_dice(BonusUsage::Attacks, DiceFormula::parse("1d4")?)
        .concentration("aria")
        .lasting(10);
    let attack = |by: &str, against: &str, formula: &str| Intent::RollFormula {
        formula: formula.to_string(),
        mode: AdMode::Normal,
        rolled_by: Some(by.to_string()),
        usage: Some(BonusUsage::Attacks),
        critical: false,
        against: Some(against.to_string()),
        ranged: false,
        timestamp: None,
    };
    Ok(vec![
        Intent::AddCombatant {
            combatant: Combatant::new("aria", "Aria", 12)
                .with_initiative(14)
                .with_armor_class(16),
        },
        Intent::AddCombatant {
            combatant: Combatant::new("gob", "Goblin", 7)
                .with_initiative(12)
                .with_armor_class(15),
        },
        Intent::AddEffect { effect: bless },
        Intent::StartCombat,
        attack("aria", "gob", "1d20+5"),
        Intent::RollDamage {
            target: "gob".to_string(),
            formula: "1d8+3".to_string(),
            attacker: Some("aria".to_string()),
            critical: false,
            damage_type: Some(DamageType::Slashing),
        },
        Intent::AdvanceTurn,
        attack("gob", "aria", "1d20+4"),
        Intent::RollDamage {
            target: "aria".to_string(),
            formula: "1d6+2".to_string(),
            attacker: Some("gob".to_string()),
            critical: false,
            damage_type: Some(DamageType::Piercing),
        },
        Intent::AdvanceTurn,
    ])
}
