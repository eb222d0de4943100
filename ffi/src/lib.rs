use anyhow::{bail, Context, Result};
use jni::objects::{JClass, JObject, JString};
use jni::sys::{jlong, jstring};
use jni::JNIEnv;
use serde::Serialize;
use serde_json::{json, Value};
use skirmish_engine::{
    check_natural, execute, AdMode, DiceFormula, Dice, EngineConfig, Intent, Natural, RollResult,
    Session,
};

#[derive(Serialize)]
struct RollReply<'a> {
    roll: &'a RollResult,
    natural: Natural,
    min: i32,
    max: i32,
}

/// `{"ok":true,"result":…}` or `{"ok":false,"error":"…"}`.
fn envelope(result: Result<Value>) -> String {
    let payload = match result {
        Ok(value) => json!({ "ok": true, "result": value }),
        Err(e) => json!({ "ok": false, "error": format!("{:#}", e) }),
    };
    payload.to_string()
}

fn to_jstring(env: &JNIEnv, text: String) -> jstring {
    match env.new_string(text) {
        Ok(s) => s.into_raw(),
        Err(_) => JObject::null().into_raw(),
    }
}

fn read_string(env: &mut JNIEnv, value: &JString) -> Result<String> {
    let text = env
        .get_string(value)
        .map_err(|e| anyhow::anyhow!("invalid_string: {}", e))?;
    Ok(text.into())
}

fn parse_mode(mode: &str) -> Result<AdMode> {
    Ok(match mode.trim().to_lowercase().as_str() {
        "" | "normal" => AdMode::Normal,
        "advantage" => AdMode::Advantage,
        "disadvantage" => AdMode::Disadvantage,
        other => bail!("unknown mode: {}", other),
    })
}

pub fn roll_formula_json(seed: i64, formula: &str, mode: &str) -> Result<Value> {
    let formula = DiceFormula::parse(formula)?;
    let mode = parse_mode(mode)?;
    let roll = execute(&formula, mode, &mut Dice::from_seed(seed as u64));
    let reply = RollReply {
        roll: &roll,
        natural: check_natural(&roll),
        min: formula.min(),
        max: formula.max(),
    };
    Ok(serde_json::to_value(reply)?)
}

/// Apply one intent to a session snapshot; an empty snapshot string starts
/// a new session. Returns the whole step (next session, events, log).
pub fn apply_intent_json(session: &str, intent: &str, seed: i64) -> Result<Value> {
    let session = if session.trim().is_empty() {
        Session::new()
    } else {
        let mut s: Session = serde_json::from_str(session).context("invalid_session")?;
        s.combat.normalize();
        s
    };
    let intent: Intent = serde_json::from_str(intent).context("invalid_intent")?;
    let config = EngineConfig {
        seed: Some(seed as u64),
        ..EngineConfig::default()
    };
    let step = session.apply(&intent, &mut config.dice(), &config);
    Ok(serde_json::to_value(step)?)
}

#[no_mangle]
pub extern "system" fn Java_com_skirmish_Ffi_version(env: JNIEnv, _class: JClass) -> jstring {
    to_jstring(&env, format!("skirmish-ffi {}", env!("CARGO_PKG_VERSION")))
}

#[no_mangle]
pub extern "system" fn Java_com_skirmish_Ffi_rollFormula(
    mut env: JNIEnv,
    _class: JClass,
    seed: jlong,
    formula: JString,
    mode: JString,
) -> jstring {
    let result = read_string(&mut env, &formula).and_then(|formula| {
        let mode = read_string(&mut env, &mode)?;
        roll_formula_json(seed, &formula, &mode)
    });
    to_jstring(&env, envelope(result))
}

#[no_mangle]
pub extern "system" fn Java_com_skirmish_Ffi_applyIntentJson(
    mut env: JNIEnv,
    _class: JClass,
    session: JString,
    intent: JString,
    seed: jlong,
) -> jstring {
    let result = read_string(&mut env, &session).and_then(|session| {
        let intent = read_string(&mut env, &intent)?;
        apply_intent_json(&session, &intent, seed)
    });
    to_jstring(&env, envelope(result))
}
