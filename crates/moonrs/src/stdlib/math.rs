// Math library
// Implements: abs, ceil, floor, sqrt, exp, log, pow (legacy), sin, cos,
// tan, asin, acos, atan, deg, rad, max, min, random, randomseed, fmod,
// modf, tointeger, type, ult, pi, huge, maxinteger, mininteger

use crate::lib_registry::{
    LibraryModule, arg_or_nil, bad_argument, check_integer, check_number,
};
use crate::lua_interp::{LuaResult, LuaRng, LuaState};
use crate::lua_value::number::{self, float_to_integer};
use crate::lua_value::LuaValue;

pub fn create_math_lib() -> LibraryModule {
    crate::lib_module!("math", {
        "abs" => math_abs,
        "ceil" => math_ceil,
        "floor" => math_floor,
        "sqrt" => math_sqrt,
        "exp" => math_exp,
        "log" => math_log,
        "pow" => math_pow,
        "sin" => math_sin,
        "cos" => math_cos,
        "tan" => math_tan,
        "asin" => math_asin,
        "acos" => math_acos,
        "atan" => math_atan,
        "deg" => math_deg,
        "rad" => math_rad,
        "max" => math_max,
        "min" => math_min,
        "random" => math_random,
        "randomseed" => math_randomseed,
        "fmod" => math_fmod,
        "modf" => math_modf,
        "tointeger" => math_tointeger,
        "type" => math_type,
        "ult" => math_ult,
    })
    .with_value("pi", |_| Ok(LuaValue::Float(std::f64::consts::PI)))
    .with_value("huge", |_| Ok(LuaValue::Float(f64::INFINITY)))
    .with_value("maxinteger", |_| Ok(LuaValue::Integer(i64::MAX)))
    .with_value("mininteger", |_| Ok(LuaValue::Integer(i64::MIN)))
}

fn math_abs(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    // Integer abs stays integer (wrapping at mininteger)
    match arg_or_nil(args, 1) {
        LuaValue::Integer(i) => Ok(vec![LuaValue::Integer(i.wrapping_abs())]),
        _ => {
            let f = check_number(l, args, 1, "abs")?;
            Ok(vec![LuaValue::Float(f.abs())])
        }
    }
}

/// floor/ceil return integers when the result fits.
fn floor_to_value(f: f64) -> LuaValue {
    match float_to_integer(f) {
        Some(i) => LuaValue::Integer(i),
        None => LuaValue::Float(f),
    }
}

fn math_floor(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    match arg_or_nil(args, 1) {
        LuaValue::Integer(i) => Ok(vec![LuaValue::Integer(i)]),
        _ => {
            let f = check_number(l, args, 1, "floor")?;
            Ok(vec![floor_to_value(f.floor())])
        }
    }
}

fn math_ceil(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    match arg_or_nil(args, 1) {
        LuaValue::Integer(i) => Ok(vec![LuaValue::Integer(i)]),
        _ => {
            let f = check_number(l, args, 1, "ceil")?;
            Ok(vec![floor_to_value(f.ceil())])
        }
    }
}

macro_rules! float_fn {
    ($name:ident, $fname:literal, $method:ident) => {
        fn $name(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
            let f = check_number(l, args, 1, $fname)?;
            Ok(vec![LuaValue::Float(f.$method())])
        }
    };
}

float_fn!(math_sqrt, "sqrt", sqrt);
float_fn!(math_exp, "exp", exp);
float_fn!(math_sin, "sin", sin);
float_fn!(math_cos, "cos", cos);
float_fn!(math_tan, "tan", tan);
float_fn!(math_asin, "asin", asin);
float_fn!(math_acos, "acos", acos);

fn math_atan(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let y = check_number(l, args, 1, "atan")?;
    let x = match args.get(1) {
        None | Some(LuaValue::Nil) => 1.0,
        _ => check_number(l, args, 2, "atan")?,
    };
    Ok(vec![LuaValue::Float(y.atan2(x))])
}

fn math_log(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(l, args, 1, "log")?;
    let result = match args.get(1) {
        None | Some(LuaValue::Nil) => x.ln(),
        _ => {
            let base = check_number(l, args, 2, "log")?;
            if base == 2.0 {
                x.log2()
            } else if base == 10.0 {
                x.log10()
            } else {
                x.ln() / base.ln()
            }
        }
    };
    Ok(vec![LuaValue::Float(result)])
}

/// Legacy x^y kept for compatibility.
fn math_pow(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let x = check_number(l, args, 1, "pow")?;
    let y = check_number(l, args, 2, "pow")?;
    Ok(vec![LuaValue::Float(x.powf(y))])
}

fn math_deg(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let f = check_number(l, args, 1, "deg")?;
    Ok(vec![LuaValue::Float(f.to_degrees())])
}

fn math_rad(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let f = check_number(l, args, 1, "rad")?;
    Ok(vec![LuaValue::Float(f.to_radians())])
}

fn math_max(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    minmax(l, args, "max", false)
}

fn math_min(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    minmax(l, args, "min", true)
}

fn minmax(
    l: &mut LuaState,
    args: &[LuaValue],
    fname: &str,
    want_less: bool,
) -> LuaResult<Vec<LuaValue>> {
    if args.is_empty() {
        return Err(l.error(format!(
            "bad argument #1 to '{}' (number expected, got no value)",
            fname
        )));
    }
    let mut best = args[0].clone();
    if !best.is_number() {
        return Err(bad_argument(l, 1, fname, "number", &best));
    }
    for (i, candidate) in args.iter().enumerate().skip(1) {
        if !candidate.is_number() {
            return Err(bad_argument(l, i + 1, fname, "number", candidate));
        }
        let replace = if want_less {
            number::num_lt(candidate, &best)
        } else {
            number::num_lt(&best, candidate)
        }
        .unwrap_or(false);
        if replace {
            best = candidate.clone();
        }
    }
    Ok(vec![best])
}

fn math_random(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let (low, high) = match args.len() {
        0 => {
            let f = {
                let mut rng = self_rng(l);
                rng.next_float()
            };
            return Ok(vec![LuaValue::Float(f)]);
        }
        1 => (1, check_integer(l, args, 1, "random")?),
        2 => (
            check_integer(l, args, 1, "random")?,
            check_integer(l, args, 2, "random")?,
        ),
        _ => return Err(l.error("wrong number of arguments to 'random'")),
    };
    if low > high {
        return Err(l.error("bad argument #2 to 'random' (interval is empty)"));
    }
    let value = {
        let mut rng = self_rng(l);
        rng.next_in_range(low, high)
    };
    Ok(vec![LuaValue::Integer(value)])
}

fn math_randomseed(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let rng = match args.first() {
        None | Some(LuaValue::Nil) => LuaRng::from_clock(),
        _ => {
            let n1 = check_number(l, args, 1, "randomseed")?;
            let n2 = match args.get(1) {
                None | Some(LuaValue::Nil) => 0.0,
                _ => check_number(l, args, 2, "randomseed")?,
            };
            LuaRng::seeded(n1.to_bits(), n2.to_bits())
        }
    };
    *self_rng(l) = rng;
    Ok(Vec::new())
}

fn self_rng(l: &LuaState) -> std::sync::MutexGuard<'_, LuaRng> {
    l.rt.rng.lock().unwrap_or_else(|e| e.into_inner())
}

fn math_fmod(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    match (arg_or_nil(args, 1), arg_or_nil(args, 2)) {
        (LuaValue::Integer(a), LuaValue::Integer(b)) => {
            if b == 0 {
                return Err(l.error("bad argument #2 to 'fmod' (zero)"));
            }
            Ok(vec![LuaValue::Integer(a.wrapping_rem(b))])
        }
        _ => {
            let a = check_number(l, args, 1, "fmod")?;
            let b = check_number(l, args, 2, "fmod")?;
            Ok(vec![LuaValue::Float(a % b)])
        }
    }
}

/// modf: integral part (as float) and fractional part.
fn math_modf(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let f = check_number(l, args, 1, "modf")?;
    let integral = if f >= 0.0 { f.floor() } else { f.ceil() };
    let fractional = if f.is_infinite() { 0.0 } else { f - integral };
    Ok(vec![floor_to_value(integral), LuaValue::Float(fractional)])
}

fn math_tointeger(_l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let value = arg_or_nil(args, 1);
    Ok(vec![match &value {
        LuaValue::Integer(i) => LuaValue::Integer(*i),
        LuaValue::Float(f) => match float_to_integer(*f) {
            Some(i) => LuaValue::Integer(i),
            None => LuaValue::Nil,
        },
        _ => LuaValue::Nil,
    }])
}

fn math_type(_l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    Ok(vec![match arg_or_nil(args, 1) {
        LuaValue::Integer(_) => LuaValue::str("integer"),
        LuaValue::Float(_) => LuaValue::str("float"),
        _ => LuaValue::Nil,
    }])
}

/// Unsigned comparison of two integers.
fn math_ult(l: &mut LuaState, args: &[LuaValue]) -> LuaResult<Vec<LuaValue>> {
    let a = check_integer(l, args, 1, "ult")? as u64;
    let b = check_integer(l, args, 2, "ult")? as u64;
    Ok(vec![LuaValue::Boolean(a < b)])
}
