// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! `rands()` sampling
//!
//! Seeded calls get a fresh generator derived from a hash of the seed, so the
//! same seed always yields the same sequence. Unseeded calls draw from one
//! process-lifetime generator seeded at first use from wall-clock time and
//! the process id.

use super::{BuiltinContext, BuiltinError, Builtins};
use crate::eval::MAX_RANGE_ELEMENTS;
use crate::value::Value;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static PROCESS_RNG: OnceLock<Mutex<StdRng>> = OnceLock::new();

fn process_rng() -> &'static Mutex<StdRng> {
    PROCESS_RNG.get_or_init(|| {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Mutex::new(StdRng::seed_from_u64(secs.wrapping_add(std::process::id() as u64)))
    })
}

pub(super) fn register(builtins: &mut Builtins) {
    builtins.register(
        "rands",
        rands,
        &[
            "rands(min, max, num_results) -> vector",
            "rands(min, max, num_results, seed) -> vector",
        ],
    );
}

/// Hash a numeric seed to 32 bits. `-0.0` and `0.0` hash alike.
pub fn hash_seed(seed: f64) -> u32 {
    let bits = if seed == 0.0 {
        0u64
    } else if seed.is_nan() {
        f64::NAN.to_bits()
    } else {
        seed.to_bits()
    };
    // splitmix64 finalizer
    let mut z = bits.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    (z ^ (z >> 32)) as u32
}

/// Draw `count` samples from `[min, max)`; a degenerate range fills with `min`.
/// `seed` selects the deterministic generator.
pub fn sample_uniform(min: f64, max: f64, count: usize, seed: Option<f64>) -> Vec<f64> {
    if min == max {
        return vec![min; count];
    }
    match seed {
        Some(seed) => {
            let mut rng = StdRng::seed_from_u64(hash_seed(seed) as u64);
            (0..count).map(|_| rng.gen_range(min..max)).collect()
        }
        None => {
            let mut rng = process_rng().lock();
            (0..count).map(|_| rng.gen_range(min..max)).collect()
        }
    }
}

fn rands(ctx: &BuiltinContext<'_>, args: &[Value]) -> Result<Value, BuiltinError> {
    if args.len() != 3 && args.len() != 4 {
        return Err(BuiltinError::ArgCount("rands"));
    }
    // Non-numeric arguments yield undef without a warning
    let (Some(mut min), Some(mut max), Some(count)) = (
        args[0].try_as_number(),
        args[1].try_as_number(),
        args[2].try_as_number(),
    ) else {
        return Ok(Value::Undefined);
    };
    let seed = match args.get(3) {
        Some(v) => match v.try_as_number() {
            Some(seed) => Some(seed),
            None => return Ok(Value::Undefined),
        },
        None => None,
    };

    if !min.is_finite() {
        ctx.warn("rands() range min cannot be infinite");
        min = -f64::MAX / 2.0;
        ctx.diagnostics.warning(format!("resetting to {:.6}", min));
    }
    if !max.is_finite() {
        ctx.warn("rands() range max cannot be infinite");
        max = f64::MAX / 2.0;
        ctx.diagnostics.warning(format!("resetting to {:.6}", max));
    }
    if max < min {
        std::mem::swap(&mut min, &mut max);
    }

    let mut count = count.abs();
    if !count.is_finite() {
        ctx.warn("rands() cannot create an infinite number of results");
        ctx.diagnostics.warning("resetting number of results to 1");
        count = 1.0;
    }
    if count > MAX_RANGE_ELEMENTS as f64 {
        ctx.warn(format!("rands() cannot create more than {} results", MAX_RANGE_ELEMENTS));
        return Ok(Value::Undefined);
    }

    Ok(Value::numbers(sample_uniform(min, max, count as usize, seed)))
}

#[cfg(test)]
mod tests {
    use super::super::testing::call;
    use super::*;

    fn numbers(value: &Value) -> Vec<f64> {
        value.try_as_numbers().unwrap_or_default()
    }

    #[test]
    fn test_equal_endpoints_fill_constant() {
        let first = call("rands", &[Value::Number(0.0), Value::Number(0.0), Value::Number(3.0)]).0;
        let second = call("rands", &[Value::Number(0.0), Value::Number(0.0), Value::Number(3.0)]).0;
        assert_eq!(first, Value::numbers([0.0, 0.0, 0.0]));
        assert_eq!(first, second);
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let args = [
            Value::Number(0.0),
            Value::Number(10.0),
            Value::Number(5.0),
            Value::Number(42.0),
        ];
        let a = numbers(&call("rands", &args).0);
        let b = numbers(&call("rands", &args).0);
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
        assert!(a.iter().all(|x| (0.0..10.0).contains(x)));
    }

    #[test]
    fn test_descending_range_is_swapped() {
        let values = numbers(
            &call("rands", &[Value::Number(5.0), Value::Number(1.0), Value::Number(20.0)]).0,
        );
        assert_eq!(values.len(), 20);
        assert!(values.iter().all(|x| (1.0..5.0).contains(x)));
    }

    #[test]
    fn test_infinite_bounds_are_clamped() {
        let (value, sink) = call(
            "rands",
            &[Value::Number(f64::NEG_INFINITY), Value::Number(0.0), Value::Number(1.0), Value::Number(1.0)],
        );
        assert_eq!(numbers(&value).len(), 1);
        assert!(sink.contains("rands() range min cannot be infinite"));
        assert!(sink.contains("WARNING: resetting to"));
    }

    #[test]
    fn test_infinite_count_resets_to_one() {
        let (value, sink) = call(
            "rands",
            &[Value::Number(0.0), Value::Number(1.0), Value::Number(f64::INFINITY)],
        );
        assert_eq!(numbers(&value).len(), 1);
        assert!(sink.contains("resetting number of results to 1"));
    }

    #[test]
    fn test_huge_count_is_refused() {
        let (value, sink) = call(
            "rands",
            &[Value::Number(0.0), Value::Number(1.0), Value::Number(1e20)],
        );
        assert!(value.is_undefined());
        assert!(sink.contains("rands() cannot create more than 1000000 results"));

        let (value, _) = call(
            "rands",
            &[Value::Number(0.0), Value::Number(1.0), Value::Number(MAX_RANGE_ELEMENTS as f64), Value::Number(3.0)],
        );
        assert_eq!(numbers(&value).len(), MAX_RANGE_ELEMENTS);
    }

    #[test]
    fn test_negative_zero_seed_matches_zero() {
        assert_eq!(hash_seed(-0.0), hash_seed(0.0));
        assert_ne!(hash_seed(1.0), hash_seed(2.0));
    }

    #[test]
    fn test_wrong_arity() {
        let (value, sink) = call("rands", &[Value::Number(0.0)]);
        assert!(value.is_undefined());
        assert!(sink.contains("rands() number of parameters does not match"));
    }
}
