//! Property tests over the pure building blocks.

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use conjecture_engine::shrinking::integer::shrink_integer;
use conjecture_engine::shrinking::{Integer, Natural};
use conjecture_engine::{
    count_between_floats, find_integer, float_to_int, int_to_float, replace_all, sort_key,
    ConjectureData, FloatRange, FloatWidth, IntegerRange, Sampler, Shrinker,
};

proptest! {
    #[test]
    fn find_integer_finds_exact_threshold(target in 0usize..1_000_000) {
        let mut calls = 0usize;
        let found = find_integer(|n| {
            calls += 1;
            n <= target
        });
        prop_assert_eq!(found, target);
        let log = (usize::BITS - target.leading_zeros()) as usize;
        prop_assert!(calls <= 2 * log + 6);
    }

    #[test]
    fn replace_all_single_splice_length(
        buffer in proptest::collection::vec(any::<u8>(), 0..64),
        a in 0usize..64,
        b in 0usize..64,
        replacement in proptest::collection::vec(any::<u8>(), 0..16),
    ) {
        let u = a.min(b).min(buffer.len());
        let v = a.max(b).min(buffer.len());
        let result = replace_all(&buffer, &[(u, v, replacement.clone())]);
        prop_assert_eq!(result.len(), buffer.len() + replacement.len() - (v - u));
        prop_assert_eq!(&result[..u], &buffer[..u]);
        prop_assert_eq!(&result[u..u + replacement.len()], replacement.as_slice());
    }

    #[test]
    fn replace_all_without_replacements_is_identity(
        buffer in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        prop_assert_eq!(replace_all(&buffer, &[]), buffer);
    }

    #[test]
    fn sampler_never_returns_zero_weight(
        weights in proptest::collection::vec(prop_oneof![Just(0.0), 0.01f64..10.0], 1..12),
        seed in any::<u64>(),
    ) {
        prop_assume!(weights.iter().any(|&w| w > 0.0));
        let sampler = Sampler::new(&weights).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..200 {
            let i = sampler.sample(&mut rng);
            prop_assert!(weights[i] > 0.0);
        }
    }

    #[test]
    fn sampler_probabilities_sum_to_one(
        weights in proptest::collection::vec(0.01f64..10.0, 1..12),
    ) {
        let sampler = Sampler::new(&weights).unwrap();
        let total: f64 = (0..weights.len()).map(|i| sampler.probability(i)).sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn float_int_round_trip(value in any::<f64>()) {
        prop_assume!(!value.is_nan());
        let bits = float_to_int(value, FloatWidth::Width64);
        prop_assert_eq!(int_to_float(bits, FloatWidth::Width64), value);
    }

    #[test]
    fn count_between_positive_floats_matches_bits(x in 0.0f64..1e10, y in 0.0f64..1e10) {
        let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
        let expected =
            float_to_int(hi, FloatWidth::Width64) - float_to_int(lo, FloatWidth::Width64) + 1;
        prop_assert_eq!(count_between_floats(lo, hi, FloatWidth::Width64), expected);
    }

    #[test]
    fn integer_range_stays_in_bounds(
        lo in 0u64..1_000,
        span in 0u64..100_000,
        buffer in proptest::collection::vec(any::<u8>(), 0..32),
    ) {
        let mut data = ConjectureData::for_buffer(&buffer);
        if let Ok(n) = data.draw(&IntegerRange::new(lo, lo + span)) {
            prop_assert!(lo <= n && n <= lo + span);
        }
    }

    #[test]
    fn float_range_stays_in_bounds(
        a in -1e6f64..1e6,
        b in -1e6f64..1e6,
        buffer in proptest::collection::vec(any::<u8>(), 8..16),
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut data = ConjectureData::for_buffer(&buffer);
        if let Ok(x) = data.draw(&FloatRange::new(lo, hi)) {
            prop_assert!(lo <= x && x <= hi, "{} not in [{}, {}]", x, lo, hi);
        }
    }

    #[test]
    fn shrink_integer_finds_threshold(threshold in 0u64..1_000_000, extra in 0u64..1_000_000) {
        prop_assert_eq!(shrink_integer(threshold + extra, |x| x >= threshold), threshold);
    }

    #[test]
    fn integer_shrinker_keeps_exact_target_cheaply(n in any::<u64>()) {
        let target = Natural::from(n);
        let expected = target.clone();
        let mut shrinker = Integer::new(target, move |v: &Natural| *v == expected);
        shrinker.run();
        prop_assert_eq!(shrinker.current(), &Natural::from(n));
        prop_assert!(shrinker.calls() <= 10, "took {} calls", shrinker.calls());
    }

    #[test]
    fn integer_shrinker_converges_to_threshold_in_log_calls(
        threshold in 0u64..1 << 48,
        extra in 0u64..1 << 48,
    ) {
        let start = threshold + extra;
        let floor = Natural::from(threshold);
        let mut shrinker = Integer::new(Natural::from(start), move |v: &Natural| *v >= floor);
        shrinker.run();
        prop_assert_eq!(shrinker.current(), &Natural::from(threshold));
        let bits = (u64::BITS - start.leading_zeros()) as usize;
        prop_assert!(
            shrinker.calls() <= 12 * (bits + 4),
            "took {} calls from {}",
            shrinker.calls(),
            start
        );
    }

    #[test]
    fn sort_key_orders_by_length_first(
        a in proptest::collection::vec(any::<u8>(), 0..8),
        b in proptest::collection::vec(any::<u8>(), 0..8),
    ) {
        if a.len() < b.len() {
            prop_assert!(sort_key(&a) < sort_key(&b));
        }
    }
}

#[test]
fn count_between_signed_zeros() {
    assert_eq!(count_between_floats(-0.0, 0.0, FloatWidth::Width64), 2);
}
