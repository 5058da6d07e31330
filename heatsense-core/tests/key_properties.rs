//! Property tests for cache key derivation

use heatsense_core::cache::{ArtifactKind, CacheKey, CacheParams, ParamValue};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

fn param_value() -> impl Strategy<Value = ParamValue> {
    prop_oneof![
        any::<bool>().prop_map(ParamValue::Bool),
        any::<i64>().prop_map(ParamValue::Int),
        (-1.0e6f64..1.0e6).prop_map(ParamValue::Float),
        "[a-z0-9_ ]{0,12}".prop_map(ParamValue::Text),
    ]
}

proptest! {
    #[test]
    fn key_ignores_insertion_order(
        entries in prop::collection::btree_map("[a-z_]{1,10}", param_value(), 0..8),
        seed in any::<u64>(),
    ) {
        let forward: CacheParams = entries.clone().into_iter().collect();

        let mut shuffled: Vec<_> = entries.into_iter().collect();
        let mut rng = StdRng::seed_from_u64(seed);
        for i in (1..shuffled.len()).rev() {
            let j = rng.gen_range(0..=i);
            shuffled.swap(i, j);
        }
        let reordered: CacheParams = shuffled.into_iter().collect();

        for kind in ArtifactKind::ALL {
            prop_assert_eq!(CacheKey::derive(kind, &forward), CacheKey::derive(kind, &reordered));
        }
    }

    #[test]
    fn changed_value_changes_key(
        base in -1.0e6f64..1.0e6,
        delta in 1.0e-3f64..1.0e3,
    ) {
        let a = CacheParams::new().with("resolution", base).with("area", "x");
        let b = CacheParams::new().with("resolution", base + delta).with("area", "x");
        prop_assert_ne!(
            CacheKey::derive(ArtifactKind::Grid, &a),
            CacheKey::derive(ArtifactKind::Grid, &b)
        );
    }
}

#[test]
fn no_collisions_in_random_sample() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut seen_params = HashSet::new();
    let mut keys = HashSet::new();

    for _ in 0..20_000 {
        let min_x: i32 = rng.gen_range(-500_000..500_000);
        let min_y: i32 = rng.gen_range(5_000_000..6_000_000);
        let resolution: u32 = rng.gen_range(10..500);
        let cloud: u32 = rng.gen_range(0..100);
        if !seen_params.insert((min_x, min_y, resolution, cloud)) {
            continue;
        }

        let params = CacheParams::new()
            .with("min_x", min_x)
            .with("min_y", min_y)
            .with("resolution", resolution)
            .with("cloud_threshold", cloud);
        assert!(
            keys.insert(CacheKey::derive(ArtifactKind::Temperature, &params)),
            "collision for {:?}",
            params
        );
    }
    assert_eq!(keys.len(), seen_params.len());
}
