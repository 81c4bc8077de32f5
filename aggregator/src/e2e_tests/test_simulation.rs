//! Test long seeded runs of the storage and feed simulations.

use crate::simulation::{Simulator, SimulatorConfig};

const SEEDS: [u64; 4] = [0, 42, 1_705_322_096, u64::MAX];

#[test]
fn test_storage_simulation_many_seeds() {
    for seed in SEEDS {
        let config = SimulatorConfig::new(seed).with_key_range(40);
        let result = Simulator::new(config).run(5_000).expect("valid degree");
        assert!(
            result.passed(),
            "seed {seed} failed: {:?}",
            result.violations
        );
    }
}

#[test]
fn test_storage_simulation_large_degree() {
    let config = SimulatorConfig::new(9)
        .with_degree(16)
        .with_key_range(2_000)
        .with_validate_every(100);
    let result = Simulator::new(config).run(20_000).expect("valid degree");
    assert!(result.passed(), "{:?}", result.violations);
    assert!(result.final_len > 0);
}

#[test]
fn test_feed_simulation_many_seeds() {
    for seed in SEEDS {
        let config = SimulatorConfig::new(seed).with_malformed_rate(0.3);
        let result = Simulator::new(config).run_feed(2_000).expect("valid degree");
        assert!(
            result.passed(),
            "seed {seed} failed: {:?}",
            result.violations
        );
        assert_eq!(
            result.successful_operations + result.rejected_operations,
            result.steps
        );
    }
}
