use dpol_algorithms::{RatioStatistic, ReservoirSampler};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

#[test]
fn test_reservoir_keeps_both_of_two() {
    let mut rng = Xoshiro256StarStar::seed_from_u64(0);
    let mut reservoir = ReservoirSampler::new(2);
    reservoir.add(10, &mut rng);
    reservoir.add(20, &mut rng);
    assert_eq!(reservoir.items(), &[10, 20]);
}

#[test]
fn test_reservoir_retention_is_uniform() {
    const ITEMS: usize = 1000;
    const TRIALS: u64 = 4000;
    let mut retained = vec![0_u32; ITEMS];

    for seed in 0..TRIALS {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        let mut reservoir = ReservoirSampler::new(2);
        for item in 0..ITEMS {
            reservoir.add(item, &mut rng);
        }
        assert_eq!(reservoir.len(), 2);
        for &item in reservoir.items() {
            retained[item] += 1;
        }
    }

    // Each item is kept with probability 2/1000, so each block of 100 items
    // expects 4000 * 100 * 0.002 = 800 retentions.
    let expected = 800.0;
    for block in retained.chunks(100) {
        let hits = f64::from(block.iter().sum::<u32>());
        assert!(
            (hits - expected).abs() < 0.15 * expected,
            "block retained {hits} times, expected about {expected}"
        );
    }
}

#[test]
fn test_ratio_of_six_to_three() {
    let diffs = [0.5, 1.5, 2.5, 3.5, 4.5, 5.5, -0.5, -1.5, -2.5];
    let stat = RatioStatistic::from_differences(diffs);
    assert!((stat.ratio.unwrap() - 2.0).abs() < 1e-12);
    let expected_error = 2.0 * (1.0_f64 / 6.0 + 1.0 / 3.0).sqrt();
    assert!((stat.error.unwrap() - expected_error).abs() < 1e-12);
}
