use dpol_algorithms::{
    CutPolicy, GeometryFilter, MomentumCut, NeutronDetectorConfig, ZCutThresholds,
};
use dpol_core::{EventBatch, Momentum};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

fn random_batch(seed: u64, n: usize) -> EventBatch {
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            (
                Momentum::new(
                    rng.gen_range(-250.0..100.0),
                    rng.gen_range(-100.0..100.0),
                    rng.gen_range(500.0..750.0),
                ),
                Momentum::new(
                    rng.gen_range(-250.0..100.0),
                    rng.gen_range(-100.0..100.0),
                    rng.gen_range(500.0..750.0),
                ),
            )
        })
        .collect()
}

fn passed(batch: &EventBatch, t: ZCutThresholds) -> usize {
    MomentumCut::new(CutPolicy::Z(t)).unwrap().evaluate(batch).n_passed
}

#[test]
fn test_z_cut_is_monotonic_in_every_threshold() {
    let batch = random_batch(2024, 20_000);
    let base = ZCutThresholds::default();
    let baseline = passed(&batch, base);
    assert!(baseline > 0);

    for step in 1..=4 {
        let s = f64::from(step);
        let tightened = [
            ZCutThresholds { pz_sum_threshold: base.pz_sum_threshold + 20.0 * s, ..base },
            ZCutThresholds { phi_threshold: base.phi_threshold - 0.1 * s, ..base },
            ZCutThresholds { delta_pz_threshold: base.delta_pz_threshold - 30.0 * s, ..base },
            ZCutThresholds { px_sum_threshold: base.px_sum_threshold - 100.0 * s, ..base },
            ZCutThresholds { pt_sum_sq_threshold: base.pt_sum_sq_threshold * (1.0 + s), ..base },
        ];
        for t in tightened {
            assert!(passed(&batch, t) <= baseline, "tightening {t:?} increased passes");
        }
    }
}

#[test]
fn test_rotated_arrays_cover_final_mask() {
    let batch = random_batch(7, 5000);
    for cut in [
        MomentumCut::for_polarization(dpol_core::PolarizationType::Z),
        MomentumCut::for_polarization(dpol_core::PolarizationType::Y),
    ] {
        let result = cut.evaluate(&batch);
        for (i, &m) in result.mask.iter().enumerate() {
            if m {
                assert!(result.rotated.proton(i).is_some());
                assert!(result.rotated.neutron(i).is_some());
            }
        }
        assert!(result.rotated.n_defined() >= result.n_passed);
        assert_eq!(result.passed_rotated().len(), result.n_passed);
    }
}

#[test]
fn test_smeared_cut_is_reproducible_for_a_seed() {
    let batch = random_batch(11, 2000);
    let cut = MomentumCut::for_polarization(dpol_core::PolarizationType::Y)
        .with_resolution(0.02)
        .unwrap();
    let run = || {
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        cut.apply(&batch, &mut rng).mask
    };
    assert_eq!(run(), run());
}

#[test]
fn test_geometry_accepts_engineered_batch() {
    let mut rng = Xoshiro256StarStar::seed_from_u64(5);
    let inside: EventBatch = (0..500)
        .map(|_| {
            (
                Momentum::new(rng.gen_range(-100.0..=100.0), rng.gen_range(-50.0..50.0), 600.0),
                Momentum::new(rng.gen_range(-50.0..50.0), rng.gen_range(-20.0..20.0), 600.0),
            )
        })
        .collect();

    for (field, angle) in GeometryFilter::standard_configurations() {
        let filter = GeometryFilter::new(field, angle).unwrap();
        let result = filter.apply(&inside);
        assert_eq!(result.n_passed, 500);
        assert!((result.efficiency - 1.0).abs() < f64::EPSILON);
    }
}

#[test]
fn test_geometry_rejects_when_proton_detector_misses() {
    let outside: EventBatch = (0..100)
        .map(|i| {
            let px = if i % 2 == 0 { 150.0 } else { -150.0 };
            (Momentum::new(px, 0.0, 600.0), Momentum::new(0.0, 0.0, 600.0))
        })
        .collect();
    let result = GeometryFilter::new(1.0, 5.0).unwrap().apply(&outside);
    assert_eq!(result.n_passed, 0);
    assert!(result.efficiency.abs() < f64::EPSILON);
}

#[test]
fn test_snapshot_round_trip_reproduces_masks() {
    let batch = random_batch(99, 5000);
    let filter = GeometryFilter::new(1.4, 15.0)
        .unwrap()
        .with_neutron_detector(NeutronDetectorConfig::default().with_size(2400.0, 1200.0));

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("1.40T/15deg/geometry_config.json");
    filter.save(&path).unwrap();
    let restored = GeometryFilter::load(&path).unwrap();

    assert_eq!(restored.proton_detector(), filter.proton_detector());
    assert_eq!(restored.neutron_detector(), filter.neutron_detector());
    assert_eq!(restored.apply(&batch).mask, filter.apply(&batch).mask);
}
