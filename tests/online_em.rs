use approx::assert_relative_eq;
use bivmix::prelude::*;
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

fn weight_sum(mm: &OnlineMixture) -> f64 {
    mm.weights().iter().sum()
}

#[test]
fn two_separated_clusters_converge() {
    let prior = MixturePrior::new(100.0, 100.0);
    let mut mm = OnlineMixture::new(2, prior).unwrap();
    for _ in 0..250 {
        mm.ingest(100.0, 50.0).unwrap();
        mm.ingest(100.0, 150.0).unwrap();
    }

    assert_eq!(mm.n(), 500);

    let (mx0, my0) = mm.component(0).gauss().mu();
    let (mx1, my1) = mm.component(1).gauss().mu();
    assert_relative_eq!(mx0, 100.0, epsilon = 1e-6);
    assert_relative_eq!(my0, 50.0, epsilon = 1e-6);
    assert_relative_eq!(mx1, 100.0, epsilon = 1e-6);
    assert_relative_eq!(my1, 150.0, epsilon = 1e-6);

    assert_relative_eq!(mm.weight(0), 0.5, epsilon = 1e-3);
    assert_relative_eq!(mm.weight(1), 0.5, epsilon = 1e-3);
    assert_relative_eq!(mm.entropy(), 1.0, epsilon = 1e-3);

    let (m_x, m_y) = mm.mean().unwrap();
    assert_relative_eq!(m_x, 100.0, epsilon = 1e-6);
    assert_relative_eq!(m_y, 100.0, epsilon = 1e-3);
}

#[test]
fn noisy_clusters_are_separated() {
    let mut rng = Xoshiro256Plus::seed_from_u64(0x5EED);
    let lower = BivariateGaussian::new(100.0, 50.0, 25.0, 25.0, 0.0).unwrap();
    let upper = BivariateGaussian::new(100.0, 150.0, 25.0, 25.0, 0.0).unwrap();

    let mut mm = OnlineMixture::new(2, MixturePrior::default()).unwrap();
    // seed one point in each cluster so the components start apart
    mm.ingest(100.0, 50.0).unwrap();
    mm.ingest(100.0, 150.0).unwrap();

    for _ in 0..2_000 {
        let (x, y) = if rng.gen::<bool>() {
            lower.draw(&mut rng)
        } else {
            upper.draw(&mut rng)
        };
        mm.ingest(x, y).unwrap();
    }

    let (_, my0) = mm.component(0).gauss().mu();
    let (_, my1) = mm.component(1).gauss().mu();
    assert_relative_eq!(my0, 50.0, epsilon = 1.0);
    assert_relative_eq!(my1, 150.0, epsilon = 1.0);
    assert_relative_eq!(mm.weight(0), 0.5, epsilon = 0.05);
    assert_relative_eq!(weight_sum(&mm), 1.0, epsilon = 1e-10);

    let (vx, vy) = mm.variance().unwrap();
    // within ≈ 25, between ≈ 50² along y
    assert_relative_eq!(vx, 25.0, epsilon = 5.0);
    assert_relative_eq!(vy, 2_525.0, epsilon = 150.0);
}

#[test]
fn zero_covariance_component_is_degenerate() {
    let mm = OnlineMixture::new_unchecked(3, MixturePrior::new(0.0, 0.0));
    assert!(matches!(
        mm.density(0.0, 0.0, 1),
        Err(BivariateGaussianError::DegenerateCovariance { .. })
    ));
}

#[test]
fn independently_trained_shards_merge() {
    let mut rng = Xoshiro256Plus::seed_from_u64(99);
    let points: Vec<(f64, f64)> = (0..1_000)
        .map(|ix| {
            let shift = if ix % 2 == 0 { 0.0 } else { 100.0 };
            (rng.gen_range(90.0..110.0), rng.gen_range(40.0..60.0) + shift)
        })
        .collect();

    let (left, right) = points.split_at(500);
    let mut a = OnlineMixture::new(2, MixturePrior::default()).unwrap();
    let mut b = OnlineMixture::new(2, MixturePrior::default()).unwrap();
    a.ingest_many(left).unwrap();
    b.ingest_many(right).unwrap();

    let merged = OnlineMixture::merged(&a, &b).unwrap();
    assert_eq!(merged.k(), 2);
    assert_relative_eq!(weight_sum(&merged), 1.0, epsilon = 1e-12);
    assert!(merged.n() <= a.n() + b.n());
    assert_relative_eq!(merged.entropy(), 1.0, epsilon = 0.05);
}

proptest! {
    #[test]
    fn weights_sum_to_one_once_seeded(
        k in 1_usize..6,
        xs in prop::collection::vec((-1e3..1e3_f64, -1e3..1e3_f64), 6..200),
    ) {
        let mut mm = OnlineMixture::new(k, MixturePrior::default()).unwrap();
        for &(x, y) in &xs {
            mm.ingest(x, y).unwrap();
            prop_assert_eq!(mm.k(), k);
        }
        prop_assert!((weight_sum(&mm) - 1.0).abs() < 1e-9);
        prop_assert_eq!(mm.n(), xs.len());
    }

    #[test]
    fn seeding_weights_are_exactly_one_over_n(
        xs in prop::collection::vec((-1e3..1e3_f64, -1e3..1e3_f64), 1..8),
    ) {
        let k = 8;
        let mut mm = OnlineMixture::new(k, MixturePrior::default()).unwrap();
        for (ix, &(x, y)) in xs.iter().enumerate() {
            mm.ingest(x, y).unwrap();
            let n = ix + 1;
            for j in 0..n {
                prop_assert_eq!(mm.weight(j), 1.0 / n as f64);
            }
        }
    }

    #[test]
    fn self_merge_leaves_mixture_unchanged(
        xs in prop::collection::vec((-1e2..1e2_f64, -1e2..1e2_f64), 0..100),
    ) {
        let mut mm = OnlineMixture::new(3, MixturePrior::default()).unwrap();
        mm.ingest_many(&xs).unwrap();
        let copy = mm.clone();
        mm.merge(&copy).unwrap();
        prop_assert_eq!(mm, copy);
    }

    #[test]
    fn empty_merge_yields_other(
        xs in prop::collection::vec((-1e2..1e2_f64, -1e2..1e2_f64), 1..100),
    ) {
        let mut b = OnlineMixture::new(3, MixturePrior::default()).unwrap();
        b.ingest_many(&xs).unwrap();
        let a = OnlineMixture::new(3, MixturePrior::default()).unwrap();
        let c = OnlineMixture::merged(&a, &b).unwrap();
        prop_assert_eq!(c, b);
    }

    #[test]
    fn entropy_is_bounded_by_log2_k(
        k in 1_usize..6,
        xs in prop::collection::vec((-1e3..1e3_f64, -1e3..1e3_f64), 0..100),
    ) {
        let mut mm = OnlineMixture::new(k, MixturePrior::default()).unwrap();
        mm.ingest_many(&xs).unwrap();
        let h = mm.entropy();
        prop_assert!(h >= 0.0);
        prop_assert!(h <= (k as f64).log2() + 1e-9);
    }
}
