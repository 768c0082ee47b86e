use itertools::Itertools;
use log::debug;

use super::{MixtureComponent, OnlineMixture, OnlineMixtureError};

/// Components ordered by descending weight; equal weights keep their order.
fn by_weight_desc(components: &[MixtureComponent]) -> Vec<MixtureComponent> {
    components
        .iter()
        .cloned()
        .sorted_by(|a, b| b.weight.total_cmp(&a.weight))
        .collect()
}

impl OnlineMixture {
    /// Combine `other` into `self`.
    ///
    /// Both mixtures are ranked by weight and the `K` output slots are filled
    /// by repeatedly taking the heavier of the two next-ranked components
    /// (ties go to `self`). Point counts of the chosen components are summed
    /// into the new total and the chosen weights are renormalized.
    ///
    /// Components are paired by rank, not by location, so this is only
    /// meaningful when both mixtures settled on similar clusters.
    ///
    /// - An empty `self` becomes a copy of `other`.
    /// - An empty `other`, or one equal to `self`, leaves `self` unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ComponentCountMismatch` if the mixtures have different `K`;
    /// `self` is not modified.
    ///
    /// # Example
    ///
    /// ```
    /// use bivmix::prelude::*;
    ///
    /// let mut a = OnlineMixture::new(2, MixturePrior::default()).unwrap();
    /// let mut b = OnlineMixture::new(2, MixturePrior::default()).unwrap();
    ///
    /// a.ingest_many(&[(0.0, 0.0), (50.0, 50.0), (1.0, 0.0)]).unwrap();
    /// b.ingest_many(&[(50.0, 50.0), (0.0, 0.0), (51.0, 50.0)]).unwrap();
    ///
    /// a.merge(&b).unwrap();
    ///
    /// assert_eq!(a.k(), 2);
    /// assert_eq!(a.n(), 4);
    /// assert!((a.weight(0) + a.weight(1) - 1.0).abs() < 1e-12);
    /// ```
    pub fn merge(&mut self, other: &Self) -> Result<(), OnlineMixtureError> {
        let k = self.k();
        if other.k() != k {
            return Err(OnlineMixtureError::ComponentCountMismatch {
                expected: k,
                found: other.k(),
            });
        }

        if self == other || other.is_empty() {
            debug!("merge is a no-op");
            return Ok(());
        }

        if self.is_empty() {
            debug!("merging into an empty mixture; taking the other");
            *self = other.clone();
            return Ok(());
        }

        let mut lhs = by_weight_desc(&self.components).into_iter().peekable();
        let mut rhs = by_weight_desc(&other.components).into_iter().peekable();

        let mut merged: Vec<MixtureComponent> = Vec::with_capacity(k);
        let mut n = 0;
        let mut weight_sum = 0.0;

        for _ in 0..k {
            let take_lhs = match (lhs.peek(), rhs.peek()) {
                (Some(a), Some(b)) => a.weight >= b.weight,
                (Some(_), None) => true,
                (None, _) => false,
            };

            let next = if take_lhs { lhs.next() } else { rhs.next() };
            // 2K candidates for K slots, so a cursor always has one left
            if let Some(cpnt) = next {
                n += cpnt.n;
                weight_sum += cpnt.weight;
                merged.push(cpnt);
            }
        }

        debug!(
            "merged {} + {} points into {} (weight sum {})",
            self.n, other.n, n, weight_sum
        );

        if weight_sum > 0.0 {
            let w_inv = weight_sum.recip();
            merged.iter_mut().for_each(|cpnt| cpnt.weight *= w_inv);
        }

        self.components = merged;
        self.n = n;
        Ok(())
    }

    /// The merge of `a` and `b` as a new mixture. See
    /// [`merge`](OnlineMixture::merge).
    pub fn merged(a: &Self, b: &Self) -> Result<Self, OnlineMixtureError> {
        let mut out = a.clone();
        out.merge(b)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::{BivariateGaussian, MixturePrior};
    use crate::traits::Parameterized;
    use crate::dist::OnlineMixtureParameters;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256Plus;

    const TOL: f64 = 1E-12;

    /// Build a mixture from (weight, n, mu_x, mu_y) tuples
    fn mixture(cpnts: &[(f64, usize, f64, f64)]) -> OnlineMixture {
        let components: Vec<MixtureComponent> = cpnts
            .iter()
            .map(|&(w, n, x, y)| {
                let gauss =
                    BivariateGaussian::new_unchecked(x, y, 1.0, 1.0, 0.0);
                MixtureComponent::new_unchecked(w, n, gauss)
            })
            .collect();
        let n = components.iter().map(|c| c.n()).sum();
        OnlineMixture::from_params(OnlineMixtureParameters {
            components,
            n,
            prior: MixturePrior::default(),
        })
    }

    fn trained(seed: u64, n: usize) -> OnlineMixture {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let mut mm = OnlineMixture::new(3, MixturePrior::default()).unwrap();
        for _ in 0..n {
            let shift = if rng.gen::<bool>() { 0.0 } else { 100.0 };
            let x: f64 = rng.gen_range(50.0..150.0);
            let y: f64 = rng.gen_range(25.0..75.0) + shift;
            mm.ingest(x, y).unwrap();
        }
        mm
    }

    #[test]
    fn mismatched_k_is_rejected() {
        let mut a = trained(1, 20);
        let before = a.clone();
        let b = OnlineMixture::new(2, MixturePrior::default()).unwrap();

        assert_eq!(
            a.merge(&b),
            Err(OnlineMixtureError::ComponentCountMismatch {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(a, before);
    }

    #[test]
    fn empty_lhs_becomes_rhs() {
        let mut a = OnlineMixture::new(3, MixturePrior::new(1.0, 2.0)).unwrap();
        let b = trained(2, 50);
        a.merge(&b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_rhs_is_noop() {
        let mut a = trained(3, 50);
        let before = a.clone();
        let b = OnlineMixture::new(3, MixturePrior::default()).unwrap();
        a.merge(&b).unwrap();
        assert_eq!(a, before);
    }

    #[test]
    fn both_empty_is_empty() {
        let a = OnlineMixture::new(3, MixturePrior::default()).unwrap();
        let b = OnlineMixture::new(3, MixturePrior::default()).unwrap();
        let c = OnlineMixture::merged(&a, &b).unwrap();
        assert!(c.is_empty());
        assert_eq!(c, a);
    }

    #[test]
    fn self_merge_is_noop() {
        let mut a = trained(4, 200);
        let copy = a.clone();
        a.merge(&copy).unwrap();
        assert_eq!(a, copy);
    }

    #[test]
    fn interleaves_by_weight() {
        let a = mixture(&[(0.3, 3, 0.0, 0.0), (0.7, 7, 1.0, 1.0)]);
        let b = mixture(&[(0.4, 4, 2.0, 2.0), (0.6, 6, 3.0, 3.0)]);
        let c = OnlineMixture::merged(&a, &b).unwrap();

        assert_eq!(c.k(), 2);
        assert_eq!(c.n(), 13);
        assert_eq!(c.component(0).gauss().mu(), (1.0, 1.0));
        assert_eq!(c.component(1).gauss().mu(), (3.0, 3.0));
        assert::close(c.weight(0), 0.7 / 1.3, TOL);
        assert::close(c.weight(1), 0.6 / 1.3, TOL);
    }

    #[test]
    fn interleaves_three_components() {
        let a = mixture(&[
            (0.2, 2, 0.0, 0.0),
            (0.5, 5, 1.0, 1.0),
            (0.3, 3, 2.0, 2.0),
        ]);
        let b = mixture(&[
            (0.15, 3, 3.0, 3.0),
            (0.25, 5, 4.0, 4.0),
            (0.6, 12, 5.0, 5.0),
        ]);
        let c = OnlineMixture::merged(&a, &b).unwrap();

        let mus: Vec<(f64, f64)> =
            c.components().iter().map(|c| c.gauss().mu()).collect();
        assert_eq!(mus, vec![(5.0, 5.0), (1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(c.n(), 12 + 5 + 3);
        assert::close(c.weight(0), 0.6 / 1.4, TOL);
        assert::close(c.weight(1), 0.5 / 1.4, TOL);
        assert::close(c.weight(2), 0.3 / 1.4, TOL);
    }

    #[test]
    fn ties_prefer_lhs() {
        let a = mixture(&[(0.5, 5, 0.0, 0.0), (0.5, 5, 1.0, 1.0)]);
        let b = mixture(&[(0.5, 5, 2.0, 2.0), (0.5, 5, 3.0, 3.0)]);
        let c = OnlineMixture::merged(&a, &b).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn merged_weights_sum_to_one() {
        let a = trained(5, 300);
        let b = trained(6, 500);
        let c = OnlineMixture::merged(&a, &b).unwrap();

        assert_eq!(c.k(), 3);
        assert::close(c.weights().iter().sum::<f64>(), 1.0, TOL);
        assert_eq!(c.n(), c.components().iter().map(|c| c.n()).sum::<usize>());
    }

    #[test]
    fn merged_mixture_keeps_learning() {
        let a = trained(7, 100);
        let b = trained(8, 100);
        let mut c = OnlineMixture::merged(&a, &b).unwrap();
        let n = c.n();
        c.ingest(100.0, 50.0).unwrap();
        assert_eq!(c.n(), n + 1);
        assert::close(c.weights().iter().sum::<f64>(), 1.0, 1e-10);
    }
}
