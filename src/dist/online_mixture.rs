//! Online (streaming) EM estimate of a bivariate Gaussian mixture
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use log::{debug, trace};
use rand::Rng;
use std::fmt;

use crate::consts::DEFAULT_PRIOR_VARIANCE;
use crate::dist::{BivariateGaussian, BivariateGaussianError};
use crate::misc::{logsumexp, pflip};
use crate::traits::{Parameterized, Sampleable};

mod merge;
mod stats;

/// Prior diagonal covariance given to every component before data arrives.
///
/// Should be large relative to the spread of the data. It is only visible
/// until a component receives its second point, and as the fallback of
/// [`OnlineMixture::mean_covariance`] on an empty mixture.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct MixturePrior {
    /// Variance along x
    pub var_x: f64,
    /// Variance along y
    pub var_y: f64,
}

impl MixturePrior {
    pub fn new(var_x: f64, var_y: f64) -> Self {
        MixturePrior { var_x, var_y }
    }
}

impl Default for MixturePrior {
    fn default() -> Self {
        MixturePrior {
            var_x: DEFAULT_PRIOR_VARIANCE,
            var_y: DEFAULT_PRIOR_VARIANCE,
        }
    }
}

/// One slot of an [`OnlineMixture`]: a mixing weight, the number of points
/// hard-assigned to the slot, and the slot's Gaussian.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct MixtureComponent {
    weight: f64,
    n: usize,
    gauss: BivariateGaussian,
}

impl MixtureComponent {
    /// Assemble a component from parts without validation
    pub fn new_unchecked(
        weight: f64,
        n: usize,
        gauss: BivariateGaussian,
    ) -> Self {
        MixtureComponent { weight, n, gauss }
    }

    /// Estimated mixing proportion
    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Number of points assigned to this component
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// The component distribution
    #[inline]
    pub fn gauss(&self) -> &BivariateGaussian {
        &self.gauss
    }
}

/// Mixture of `K` bivariate Gaussians estimated online, one point at a time.
///
/// The first `K` points seed one component each. Every later point is
/// hard-assigned to the component with the largest responsibility (E-step)
/// and only that component's mean and covariance move (M-step); all weights
/// decay toward the one-hot assignment at rate `1/n`. No points are stored.
///
/// This is a heuristic approximation of EM, not an optimizer: it has no
/// convergence guarantee and identical repeated points shrink a component's
/// covariance toward zero.
///
/// # Example
///
/// ```
/// use bivmix::prelude::*;
///
/// let mut mixture = OnlineMixture::new(1, MixturePrior::default()).unwrap();
/// mixture.ingest(10.0, 10.0).unwrap();
///
/// assert_eq!(mixture.component(0).gauss().mu(), (10.0, 10.0));
/// assert_eq!(mixture.component_n(0), 1);
/// assert_eq!(mixture.weight(0), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "serde1", serde(try_from = "OnlineMixtureParameters"))]
#[cfg_attr(feature = "serde1", serde(into = "OnlineMixtureParameters"))]
pub struct OnlineMixture {
    components: Vec<MixtureComponent>,
    /// Number of points ingested
    n: usize,
    prior: MixturePrior,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct OnlineMixtureParameters {
    pub components: Vec<MixtureComponent>,
    pub n: usize,
    pub prior: MixturePrior,
}

impl Parameterized for OnlineMixture {
    type Parameters = OnlineMixtureParameters;

    fn emit_params(&self) -> Self::Parameters {
        Self::Parameters {
            components: self.components.clone(),
            n: self.n,
            prior: self.prior,
        }
    }

    fn from_params(params: Self::Parameters) -> Self {
        OnlineMixture {
            components: params.components,
            n: params.n,
            prior: params.prior,
        }
    }
}

impl TryFrom<OnlineMixtureParameters> for OnlineMixture {
    type Error = OnlineMixtureError;

    fn try_from(
        params: OnlineMixtureParameters,
    ) -> Result<Self, Self::Error> {
        if params.components.is_empty() {
            return Err(OnlineMixtureError::ZeroComponents);
        }

        let n = params.n;
        let total: usize = params.components.iter().map(|c| c.n).sum();
        // while seeding, exactly the first `n` slots hold one point each
        let seeding_in_order = n >= params.components.len()
            || params
                .components
                .iter()
                .enumerate()
                .all(|(ix, c)| c.n == usize::from(ix < n));

        if total != n || !seeding_in_order {
            Err(OnlineMixtureError::InconsistentCounts { n, total })
        } else {
            Ok(Self::from_params(params))
        }
    }
}

impl From<OnlineMixture> for OnlineMixtureParameters {
    fn from(mixture: OnlineMixture) -> Self {
        OnlineMixtureParameters {
            components: mixture.components,
            n: mixture.n,
            prior: mixture.prior,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum OnlineMixtureError {
    /// The mixture must have at least one component
    ZeroComponents,
    /// A prior variance is less than or equal to zero
    PriorVarianceTooLow { var_x: f64, var_y: f64 },
    /// A prior variance is infinite or NaN
    PriorVarianceNotFinite { var_x: f64, var_y: f64 },
    /// An ingested coordinate is infinite or NaN
    PointNotFinite { x: f64, y: f64 },
    /// Component `k` cannot be evaluated
    Degenerate {
        k: usize,
        source: BivariateGaussianError,
    },
    /// Two mixtures with different numbers of components were combined
    ComponentCountMismatch { expected: usize, found: usize },
    /// The point count does not agree with the per-component counts
    InconsistentCounts { n: usize, total: usize },
    /// The mixture has no weight to draw from
    Unseeded,
}

impl OnlineMixture {
    /// Create an empty mixture with `k` components
    ///
    /// # Arguments
    /// - k: number of components, fixed for the life of the mixture
    /// - prior: initial diagonal covariance of every component
    pub fn new(
        k: usize,
        prior: MixturePrior,
    ) -> Result<Self, OnlineMixtureError> {
        let MixturePrior { var_x, var_y } = prior;
        if k == 0 {
            Err(OnlineMixtureError::ZeroComponents)
        } else if !var_x.is_finite() || !var_y.is_finite() {
            Err(OnlineMixtureError::PriorVarianceNotFinite { var_x, var_y })
        } else if var_x <= 0.0 || var_y <= 0.0 {
            Err(OnlineMixtureError::PriorVarianceTooLow { var_x, var_y })
        } else {
            Ok(Self::new_unchecked(k, prior))
        }
    }

    /// Create an empty mixture without validating the prior.
    ///
    /// A zero prior variance is allowed here and yields components whose
    /// density is undefined. `k` must still be at least 1.
    #[must_use]
    pub fn new_unchecked(k: usize, prior: MixturePrior) -> Self {
        let gauss =
            BivariateGaussian::diagonal_unchecked(prior.var_x, prior.var_y);
        let components = (0..k)
            .map(|_| MixtureComponent::new_unchecked(0.0, 0, gauss.clone()))
            .collect();

        OnlineMixture {
            components,
            n: 0,
            prior,
        }
    }

    /// Number of components, `K`
    #[inline]
    pub fn k(&self) -> usize {
        self.components.len()
    }

    /// Number of points ingested
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// `true` if no point has been ingested
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// `true` once every component has been seeded with a point
    #[inline]
    pub fn is_seeded(&self) -> bool {
        self.n >= self.k()
    }

    /// The prior diagonal covariance the mixture was built with
    #[inline]
    pub fn prior(&self) -> MixturePrior {
        self.prior
    }

    #[inline]
    pub fn components(&self) -> &[MixtureComponent] {
        &self.components
    }

    /// The `k`-th component
    ///
    /// # Panics
    ///
    /// Panics if `k` is not in `[0, K)`.
    #[inline]
    pub fn component(&self, k: usize) -> &MixtureComponent {
        &self.components[k]
    }

    /// Weight of the `k`-th component
    ///
    /// # Panics
    ///
    /// Panics if `k` is not in `[0, K)`.
    #[inline]
    pub fn weight(&self, k: usize) -> f64 {
        self.components[k].weight
    }

    /// Number of points assigned to the `k`-th component
    ///
    /// # Panics
    ///
    /// Panics if `k` is not in `[0, K)`.
    #[inline]
    pub fn component_n(&self, k: usize) -> usize {
        self.components[k].n
    }

    pub fn weights(&self) -> Vec<f64> {
        self.components.iter().map(|cpnt| cpnt.weight).collect()
    }

    /// Density of the `k`-th component at `(x, y)`, not scaled by its weight
    ///
    /// # Panics
    ///
    /// Panics if `k` is not in `[0, K)`.
    pub fn density(
        &self,
        x: f64,
        y: f64,
        k: usize,
    ) -> Result<f64, BivariateGaussianError> {
        self.components[k].gauss.pdf(x, y)
    }

    /// Log density of the whole mixture at `(x, y)`
    ///
    /// Components with zero weight are skipped. An empty mixture has no mass
    /// anywhere and returns `-∞`.
    pub fn ln_f(&self, x: f64, y: f64) -> Result<f64, OnlineMixtureError> {
        let terms = self
            .components
            .iter()
            .enumerate()
            .filter(|(_, cpnt)| cpnt.weight > 0.0)
            .map(|(k, cpnt)| {
                cpnt.gauss
                    .ln_pdf(x, y)
                    .map(|ln_f| cpnt.weight.ln() + ln_f)
                    .map_err(|source| OnlineMixtureError::Degenerate {
                        k,
                        source,
                    })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        if terms.is_empty() {
            Ok(f64::NEG_INFINITY)
        } else {
            Ok(logsumexp(&terms))
        }
    }

    /// Normalized probability that each component generated `(x, y)`
    ///
    /// When every weighted density underflows to zero the normalization is
    /// undefined and every entry is NaN.
    pub fn responsibilities(
        &self,
        x: f64,
        y: f64,
    ) -> Result<Vec<f64>, OnlineMixtureError> {
        let mut ps = self
            .components
            .iter()
            .enumerate()
            .map(|(k, cpnt)| {
                cpnt.gauss
                    .pdf(x, y)
                    .map(|f| f * cpnt.weight)
                    .map_err(|source| OnlineMixtureError::Degenerate {
                        k,
                        source,
                    })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let sum: f64 = ps.iter().sum();
        ps.iter_mut().for_each(|p| *p /= sum);
        Ok(ps)
    }

    /// Add one point to the estimate.
    ///
    /// While fewer than `K` points have been seen the point seeds the next
    /// component. Afterwards it runs one E-step and one M-step.
    ///
    /// # Errors
    ///
    /// - `PointNotFinite` if either coordinate is NaN or infinite.
    /// - `Degenerate` if a component's covariance is no longer positive
    ///   definite, so responsibilities cannot be computed.
    ///
    /// The mixture is left untouched on error.
    pub fn ingest(&mut self, x: f64, y: f64) -> Result<(), OnlineMixtureError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(OnlineMixtureError::PointNotFinite { x, y });
        }

        if self.is_seeded() {
            let max_k = self.estep(x, y)?;
            self.mstep(x, y, max_k);
        } else {
            self.seed(x, y);
        }
        Ok(())
    }

    /// Ingest each point in order, stopping at the first error
    pub fn ingest_many(
        &mut self,
        points: &[(f64, f64)],
    ) -> Result<(), OnlineMixtureError> {
        points.iter().try_for_each(|&(x, y)| self.ingest(x, y))
    }

    /// Center the next unseeded component on `(x, y)` and make the weights
    /// uniform over the seeded components.
    fn seed(&mut self, x: f64, y: f64) {
        self.n += 1;
        let ix = self.n - 1;

        let cpnt = &mut self.components[ix];
        cpnt.gauss.set_mu_unchecked(x, y);
        cpnt.n += 1;

        let w = (self.n as f64).recip();
        self.components[..self.n]
            .iter_mut()
            .for_each(|cpnt| cpnt.weight = w);

        if self.is_seeded() {
            debug!("all {} components seeded", self.k());
        }
    }

    /// Index of the component most responsible for `(x, y)`.
    ///
    /// Scans from index 0 and only moves on a strictly greater value, so ties
    /// go to the lowest index and an all-NaN vector yields 0.
    fn estep(&self, x: f64, y: f64) -> Result<usize, OnlineMixtureError> {
        let rs = self.responsibilities(x, y)?;

        let mut max_r = 0.0;
        let mut max_k = 0;
        for (k, &r) in rs.iter().enumerate() {
            if r > max_r {
                max_r = r;
                max_k = k;
            }
        }

        trace!("({x}, {y}) assigned to component {max_k} (r = {max_r})");
        Ok(max_k)
    }

    fn mstep(&mut self, x: f64, y: f64, max_k: usize) {
        self.n += 1;
        let n_inv = (self.n as f64).recip();

        self.components
            .iter_mut()
            .enumerate()
            .for_each(|(k, cpnt)| {
                let z = if k == max_k { 1.0 } else { 0.0 };
                cpnt.weight = (z - cpnt.weight).mul_add(n_inv, cpnt.weight);
            });

        let cpnt = &mut self.components[max_k];
        cpnt.n += 1;
        cpnt.gauss.observe(x, y, cpnt.n);
    }

    /// Single draw, or an error if the mixture has no weight or the chosen
    /// component is degenerate
    pub fn try_draw<R: Rng>(
        &self,
        rng: &mut R,
    ) -> Result<(f64, f64), OnlineMixtureError> {
        let weights = self.weights();
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(OnlineMixtureError::Unseeded);
        }

        let k = pflip(&weights, 1, &mut *rng)[0];
        self.components[k]
            .gauss
            .try_draw(rng)
            .map_err(|source| OnlineMixtureError::Degenerate { k, source })
    }
}

impl Default for OnlineMixture {
    /// A single-component mixture with the default prior
    fn default() -> Self {
        OnlineMixture::new_unchecked(1, MixturePrior::default())
    }
}

impl Sampleable<(f64, f64)> for OnlineMixture {
    fn draw<R: Rng>(&self, rng: &mut R) -> (f64, f64) {
        self.try_draw(rng)
            .unwrap_or_else(|err| panic!("Cannot draw from mixture: {err}"))
    }
}

impl std::error::Error for OnlineMixtureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Degenerate { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for OnlineMixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroComponents => {
                write!(f, "a mixture must have at least one component")
            }
            Self::PriorVarianceTooLow { var_x, var_y } => write!(
                f,
                "prior variances ({var_x}, {var_y}) must be greater than zero"
            ),
            Self::PriorVarianceNotFinite { var_x, var_y } => {
                write!(f, "non-finite prior variance: ({var_x}, {var_y})")
            }
            Self::PointNotFinite { x, y } => {
                write!(f, "non-finite point: ({x}, {y})")
            }
            Self::Degenerate { k, source } => {
                write!(f, "component {k} is degenerate: {source}")
            }
            Self::ComponentCountMismatch { expected, found } => write!(
                f,
                "expected a mixture with {expected} components, found {found}"
            ),
            Self::InconsistentCounts { n, total } => write!(
                f,
                "mixture of {n} points has component counts summing to \
                 {total} or seeded out of order"
            ),
            Self::Unseeded => write!(f, "the mixture has no data"),
        }
    }
}
