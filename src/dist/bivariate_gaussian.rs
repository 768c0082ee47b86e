//! Bivariate Gaussian/Normal distribution over (x, y) in ℝ²
#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::PI;
use std::fmt;

use crate::consts::LN_2PI;
use crate::impl_display;
use crate::traits::{Mean, Parameterized, Sampleable, Variance};

/// Bivariate Gaussian, N(μ, Σ), with
///
/// ```text
///     μ = [μx, μy]      Σ = [ var_x   cov_xy ]
///                           [ cov_xy  var_y  ]
/// ```
///
/// Unlike most distributions, the parameters of a `BivariateGaussian` may be
/// driven into a degenerate state by online updates, so every quantity that
/// depends on Σ⁻¹ is fallible.
///
/// # Example
///
/// ```
/// use bivmix::dist::BivariateGaussian;
///
/// let gauss = BivariateGaussian::new(1.0, -1.0, 2.0, 1.0, 0.5).unwrap();
/// let f = gauss.pdf(1.0, -1.0).unwrap();
///
/// // the density at the mean is 1 / (2π sqrt(det Σ))
/// let expected = 1.0 / (2.0 * std::f64::consts::PI * 1.75_f64.sqrt());
/// assert!((f - expected).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct BivariateGaussian {
    mu_x: f64,
    mu_y: f64,
    var_x: f64,
    var_y: f64,
    cov_xy: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct BivariateGaussianParameters {
    pub mu_x: f64,
    pub mu_y: f64,
    pub var_x: f64,
    pub var_y: f64,
    pub cov_xy: f64,
}

impl Parameterized for BivariateGaussian {
    type Parameters = BivariateGaussianParameters;

    fn emit_params(&self) -> Self::Parameters {
        Self::Parameters {
            mu_x: self.mu_x,
            mu_y: self.mu_y,
            var_x: self.var_x,
            var_y: self.var_y,
            cov_xy: self.cov_xy,
        }
    }

    fn from_params(params: Self::Parameters) -> Self {
        Self::new_unchecked(
            params.mu_x,
            params.mu_y,
            params.var_x,
            params.var_y,
            params.cov_xy,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum BivariateGaussianError {
    /// One of the mean coordinates is infinite or NaN
    MeanNotFinite { mu_x: f64, mu_y: f64 },
    /// One of the variances is infinite or NaN
    VarianceNotFinite { var_x: f64, var_y: f64 },
    /// One of the variances is less than or equal to zero
    VarianceTooLow { var_x: f64, var_y: f64 },
    /// The covariance is infinite or NaN
    CovarianceNotFinite { cov_xy: f64 },
    /// The covariance determinant, var_x·var_y - cov_xy², is not positive
    DegenerateCovariance { det: f64 },
}

impl BivariateGaussian {
    /// Create a new bivariate Gaussian
    ///
    /// # Arguments
    /// - mu_x, mu_y: mean
    /// - var_x, var_y: variances along each axis
    /// - cov_xy: covariance between the axes
    pub fn new(
        mu_x: f64,
        mu_y: f64,
        var_x: f64,
        var_y: f64,
        cov_xy: f64,
    ) -> Result<Self, BivariateGaussianError> {
        if !mu_x.is_finite() || !mu_y.is_finite() {
            Err(BivariateGaussianError::MeanNotFinite { mu_x, mu_y })
        } else if !var_x.is_finite() || !var_y.is_finite() {
            Err(BivariateGaussianError::VarianceNotFinite { var_x, var_y })
        } else if var_x <= 0.0 || var_y <= 0.0 {
            Err(BivariateGaussianError::VarianceTooLow { var_x, var_y })
        } else if !cov_xy.is_finite() {
            Err(BivariateGaussianError::CovarianceNotFinite { cov_xy })
        } else {
            let gauss = Self::new_unchecked(mu_x, mu_y, var_x, var_y, cov_xy);
            gauss.checked_cov_det().map(|_| gauss)
        }
    }

    /// Creates a new bivariate Gaussian without checking whether the
    /// parameters are valid.
    #[inline]
    #[must_use]
    pub fn new_unchecked(
        mu_x: f64,
        mu_y: f64,
        var_x: f64,
        var_y: f64,
        cov_xy: f64,
    ) -> Self {
        BivariateGaussian {
            mu_x,
            mu_y,
            var_x,
            var_y,
            cov_xy,
        }
    }

    /// Axis-aligned Gaussian at the origin with variances `var_x` and `var_y`.
    ///
    /// Not validated; a zero variance yields a degenerate distribution.
    #[inline]
    #[must_use]
    pub fn diagonal_unchecked(var_x: f64, var_y: f64) -> Self {
        Self::new_unchecked(0.0, 0.0, var_x, var_y, 0.0)
    }

    /// Standard bivariate normal, N(0, I)
    ///
    /// # Example
    ///
    /// ```rust
    /// # use bivmix::dist::BivariateGaussian;
    /// let gauss = BivariateGaussian::standard();
    ///
    /// let expected = BivariateGaussian::new(0.0, 0.0, 1.0, 1.0, 0.0).unwrap();
    /// assert_eq!(gauss, expected);
    /// ```
    #[inline]
    #[must_use]
    pub fn standard() -> Self {
        Self::diagonal_unchecked(1.0, 1.0)
    }

    /// Get the mean as an `(x, y)` pair
    #[inline]
    #[must_use]
    pub fn mu(&self) -> (f64, f64) {
        (self.mu_x, self.mu_y)
    }

    #[inline]
    #[must_use]
    pub fn mu_x(&self) -> f64 {
        self.mu_x
    }

    #[inline]
    #[must_use]
    pub fn mu_y(&self) -> f64 {
        self.mu_y
    }

    /// Set the mean without input validation
    #[inline]
    pub fn set_mu_unchecked(&mut self, mu_x: f64, mu_y: f64) {
        self.mu_x = mu_x;
        self.mu_y = mu_y;
    }

    #[inline]
    #[must_use]
    pub fn var_x(&self) -> f64 {
        self.var_x
    }

    #[inline]
    #[must_use]
    pub fn var_y(&self) -> f64 {
        self.var_y
    }

    #[inline]
    #[must_use]
    pub fn cov_xy(&self) -> f64 {
        self.cov_xy
    }

    /// Determinant of the covariance matrix, var_x·var_y - cov_xy²
    #[inline]
    #[must_use]
    pub fn cov_det(&self) -> f64 {
        self.var_x.mul_add(self.var_y, -self.cov_xy * self.cov_xy)
    }

    fn checked_cov_det(&self) -> Result<f64, BivariateGaussianError> {
        let det = self.cov_det();
        if det > 0.0 && det.is_finite() {
            Ok(det)
        } else {
            Err(BivariateGaussianError::DegenerateCovariance { det })
        }
    }

    /// Quadratic form (p - μ)ᵀ Σ⁻¹ (p - μ) given the covariance determinant
    #[inline]
    fn mahalanobis_sq(&self, x: f64, y: f64, det: f64) -> f64 {
        let det_inv = det.recip();
        let inv_xx = self.var_y * det_inv;
        let inv_xy = -self.cov_xy * det_inv;
        let inv_yy = self.var_x * det_inv;

        let dx = x - self.mu_x;
        let dy = y - self.mu_y;

        let e = dx.mul_add(inv_xx, dy * inv_xy);
        let f = dx.mul_add(inv_xy, dy * inv_yy);

        e.mul_add(dx, f * dy)
    }

    /// Probability density at `(x, y)`
    ///
    /// # Errors
    ///
    /// Returns `DegenerateCovariance` if the covariance determinant is not
    /// positive, in which case neither Σ⁻¹ nor the normalizer exist.
    ///
    /// # Example
    ///
    /// ```
    /// # use bivmix::dist::BivariateGaussian;
    /// let flat = BivariateGaussian::diagonal_unchecked(0.0, 0.0);
    /// assert!(flat.pdf(0.0, 0.0).is_err());
    /// ```
    pub fn pdf(&self, x: f64, y: f64) -> Result<f64, BivariateGaussianError> {
        let det = self.checked_cov_det()?;
        let z = (2.0 * PI * det.sqrt()).recip();
        Ok(z * (-0.5 * self.mahalanobis_sq(x, y, det)).exp())
    }

    /// Log probability density at `(x, y)`
    ///
    /// # Errors
    ///
    /// Same conditions as [`pdf`](BivariateGaussian::pdf).
    pub fn ln_pdf(
        &self,
        x: f64,
        y: f64,
    ) -> Result<f64, BivariateGaussianError> {
        let det = self.checked_cov_det()?;
        let q = self.mahalanobis_sq(x, y, det);
        Ok(0.5_f64.mul_add(-det.ln(), -LN_2PI) - 0.5 * q)
    }

    /// Approximate orientation of the covariance ellipse.
    ///
    /// The eigenvalues λ₁ ≥ λ₂ of Σ come from the quadratic formula on the
    /// characteristic polynomial λ² - tr(Σ)λ + det(Σ); the angle reported is
    /// `atan2(λ₁, λ₂)`. Intended for drawing, not for geometry.
    ///
    /// # Errors
    ///
    /// Returns `DegenerateCovariance` when the determinant is not positive.
    pub fn ellipse_angle(&self) -> Result<f64, BivariateGaussianError> {
        let c = self.checked_cov_det()?;
        let b = -self.var_x - self.var_y;
        let d = b.mul_add(b, -4.0 * c).max(0.0).sqrt();
        let l1 = (-b + d) / 2.0;
        let l2 = (-b - d) / 2.0;
        Ok(l1.atan2(l2))
    }

    /// Fold `(x, y)` into the running mean and covariance as the `n`-th
    /// observation.
    ///
    /// The covariance is pulled toward the outer product of the pre-update
    /// deviation, scaled by `1 - 1/n`, with step `1/n`. Nothing but the
    /// current estimate is stored.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `n` is zero.
    pub fn observe(&mut self, x: f64, y: f64, n: usize) {
        debug_assert!(n > 0, "observation index starts at 1");

        let dx = x - self.mu_x;
        let dy = y - self.mu_y;
        let rate = (n as f64).recip();

        self.mu_x = dx.mul_add(rate, self.mu_x);
        self.mu_y = dy.mul_add(rate, self.mu_y);

        let a = 1.0 - rate;
        self.var_x =
            (a * dx).mul_add(dx, -self.var_x).mul_add(rate, self.var_x);
        self.var_y =
            (a * dy).mul_add(dy, -self.var_y).mul_add(rate, self.var_y);
        self.cov_xy =
            (a * dx).mul_add(dy, -self.cov_xy).mul_add(rate, self.cov_xy);
    }

    /// Single draw, or an error if Σ is not positive definite
    pub fn try_draw<R: Rng>(
        &self,
        rng: &mut R,
    ) -> Result<(f64, f64), BivariateGaussianError> {
        let det = self.checked_cov_det()?;
        if self.var_x <= 0.0 {
            return Err(BivariateGaussianError::VarianceTooLow {
                var_x: self.var_x,
                var_y: self.var_y,
            });
        }

        // lower Cholesky factor of Σ
        let l11 = self.var_x.sqrt();
        let l21 = self.cov_xy / l11;
        let l22 = (det / self.var_x).sqrt();

        let z1: f64 = rng.sample(StandardNormal);
        let z2: f64 = rng.sample(StandardNormal);

        let x = l11.mul_add(z1, self.mu_x);
        let y = l21.mul_add(z1, l22.mul_add(z2, self.mu_y));
        Ok((x, y))
    }
}

impl Default for BivariateGaussian {
    fn default() -> Self {
        BivariateGaussian::standard()
    }
}

impl From<&BivariateGaussian> for String {
    fn from(gauss: &BivariateGaussian) -> String {
        format!(
            "N₂(μ: [{}, {}], Σ: [[{}, {}], [{}, {}]])",
            gauss.mu_x,
            gauss.mu_y,
            gauss.var_x,
            gauss.cov_xy,
            gauss.cov_xy,
            gauss.var_y
        )
    }
}

impl_display!(BivariateGaussian);

impl Sampleable<(f64, f64)> for BivariateGaussian {
    fn draw<R: Rng>(&self, rng: &mut R) -> (f64, f64) {
        self.try_draw(rng)
            .unwrap_or_else(|err| panic!("Cannot draw from {self}: {err}"))
    }
}

impl Mean<(f64, f64)> for BivariateGaussian {
    fn mean(&self) -> Option<(f64, f64)> {
        Some(self.mu())
    }
}

impl Variance<(f64, f64)> for BivariateGaussian {
    fn variance(&self) -> Option<(f64, f64)> {
        Some((self.var_x, self.var_y))
    }
}

impl std::error::Error for BivariateGaussianError {}

impl fmt::Display for BivariateGaussianError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MeanNotFinite { mu_x, mu_y } => {
                write!(f, "non-finite mean: ({mu_x}, {mu_y})")
            }
            Self::VarianceNotFinite { var_x, var_y } => {
                write!(f, "non-finite variance: ({var_x}, {var_y})")
            }
            Self::VarianceTooLow { var_x, var_y } => write!(
                f,
                "variances ({var_x}, {var_y}) must be greater than zero"
            ),
            Self::CovarianceNotFinite { cov_xy } => {
                write!(f, "non-finite covariance: {cov_xy}")
            }
            Self::DegenerateCovariance { det } => write!(
                f,
                "covariance determinant ({det}) must be greater than zero"
            ),
        }
    }
}
