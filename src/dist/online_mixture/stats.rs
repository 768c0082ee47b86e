use super::OnlineMixture;
use crate::consts::ENTROPY_WEIGHT_FLOOR;
use crate::misc::weight_entropy;
use crate::traits::{Entropy, Mean, Variance};

impl OnlineMixture {
    /// Average over both axes of the weighted within-component variances.
    ///
    /// An empty mixture has no weights to average with, so the mean of the
    /// two prior variances is returned instead.
    pub fn mean_covariance(&self) -> f64 {
        if self.is_empty() {
            return (self.prior.var_x + self.prior.var_y) * 0.5;
        }

        let (s_x, s_y) =
            self.components.iter().fold((0.0, 0.0), |(s_x, s_y), cpnt| {
                (
                    cpnt.weight.mul_add(cpnt.gauss.var_x(), s_x),
                    cpnt.weight.mul_add(cpnt.gauss.var_y(), s_y),
                )
            });

        (s_x + s_y) * 0.5
    }
}

/// Weighted mean of the component means.
impl Mean<(f64, f64)> for OnlineMixture {
    /// `None` until a point has been ingested. An empty mixture has no
    /// weight on any component, so there is no mean to report, rather than
    /// a mean of `(0, 0)`.
    fn mean(&self) -> Option<(f64, f64)> {
        if self.is_empty() {
            return None;
        }

        let mean = self.components.iter().fold((0.0, 0.0), |(m_x, m_y), cpnt| {
            (
                cpnt.weight.mul_add(cpnt.gauss.mu_x(), m_x),
                cpnt.weight.mul_add(cpnt.gauss.mu_y(), m_y),
            )
        });
        Some(mean)
    }
}

/// Per-axis variance by the law of total variance: the spread of the
/// component means about the mixture mean plus the weighted
/// within-component variances.
impl Variance<(f64, f64)> for OnlineMixture {
    /// `None` on an empty mixture, like [`Mean::mean`].
    fn variance(&self) -> Option<(f64, f64)> {
        let (m_x, m_y) = self.mean()?;

        let var = self.components.iter().fold((0.0, 0.0), |(s_x, s_y), cpnt| {
            let dx = cpnt.gauss.mu_x() - m_x;
            let dy = cpnt.gauss.mu_y() - m_y;
            (
                cpnt.weight.mul_add(dx.mul_add(dx, cpnt.gauss.var_x()), s_x),
                cpnt.weight.mul_add(dy.mul_add(dy, cpnt.gauss.var_y()), s_y),
            )
        });
        Some(var)
    }
}

/// Shannon entropy of the mixing weights, in bits.
///
/// Near 0 when one component dominates, `log2(K)` when the weights are
/// uniform. Weights at or below
/// [`ENTROPY_WEIGHT_FLOOR`](crate::consts::ENTROPY_WEIGHT_FLOOR) are ignored.
impl Entropy for OnlineMixture {
    fn entropy(&self) -> f64 {
        weight_entropy(&self.weights(), ENTROPY_WEIGHT_FLOOR)
    }
}
