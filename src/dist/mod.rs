//! Probability distributions
mod bivariate_gaussian;
mod online_mixture;

pub use bivariate_gaussian::{
    BivariateGaussian, BivariateGaussianError, BivariateGaussianParameters,
};
pub use online_mixture::{
    MixtureComponent, MixturePrior, OnlineMixture, OnlineMixtureError,
    OnlineMixtureParameters,
};
