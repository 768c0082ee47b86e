//! Online estimation of bivariate Gaussian mixtures.
//!
//! An [`OnlineMixture`](crate::dist::OnlineMixture) holds a fixed number of
//! bivariate Gaussian components and updates them one point at a time with a
//! hard-assignment approximation of Expectation-Maximization. No point history
//! is retained, so memory is constant in the length of the stream.
//!
//! # Example
//!
//! ```
//! use bivmix::prelude::*;
//!
//! let mut mixture = OnlineMixture::new(2, MixturePrior::default()).unwrap();
//!
//! for _ in 0..250 {
//!     mixture.ingest(100.0, 50.0).unwrap();
//!     mixture.ingest(100.0, 150.0).unwrap();
//! }
//!
//! assert_eq!(mixture.n(), 500);
//! assert!((mixture.entropy() - 1.0).abs() < 1e-2);
//! ```
#![warn(
    clippy::all,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::unseparated_literal_suffix,
    clippy::unreadable_literal,
    clippy::option_option,
    clippy::implicit_clone
)]

#[cfg(feature = "serde1")]
extern crate serde;

pub mod consts;
pub mod dist;
pub mod misc;
pub mod prelude;
pub mod traits;

doc_comment::doctest!("../README.md");

#[macro_export]
macro_rules! impl_display {
    ($kind: ty) => {
        impl ::std::fmt::Display for $kind {
            fn fmt(
                &self,
                f: &mut ::std::fmt::Formatter<'_>,
            ) -> ::std::fmt::Result {
                write!(f, "{}", String::from(self))
            }
        }
    };
}
