//! Mathematical and numerical constants

/// ln(2π)
pub const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Default prior variance along each axis of a fresh component.
///
/// Large relative to the spread of the data the estimator was tuned on, so it
/// acts as a weak prior that is overwritten as points accumulate.
pub const DEFAULT_PRIOR_VARIANCE: f64 = 100.0;

/// Weights at or below this value do not contribute to the weight entropy.
pub const ENTROPY_WEIGHT_FLOOR: f64 = 1E-4;
