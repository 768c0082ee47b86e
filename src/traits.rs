//! Trait definitions
use rand::Rng;

/// Types that can be round-tripped through a plain parameter record.
pub trait Parameterized: Sized {
    type Parameters;

    /// Emit the parameters that fully describe `self`
    fn emit_params(&self) -> Self::Parameters;

    /// Rebuild from parameters without validation
    fn from_params(params: Self::Parameters) -> Self;

    /// Apply `f` to the parameters and rebuild
    fn map_params(
        &self,
        f: impl Fn(Self::Parameters) -> Self::Parameters,
    ) -> Self {
        let params = self.emit_params();
        let new_params = f(params);
        Self::from_params(new_params)
    }
}

/// Types that can be sampled from
pub trait Sampleable<X> {
    /// Single draw from the distribution
    ///
    /// # Example
    ///
    /// ```
    /// use bivmix::dist::BivariateGaussian;
    /// use bivmix::traits::Sampleable;
    ///
    /// let mut rng = rand::thread_rng();
    /// let gauss = BivariateGaussian::standard();
    /// let (x, y): (f64, f64) = gauss.draw(&mut rng);
    ///
    /// assert!(x.is_finite() && y.is_finite());
    /// ```
    fn draw<R: Rng>(&self, rng: &mut R) -> X;

    /// Multiple draws
    fn sample<R: Rng>(&self, n: usize, mut rng: &mut R) -> Vec<X> {
        (0..n).map(|_| self.draw(&mut rng)).collect()
    }

    /// Endless stream of draws
    fn sample_stream<'r, R: Rng>(
        &'r self,
        mut rng: &'r mut R,
    ) -> Box<dyn Iterator<Item = X> + 'r> {
        Box::new(std::iter::repeat_with(move || self.draw(&mut rng)))
    }
}

pub trait Mean<M> {
    /// The mean, if it is defined
    fn mean(&self) -> Option<M>;
}

pub trait Variance<V> {
    /// The variance, if it is defined
    fn variance(&self) -> Option<V>;
}

pub trait Entropy {
    /// The entropy
    fn entropy(&self) -> f64;
}
