use rand::Rng;
use std::ops::AddAssign;

/// Safely compute `log(sum(exp(xs))`
///
/// # Example
///
/// ```rust
/// # use bivmix::misc::logsumexp;
/// let xs: Vec<f64> = vec![0.0; 4];
/// assert!((logsumexp(&xs) - 4.0_f64.ln()).abs() < 1e-12);
/// ```
pub fn logsumexp(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        panic!("Empty container");
    } else if xs.len() == 1 {
        xs[0]
    } else {
        let maxval = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if maxval == f64::NEG_INFINITY {
            // every term is exp(-∞) = 0
            return f64::NEG_INFINITY;
        }

        xs.iter().fold(0.0, |acc, x| acc + (x - maxval).exp()).ln() + maxval
    }
}

/// Cumulative sum of `xs`
///
/// # Example
///
/// ```rust
/// # use bivmix::misc::cumsum;
/// let xs: Vec<i32> = vec![1, 1, 2, 1];
/// assert_eq!(cumsum(&xs), vec![1, 2, 4, 5]);
/// ```
pub fn cumsum<T>(xs: &[T]) -> Vec<T>
where
    T: AddAssign + Copy + Default,
{
    xs.iter()
        .scan(T::default(), |acc, &x| {
            *acc += x;
            Some(*acc)
        })
        .collect()
}

#[inline]
fn catflip(cws: &[f64], r: f64) -> Option<usize> {
    cws.iter().position(|&w| w > r)
}

/// Draw `n` indices in proportion to their `weights`
///
/// The weights need not be normalized.
///
/// # Panics
///
/// Panics if `weights` is empty or sums to zero.
pub fn pflip(weights: &[f64], n: usize, rng: &mut impl Rng) -> Vec<usize> {
    if weights.is_empty() {
        panic!("Empty container");
    }
    let cws: Vec<f64> = cumsum(weights);
    let scale: f64 = cws[cws.len() - 1];
    let u = rand::distributions::Uniform::new(0.0, 1.0);

    (0..n)
        .map(|_| {
            let r = rng.sample(u) * scale;
            match catflip(&cws, r) {
                Some(ix) => ix,
                None => {
                    let wsvec = weights.to_vec();
                    panic!("Could not draw from {:?}", wsvec)
                }
            }
        })
        .collect()
}

/// Shannon entropy, in bits, of a set of weights.
///
/// Weights at or below `floor` are treated as contributing nothing, which also
/// keeps `log2(0)` out of the sum.
///
/// # Example
///
/// ```rust
/// # use bivmix::misc::weight_entropy;
/// let h = weight_entropy(&[0.25, 0.25, 0.25, 0.25], 1e-4);
/// assert!((h - 2.0).abs() < 1e-12);
/// ```
pub fn weight_entropy(weights: &[f64], floor: f64) -> f64 {
    weights
        .iter()
        .filter(|&&w| w > floor)
        .fold(0.0, |acc, &w| w.mul_add(-w.log2(), acc))
}
