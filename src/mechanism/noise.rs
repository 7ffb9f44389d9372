//! Calibrated dχ-privacy noise.
//!
//! Each noise vector has a direction drawn uniformly from the unit sphere in
//! `D` dimensions (a normalized standard normal draw) and a magnitude drawn
//! from `Gamma(shape = D, scale = 1/ε)`. Smaller ε gives larger expected
//! magnitude, `D / ε`.

use ndarray::{Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma, StandardNormal};

use crate::mechanism::error::MechanismError;
use crate::types::{BatchShape, Epsilon};

/// Source of one noise vector per (text, position).
///
/// Implementations must not reuse randomness across calls.
pub trait NoiseSource: Send + Sync {
    fn sample(
        &self,
        shape: BatchShape,
        dimension: usize,
        epsilon: Epsilon,
    ) -> Result<Array3<f32>, MechanismError>;
}

/// v0: the Gamma-magnitude, uniform-direction sampler.
///
/// Every call seeds its own generator from OS entropy, so concurrent
/// callers share no state and no two calls replay the same stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct GammaSphereNoise;

impl GammaSphereNoise {
    /// Sample an (N, L, D) noise batch from the given generator.
    pub fn sample_with<R: Rng + ?Sized>(
        rng: &mut R,
        shape: BatchShape,
        dimension: usize,
        epsilon: Epsilon,
    ) -> Result<Array3<f32>, MechanismError> {
        if dimension == 0 {
            return Err(MechanismError::InvalidDistribution(
                "dimension must be positive".into(),
            ));
        }
        let gamma = Gamma::new(dimension as f32, epsilon.gamma_scale() as f32)
            .map_err(|e| MechanismError::InvalidDistribution(e.to_string()))?;

        let mut noise = Array3::<f32>::from_shape_simple_fn(
            (shape.texts, shape.positions, dimension),
            || StandardNormal.sample(rng),
        );
        let magnitudes =
            Array2::<f32>::from_shape_simple_fn((shape.texts, shape.positions), || {
                gamma.sample(rng)
            });

        // lanes along the last axis come out in (n, l) row-major order,
        // matching the magnitude matrix
        let lanes = noise.lanes_mut(Axis(2)).into_iter();
        for (mut direction, &magnitude) in lanes.zip(magnitudes.iter()) {
            let norm = direction.dot(&direction).sqrt();
            let scale = magnitude / norm;
            direction.mapv_inplace(|x| x * scale);
        }
        Ok(noise)
    }
}

impl NoiseSource for GammaSphereNoise {
    fn sample(
        &self,
        shape: BatchShape,
        dimension: usize,
        epsilon: Epsilon,
    ) -> Result<Array3<f32>, MechanismError> {
        let mut rng = StdRng::from_entropy();
        Self::sample_with(&mut rng, shape, dimension, epsilon)
    }
}
