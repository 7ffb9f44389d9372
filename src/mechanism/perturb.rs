use ndarray::{Array3, ArrayView2, ArrayView3, Axis, Zip};

use crate::mechanism::error::{check_shape, MechanismError};

/// Add `noise` to `embeddings` at positions where `mask` is true.
///
/// Masked-out positions are copied bit for bit, so projection recovers their
/// original token id. Inputs are left untouched.
pub fn perturb(
    embeddings: ArrayView3<'_, f32>,
    noise: ArrayView3<'_, f32>,
    mask: ArrayView2<'_, bool>,
) -> Result<Array3<f32>, MechanismError> {
    check_shape("noise", embeddings.shape(), noise.shape())?;
    check_shape("validity mask", &embeddings.shape()[..2], mask.shape())?;

    let mut perturbed = embeddings.to_owned();
    Zip::from(perturbed.lanes_mut(Axis(2)))
        .and(noise.lanes(Axis(2)))
        .and(mask)
        .for_each(|mut embedding, delta, &valid| {
            if valid {
                embedding += &delta;
            }
        });
    Ok(perturbed)
}
