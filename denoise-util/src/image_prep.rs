#![allow(dead_code)]

use candle_core::Tensor;
use ndarray::{Array3, Array4, Axis};

/// Scale raw 8-bit pixels into `[0, 1]` and insert the channel axis:
/// `(n, h, w)` u8 becomes `(n, 1, h, w)` f32.
pub fn normalize_images(raw_nhw: &Array3<u8>) -> Array4<f32> {
    raw_nhw
        .mapv(|pixel| f32::from(pixel) / 255.0)
        .insert_axis(Axis(1))
}

/// Undo the normalization for the visualization boundary: a single-channel
/// `(n, 1, h, w)` tensor in `[0, 1]` becomes `(n, h, w)` pixels in 0-255.
/// Values are saturated, never rejected.
pub fn tensor_to_images(x_nchw: &Tensor) -> anyhow::Result<Array3<u8>> {
    let (n, c, h, w) = x_nchw.dims4()?;

    if c != 1 {
        return Err(anyhow::anyhow!(
            "expected a single-channel tensor, found {} channels",
            c
        ));
    }

    let values = x_nchw.flatten_all()?.to_vec1::<f32>()?;
    let pixels = values
        .into_iter()
        .map(|x| (x * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect::<Vec<u8>>();

    Ok(Array3::from_shape_vec((n, h, w), pixels)?)
}
