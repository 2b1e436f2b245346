#![allow(dead_code)]

use candle_core::{Result, Tensor};

/// Mean squared reconstruction error, averaged over pixels
///
/// mse(i) = mean_p [ x(i,p) - xhat(i,p) ]^2
///
/// * `x_nchw` - target tensor (clean images)
/// * `xhat_nchw` - reconstruction tensor
///
pub fn mean_squared_error(x_nchw: &Tensor, xhat_nchw: &Tensor) -> Result<Tensor> {
    x_nchw.sub(xhat_nchw)?.powf(2.)?.flatten_from(1)?.mean(1)
}

/// Gaussian log-likelihood of a reconstruction
///
/// llik(i) = -0.5 * sum_p [ x(i,p) - xhat(i,p) ]^2
///
/// * `x_nchw` - target tensor (clean images)
/// * `xhat_nchw` - reconstruction tensor
///
pub fn gaussian_likelihood(x_nchw: &Tensor, xhat_nchw: &Tensor) -> Result<Tensor> {
    x_nchw.sub(xhat_nchw)?.powf(2.)?.flatten_from(1)?.sum(1)? * (-0.5)
}
