pub mod fit_denoise;
pub mod mnist_idx;
