//! Normalization applied before model fitting.

pub mod scale;

pub use scale::{center_scale, column_mean_sd, count_varying_columns, dummy_encode, pearson, scale_view, ScaledBlock};
