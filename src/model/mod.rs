//! Statistical models for multi-omics integration.

pub mod factor;
pub mod plsda;
pub mod predict;
pub mod sparse;

pub use factor::{
    fit_factor_model, ConvergenceMode, FactorModel, FactorOptions, TrainingArtifact,
    VariationalState,
};
pub use plsda::{
    block_plsda, block_splsda, design_matrix, fit_block_plsda, PlsdaBlock, PlsdaConfig,
    PlsdaModel, SelectedFeature,
};
pub use predict::{CirclePoint, PlsdaPrediction};
pub use sparse::{soft_threshold_keep, KeepX};
