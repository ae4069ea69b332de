//! Composable Multi-Omics Integration Library
//!
//! This library provides modular primitives for integrating several omics
//! assays measured on the same samples.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (AssayTable, MultiAssay, Outcome, Metadata)
//!   and dataset manifests
//! - **normalize**: Centering and scaling
//! - **model**: Block (s)PLS-DA and the multi-view factor model
//! - **join**: Clinical metadata joins with explicit match status
//! - **persist**: Reading and writing of every artifact
//! - **plot**: SVG renderers
//! - **report**: Report composition and execution
//! - **synthetic**: Seeded synthetic datasets with ground truth
//!
//! # Example
//!
//! ```no_run
//! use omics_integration::prelude::*;
//!
//! let dataset = load_dataset("data/manifest.yaml", None).unwrap();
//! let outcome = dataset.outcome.as_ref().unwrap();
//!
//! let keep = KeepX::new()
//!     .with("mrna", &[25, 25])
//!     .with("mirna", &[20, 20]);
//! let model = block_splsda(&dataset.assays, outcome, 2, keep).unwrap();
//! plot_individuals(&model, None, 0, 1, "individuals.svg").unwrap();
//!
//! let factors = fit_factor_model(&dataset.assays, &FactorOptions::default()).unwrap();
//! save_factor_model("factor_model.json", &factors).unwrap();
//! ```

pub mod data;
pub mod error;
pub mod join;
pub mod model;
pub mod normalize;
pub mod persist;
pub mod plot;
pub mod report;
pub mod synthetic;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::data::{
        load_dataset, AssayTable, DatasetManifest, LoadedDataset, Metadata, MultiAssay,
        Orientation, Outcome, SampleIdPattern, Variable,
    };
    pub use crate::error::{OmicsError, Result};
    pub use crate::join::{join_clinical, ClinicalJoin, FactorCovariateTable, MatchStatus};
    pub use crate::model::{
        block_plsda, block_splsda, fit_block_plsda, fit_factor_model, ConvergenceMode,
        FactorModel, FactorOptions, KeepX, PlsdaConfig, PlsdaModel,
    };
    pub use crate::persist::{
        load_factor_model, save_factor_model, write_clinical_csv, write_factor_scores,
    };
    pub use crate::plot::{
        plot_factor_correlation, plot_factor_covariate, plot_individuals, plot_loadings,
        plot_variables, plot_variance_explained, CovariatePlotOptions,
    };
    pub use crate::report::{run_report, IdPattern, PlotKind, Report, ReportConfig, ReportStep};
    pub use crate::synthetic::{generate_synthetic, SyntheticConfig, SyntheticData};
}
