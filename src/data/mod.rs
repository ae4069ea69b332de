//! Data structures for multi-omics integration.

mod assay;
pub mod dataset;
mod metadata;
mod multi_assay;
mod outcome;
mod sample_id;

pub use assay::{AssayTable, Orientation};
pub use dataset::{
    fetch_to_cache, load_dataset, load_manifest, AssaySource, ClinicalSource, DatasetManifest,
    Delimiter, LoadedDataset, OutcomeSource,
};
pub use metadata::{Metadata, Variable, VariableType};
pub use multi_assay::{check_same_axis, MultiAssay};
pub use outcome::{Outcome, OutcomeValues};
pub use sample_id::SampleIdPattern;
