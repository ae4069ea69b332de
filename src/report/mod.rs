//! Report composition and execution for multi-omics integration.

mod runner;

pub use runner::{
    run_report, BlockSummary, FactorSummary, IdPattern, JoinSummary, PlotKind, PlsdaSummary, Report,
    ReportConfig, ReportOutput, ReportStep, ReportSummary,
};
