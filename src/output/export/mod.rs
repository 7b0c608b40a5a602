//! Export of simulation and validation results.
//!
//! # Architecture
//!
//! This module defines the [`Exporter`] trait that abstracts the export format.
//! Each format is an independent implementation in its own sub-module, so
//! adding a format means adding a file without touching existing ones.
//!
//! # Available formats
//!
//! | Format  | Module  |
//! |---------|---------|
//! | CSV     | [`csv`] |
//!
//! # Usage example
//!
//! ```rust,ignore
//! use lagrangian_rs::output::export::{CsvExporter, Exporter};
//!
//! let exporter = CsvExporter::default();
//!
//! // Final concentration grid
//! exporter.export_grid(&engine.concentrations(), "final.csv")?;
//!
//! // Simulated profiles against the reference curve
//! exporter.export_comparison(&comparison, "comparison.csv")?;
//!
//! // RMSE table with fitted power laws
//! exporter.export_convergence(&report, "convergence.csv")?;
//! ```

pub mod csv;

pub use csv::{CsvConfig, CsvError, CsvExporter, CsvMetadata};

use std::path::Path;

use crate::output::concentration::ConcentrationGrid;
use crate::validation::{ConvergenceReport, ReferenceComparison};

/// Abstraction trait for all export formats.
///
/// # Associated type `Error`
///
/// Each format manages its own errors via the associated type. This avoids
/// systematic boxing (`Box<dyn Error>`) and lets the caller react precisely
/// to the error kind.
pub trait Exporter {
    /// Error type specific to this export format.
    type Error: std::error::Error;

    /// Export every cell of a concentration grid with its coordinates and
    /// particle count.
    fn export_grid(&self, grid: &ConcentrationGrid, path: impl AsRef<Path>) -> Result<(), Self::Error>;

    /// Export named 1D curves sharing one coordinate axis.
    ///
    /// # Errors
    ///
    /// Fails when a curve length differs from `coordinates.len()`, when any
    /// value is not finite, or when nothing is given.
    fn export_profiles(
        &self,
        coordinates: &[f64],
        curves: &[(&str, &[f64])],
        path: impl AsRef<Path>,
    ) -> Result<(), Self::Error>;

    /// Export the reference curve next to the simulated profiles.
    fn export_comparison(&self, comparison: &ReferenceComparison, path: impl AsRef<Path>) -> Result<(), Self::Error>;

    /// Export the RMSE table and fitted values of a convergence study.
    fn export_convergence(&self, report: &ConvergenceReport, path: impl AsRef<Path>) -> Result<(), Self::Error>;
}
