//! Output of simulation results
//!
//! - **Concentration**: particle positions and labels binned onto the cell grid
//! - **Threshold**: sticky highlighting of cells that exceeded a level
//! - **Export**: CSV data export for external analysis
//!
//! # Architecture
//!
//! ```text
//! output/
//! ├── mod.rs              ← This file
//! ├── concentration.rs    ← ConcentrationBinner, ConcentrationGrid
//! ├── threshold.rs        ← ThresholdTracker
//! └── export/             ← Data export
//!     ├── mod.rs
//!     └── csv.rs
//! ```
//!
//! Rendering is left to the caller: grids are plain `ndarray::Array2<f64>`
//! with row 0 at `min_y` and column 0 at `min_x`.

pub mod concentration;
pub mod export;
pub mod threshold;

pub use concentration::{ConcentrationBinner, ConcentrationGrid};
pub use export::{CsvConfig, CsvExporter, CsvMetadata, Exporter};
pub use threshold::{DEFAULT_HIGHLIGHT_THRESHOLD, ThresholdTracker};
