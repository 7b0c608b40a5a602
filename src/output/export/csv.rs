//! CSV export of concentration grids and validation results
//!
//! Plain-text output compatible with spreadsheets, pandas and gnuplot.
//!
//! # Features
//!
//! - **Long-format grids**: one line per cell (`x, y, concentration, particles`)
//! - **Profile tables**: a coordinate column followed by one column per curve
//! - **Convergence tables**: one line per `(dt, N)` run with RMSE and fit
//! - **Metadata support**: optional `#` comment header with run parameters
//! - **Customizable**: delimiter, decimal separator, precision
//!
//! # Quick Examples
//!
//! ## Concentration grid
//!
//! ```rust,ignore
//! use lagrangian_rs::output::export::{CsvExporter, Exporter};
//!
//! let exporter = CsvExporter::default();
//! exporter.export_grid(&engine.concentrations(), "final.csv")?;
//! ```
//!
//! **Output** (`final.csv`):
//! ```csv
//! x,y,concentration,particles
//! -1.000000,-1.000000,0.000000,12
//! -0.968254,-1.000000,0.083333,12
//! ...
//! ```
//!
//! ## With Metadata
//!
//! ```rust,ignore
//! use lagrangian_rs::output::export::{CsvConfig, CsvExporter, CsvMetadata};
//!
//! let metadata = CsvMetadata::from_config(engine.config(), "Euler-Maruyama");
//! let exporter = CsvExporter::new(CsvConfig::default().with_metadata(metadata));
//! ```
//!
//! **Output**:
//! ```csv
//! # Particle Simulation Data
//! # Generated: 2026-10-16T09:30:00+00:00
//! # Scheme: Euler-Maruyama
//! # Time Max: 0.2
//! # Time Step: 0.01
//! # Steps: 21
//! # Particles: 65536
//! # Diffusivity: 0.1
//! #
//! x,y,concentration,particles
//! ...
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::output::concentration::ConcentrationGrid;
use crate::output::export::Exporter;
use crate::solver::SimulationConfig;
use crate::validation::{ConvergenceReport, ReferenceComparison};

// =============================================================================
// Errors
// =============================================================================

/// Failure while writing a CSV file.
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("nothing to export: {0}")]
    Empty(&'static str),

    #[error("length mismatch in {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("NaN or Inf in {0}")]
    NonFinite(String),
}

// =============================================================================
// Configuration Structures
// =============================================================================

/// Configuration for CSV export
///
/// # Fields
///
/// - `delimiter`: Column separator (default: ',')
/// - `decimal_separator`: Decimal point character (default: '.')
/// - `precision`: Number of decimal places (default: 6)
/// - `include_metadata`: Add header comments with run info
/// - `metadata`: Run metadata to include
///
/// # Example
///
/// ```rust
/// use lagrangian_rs::output::export::CsvConfig;
///
/// let config = CsvConfig {
///     delimiter: ';',
///     precision: 10,
///     ..Default::default()
/// };
/// assert_eq!(config.decimal_separator, '.');
/// ```
#[derive(Debug, Clone)]
pub struct CsvConfig {
    /// Column delimiter (default: ',')
    pub delimiter: char,

    /// Decimal separator (default: '.')
    pub decimal_separator: char,

    /// Number of decimal places for floating-point values (default: 6)
    pub precision: usize,

    /// Include metadata header comments (default: false)
    pub include_metadata: bool,

    /// Metadata to include in header
    pub metadata: Option<CsvMetadata>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            decimal_separator: '.',
            precision: 6,
            include_metadata: false,
            metadata: None,
        }
    }
}

impl CsvConfig {
    /// European CSV format (semicolon, comma for decimal)
    pub fn european() -> Self {
        Self {
            delimiter: ';',
            decimal_separator: ',',
            ..Default::default()
        }
    }

    /// High precision (12 decimal places)
    pub fn high_precision() -> Self {
        Self {
            precision: 12,
            ..Default::default()
        }
    }

    /// Builder pattern: set delimiter
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Builder pattern: set precision
    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Builder pattern: enable metadata
    pub fn with_metadata(mut self, metadata: CsvMetadata) -> Self {
        self.include_metadata = true;
        self.metadata = Some(metadata);
        self
    }
}

/// Metadata for CSV header comments
///
/// All fields are optional. Only non-None fields are written.
#[derive(Debug, Clone, Default)]
pub struct CsvMetadata {
    /// Scheme name (e.g. "Euler-Maruyama")
    pub scheme_name: Option<String>,

    /// Simulated time horizon
    pub time_max: Option<f64>,

    /// Time step
    pub dt: Option<f64>,

    /// Number of steps in a complete run
    pub steps: Option<usize>,

    /// Particle count
    pub particle_count: Option<usize>,

    /// Diffusion coefficient
    pub diffusivity: Option<f64>,

    /// Random seed
    pub seed: Option<u64>,

    /// Additional custom parameters
    pub custom: Vec<(String, String)>,
}

impl CsvMetadata {
    /// Metadata describing one simulation run.
    pub fn from_config(config: &SimulationConfig, scheme: &str) -> Self {
        let clock = config.clock();
        Self {
            scheme_name: Some(scheme.to_string()),
            time_max: Some(clock.time_max()),
            dt: Some(clock.dt()),
            steps: Some(clock.steps()),
            particle_count: Some(config.particle_count()),
            diffusivity: Some(config.diffusivity()),
            seed: config.seed(),
            custom: Vec::new(),
        }
    }

    /// Add custom parameter
    pub fn add_custom(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom.push((key.into(), value.into()));
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Write metadata header comments
fn write_metadata_header<W: Write>(out: &mut W, metadata: &CsvMetadata) -> io::Result<()> {
    writeln!(out, "# Particle Simulation Data")?;

    let now = chrono::Utc::now();
    writeln!(out, "# Generated: {}", now.to_rfc3339())?;

    if let Some(scheme) = &metadata.scheme_name {
        writeln!(out, "# Scheme: {}", scheme)?;
    }
    if let Some(time_max) = metadata.time_max {
        writeln!(out, "# Time Max: {}", time_max)?;
    }
    if let Some(dt) = metadata.dt {
        writeln!(out, "# Time Step: {}", dt)?;
    }
    if let Some(steps) = metadata.steps {
        writeln!(out, "# Steps: {}", steps)?;
    }
    if let Some(n) = metadata.particle_count {
        writeln!(out, "# Particles: {}", n)?;
    }
    if let Some(d) = metadata.diffusivity {
        writeln!(out, "# Diffusivity: {}", d)?;
    }
    if let Some(seed) = metadata.seed {
        writeln!(out, "# Seed: {}", seed)?;
    }

    for (key, value) in &metadata.custom {
        writeln!(out, "# {}: {}", key, value)?;
    }

    writeln!(out, "#")?;
    Ok(())
}

/// Format number with configured precision and decimal separator
fn format_number(value: f64, config: &CsvConfig) -> String {
    let formatted = format!("{:.prec$}", value, prec = config.precision);

    if config.decimal_separator != '.' {
        formatted.replace('.', &config.decimal_separator.to_string())
    } else {
        formatted
    }
}

fn ensure_finite(values: &[f64], what: &str) -> Result<(), CsvError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(CsvError::NonFinite(what.to_string()));
    }
    Ok(())
}

// =============================================================================
// Exporter
// =============================================================================

/// CSV implementation of [`Exporter`].
#[derive(Debug, Clone, Default)]
pub struct CsvExporter {
    pub config: CsvConfig,
}

impl CsvExporter {
    pub fn new(config: CsvConfig) -> Self {
        Self { config }
    }

    fn create(&self, path: &Path) -> Result<BufWriter<File>, CsvError> {
        let file = File::create(path).map_err(|source| CsvError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(BufWriter::new(file))
    }

    /// Run `body` against a buffered file, mapping I/O failures to `CsvError`.
    fn write_file<F>(&self, path: &Path, body: F) -> Result<(), CsvError>
    where
        F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
    {
        let mut out = self.create(path)?;
        let io_error = |source| CsvError::Io {
            path: path.to_path_buf(),
            source,
        };

        if self.config.include_metadata
            && let Some(metadata) = &self.config.metadata
        {
            write_metadata_header(&mut out, metadata).map_err(io_error)?;
        }
        body(&mut out).map_err(io_error)?;
        out.flush().map_err(io_error)?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }

    /// Write `header` then one line per row of `columns` (column-major input).
    fn write_columns<W: Write>(&self, out: &mut W, header: &[String], columns: &[&[f64]]) -> io::Result<()> {
        let d = self.config.delimiter.to_string();
        writeln!(out, "{}", header.join(&d))?;
        let rows = columns.first().map_or(0, |c| c.len());
        for i in 0..rows {
            let line: Vec<String> = columns.iter().map(|c| format_number(c[i], &self.config)).collect();
            writeln!(out, "{}", line.join(&d))?;
        }
        Ok(())
    }
}

impl Exporter for CsvExporter {
    type Error = CsvError;

    fn export_grid(&self, grid: &ConcentrationGrid, path: impl AsRef<Path>) -> Result<(), CsvError> {
        let values = grid.values();
        if values.is_empty() {
            return Err(CsvError::Empty("concentration grid"));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CsvError::NonFinite("concentration grid".to_string()));
        }

        let xs = grid.x_coordinates();
        let ys = grid.y_coordinates();
        let counts = grid.counts();
        let d = self.config.delimiter;

        self.write_file(path.as_ref(), |out| {
            writeln!(out, "x{d}y{d}concentration{d}particles")?;
            for ((row, col), value) in values.indexed_iter() {
                writeln!(
                    out,
                    "{}{d}{}{d}{}{d}{}",
                    format_number(xs[col], &self.config),
                    format_number(ys[row], &self.config),
                    format_number(*value, &self.config),
                    counts[[row, col]],
                )?;
            }
            Ok(())
        })
    }

    fn export_profiles(
        &self,
        coordinates: &[f64],
        curves: &[(&str, &[f64])],
        path: impl AsRef<Path>,
    ) -> Result<(), CsvError> {
        if coordinates.is_empty() || curves.is_empty() {
            return Err(CsvError::Empty("profile table"));
        }
        ensure_finite(coordinates, "coordinates")?;
        for (name, values) in curves {
            if values.len() != coordinates.len() {
                return Err(CsvError::LengthMismatch {
                    what: (*name).to_string(),
                    expected: coordinates.len(),
                    found: values.len(),
                });
            }
            ensure_finite(values, name)?;
        }

        let mut header = vec!["x".to_string()];
        header.extend(curves.iter().map(|(name, _)| (*name).to_string()));
        let mut columns: Vec<&[f64]> = vec![coordinates];
        columns.extend(curves.iter().map(|(_, values)| *values));

        self.write_file(path.as_ref(), |out| self.write_columns(out, &header, &columns))
    }

    fn export_comparison(&self, comparison: &ReferenceComparison, path: impl AsRef<Path>) -> Result<(), CsvError> {
        let names: Vec<String> = comparison
            .curves()
            .iter()
            .map(|(n, _)| format!("N={n}"))
            .collect();
        let mut curves: Vec<(&str, &[f64])> = vec![("reference", comparison.reference())];
        curves.extend(
            names
                .iter()
                .zip(comparison.curves())
                .map(|(name, (_, values))| (name.as_str(), values.as_slice())),
        );
        self.export_profiles(comparison.coordinates(), &curves, path)
    }

    fn export_convergence(&self, report: &ConvergenceReport, path: impl AsRef<Path>) -> Result<(), CsvError> {
        let rmse = report.rmse();
        if rmse.is_empty() {
            return Err(CsvError::Empty("convergence table"));
        }
        let d = self.config.delimiter;

        self.write_file(path.as_ref(), |out| {
            for (dt, fit) in report.dts().iter().zip(report.fits()) {
                writeln!(out, "# dt={}: a={} beta={}", dt, fit.a, fit.beta)?;
            }
            writeln!(out, "dt{d}particle_count{d}rmse{d}fitted_rmse")?;
            for ((i, j), value) in rmse.indexed_iter() {
                writeln!(
                    out,
                    "{}{d}{}{d}{}{d}{}",
                    format_number(report.dts()[i], &self.config),
                    report.particle_counts()[j],
                    format_number(*value, &self.config),
                    format_number(report.fitted()[[i, j]], &self.config),
                )?;
            }
            Ok(())
        })
    }
}

// =================================================================================================
// Tests
// =================================================================================================
