//! Delimited numeric column files
//!
//! Both the velocity field and the reference solution are plain text tables:
//! one sample per line, columns separated by whitespace, commas or
//! semicolons. Blank lines and lines starting with `#` are skipped. Every
//! remaining line must provide at least the required number of numeric
//! columns; extra columns are kept but ignored by callers.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DataFormatError;

/// Numeric rows read from a column file.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTable {
    rows: Vec<Vec<f64>>,
}

impl ColumnTable {
    /// Read `path`, requiring `min_columns` numeric columns on every data line.
    pub fn read(path: impl AsRef<Path>, min_columns: usize) -> Result<Self, DataFormatError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| DataFormatError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path, min_columns)
    }

    /// Parse in-memory text. `origin` is only used in error messages.
    pub fn parse(text: &str, origin: impl AsRef<Path>, min_columns: usize) -> Result<Self, DataFormatError> {
        let origin: PathBuf = origin.as_ref().to_path_buf();
        let mut rows = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut row = Vec::with_capacity(min_columns);
            for (column, token) in tokens(line).enumerate() {
                let value = token.parse::<f64>().map_err(|_| DataFormatError::InvalidNumber {
                    path: origin.clone(),
                    line: index + 1,
                    column,
                    token: token.to_string(),
                })?;
                if !value.is_finite() {
                    return Err(DataFormatError::InvalidNumber {
                        path: origin.clone(),
                        line: index + 1,
                        column,
                        token: token.to_string(),
                    });
                }
                row.push(value);
            }

            if row.len() < min_columns {
                return Err(DataFormatError::TooFewColumns {
                    path: origin,
                    line: index + 1,
                    required: min_columns,
                    found: row.len(),
                });
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(DataFormatError::Empty { path: origin });
        }

        Ok(Self { rows })
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always false for a successfully parsed table.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, in file order.
    ///
    /// Callers only ask for columns guaranteed by `min_columns`.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[index]).collect()
    }

    /// All rows.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }
}

fn tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| !t.is_empty())
}
