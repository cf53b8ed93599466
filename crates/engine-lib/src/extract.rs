//! Value extraction from time-series chunks
//!
//! Two modes: direct (read one matched measurement column) and calculated
//! (derive `100 - free/total * 100` from two component columns, with a
//! power-of-1024 rescale when the two operands arrive in mismatched units).
//! Measurement specs are tried strictly in order; a spec that matches a
//! column but yields no accepted samples falls through to the next spec
//! rather than failing the mapping.

use crate::feed::TimeSeriesChunk;
use crate::models::MeasurementSpec;
use crate::pattern::first_match_within;

/// Accepted utilization range; samples outside it are discarded, not stored.
pub const MIN_ACCEPTED: f64 = 0.0;
pub const MAX_ACCEPTED: f64 = 100.0;

/// Magnitude above which an operand is considered byte-scaled
const COARSE_MAGNITUDE: f64 = 1e9;
/// Magnitude below which an operand is considered unit-scaled (KB/MB counts)
const FINE_MAGNITUDE: f64 = 1e5;

/// Accepted samples extracted for one mapping from one chunk
#[derive(Debug, Clone)]
pub struct ExtractedSeries {
    /// Accepted (epoch-millis, value) pairs, in row order
    pub rows: Vec<(i64, f64)>,
    /// Label of the column (or column pair) that produced the values
    pub column: String,
    /// Index of the measurement spec that succeeded
    pub spec_index: usize,
    /// Samples dropped for being outside [0,100]
    pub discarded: usize,
}

impl ExtractedSeries {
    pub fn avg(&self) -> f64 {
        let sum: f64 = self.rows.iter().map(|(_, v)| v).sum();
        sum / self.rows.len() as f64
    }

    pub fn max(&self) -> f64 {
        self.rows
            .iter()
            .map(|(_, v)| *v)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Why no value could be extracted from a chunk
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractFailure {
    /// No measurement spec matched a populated column. Patterns matching
    /// only columns at or beyond the valid-column count land here too.
    NoMeasurementMatched { tried: Vec<String> },
    /// A column matched but every sample was missing or outside [0,100]
    NoAcceptedData { column: String },
}

fn accept(value: f64) -> bool {
    value.is_finite() && (MIN_ACCEPTED..=MAX_ACCEPTED).contains(&value)
}

fn spec_label(spec: &MeasurementSpec) -> String {
    match spec {
        MeasurementSpec::Direct { pattern } => pattern.clone(),
        MeasurementSpec::Calculated {
            free_pattern,
            total_pattern,
        } => format!("100-{}/{}", free_pattern, total_pattern),
    }
}

/// Try each measurement spec in order against the chunk; first spec that
/// yields at least one accepted sample wins.
pub fn extract(
    chunk: &TimeSeriesChunk,
    specs: &[MeasurementSpec],
) -> Result<ExtractedSeries, ExtractFailure> {
    let mut matched_but_empty: Option<String> = None;

    for (index, spec) in specs.iter().enumerate() {
        let attempt = match spec {
            MeasurementSpec::Direct { pattern } => extract_direct(chunk, pattern),
            MeasurementSpec::Calculated {
                free_pattern,
                total_pattern,
            } => extract_calculated(chunk, free_pattern, total_pattern),
        };

        match attempt {
            Attempt::Extracted { rows, column, discarded } => {
                return Ok(ExtractedSeries {
                    rows,
                    column,
                    spec_index: index,
                    discarded,
                });
            }
            Attempt::Empty { column } => {
                // Out-of-range or missing data: fall back to the next spec
                matched_but_empty.get_or_insert(column);
            }
            Attempt::NoColumn => {}
        }
    }

    match matched_but_empty {
        Some(column) => Err(ExtractFailure::NoAcceptedData { column }),
        None => Err(ExtractFailure::NoMeasurementMatched {
            tried: specs.iter().map(spec_label).collect(),
        }),
    }
}

enum Attempt {
    Extracted {
        rows: Vec<(i64, f64)>,
        column: String,
        discarded: usize,
    },
    Empty {
        column: String,
    },
    NoColumn,
}

fn find_column(chunk: &TimeSeriesChunk, pattern: &str) -> Option<usize> {
    first_match_within(
        &[pattern],
        &chunk.measurement_names,
        chunk.valid_column_count,
    )
    .map(|m| m.candidate_index)
}

fn extract_direct(chunk: &TimeSeriesChunk, pattern: &str) -> Attempt {
    let Some(col) = find_column(chunk, pattern) else {
        return Attempt::NoColumn;
    };
    let column = chunk.measurement_names[col].clone();

    let mut rows = Vec::new();
    let mut discarded = 0usize;
    for (ts, row) in chunk.paired_rows() {
        match row.get(col).copied().flatten() {
            Some(v) if accept(v) => rows.push((ts, v)),
            Some(_) => discarded += 1,
            None => {}
        }
    }

    if rows.is_empty() {
        Attempt::Empty { column }
    } else {
        Attempt::Extracted { rows, column, discarded }
    }
}

/// Mean magnitude of the finite samples in one column.
fn column_magnitude(chunk: &TimeSeriesChunk, col: usize) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for (_, row) in chunk.paired_rows() {
        if let Some(v) = row.get(col).copied().flatten() {
            if v.is_finite() {
                sum += v.abs();
                count += 1;
            }
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Power-of-1024 factors to apply to (free, total) so both operands sit in
/// the same unit scale.
///
/// A mismatch is declared when one operand's magnitude is >= 1e9 while the
/// other's is < 1e5 (bytes vs. KB/MB counters). The coarser-unit operand (the
/// smaller magnitude) is scaled up by the power of 1024 nearest to the
/// magnitude ratio.
fn unit_scale(free_mag: f64, total_mag: f64) -> (f64, f64) {
    let (large, small) = if free_mag >= total_mag {
        (free_mag, total_mag)
    } else {
        (total_mag, free_mag)
    };

    if large < COARSE_MAGNITUDE || small >= FINE_MAGNITUDE || small <= 0.0 {
        return (1.0, 1.0);
    }

    let exponent = ((large / small).ln() / 1024f64.ln()).round().max(1.0);
    let factor = 1024f64.powf(exponent);

    if free_mag < total_mag {
        (factor, 1.0)
    } else {
        (1.0, factor)
    }
}

fn extract_calculated(chunk: &TimeSeriesChunk, free_pattern: &str, total_pattern: &str) -> Attempt {
    let (Some(free_col), Some(total_col)) = (
        find_column(chunk, free_pattern),
        find_column(chunk, total_pattern),
    ) else {
        return Attempt::NoColumn;
    };
    let column = format!(
        "{}/{}",
        chunk.measurement_names[free_col], chunk.measurement_names[total_col]
    );

    let (free_scale, total_scale) = unit_scale(
        column_magnitude(chunk, free_col),
        column_magnitude(chunk, total_col),
    );

    let mut rows = Vec::new();
    let mut discarded = 0usize;
    for (ts, row) in chunk.paired_rows() {
        let free = row.get(free_col).copied().flatten();
        let total = row.get(total_col).copied().flatten();
        let (Some(free), Some(total)) = (free, total) else {
            continue;
        };
        let total = total * total_scale;
        if !free.is_finite() || !total.is_finite() || total == 0.0 {
            continue;
        }
        let used = 100.0 - (free * free_scale) / total * 100.0;
        if accept(used) {
            rows.push((ts, used));
        } else {
            discarded += 1;
        }
    }

    if rows.is_empty() {
        Attempt::Empty { column }
    } else {
        Attempt::Extracted { rows, column, discarded }
    }
}
