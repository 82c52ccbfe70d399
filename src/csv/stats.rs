//! Per-column statistics over a whole CSV file.
//!
//! Rows are buffered in blocks of [`CALC_CHUNK_SIZE`] and every block is
//! folded into the running per-column state, one rayon task per column.
//! Mean and variance use Welford's online update so a file is read once.

use super::data_type::{data_type, DataType};
use super::format::{CsvFormat, VariableColumnPolicy};
use super::reader::CsvReader;
use super::row::CsvRow;
use crate::error::{Error, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;

/// Rows buffered before statistics are updated.
pub const CALC_CHUNK_SIZE: usize = 5000;

// Distinct-value counting stops for new rows once a column has shown this
// many distinct values after the first `COUNT_ROW_LIMIT` rows.
const COUNT_ROW_LIMIT: usize = 1000;
const COUNT_DISTINCT_LIMIT: usize = 500;

#[derive(Clone, Debug, Default)]
struct ColumnStats {
    n: u64,
    mean: f64,
    m2: f64,
    min: Option<f64>,
    max: Option<f64>,
    counts: HashMap<String, usize>,
    dtypes: HashMap<DataType, usize>,
    processed: usize,
}

impl ColumnStats {
    fn update(
        &mut self,
        col: usize,
        records: &[CsvRow],
        n_cols: usize,
        policy: VariableColumnPolicy,
    ) -> Result<()> {
        for row in records {
            if row.len() != n_cols {
                if policy == VariableColumnPolicy::Throw {
                    return Err(Error::RowLength {
                        expected: n_cols,
                        actual: row.len(),
                        row: row.to_string(),
                    });
                }
                continue;
            }
            let Some(field) = row.get(col) else { continue };
            let text = field.as_str();

            if self.processed < COUNT_ROW_LIMIT || self.counts.len() <= COUNT_DISTINCT_LIMIT {
                *self.counts.entry(text.to_string()).or_default() += 1;
            }

            let (ty, value) = data_type(&text);
            *self.dtypes.entry(ty).or_default() += 1;
            if let Some(x) = value.filter(|_| ty.is_num()) {
                self.welford(x);
                self.min_max(x);
            }
            self.processed += 1;
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn welford(&mut self, x: f64) {
        self.n += 1;
        if self.n == 1 {
            self.mean = x;
            return;
        }
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn min_max(&mut self, x: f64) {
        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
    }

    #[allow(clippy::cast_precision_loss)]
    fn variance(&self) -> f64 {
        if self.n < 2 {
            return f64::NAN;
        }
        self.m2 / (self.n - 1) as f64
    }
}

/// Summary statistics for every column of a CSV input.
///
/// ```no_run
/// use strata::csv::{CsvFormat, CsvStat};
/// # fn main() -> strata::Result<()> {
/// let stat = CsvStat::from_path("prices.csv", CsvFormat::guess_csv())?;
/// for (name, mean) in stat.col_names().iter().zip(stat.mean()) {
///     println!("{name}: {mean}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CsvStat {
    col_names: Vec<String>,
    columns: Vec<ColumnStats>,
    n_rows: usize,
}

impl CsvStat {
    /// Compute statistics for the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or a row has the wrong
    /// length under [`VariableColumnPolicy::Throw`].
    pub fn from_path(path: impl AsRef<Path>, format: CsvFormat) -> Result<Self> {
        Self::from_reader(CsvReader::from_path(path, format)?)
    }

    /// Compute statistics for every remaining row of `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails, or a row has the wrong length under
    /// [`VariableColumnPolicy::Throw`].
    pub fn from_reader(mut reader: CsvReader) -> Result<Self> {
        let col_names = reader.col_names();
        let policy = reader.format().variable_column_policy();
        let mut stat = Self {
            columns: vec![ColumnStats::default(); col_names.len()],
            col_names,
            n_rows: 0,
        };

        let mut records = Vec::with_capacity(CALC_CHUNK_SIZE);
        for row in reader.by_ref() {
            records.push(row?);
            if records.len() >= CALC_CHUNK_SIZE {
                stat.calc_chunk(&records, policy)?;
                records.clear();
            }
        }
        stat.calc_chunk(&records, policy)?;
        Ok(stat)
    }

    fn calc_chunk(&mut self, records: &[CsvRow], policy: VariableColumnPolicy) -> Result<()> {
        let n_cols = self.col_names.len();
        self.columns
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(i, column)| column.update(i, records, n_cols, policy))?;
        self.n_rows += records.len();
        Ok(())
    }

    #[must_use]
    pub fn col_names(&self) -> &[String] {
        &self.col_names
    }

    /// Rows seen, including any of the wrong length that were skipped.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Mean of the numeric values in each column, `NaN` when there are none.
    #[must_use]
    pub fn mean(&self) -> Vec<f64> {
        self.columns
            .iter()
            .map(|c| if c.n == 0 { f64::NAN } else { c.mean })
            .collect()
    }

    /// Sample variance of each column, `NaN` with fewer than two values.
    #[must_use]
    pub fn variance(&self) -> Vec<f64> {
        self.columns.iter().map(ColumnStats::variance).collect()
    }

    #[must_use]
    pub fn mins(&self) -> Vec<f64> {
        self.columns.iter().map(|c| c.min.unwrap_or(f64::NAN)).collect()
    }

    #[must_use]
    pub fn maxes(&self) -> Vec<f64> {
        self.columns.iter().map(|c| c.max.unwrap_or(f64::NAN)).collect()
    }

    /// Occurrences of each distinct value per column.
    #[must_use]
    pub fn counts(&self) -> Vec<HashMap<String, usize>> {
        self.columns.iter().map(|c| c.counts.clone()).collect()
    }

    /// Occurrences of each [`DataType`] per column.
    #[must_use]
    pub fn dtypes(&self) -> Vec<HashMap<DataType, usize>> {
        self.columns.iter().map(|c| c.dtypes.clone()).collect()
    }
}

/// Widest type seen in each column, keyed by column name.
///
/// Any string makes a column [`DataType::String`]. Otherwise the widest
/// integer type wins, and columns holding only floats, big integers or
/// nulls are [`DataType::Double`].
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn csv_data_types(path: impl AsRef<Path>) -> Result<HashMap<String, DataType>> {
    let stat = CsvStat::from_path(path, CsvFormat::guess_csv())?;
    Ok(stat
        .col_names
        .iter()
        .zip(&stat.columns)
        .map(|(name, column)| (name.clone(), widest_type(&column.dtypes)))
        .collect())
}

fn widest_type(dtypes: &HashMap<DataType, usize>) -> DataType {
    [
        DataType::String,
        DataType::Int64,
        DataType::Int32,
        DataType::Int16,
        DataType::Int8,
    ]
    .into_iter()
    .find(|ty| dtypes.contains_key(ty))
    .unwrap_or(DataType::Double)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welford_matches_two_pass() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut column = ColumnStats::default();
        for x in values {
            column.welford(x);
            column.min_max(x);
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let var =
            values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
        assert!((column.mean - mean).abs() < 1e-12);
        assert!((column.variance() - var).abs() < 1e-12);
        assert_eq!(column.min, Some(2.0));
        assert_eq!(column.max, Some(9.0));
    }

    #[test]
    fn widest_type_prefers_strings_then_larger_ints() {
        let mut dtypes = HashMap::new();
        dtypes.insert(DataType::Int8, 3);
        dtypes.insert(DataType::Int32, 1);
        assert_eq!(widest_type(&dtypes), DataType::Int32);
        dtypes.insert(DataType::String, 1);
        assert_eq!(widest_type(&dtypes), DataType::String);
        assert_eq!(widest_type(&HashMap::from([(DataType::Null, 2)])), DataType::Double);
    }
}
