//! Cell values and the rectangular blocks they travel in
//!
//! Column coordinates of every block are display indices, the same space the
//! data source addresses cells in.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::schema::{DataSetResponse, RowDataAction};

/// A raw value as it is written to or read from the data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Missing,
    Integer(i32),
    Decimal(f64),
    Text(String),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl From<f64> for Value {
    /// Whole numbers that fit in 32 bits are sent as integers, everything else
    /// as decimals
    fn from(v: f64) -> Self {
        if v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 {
            Value::Integer(v as i32)
        } else {
            Value::Decimal(v)
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One materialised cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellValue {
    pub value: Value,
    /// The value is one of the column's user-defined missing values
    #[serde(default)]
    pub missing: bool,
}

impl CellValue {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            missing: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(Value::Missing)
    }
}

/// Inclusive rectangle of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellArea {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

impl CellArea {
    pub fn new(left: usize, top: usize, right: usize, bottom: usize) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn row_count(&self) -> usize {
        self.bottom + 1 - self.top
    }

    pub fn column_count(&self) -> usize {
        self.right + 1 - self.left
    }
}

/// A column-major grid of cells returned by the data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellBlock {
    pub row_start: usize,
    pub row_count: usize,
    pub column_start: usize,
    pub column_count: usize,
    pub values: Vec<Vec<CellValue>>,
}

impl CellBlock {
    /// Build a block for `area` filling every cell from `f(column, row)`
    pub fn from_fn<F>(area: CellArea, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> CellValue,
    {
        let values = (area.left..=area.right)
            .map(|c| (area.top..=area.bottom).map(|r| f(c, r)).collect())
            .collect();
        Self {
            row_start: area.top,
            row_count: area.row_count(),
            column_start: area.left,
            column_count: area.column_count(),
            values,
        }
    }

    pub fn area(&self) -> Option<CellArea> {
        if self.row_count == 0 || self.column_count == 0 {
            return None;
        }
        Some(CellArea::new(
            self.column_start,
            self.row_start,
            self.column_start + self.column_count - 1,
            self.row_start + self.row_count - 1,
        ))
    }
}

/// Per-row values (filter flags or row labels) for a run of rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowBlock<T> {
    pub row_start: usize,
    pub row_count: usize,
    pub values: Vec<T>,
}

/// Extent of a fetched block, used for the viewport union test
pub trait BlockExtent {
    fn row_start(&self) -> usize;
    fn row_count(&self) -> usize;
    /// `(column_start, column_count)` for cell blocks, `None` for row-only blocks
    fn columns(&self) -> Option<(usize, usize)>;
}

impl BlockExtent for CellBlock {
    fn row_start(&self) -> usize {
        self.row_start
    }

    fn row_count(&self) -> usize {
        self.row_count
    }

    fn columns(&self) -> Option<(usize, usize)> {
        Some((self.column_start, self.column_count))
    }
}

impl<T> BlockExtent for RowBlock<T> {
    fn row_start(&self) -> usize {
        self.row_start
    }

    fn row_count(&self) -> usize {
        self.row_count
    }

    fn columns(&self) -> Option<(usize, usize)> {
        None
    }
}

/// Everything a cell fetch returns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    pub data: Vec<CellBlock>,
    pub filter_data: Vec<RowBlock<bool>>,
    pub row_nums: Vec<RowBlock<u64>>,
}

impl FetchResult {
    /// Extract the cell, filter and row-number blocks carried by a response.
    /// Rows without explicit row numbers are labelled with their own index.
    pub fn from_response(response: &DataSetResponse) -> Self {
        let mut filter_data = Vec::new();
        let mut row_nums = Vec::new();

        for row in &response.rows {
            if row.action != RowDataAction::Modify {
                continue;
            }

            filter_data.push(RowBlock {
                row_start: row.row_start,
                row_count: row.row_count,
                values: row.filter_data.clone(),
            });

            let values = if row.row_nums.is_empty() {
                (row.row_start..row.row_start + row.row_count)
                    .map(|r| r as u64)
                    .collect()
            } else {
                row.row_nums.clone()
            };
            row_nums.push(RowBlock {
                row_start: row.row_start,
                row_count: row.row_count,
                values,
            });
        }

        Self {
            data: response.data.clone(),
            filter_data,
            row_nums,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.filter_data.is_empty() && self.row_nums.is_empty()
    }
}

/// A rectangular write sent to the data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteBlock {
    pub row_start: usize,
    pub row_count: usize,
    pub column_start: usize,
    pub column_count: usize,
    /// Clear the block instead of writing `values`
    pub clear: bool,
    /// Column-major; empty when `clear` is set
    pub values: Vec<Vec<Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::RowData;

    #[test]
    fn test_value_from_f64() {
        assert_eq!(Value::from(3.0), Value::Integer(3));
        assert_eq!(Value::from(2.5), Value::Decimal(2.5));
        assert_eq!(Value::from(1e12), Value::Decimal(1e12));
    }

    #[test]
    fn test_block_from_fn_is_column_major() {
        let block = CellBlock::from_fn(CellArea::new(2, 10, 3, 12), |c, r| {
            CellValue::new(Value::Integer((c * 100 + r) as i32))
        });
        assert_eq!(block.column_count, 2);
        assert_eq!(block.row_count, 3);
        assert_eq!(block.values[1][2].value, Value::Integer(312));
        assert_eq!(block.area(), Some(CellArea::new(2, 10, 3, 12)));
    }

    #[test]
    fn test_fetch_result_defaults_row_numbers() {
        let response = DataSetResponse {
            rows: vec![RowData {
                action: RowDataAction::Modify,
                row_start: 5,
                row_count: 3,
                filter_data: vec![true, false, true],
                row_nums: Vec::new(),
            }],
            ..Default::default()
        };
        let result = FetchResult::from_response(&response);
        assert_eq!(result.row_nums[0].values, vec![5, 6, 7]);
        assert_eq!(result.filter_data[0].values, vec![true, false, true]);
    }
}
