//! Row dataset of a run: phone numbers in, per-row outcomes out.
//!
//! Cells are addressed by (row, column). Column 1 holds the phone number;
//! columns 2..=7 are the output block written by the engine. The output
//! block layout is the resume surface: a non-empty result cell marks a row
//! as done, so the positions below must stay fixed across runs of a job.

mod checkpoint;
mod persist;
mod phone;

pub use checkpoint::{find_last_processed_row, resume_point, ResumePoint};
pub use persist::{
    flush, is_safe_result_filename, load, result_filename, temp_path, TEMP_SUFFIX,
};
pub use phone::{count_phones, is_valid_phone, normalize_phone, PhoneCount};

use serde::{Deserialize, Serialize};

pub const PHONE_COL: usize = 1;
pub const RESULT_COL: usize = 2;
pub const USER_NAME_COL: usize = 3;
pub const USER_ID_COL: usize = 4;
pub const USER_PHONE_COL: usize = 5;
pub const USER_AVATAR_COL: usize = 6;
pub const SEND_RESULT_COL: usize = 7;

/// Number of columns a fully processed row spans.
pub const ROW_WIDTH: usize = SEND_RESULT_COL + 1;

/// Result cell text for rows whose phone number fails validation.
pub const INVALID_PHONE: &str = "invalid phone format";

/// Grid of string cells. Rows are ordered and addressed by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Build a sheet with one row per phone (column 0 left empty).
    pub fn from_phones<I, S>(phones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = phones
            .into_iter()
            .map(|p| vec![String::new(), p.into()])
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell text, or "" if the row or column does not exist.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Set a cell, growing the row with empty cells as needed. Out-of-range rows are ignored.
    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) {
        let Some(r) = self.rows.get_mut(row) else {
            return;
        };
        if r.len() <= col {
            r.resize(col + 1, String::new());
        }
        r[col] = value.into();
    }

    pub fn phone(&self, row: usize) -> &str {
        self.cell(row, PHONE_COL)
    }

    /// True if the row's result cell has been written.
    pub fn has_result(&self, row: usize) -> bool {
        !self.cell(row, RESULT_COL).trim().is_empty()
    }

    /// Rows that carry cells beyond the known output block.
    pub fn rows_wider_than_layout(&self) -> usize {
        self.rows.iter().filter(|r| r.len() > ROW_WIDTH).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_cell_grows_row() {
        let mut sheet = Sheet::from_phones(["0912345678"]);
        sheet.set_cell(0, SEND_RESULT_COL, "sent");
        assert_eq!(sheet.rows[0].len(), ROW_WIDTH);
        assert_eq!(sheet.cell(0, SEND_RESULT_COL), "sent");
        assert_eq!(sheet.cell(0, USER_NAME_COL), "");
        assert_eq!(sheet.phone(0), "0912345678");
    }

    #[test]
    fn out_of_range_access_is_harmless() {
        let mut sheet = Sheet::default();
        assert_eq!(sheet.cell(3, 1), "");
        sheet.set_cell(3, 1, "x");
        assert!(sheet.is_empty());
    }

    #[test]
    fn result_cell_marks_row_done() {
        let mut sheet = Sheet::from_phones(["a", "b"]);
        assert!(!sheet.has_result(0));
        sheet.set_cell(0, RESULT_COL, "   ");
        assert!(!sheet.has_result(0));
        sheet.set_cell(0, RESULT_COL, "found");
        assert!(sheet.has_result(0));
    }
}
