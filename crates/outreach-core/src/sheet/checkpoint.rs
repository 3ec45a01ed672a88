//! Checkpoint detection: where a restarted run picks up.

use super::{is_valid_phone, Sheet};

/// Index of the last row whose result cell is filled, scanning from the end.
pub fn find_last_processed_row(sheet: &Sheet) -> Option<usize> {
    (0..sheet.len()).rev().find(|&row| sheet.has_result(row))
}

/// Where iteration starts and how much progress the skipped rows represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    /// Last already-recorded row, if any.
    pub checkpoint: Option<usize>,
    /// First row to process.
    pub start_row: usize,
    /// Valid phones in rows `0..=checkpoint` (progress baseline).
    pub processed_valid: u64,
}

pub fn resume_point(sheet: &Sheet) -> ResumePoint {
    let checkpoint = find_last_processed_row(sheet);
    let (start_row, processed_valid) = match checkpoint {
        Some(last) => {
            let valid = (0..=last).filter(|&r| is_valid_phone(sheet.phone(r))).count();
            (last + 1, valid as u64)
        }
        None => (0, 0),
    };
    ResumePoint {
        checkpoint,
        start_row,
        processed_valid,
    }
}
