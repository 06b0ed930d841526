//! Global bar-count selector: two rows of eight buttons shared by every
//! track, used to pick how many bars a RECORD pass should span before
//! auto-stopping.
//!
//! This is not per-track hardware: pressing a cell in either row clears
//! whatever was selected anywhere else across both rows, so at most one
//! bar count is active for the whole looper at a time.

use crate::midi::Fingerprint;

/// Two rows of eight cells each, giving bar counts 1..=16.
pub const NUM_BAR_ROWS: usize = 2;
pub const BAR_ROW_CELLS: usize = 8;

/// One row's eight control bindings.
pub struct BarRow {
    pub ctrl: [Fingerprint; BAR_ROW_CELLS],
}

impl BarRow {
    pub fn new() -> Self {
        Self {
            ctrl: [[0, 0]; BAR_ROW_CELLS],
        }
    }
}

impl Default for BarRow {
    fn default() -> Self {
        Self::new()
    }
}

/// The global bar-count selection: which `(row, cell)` is lit, if any.
/// `None` means "record until RECORD is pressed again".
pub struct BarSelector {
    pub rows: [BarRow; NUM_BAR_ROWS],
    selected: Option<(usize, usize)>,
}

impl BarSelector {
    pub fn new() -> Self {
        Self {
            rows: std::array::from_fn(|_| BarRow::new()),
            selected: None,
        }
    }

    pub fn selected(&self) -> Option<(usize, usize)> {
        self.selected
    }

    /// Number of bars the selected cell requests, or `0` for unbounded.
    pub fn number_of_bars(&self) -> u64 {
        self.selected
            .map(|(row, cell)| (row * BAR_ROW_CELLS + cell + 1) as u64)
            .unwrap_or(0)
    }

    /// Press cell `(row, cell)`: pressing the already-selected cell again
    /// deselects it (back to unbounded); pressing any other cell replaces
    /// the selection, forcing every other cell across both rows off.
    pub fn press(&mut self, row: usize, cell: usize) {
        debug_assert!(row < NUM_BAR_ROWS && cell < BAR_ROW_CELLS);
        if self.selected == Some((row, cell)) {
            self.selected = None;
        } else {
            self.selected = Some((row, cell));
        }
    }

    pub fn is_lit(&self, row: usize, cell: usize) -> bool {
        self.selected == Some((row, cell))
    }
}

impl Default for BarSelector {
    fn default() -> Self {
        Self::new()
    }
}
