//! The durable flag-command log (the `FLAG_CMD` table of a measurement set).

pub mod ms;

use thiserror::Error;

pub use ms::MsFlagCmdTable;

#[derive(Error, Debug)]
pub enum FlagCmdTableError {
    #[error("casacore error on {path}: {message}")]
    Casacore { path: String, message: String },

    #[error("Column {column} of {path} has {got} rows, but the table has {expected}")]
    ColumnLength {
        path: String,
        column: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("Row {row} is out of range; the flag command table has {num_rows} rows")]
    RowOutOfRange { row: usize, num_rows: usize },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

/// One row of a `FLAG_CMD` table.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagCmdRow {
    /// \[MJD seconds\]
    pub time: f64,
    /// \[seconds\]
    pub interval: f64,
    /// "FLAG" or "UNFLAG".
    pub flag_type: String,
    pub reason: String,
    pub level: i32,
    pub severity: i32,
    pub applied: bool,
    pub command: String,
}

/// Access to a flag-command log. Rows are addressed by their index.
pub trait FlagCmdTable {
    fn num_rows(&self) -> Result<usize, FlagCmdTableError>;

    /// Read every row in one go.
    fn read_all(&mut self) -> Result<Vec<FlagCmdRow>, FlagCmdTableError>;

    fn append(&mut self, rows: &[FlagCmdRow]) -> Result<(), FlagCmdTableError>;

    /// Set the `APPLIED` cell of each of `rows`.
    fn set_applied(&mut self, rows: &[usize], applied: bool) -> Result<(), FlagCmdTableError>;

    /// Remove exactly these rows. The remaining rows keep their order.
    fn remove_rows(&mut self, rows: &[usize]) -> Result<(), FlagCmdTableError>;

    fn remove_all(&mut self) -> Result<(), FlagCmdTableError> {
        let all: Vec<usize> = (0..self.num_rows()?).collect();
        self.remove_rows(&all)
    }
}

fn check_rows(rows: &[usize], num_rows: usize) -> Result<(), FlagCmdTableError> {
    match rows.iter().find(|&&r| r >= num_rows) {
        Some(&row) => Err(FlagCmdTableError::RowOutOfRange { row, num_rows }),
        None => Ok(()),
    }
}

/// A flag-command log held in memory. Used when there is no measurement set to
/// write to, and in tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryFlagCmdTable {
    pub rows: Vec<FlagCmdRow>,
}

impl MemoryFlagCmdTable {
    pub fn new(rows: Vec<FlagCmdRow>) -> MemoryFlagCmdTable {
        MemoryFlagCmdTable { rows }
    }
}

impl FlagCmdTable for MemoryFlagCmdTable {
    fn num_rows(&self) -> Result<usize, FlagCmdTableError> {
        Ok(self.rows.len())
    }

    fn read_all(&mut self) -> Result<Vec<FlagCmdRow>, FlagCmdTableError> {
        Ok(self.rows.clone())
    }

    fn append(&mut self, rows: &[FlagCmdRow]) -> Result<(), FlagCmdTableError> {
        self.rows.extend_from_slice(rows);
        Ok(())
    }

    fn set_applied(&mut self, rows: &[usize], applied: bool) -> Result<(), FlagCmdTableError> {
        check_rows(rows, self.rows.len())?;
        for &r in rows {
            self.rows[r].applied = applied;
        }
        Ok(())
    }

    fn remove_rows(&mut self, rows: &[usize]) -> Result<(), FlagCmdTableError> {
        check_rows(rows, self.rows.len())?;
        let mut i = 0;
        self.rows.retain(|_| {
            let keep = !rows.contains(&i);
            i += 1;
            keep
        });
        Ok(())
    }
}
