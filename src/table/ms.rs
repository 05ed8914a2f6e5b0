//! `FLAG_CMD` subtables of measurement sets, through casacore.

use std::{
    fmt::Display,
    io,
    path::{Path, PathBuf},
};

use log::{debug, trace, warn};
use marlu::rubbl_casatables;
use rubbl_casatables::{Table, TableOpenMode};

use super::{check_rows, FlagCmdRow, FlagCmdTable, FlagCmdTableError};

/// The `FLAG_CMD` table of a measurement set. The table is opened for each
/// operation and closed again afterwards.
pub struct MsFlagCmdTable {
    /// The path to the `FLAG_CMD` table on disk.
    path: PathBuf,
}

impl MsFlagCmdTable {
    /// The `FLAG_CMD` table inside the measurement set `ms`.
    pub fn new<P: AsRef<Path>>(ms: P) -> MsFlagCmdTable {
        MsFlagCmdTable {
            path: ms.as_ref().join("FLAG_CMD"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn casa_err<E: Display>(&self, e: E) -> FlagCmdTableError {
        FlagCmdTableError::Casacore {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }

    fn open(&self, mode: TableOpenMode) -> Result<Table, FlagCmdTableError> {
        Table::open(&self.path, mode).map_err(|e| self.casa_err(e))
    }

    fn write_rows(&self, table: &mut Table, rows: &[FlagCmdRow]) -> Result<(), FlagCmdTableError> {
        let first = table.n_rows();
        table.add_rows(rows.len()).map_err(|e| self.casa_err(e))?;
        for (i, row) in rows.iter().enumerate() {
            let i_row = first + i as u64;
            trace!("Writing FLAG_CMD row {i_row}: {}", row.command);
            let put = |result: Result<(), _>| result.map_err(|e| self.casa_err(e));
            put(table.put_cell("TIME", i_row, &row.time))?;
            put(table.put_cell("INTERVAL", i_row, &row.interval))?;
            put(table.put_cell("TYPE", i_row, &row.flag_type))?;
            put(table.put_cell("REASON", i_row, &row.reason))?;
            put(table.put_cell("LEVEL", i_row, &row.level))?;
            put(table.put_cell("SEVERITY", i_row, &row.severity))?;
            put(table.put_cell("APPLIED", i_row, &row.applied))?;
            put(table.put_cell("COMMAND", i_row, &row.command))?;
        }
        Ok(())
    }
}

impl FlagCmdTable for MsFlagCmdTable {
    fn num_rows(&self) -> Result<usize, FlagCmdTableError> {
        Ok(self.open(TableOpenMode::Read)?.n_rows() as usize)
    }

    fn read_all(&mut self) -> Result<Vec<FlagCmdRow>, FlagCmdTableError> {
        let mut table = self.open(TableOpenMode::Read)?;
        let num_rows = table.n_rows() as usize;
        debug!("{} has {num_rows} rows", self.path.display());

        macro_rules! column {
            ($name:literal, $t:ty) => {{
                let col: Vec<$t> = table
                    .get_col_as_vec($name)
                    .map_err(|e| self.casa_err(e))?;
                if col.len() != num_rows {
                    return Err(FlagCmdTableError::ColumnLength {
                        path: self.path.display().to_string(),
                        column: $name,
                        got: col.len(),
                        expected: num_rows,
                    });
                }
                col
            }};
        }

        let times = column!("TIME", f64);
        let intervals = column!("INTERVAL", f64);
        let types = column!("TYPE", String);
        let reasons = column!("REASON", String);
        let levels = column!("LEVEL", i32);
        let severities = column!("SEVERITY", i32);
        let applied = column!("APPLIED", bool);
        let commands = column!("COMMAND", String);

        let rows = itertools::izip!(
            times, intervals, types, reasons, levels, severities, applied, commands
        )
        .map(
            |(time, interval, flag_type, reason, level, severity, applied, command)| FlagCmdRow {
                time,
                interval,
                flag_type,
                reason,
                level,
                severity,
                applied,
                command,
            },
        )
        .collect();
        Ok(rows)
    }

    fn append(&mut self, rows: &[FlagCmdRow]) -> Result<(), FlagCmdTableError> {
        let mut table = self.open(TableOpenMode::ReadWrite)?;
        self.write_rows(&mut table, rows)
    }

    fn set_applied(&mut self, rows: &[usize], applied: bool) -> Result<(), FlagCmdTableError> {
        let mut table = self.open(TableOpenMode::ReadWrite)?;
        check_rows(rows, table.n_rows() as usize)?;
        for &row in rows {
            table
                .put_cell("APPLIED", row as u64, &applied)
                .map_err(|e| self.casa_err(e))?;
        }
        Ok(())
    }

    /// casacore can't remove rows through this interface, so the table is
    /// rebuilt without them: an empty copy is made next to the original, the
    /// surviving rows are written to it, and it then replaces the original.
    /// The original stays on disk until the copy is in its place.
    fn remove_rows(&mut self, rows: &[usize]) -> Result<(), FlagCmdTableError> {
        let all = self.read_all()?;
        check_rows(rows, all.len())?;
        let kept: Vec<FlagCmdRow> = all
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !rows.contains(i))
            .map(|(_, row)| row)
            .collect();

        let rebuild = self.path.with_extension("rebuild");
        if rebuild.exists() {
            std::fs::remove_dir_all(&rebuild)?;
        }
        {
            let mut table = self.open(TableOpenMode::Read)?;
            table
                .deep_copy_no_rows(&rebuild.to_string_lossy())
                .map_err(|e| self.casa_err(e))?;
        }
        {
            let mut copy =
                Table::open(&rebuild, TableOpenMode::ReadWrite).map_err(|e| self.casa_err(e))?;
            self.write_rows(&mut copy, &kept)?;
        }
        swap_into_place(&self.path, &rebuild)?;
        debug!(
            "Rebuilt {} with {} rows ({} removed)",
            self.path.display(),
            kept.len(),
            rows.len()
        );
        Ok(())
    }
}

/// Move the directory `replacement` to `live`. The old `live` is set aside
/// first and only deleted once `replacement` has taken its place; if that
/// move fails, the old `live` is put back.
fn swap_into_place(live: &Path, replacement: &Path) -> io::Result<()> {
    let old = live.with_extension("old");
    if old.exists() {
        std::fs::remove_dir_all(&old)?;
    }
    std::fs::rename(live, &old)?;
    if let Err(e) = std::fs::rename(replacement, live) {
        warn!("Couldn't replace {}, restoring it: {e}", live.display());
        std::fs::rename(&old, live)?;
        return Err(e);
    }
    std::fs::remove_dir_all(&old)
}
