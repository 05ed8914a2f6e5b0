use log::{debug, info, warn};

use super::{FlagCmdRead, ReadError};
use crate::{
    list::ListMode,
    record::{FlagCommandRecord, FlagCommands, FlagType, RecordDefaults},
    table::FlagCmdTable,
};

/// Reads flag commands from a `FLAG_CMD` table. Row numbers become record ids.
pub struct TableReader<'a> {
    table: &'a mut dyn FlagCmdTable,

    /// If not empty, only read these rows.
    rows: Vec<usize>,

    /// Should rows that have already been applied be read?
    use_applied: bool,

    /// If not empty, only read rows with one of these reasons.
    reasons: Vec<String>,

    /// Midnight of the dataset's first day \[MJD seconds\], for relative times
    /// in commands.
    day_start: f64,
}

impl<'a> TableReader<'a> {
    pub fn new(table: &'a mut dyn FlagCmdTable, day_start: f64) -> TableReader<'a> {
        TableReader {
            table,
            rows: vec![],
            use_applied: true,
            reasons: vec![],
            day_start,
        }
    }

    pub fn rows(mut self, rows: &[usize]) -> Self {
        self.rows = rows.to_vec();
        self
    }

    pub fn use_applied(mut self, use_applied: bool) -> Self {
        self.use_applied = use_applied;
        self
    }

    pub fn reasons(mut self, reasons: &[String]) -> Self {
        self.reasons = reasons.to_vec();
        self
    }
}

impl FlagCmdRead for TableReader<'_> {
    fn read_flag_cmds(&mut self) -> Result<FlagCommands, ReadError> {
        // No random access; read everything, then pick.
        let all_rows = self.table.read_all()?;
        let mut flag_cmds = FlagCommands::new();
        if all_rows.is_empty() {
            warn!("The FLAG_CMD table is empty, no flags extracted");
            return Ok(flag_cmds);
        }

        let mut selected: Vec<usize> = if self.rows.is_empty() {
            (0..all_rows.len()).collect()
        } else {
            self.rows
                .iter()
                .copied()
                .filter(|&r| {
                    let exists = r < all_rows.len();
                    if !exists {
                        warn!(
                            "Row {r} was requested, but the FLAG_CMD table only has {} rows",
                            all_rows.len()
                        );
                    }
                    exists
                })
                .collect()
        };
        if !self.use_applied {
            selected.retain(|&r| !all_rows[r].applied);
        }
        if !self.reasons.is_empty() {
            selected.retain(|&r| self.reasons.contains(&all_rows[r].reason));
        }

        for r in selected {
            let row = &all_rows[r];
            if row.command.trim().is_empty() {
                warn!("Ignoring empty COMMAND string in row {r}");
                continue;
            }
            let defaults = RecordDefaults {
                time: row.time,
                interval: row.interval,
                day_start: self.day_start,
            };
            let mut record = match FlagCommandRecord::from_stored_command(r, &row.command, &defaults)
            {
                Ok(record) => record,
                Err(e) => {
                    warn!("Ignoring row {r} ('{}'): {e}", row.command);
                    continue;
                }
            };
            // The columns know better than the command.
            record.time = row.time;
            record.interval = row.interval;
            record.flag_type = FlagType::from_column(&row.flag_type);
            record.reason = row.reason.clone();
            record.level = row.level;
            record.severity = row.severity;
            record.applied = row.applied;
            debug!("Row {r}: {}", record.command);
            flag_cmds.insert(r, record);
        }

        info!("Read {} rows from the FLAG_CMD table", flag_cmds.len());
        Ok(flag_cmds)
    }

    fn list_mode(&self) -> ListMode {
        ListMode::Table
    }
}
