//! Measurement sets, as far as flag commands are concerned.

use std::path::{Path, PathBuf};

use log::{debug, info};
use marlu::rubbl_casatables;
use rubbl_casatables::{Table, TableOpenMode};
use thiserror::Error;

use crate::{
    table::MsFlagCmdTable,
    time::{format_mjd_seconds, TimeSpan},
};

#[derive(Error, Debug)]
pub enum MsError {
    #[error("Visibility data set {0} not found - please verify the name")]
    NotFound(PathBuf),

    #[error("Measurement set {0} has no rows")]
    Empty(PathBuf),

    #[error("casacore error on {path}: {message}")]
    Casacore { path: PathBuf, message: String },
}

pub struct MeasurementSet {
    /// The path to the measurement set on disk.
    path: PathBuf,
}

/// Open a measurement set table read only. If `table` is `None`, then open the
/// base table.
fn read_table(ms: &Path, table: Option<&str>) -> Result<Table, MsError> {
    let path = match table {
        Some(t) => ms.join(t),
        None => ms.to_path_buf(),
    };
    Table::open(&path, TableOpenMode::Read).map_err(|e| MsError::Casacore {
        path,
        message: e.to_string(),
    })
}

impl MeasurementSet {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<MeasurementSet, MsError> {
        let path = path.as_ref();
        debug!("Using measurement set: {}", path.display());
        if !path.exists() {
            return Err(MsError::NotFound(path.to_path_buf()));
        }
        Ok(MeasurementSet {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The first and last values of the main table's `TIME` column.
    pub fn time_span(&self) -> Result<TimeSpan, MsError> {
        let mut main_table = read_table(&self.path, None)?;
        let times: Vec<f64> =
            main_table
                .get_col_as_vec("TIME")
                .map_err(|e| MsError::Casacore {
                    path: self.path.clone(),
                    message: e.to_string(),
                })?;
        let (start, end) = times
            .iter()
            .fold(None, |acc: Option<(f64, f64)>, &t| match acc {
                None => Some((t, t)),
                Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
            })
            .ok_or_else(|| MsError::Empty(self.path.clone()))?;

        let span = TimeSpan::new(start, end);
        info!(
            "MS spans timerange {} to {}",
            format_mjd_seconds(span.start),
            format_mjd_seconds(span.end)
        );
        Ok(span)
    }

    pub fn flag_cmd_table(&self) -> MsFlagCmdTable {
        MsFlagCmdTable::new(&self.path)
    }

    /// Where the flag versions of this measurement set live
    /// (`<vis>.flagversions`).
    pub fn flag_versions_dir(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".flagversions");
        PathBuf::from(name)
    }
}
