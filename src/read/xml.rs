//! Online flags from an ASDM (`Antenna.xml` and `Flag.xml`).

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use roxmltree::{Document, Node};

use super::{FlagCmdRead, ReadError};
use crate::{
    list::ListMode,
    record::{FlagCommandRecord, FlagCommands},
    time::mjd_nanoseconds_to_seconds,
};

pub struct AsdmReader {
    /// The ASDM directory.
    dir: PathBuf,

    /// Padding added to both ends of every flag \[seconds\].
    tbuff: f64,

    /// If not empty, only keep flags on these antennas.
    antennas: Vec<String>,

    /// If not empty, only keep flags with these reasons.
    reasons: Vec<String>,
}

impl AsdmReader {
    pub fn new<P: AsRef<Path>>(dir: P, tbuff: f64) -> AsdmReader {
        AsdmReader {
            dir: dir.as_ref().to_path_buf(),
            tbuff,
            antennas: vec![],
            reasons: vec![],
        }
    }

    pub fn antennas(mut self, antennas: &[String]) -> Self {
        self.antennas = antennas.to_vec();
        self
    }

    pub fn reasons(mut self, reasons: &[String]) -> Self {
        self.reasons = reasons.to_vec();
        self
    }
}

fn read_xml(path: &Path) -> Result<String, ReadError> {
    std::fs::read_to_string(path).map_err(|source| ReadError::IO {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_xml<'a>(path: &Path, text: &'a str) -> Result<Document<'a>, ReadError> {
    Document::parse(text).map_err(|e| ReadError::Xml {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// The trimmed text of the child element `name`.
fn child_text<'a>(row: Node<'a, '_>, name: &str) -> Option<&'a str> {
    row.children()
        .find(|c| c.has_tag_name(name))
        .and_then(|c| c.text())
        .map(str::trim)
}

fn rows<'a, 'input>(doc: &'a Document<'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    doc.descendants().filter(|n| n.has_tag_name("row"))
}

/// `antennaId` in `Flag.xml` is either a bare id or an ASDM array
/// ("1 2 Antenna_0 Antenna_1": rank, length, then the ids). Every id must be
/// known.
fn resolve_antennas(ids: &str, names: &HashMap<String, String>) -> Option<String> {
    if let Some(name) = names.get(ids) {
        return Some(name.clone());
    }
    let tokens: Vec<&str> = ids.split_whitespace().collect();
    match tokens.as_slice() {
        [_rank, _len, ids @ ..] if !ids.is_empty() => ids
            .iter()
            .map(|id| names.get(*id).cloned())
            .collect::<Option<Vec<String>>>()
            .map(|v| v.join(",")),
        _ => None,
    }
}

impl FlagCmdRead for AsdmReader {
    fn read_flag_cmds(&mut self) -> Result<FlagCommands, ReadError> {
        // Antenna ids to names.
        let antenna_path = self.dir.join("Antenna.xml");
        let antenna_text = read_xml(&antenna_path)?;
        let antenna_doc = parse_xml(&antenna_path, &antenna_text)?;
        let names: HashMap<String, String> = rows(&antenna_doc)
            .filter_map(|row| {
                let id = child_text(row, "antennaId")?;
                let name = child_text(row, "name")?;
                Some((id.to_string(), name.to_string()))
            })
            .collect();
        info!("Found {} antennas in Antenna.xml", names.len());

        let flag_path = self.dir.join("Flag.xml");
        let flag_text = read_xml(&flag_path)?;
        let flag_doc = parse_xml(&flag_path, &flag_text)?;

        let mut flag_cmds = FlagCommands::new();
        let mut num_rows = 0;
        for (i_row, row) in rows(&flag_doc).enumerate() {
            num_rows += 1;
            let fields = (|| {
                let flag_id = child_text(row, "flagId")?;
                let antenna = resolve_antennas(child_text(row, "antennaId")?, &names)?;
                let start: i64 = child_text(row, "startTime")?.parse().ok()?;
                let end: i64 = child_text(row, "endTime")?.parse().ok()?;
                let reason = child_text(row, "reason").unwrap_or("");
                Some((flag_id, antenna, start, end, reason))
            })();
            let (flag_id, antenna, start, end, reason) = match fields {
                Some(f) => f,
                None => {
                    warn!("Ignoring malformed or unknown-antenna row {i_row} of Flag.xml");
                    continue;
                }
            };

            if !self.antennas.is_empty() && !self.antennas.iter().any(|a| antenna == *a) {
                continue;
            }
            if !self.reasons.is_empty() && !self.reasons.iter().any(|r| reason == r) {
                continue;
            }

            let start = mjd_nanoseconds_to_seconds(start) - self.tbuff;
            let end = mjd_nanoseconds_to_seconds(end) + self.tbuff;
            let record = FlagCommandRecord::online(i_row, flag_id, &antenna, start, end, reason);
            debug!("{flag_id}: {}", record.command);
            flag_cmds.insert(i_row, record);
        }

        if num_rows == 0 {
            info!("No valid flags found in Flag.xml");
        } else {
            info!("Found {num_rows} flags in Flag.xml, kept {}", flag_cmds.len());
        }
        Ok(flag_cmds)
    }

    fn list_mode(&self) -> ListMode {
        ListMode::Online
    }
}
