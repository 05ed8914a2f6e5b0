use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::{FlagCmdRead, ReadError};
use crate::{
    list::ListMode,
    parse::is_blank_or_comment,
    record::{FlagCommandRecord, FlagCommands, RecordDefaults},
    time::TimeSpan,
};

/// Parse command lines into records, numbering the survivors from 0. Lines
/// that don't parse are skipped.
fn parse_lines<S: AsRef<str>>(lines: &[S], defaults: &RecordDefaults) -> FlagCommands {
    let mut flag_cmds = FlagCommands::new();
    for (i_line, line) in lines.iter().map(AsRef::as_ref).enumerate() {
        if is_blank_or_comment(line) {
            continue;
        }
        match FlagCommandRecord::from_command_line(flag_cmds.len(), line, defaults) {
            Ok(record) => {
                debug!("{}: {}", record.id, record.command);
                flag_cmds.insert(record.id, record);
            }
            Err(e) => warn!("Ignoring line {} ('{line}'): {e}", i_line + 1),
        }
    }
    info!("Parsed {} flag command strings", flag_cmds.len());
    flag_cmds
}

/// Reads flag commands from a text file, one command per line.
pub struct TextFileReader {
    path: PathBuf,
    defaults: RecordDefaults,
}

impl TextFileReader {
    /// Commands without a `timerange` get zero time and interval.
    pub fn new<P: AsRef<Path>>(path: P, span: &TimeSpan) -> TextFileReader {
        TextFileReader {
            path: path.as_ref().to_path_buf(),
            defaults: RecordDefaults {
                time: 0.0,
                interval: 0.0,
                day_start: span.start_day(),
            },
        }
    }
}

impl FlagCmdRead for TextFileReader {
    fn read_flag_cmds(&mut self) -> Result<FlagCommands, ReadError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| ReadError::IO {
            path: self.path.clone(),
            source,
        })?;
        let lines: Vec<&str> = contents.lines().collect();
        info!("Read {} lines from file {}", lines.len(), self.path.display());
        Ok(parse_lines(&lines, &self.defaults))
    }

    fn list_mode(&self) -> ListMode {
        ListMode::File
    }
}

/// Reads flag commands given directly as strings.
pub struct CmdListReader {
    commands: Vec<String>,
    defaults: RecordDefaults,
}

impl CmdListReader {
    /// Commands without a `timerange` cover the whole dataset.
    pub fn new(commands: Vec<String>, span: &TimeSpan) -> CmdListReader {
        CmdListReader {
            commands,
            defaults: RecordDefaults {
                time: span.centre(),
                interval: span.width(),
                day_start: span.start_day(),
            },
        }
    }
}

impl FlagCmdRead for CmdListReader {
    fn read_flag_cmds(&mut self) -> Result<FlagCommands, ReadError> {
        if self.commands.is_empty() {
            warn!("Empty flag command list");
        } else {
            info!("Input {} lines from input list", self.commands.len());
        }
        Ok(parse_lines(&self.commands, &self.defaults))
    }

    fn list_mode(&self) -> ListMode {
        ListMode::File
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::{modes::FlagMode, selection::SelectionKey};

    const DAY: f64 = 55931.0 * 86400.0;

    fn span() -> TimeSpan {
        TimeSpan::new(DAY + 3600.0, DAY + 7200.0)
    }

    #[test]
    fn test_one_bad_line_among_many() {
        let lines = [
            "antenna='ea01' mode=manual",
            "scan=2 antenna",
            "spw='0:0~10'",
            "# a comment",
            "",
            "mode=shadow diameter=25",
        ];
        let flag_cmds = parse_lines(
            &lines,
            &RecordDefaults {
                time: 0.0,
                interval: 0.0,
                day_start: DAY,
            },
        );
        assert_eq!(flag_cmds.len(), 3);
        // Ids are compact.
        assert_eq!(flag_cmds.keys().copied().collect::<Vec<_>>(), [0, 1, 2]);
        assert_eq!(flag_cmds[&2].mode, Some(FlagMode::Shadow));
    }

    #[test]
    fn test_file_reader() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "antenna='1' spw='0' mode=manual reason='X'").unwrap();
        writeln!(file, "   ").unwrap();
        writeln!(file, "scan=3 # trailing comment").unwrap();
        file.flush().unwrap();

        let mut reader = TextFileReader::new(file.path(), &span());
        let flag_cmds = reader.read_flag_cmds().unwrap();
        assert_eq!(flag_cmds.len(), 2);
        let first = &flag_cmds[&0];
        assert_eq!(first.selection.get(SelectionKey::Antenna), Some("1"));
        assert_eq!(first.selection.get(SelectionKey::Spw), Some("0"));
        assert_eq!(first.mode, Some(FlagMode::Manual));
        assert_eq!(first.reason, "X");
        assert_eq!(first.time, 0.0);
        assert_eq!(reader.list_mode(), ListMode::File);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = TextFileReader::new(dir.path().join("flags.txt"), &span());
        assert!(matches!(
            reader.read_flag_cmds(),
            Err(ReadError::IO { .. })
        ));
    }

    #[test]
    fn test_cmdlist_defaults_to_the_dataset() {
        let mut reader = CmdListReader::new(
            vec![
                "scan=1".to_string(),
                "timerange='02:00:00~02:30:00'".to_string(),
            ],
            &span(),
        );
        let flag_cmds = reader.read_flag_cmds().unwrap();
        assert_eq!(flag_cmds[&0].time, DAY + 5400.0);
        assert_eq!(flag_cmds[&0].interval, 3600.0);
        assert!((flag_cmds[&1].time - (DAY + 8100.0)).abs() < 1e-6);
        assert!((flag_cmds[&1].interval - 1800.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_cmdlist() {
        let mut reader = CmdListReader::new(vec![], &span());
        assert!(reader.read_flag_cmds().unwrap().is_empty());
    }
}
