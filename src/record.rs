//! The normalised flag command.

use std::collections::BTreeMap;

use log::debug;

use crate::{
    modes::FlagMode,
    parse::{classify, tokenise, ParseError},
    selection::{Selection, SelectionKey},
    time::{format_mjd_seconds, parse_timerange},
};

/// Record ids to records. Iteration is in ascending id order, which is also
/// the order agents are registered in.
pub type FlagCommands = BTreeMap<usize, FlagCommandRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagType {
    Flag,
    Unflag,
}

impl FlagType {
    pub fn as_str(self) -> &'static str {
        match self {
            FlagType::Flag => "FLAG",
            FlagType::Unflag => "UNFLAG",
        }
    }

    /// Anything other than "UNFLAG" is a flag.
    pub fn from_column(s: &str) -> FlagType {
        if s.trim().eq_ignore_ascii_case("UNFLAG") {
            FlagType::Unflag
        } else {
            FlagType::Flag
        }
    }
}

/// Values a record takes when its command doesn't say otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordDefaults {
    /// \[MJD seconds\]
    pub time: f64,

    /// \[seconds\]
    pub interval: f64,

    /// Midnight of the dataset's first day \[MJD seconds\]. Relative times in
    /// a `timerange` are offsets from this.
    pub day_start: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlagCommandRecord {
    pub id: usize,

    /// An id given by the source itself (an `id=` key, or a flag id in
    /// machine records).
    pub source_id: Option<String>,

    /// `None` means manual.
    pub mode: Option<FlagMode>,

    pub selection: Selection,

    /// Mode-parameter candidates, as given. Which of these are used depends on
    /// the mode.
    pub params: Vec<(String, String)>,

    /// \[MJD seconds\]
    pub time: f64,

    /// \[seconds\]
    pub interval: f64,

    pub reason: String,

    /// Regenerated from the structured fields; never empty.
    pub command: String,

    pub flag_type: FlagType,
    pub applied: bool,
    pub level: i32,
    pub severity: i32,
}

impl FlagCommandRecord {
    /// Parse a command line. The record keys `reason`, `applied`, `level`,
    /// `severity`, `time`, `interval`, `id` and `unflag` are taken out of the
    /// command and into the record. If nothing is left after that, there is no
    /// command, and the line is an error.
    pub fn from_command_line(
        id: usize,
        line: &str,
        defaults: &RecordDefaults,
    ) -> Result<FlagCommandRecord, ParseError> {
        Self::parse_line(id, line, defaults, true)
    }

    /// Parse a command already stored in a `FLAG_CMD` table. The selection
    /// values are kept as they are; a `timerange` this crate can't read only
    /// leaves the default time and interval in place, as the table's columns
    /// supply those.
    pub fn from_stored_command(
        id: usize,
        line: &str,
        defaults: &RecordDefaults,
    ) -> Result<FlagCommandRecord, ParseError> {
        Self::parse_line(id, line, defaults, false)
    }

    fn parse_line(
        id: usize,
        line: &str,
        defaults: &RecordDefaults,
        strict_timerange: bool,
    ) -> Result<FlagCommandRecord, ParseError> {
        let mut record = FlagCommandRecord {
            id,
            source_id: None,
            mode: None,
            selection: Selection::default(),
            params: vec![],
            time: defaults.time,
            interval: defaults.interval,
            reason: String::new(),
            command: String::new(),
            flag_type: FlagType::Flag,
            applied: false,
            level: 0,
            severity: 0,
        };

        let mut kept = vec![];
        for (key, value) in tokenise(line)? {
            match key {
                "reason" => record.reason = value.to_string(),
                "applied" => record.applied = is_true(value),
                "level" => record.level = to_i32(key, value)?,
                "severity" => record.severity = to_i32(key, value)?,
                "time" => record.time = to_f64(key, value)?,
                "interval" => record.interval = to_f64(key, value)?,
                "id" => record.source_id = Some(value.to_string()),
                "unflag" => {
                    if is_true(value) {
                        record.flag_type = FlagType::Unflag;
                    }
                }
                _ => {
                    if key == "timerange" && !value.is_empty() {
                        match parse_timerange(value, defaults.day_start) {
                            Ok((start, end)) => {
                                record.time = 0.5 * (start + end);
                                record.interval = end - start;
                            }
                            Err(e) if strict_timerange => return Err(e.into()),
                            Err(e) => debug!("Keeping the default time for '{value}': {e}"),
                        }
                    }
                    kept.push((key, value));
                }
            }
        }
        if kept.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        let parsed = classify(kept)?;
        record.selection = parsed.selection;
        record.mode = parsed.mode;
        record.params = parsed.others;
        record.command = record.reconstruct_command();
        Ok(record)
    }

    /// A record for one flag generated by the telescope's online system.
    pub fn online(
        id: usize,
        flag_id: &str,
        antenna: &str,
        start: f64,
        end: f64,
        reason: &str,
    ) -> FlagCommandRecord {
        let mut selection = Selection::default();
        selection.set(SelectionKey::Antenna, antenna);
        selection.set(
            SelectionKey::Timerange,
            &format!("{}~{}", format_mjd_seconds(start), format_mjd_seconds(end)),
        );
        let mut record = FlagCommandRecord {
            id,
            source_id: Some(flag_id.to_string()),
            mode: Some(FlagMode::Online),
            selection,
            params: vec![],
            time: 0.5 * (start + end),
            interval: end - start,
            reason: reason.to_string(),
            command: String::new(),
            flag_type: FlagType::Flag,
            applied: false,
            level: 0,
            severity: 0,
        };
        record.command = record.reconstruct_command();
        record
    }

    pub fn effective_mode(&self) -> FlagMode {
        self.mode.unwrap_or(FlagMode::Manual)
    }

    /// Build the command text from the structured fields. Parsing the result
    /// gives back the same selection, mode and parameters.
    pub fn reconstruct_command(&self) -> String {
        let mut tokens: Vec<String> = self
            .selection
            .iter()
            .map(|(k, v)| format!("{}='{v}'", k.as_str()))
            .collect();
        if let Some(mode) = self.mode {
            tokens.push(format!("mode='{mode}'"));
        }
        tokens.extend(self.params.iter().map(|(k, v)| format!("{k}='{v}'")));
        if self.flag_type == FlagType::Unflag {
            tokens.push("unflag='True'".to_string());
        }
        tokens.join(" ")
    }

    /// The command as written to the log: `mode=manual` is spelled out if no
    /// mode was given.
    pub fn command_with_default_mode(&self) -> String {
        match self.mode {
            Some(_) => self.command.clone(),
            None => format!("{} mode='manual'", self.command),
        }
    }

    /// The command with its reason put back in, as written to text files.
    pub fn command_with_reason(&self) -> String {
        if self.reason.is_empty() {
            self.command.clone()
        } else {
            format!("{} reason='{}'", self.command, self.reason)
        }
    }

    /// The reconstructed `timerange` of this record, from `time` and
    /// `interval`.
    pub fn timerange(&self) -> (f64, f64) {
        let half = 0.5 * self.interval;
        (self.time - half, self.time + half)
    }
}

fn is_true(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "t" | "1")
}

fn to_i32(key: &str, value: &str) -> Result<i32, ParseError> {
    value.parse().map_err(|_| ParseError::NotInteger {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn to_f64(key: &str, value: &str) -> Result<f64, ParseError> {
    value.parse().map_err(|_| ParseError::NotNumber {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: f64 = 55931.0 * 86400.0;

    fn defaults() -> RecordDefaults {
        RecordDefaults {
            time: DAY + 1000.0,
            interval: 2000.0,
            day_start: DAY,
        }
    }

    #[test]
    fn test_manual_record() {
        let record = FlagCommandRecord::from_command_line(
            0,
            "antenna='1' spw='0' mode=manual reason='X'",
            &defaults(),
        )
        .unwrap();
        assert_eq!(record.selection.get(SelectionKey::Antenna), Some("1"));
        assert_eq!(record.selection.get(SelectionKey::Spw), Some("0"));
        assert_eq!(record.mode, Some(FlagMode::Manual));
        assert_eq!(record.reason, "X");
        assert!(!record.command.contains("reason"));
        assert_eq!(record.flag_type, FlagType::Flag);
        // No timerange, so the defaults stay.
        assert_eq!(record.time, DAY + 1000.0);
        assert_eq!(record.interval, 2000.0);
    }

    #[test]
    fn test_record_keys_are_extracted() {
        let record = FlagCommandRecord::from_command_line(
            3,
            "scan=1 applied=True level=2 severity=5 id=ONLINE_7 unflag=True",
            &defaults(),
        )
        .unwrap();
        assert!(record.applied);
        assert_eq!(record.level, 2);
        assert_eq!(record.severity, 5);
        assert_eq!(record.source_id.as_deref(), Some("ONLINE_7"));
        assert_eq!(record.flag_type, FlagType::Unflag);
        assert!(record.params.is_empty());
    }

    #[test]
    fn test_timerange_sets_time_and_interval() {
        let record = FlagCommandRecord::from_command_line(
            0,
            "timerange='01:00:00~01:10:00'",
            &defaults(),
        )
        .unwrap();
        assert!((record.time - (DAY + 3900.0)).abs() < 1e-6);
        assert!((record.interval - 600.0).abs() < 1e-6);

        let (start, end) = record.timerange();
        assert!((start - (DAY + 3600.0)).abs() < 1e-6);
        assert!((end - (DAY + 4200.0)).abs() < 1e-6);
    }

    #[test]
    fn test_nothing_left_is_an_error() {
        assert_eq!(
            FlagCommandRecord::from_command_line(0, "reason='X' applied=False", &defaults()),
            Err(ParseError::EmptyCommand)
        );
        assert_eq!(
            FlagCommandRecord::from_command_line(0, "# only a comment", &defaults()),
            Err(ParseError::EmptyCommand)
        );
    }

    #[test]
    fn test_bad_record_values() {
        assert!(matches!(
            FlagCommandRecord::from_command_line(0, "scan=1 level=high", &defaults()),
            Err(ParseError::NotInteger { .. })
        ));
        assert!(matches!(
            FlagCommandRecord::from_command_line(0, "scan=1 timerange=1~2~3", &defaults()),
            Err(ParseError::Time(_))
        ));
    }

    #[test]
    fn test_stored_command_keeps_unknown_timerange() {
        let line = "antenna='ea01' timerange='>2012/01/05/12:00:00'";
        assert!(matches!(
            FlagCommandRecord::from_command_line(0, line, &defaults()),
            Err(ParseError::Time(_))
        ));

        let record = FlagCommandRecord::from_stored_command(0, line, &defaults()).unwrap();
        assert_eq!(
            record.selection.get(SelectionKey::Timerange),
            Some(">2012/01/05/12:00:00")
        );
        assert_eq!(record.time, DAY + 1000.0);
        assert_eq!(record.interval, 2000.0);
        assert_eq!(record.command, line);

        // Other bad values are still errors.
        assert!(matches!(
            FlagCommandRecord::from_stored_command(0, "scan=1 level=high", &defaults()),
            Err(ParseError::NotInteger { .. })
        ));
    }

    #[test]
    fn test_reconstruction_is_idempotent() {
        let lines = [
            "antenna='ea01&&*' timerange=01:00:00~02:00:00 mode=clip clipminmax=[0,50] clipoutside=True",
            "spw=\"0:10~20\" correlation=RR mode=quack quackinterval=5.0 reason='QUACK'",
            "scan=1,2,3 field=3C286 unflag=True",
            "intent=*CALIBRATE* mode=tfcrop ntime=scan",
        ];
        for (i, line) in lines.iter().enumerate() {
            let first = FlagCommandRecord::from_command_line(i, line, &defaults()).unwrap();
            let second =
                FlagCommandRecord::from_command_line(i, &first.command, &defaults()).unwrap();
            assert_eq!(first.selection, second.selection, "{line}");
            assert_eq!(first.mode, second.mode, "{line}");
            assert_eq!(first.params, second.params, "{line}");
            assert_eq!(first.flag_type, second.flag_type, "{line}");
            assert_eq!(first.command, second.command, "{line}");
        }
    }

    #[test]
    fn test_online_record_reconstruction() {
        let record =
            FlagCommandRecord::online(0, "Flag_3", "DV04", DAY + 100.0, DAY + 160.5, "FOCUS_ERROR");
        assert_eq!(record.mode, Some(FlagMode::Online));
        assert_eq!(
            record.selection.get(SelectionKey::Timerange),
            Some("2012/01/05/00:01:40.000~2012/01/05/00:02:40.500")
        );
        let reparsed =
            FlagCommandRecord::from_command_line(0, &record.command, &defaults()).unwrap();
        assert_eq!(reparsed.selection, record.selection);
        assert_eq!(reparsed.mode, record.mode);
        assert!((reparsed.time - record.time).abs() < 1e-3);
        assert!((reparsed.interval - record.interval).abs() < 1e-3);
    }

    #[test]
    fn test_default_mode_and_reason() {
        let record =
            FlagCommandRecord::from_command_line(0, "scan=1 reason='BAD'", &defaults()).unwrap();
        assert_eq!(record.command, "scan='1'");
        assert_eq!(record.command_with_default_mode(), "scan='1' mode='manual'");
        assert_eq!(record.command_with_reason(), "scan='1' reason='BAD'");
        assert_eq!(record.effective_mode(), FlagMode::Manual);
    }
}
