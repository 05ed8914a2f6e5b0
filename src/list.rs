//! Listing flag commands.

use log::{info, warn};

use crate::{
    record::{FlagCommandRecord, FlagCommands},
    selection::SelectionKey,
};

/// The layout of a listing; each source has its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Online flags: key, flag id, antenna, reason and time range.
    Online,

    /// `FLAG_CMD` rows, with all their columns.
    Table,

    /// Plain command strings.
    File,
}

fn capitalised_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

fn header(mode: ListMode) -> String {
    match mode {
        ListMode::Online => format!(
            "{:>8} {:>12} {:>8} {:>32} {:>48}",
            "Key", "FlagID", "Antenna", "Reason", "Timerange"
        ),
        ListMode::Table => format!(
            "{:>8} {:>45} {:>32} {:>6} {:>7} {:>3} {:>3} {}",
            "Row", "Timerange", "Reason", "Type", "Applied", "Level", "Severity", "Command"
        ),
        ListMode::File => format!("{:>8} {}", "Key", "Command"),
    }
}

fn line(key: usize, record: &FlagCommandRecord, mode: ListMode) -> String {
    let antenna = record.selection.get(SelectionKey::Antenna).unwrap_or("");
    let timerange = record.selection.get(SelectionKey::Timerange).unwrap_or("");
    match mode {
        ListMode::Online => {
            let flag_id = record
                .source_id
                .clone()
                .unwrap_or_else(|| key.to_string());
            format!(
                "{key:>8} {flag_id:>12} {antenna:>8} {:>32} {timerange:>48}",
                record.reason
            )
        }
        ListMode::Table => format!(
            "{key:>8} {timerange:>45} {:>32} {:>6} {:>7} {:>3} {:>3} {}",
            record.reason,
            record.flag_type.as_str(),
            capitalised_bool(record.applied),
            record.level,
            record.severity,
            record.command
        ),
        ListMode::File => format!("{key:>8} {}", record.command),
    }
}

/// Format `flag_cmds` for listing, keeping only the flags on `antennas` with
/// one of `reasons` (an empty filter keeps everything). The first line is a
/// header. Nothing at all is returned if there are no flags.
pub fn format_listing(
    flag_cmds: &FlagCommands,
    mode: ListMode,
    antennas: &[String],
    reasons: &[String],
) -> Vec<String> {
    if flag_cmds.is_empty() {
        return vec![];
    }

    let mut lines = vec![header(mode)];
    lines.extend(
        flag_cmds
            .iter()
            .filter(|(_, r)| {
                antennas.is_empty()
                    || antennas
                        .iter()
                        .any(|a| r.selection.get(SelectionKey::Antenna) == Some(a.as_str()))
            })
            .filter(|(_, r)| reasons.is_empty() || reasons.contains(&r.reason))
            .map(|(&key, r)| line(key, r, mode)),
    );
    lines
}

/// List flag commands to the log.
pub fn list_flag_cmds(
    flag_cmds: &FlagCommands,
    mode: ListMode,
    antennas: &[String],
    reasons: &[String],
) {
    if flag_cmds.is_empty() {
        warn!("There are no flags to list");
        return;
    }
    if !antennas.is_empty() {
        info!("Selecting flags by antenna={}", antennas.join(","));
    }
    if !reasons.is_empty() {
        info!("Selecting flags by reason={}", reasons.join(","));
    }
    for l in format_listing(flag_cmds, mode, antennas, reasons) {
        info!("{l}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordDefaults;

    fn flag_cmds() -> FlagCommands {
        let defaults = RecordDefaults {
            time: 0.0,
            interval: 0.0,
            day_start: 0.0,
        };
        [
            "antenna='ea01' reason='FOCUS_ERROR' applied=True",
            "antenna='ea02' reason='SHADOW'",
        ]
        .iter()
        .enumerate()
        .map(|(i, l)| {
            (
                i,
                FlagCommandRecord::from_command_line(i, l, &defaults).unwrap(),
            )
        })
        .collect()
    }

    #[test]
    fn test_file_listing() {
        let lines = format_listing(&flag_cmds(), ListMode::File, &[], &[]);
        assert_eq!(
            lines,
            [
                "     Key Command",
                "       0 antenna='ea01'",
                "       1 antenna='ea02'"
            ]
        );
    }

    #[test]
    fn test_table_listing() {
        let lines = format_listing(&flag_cmds(), ListMode::Table, &[], &[]);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("     Row"));
        assert!(lines[1].contains(" FLAG "));
        assert!(lines[1].contains(" True "));
        assert!(lines[1].ends_with("antenna='ea01'"));
        assert!(lines[2].contains(" False "));
    }

    #[test]
    fn test_listing_filters() {
        let lines = format_listing(
            &flag_cmds(),
            ListMode::Online,
            &["ea02".to_string()],
            &[],
        );
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("SHADOW"));

        let lines = format_listing(
            &flag_cmds(),
            ListMode::Online,
            &[],
            &["NOPE".to_string()],
        );
        assert_eq!(lines.len(), 1);

        assert!(format_listing(&FlagCommands::new(), ListMode::File, &[], &[]).is_empty());
    }
}
