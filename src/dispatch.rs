//! Running one action (list, apply, unapply, clear, plot or extract) against a
//! dataset.

use std::{
    path::PathBuf,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use hifitime::Epoch;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    agents::register_agents,
    engine::{FlagEngine, RunStats},
    list::{list_flag_cmds, ListMode},
    persist::{self, CommandText},
    plot::{flag_plot, FlagPlotter, TextPlotter},
    read::{AsdmReader, CmdListReader, FlagCmdRead, ReadError, TableReader, TextFileReader},
    record::FlagCommands,
    selection::SelectionUnion,
    table::FlagCmdTable,
    time::TimeSpan,
    versions::backup_flags,
    FlagCmdError,
};

#[derive(Error, Debug)]
#[error("Unknown {kind} '{value}'; expected one of {expected}")]
pub struct UnknownOption {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Apply,
    Unapply,
    Clear,
    Plot,
    Extract,
}

impl FromStr for Action {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "list" => Ok(Action::List),
            "apply" => Ok(Action::Apply),
            "unapply" => Ok(Action::Unapply),
            "clear" => Ok(Action::Clear),
            "plot" => Ok(Action::Plot),
            "extract" => Ok(Action::Extract),
            _ => Err(UnknownOption {
                kind: "action",
                value: s.to_string(),
                expected: "list, apply, unapply, clear, plot, extract",
            }),
        }
    }
}

/// Where flag commands come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Table,
    File,
    Xml,
    CmdList,
}

impl FromStr for InputMode {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(InputMode::Table),
            "file" => Ok(InputMode::File),
            "xml" => Ok(InputMode::Xml),
            "cmd" | "cmdlist" => Ok(InputMode::CmdList),
            _ => Err(UnknownOption {
                kind: "input mode",
                value: s.to_string(),
                expected: "table, file, xml, cmdlist",
            }),
        }
    }
}

/// The source of the flag commands for one action.
pub enum FlagCmdInput<'t> {
    /// The dataset's own `FLAG_CMD` table, i.e. the session's table.
    OwnTable,

    /// Some other `FLAG_CMD` table.
    Table(&'t mut dyn FlagCmdTable),

    /// A text file of commands.
    File(PathBuf),

    /// An ASDM directory with `Antenna.xml` and `Flag.xml`.
    Xml(PathBuf),

    CmdList(Vec<String>),
}

impl FlagCmdInput<'_> {
    fn is_own_table(&self) -> bool {
        matches!(self, FlagCmdInput::OwnTable)
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub action: Action,

    /// Table rows to read. For unapply, these are the rows to unapply; every
    /// row is still read.
    pub tablerows: Vec<usize>,

    /// Read table rows that have already been applied?
    pub use_applied: bool,

    /// Only use commands with these reasons.
    pub reasons: Vec<String>,

    /// Only use machine records for these antennas.
    pub antennas: Vec<String>,

    /// Padding added to both ends of machine-record time ranges \[seconds\].
    pub tbuff: f64,

    /// Snapshot the flags before changing them.
    pub flag_backup: bool,

    /// If false, the engine runs without changing the dataset.
    pub write_flags: bool,

    /// Needed for clear to do anything.
    pub clear_all: bool,

    /// Table rows to clear; empty means all of them.
    pub rowlist: Vec<usize>,

    /// Save the commands (to the table, or to `outfile` if given).
    pub save_pars: bool,
    pub outfile: Option<PathBuf>,

    /// Flag versions are named `<prefix>_<n>`.
    pub backup_prefix: String,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        DispatchOptions {
            action: Action::List,
            tablerows: vec![],
            use_applied: false,
            reasons: vec![],
            antennas: vec![],
            tbuff: 0.0,
            flag_backup: true,
            write_flags: true,
            clear_all: false,
            rowlist: vec![],
            save_pars: false,
            outfile: None,
            backup_prefix: "flagcmd".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done,
    Extracted(FlagCommands),
}

/// Everything an action works with.
pub struct Session<'a> {
    /// The dataset's `FLAG_CMD` table.
    pub flag_cmd_table: &'a mut dyn FlagCmdTable,

    pub engine: &'a mut dyn FlagEngine,

    /// The dataset's time span, for relative times and default intervals.
    pub time_span: TimeSpan,

    /// Without one, plots are logged as text.
    pub plotter: Option<&'a mut dyn FlagPlotter>,

    /// Ticks for each agent that is set up.
    pub progress_bar: Option<ProgressBar>,
}

impl<'a> Session<'a> {
    pub fn new(
        flag_cmd_table: &'a mut dyn FlagCmdTable,
        engine: &'a mut dyn FlagEngine,
        time_span: TimeSpan,
    ) -> Session<'a> {
        Session {
            flag_cmd_table,
            engine,
            time_span,
            plotter: None,
            progress_bar: None,
        }
    }

    pub fn dispatch(
        &mut self,
        input: FlagCmdInput<'_>,
        opts: &DispatchOptions,
    ) -> Result<Outcome, FlagCmdError> {
        info!("Action: {:?}", opts.action);
        match opts.action {
            Action::Clear => {
                self.clear(opts)?;
                Ok(Outcome::Done)
            }
            Action::List => {
                self.list(input, opts)?;
                Ok(Outcome::Done)
            }
            Action::Apply | Action::Unapply => {
                self.apply(input, opts)?;
                Ok(Outcome::Done)
            }
            Action::Plot => {
                self.plot(input, opts)?;
                Ok(Outcome::Done)
            }
            Action::Extract => {
                let (flag_cmds, _) = self.read(input, opts)?;
                Ok(Outcome::Extracted(flag_cmds))
            }
        }
    }

    fn read(
        &mut self,
        input: FlagCmdInput<'_>,
        opts: &DispatchOptions,
    ) -> Result<(FlagCommands, ListMode), ReadError> {
        let day_start = self.time_span.start_day();
        // Unapplying needs every row; the requested rows are picked out later.
        let (rows, use_applied) = if opts.action == Action::Unapply {
            (&[][..], true)
        } else {
            (opts.tablerows.as_slice(), opts.use_applied)
        };

        match input {
            FlagCmdInput::OwnTable => read_all(
                TableReader::new(&mut *self.flag_cmd_table, day_start)
                    .rows(rows)
                    .use_applied(use_applied)
                    .reasons(&opts.reasons),
            ),
            FlagCmdInput::Table(table) => read_all(
                TableReader::new(table, day_start)
                    .rows(rows)
                    .use_applied(use_applied)
                    .reasons(&opts.reasons),
            ),
            FlagCmdInput::File(path) => read_all(TextFileReader::new(path, &self.time_span)),
            FlagCmdInput::Xml(dir) => read_all(
                AsdmReader::new(dir, opts.tbuff)
                    .antennas(&opts.antennas)
                    .reasons(&opts.reasons),
            ),
            FlagCmdInput::CmdList(commands) => {
                read_all(CmdListReader::new(commands, &self.time_span))
            }
        }
    }

    fn clear(&mut self, opts: &DispatchOptions) -> Result<(), FlagCmdError> {
        if !opts.clear_all {
            warn!("Safety mode: clearall is not set, so nothing is cleared");
            return Ok(());
        }
        persist::clear(self.flag_cmd_table, &opts.rowlist)?;
        Ok(())
    }

    fn list(&mut self, input: FlagCmdInput<'_>, opts: &DispatchOptions) -> Result<(), FlagCmdError> {
        let own_table = input.is_own_table();
        let (flag_cmds, list_mode) = self.read(input, opts)?;
        if flag_cmds.is_empty() {
            warn!("There are no flag commands in input");
            return Ok(());
        }
        list_flag_cmds(&flag_cmds, list_mode, &opts.antennas, &opts.reasons);

        if opts.save_pars {
            let ids: Vec<usize> = flag_cmds.keys().copied().collect();
            if own_table {
                info!("These commands are already in the FLAG_CMD table");
            } else {
                self.save(&flag_cmds, &ids, false, CommandText::WithReason, opts)?;
            }
        }
        Ok(())
    }

    fn apply(&mut self, input: FlagCmdInput<'_>, opts: &DispatchOptions) -> Result<(), FlagCmdError> {
        let apply = opts.action == Action::Apply;
        let own_table = input.is_own_table();
        let (flag_cmds, _) = self.read(input, opts)?;
        if flag_cmds.is_empty() {
            warn!("There are no flag commands in input");
            return Ok(());
        }

        let commands: Vec<&str> = flag_cmds.values().map(|r| r.command.as_str()).collect();
        let union = SelectionUnion::from_commands(&commands);
        info!("Selecting data: {union}");
        self.engine.select_data(&union)?;

        if let Some(pb) = &self.progress_bar {
            pb.set_length(flag_cmds.len() as u64);
        }
        let unapply_rows: &[usize] = if apply { &[] } else { &opts.tablerows };
        let registered = register_agents(
            &mut *self.engine,
            &flag_cmds,
            unapply_rows,
            apply,
            self.progress_bar.as_ref(),
        )?;
        if let Some(pb) = &self.progress_bar {
            pb.finish();
        }

        self.engine.init()?;
        if opts.flag_backup && opts.write_flags {
            backup_flags(&mut *self.engine, &opts.backup_prefix, now())?;
        }
        let stats = self.engine.run(opts.write_flags)?;
        log_stats(&stats);
        self.engine.done()?;

        let applied = opts.write_flags && apply;
        if own_table {
            persist::update_applied(self.flag_cmd_table, &registered.valid, applied)?;
        } else if opts.save_pars {
            self.save(
                &flag_cmds,
                &registered.valid,
                applied,
                CommandText::WithDefaultMode,
                opts,
            )?;
        }
        Ok(())
    }

    fn plot(&mut self, input: FlagCmdInput<'_>, opts: &DispatchOptions) -> Result<(), FlagCmdError> {
        let (flag_cmds, _) = self.read(input, opts)?;
        if flag_cmds.is_empty() {
            warn!("There are no flags to plot");
            return Ok(());
        }
        let plot = flag_plot(&flag_cmds, &self.time_span);
        match self.plotter.as_deref_mut() {
            Some(plotter) => plotter.render(&plot)?,
            None => TextPlotter::default().render(&plot)?,
        }
        Ok(())
    }

    fn save(
        &mut self,
        flag_cmds: &FlagCommands,
        ids: &[usize],
        applied: bool,
        text: CommandText,
        opts: &DispatchOptions,
    ) -> Result<(), FlagCmdError> {
        match &opts.outfile {
            None => {
                persist::write_to_table(self.flag_cmd_table, flag_cmds, ids, applied)?;
            }
            Some(path) => {
                persist::append_to_file(path, flag_cmds, ids, text)?;
            }
        }
        Ok(())
    }
}

fn read_all<R: FlagCmdRead>(mut reader: R) -> Result<(FlagCommands, ListMode), ReadError> {
    let flag_cmds = reader.read_flag_cmds()?;
    Ok((flag_cmds, reader.list_mode()))
}

fn log_stats(stats: &RunStats) {
    for agent in &stats.agents {
        debug!(
            "{}: {} flagged, {} unflagged",
            agent.name, agent.num_flagged, agent.num_unflagged
        );
    }
    let (flagged, unflagged) = stats.agents.iter().fold((0, 0), |(f, u), a| {
        (f + a.num_flagged, u + a.num_unflagged)
    });
    info!(
        "{} agents ran: {flagged} flagged, {unflagged} unflagged",
        stats.agents.len()
    );
}

fn now() -> Epoch {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    Epoch::from_unix_seconds(seconds)
}
