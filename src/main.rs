use std::path::PathBuf;

use clap::{AppSettings, Parser};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, error, info};

use flagcmd::{
    engine::DryRunEngine,
    ms::MeasurementSet,
    plot::TextPlotter,
    Action, DispatchOptions, FlagCmdInput, InputMode, Outcome, Session,
};

#[derive(Parser)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_long_args = true)]
struct Args {
    /// The measurement set to flag.
    vis: PathBuf,

    /// Where the flag commands come from: table, file, xml or cmdlist.
    #[clap(long, default_value = "table")]
    inpmode: InputMode,

    /// The source of the flag commands. For table, another measurement set
    /// (the default is vis itself); for file, a text file of commands; for
    /// xml, a directory with Flag.xml and Antenna.xml (the default is vis).
    #[clap(long)]
    inpfile: Option<PathBuf>,

    /// FLAG_CMD rows to use. With --action unapply, the rows to unapply.
    #[clap(long, multiple_values(true))]
    tablerows: Vec<usize>,

    /// Also read FLAG_CMD rows that have already been applied.
    #[clap(long)]
    useapplied: bool,

    /// Only use flags with this reason. Can be given multiple times.
    #[clap(long, multiple_occurrences(true))]
    reason: Vec<String>,

    /// A flag command, with --inpmode cmdlist. Can be given multiple times.
    #[clap(long, multiple_occurrences(true))]
    command: Vec<String>,

    /// Time padding added to both ends of online flags [seconds].
    #[clap(long, default_value = "0")]
    tbuff: f64,

    /// Only use online flags for these antennas.
    #[clap(long, multiple_values(true))]
    ants: Vec<String>,

    /// list, apply, unapply, clear, plot or extract.
    #[clap(long, default_value = "list")]
    action: Action,

    /// Save the current flags to a flag version before changing them.
    #[clap(long, parse(try_from_str), default_value = "true")]
    flagbackup: bool,

    /// Needed for --action clear to remove anything.
    #[clap(long)]
    clearall: bool,

    /// FLAG_CMD rows to clear. The default is all of them.
    #[clap(long, multiple_values(true))]
    rowlist: Vec<usize>,

    /// Write the flag plot here instead of logging it.
    #[clap(long)]
    plotfile: Option<PathBuf>,

    /// Change the flags of the data. If false, agents only run.
    #[clap(long, parse(try_from_str), default_value = "true")]
    writeflags: bool,

    /// Save the flag commands to FLAG_CMD, or to --outfile.
    #[clap(long)]
    savepars: bool,

    /// Append saved flag commands to this text file instead of FLAG_CMD.
    #[clap(long)]
    outfile: Option<PathBuf>,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    verbosity: u8,

    /// Disable progress bars.
    #[clap(long)]
    no_progress_bars: bool,
}

fn main() {
    let args = Args::parse();
    setup_logging(args.verbosity);

    if let Err(e) = try_main(args) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn try_main(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let ms = MeasurementSet::open(&args.vis)?;
    let time_span = ms.time_span()?;
    let mut flag_cmd_table = ms.flag_cmd_table();
    let mut engine = DryRunEngine::with_version_dir(ms.flag_versions_dir())?;
    let mut plotter = TextPlotter::new(args.plotfile.clone());

    let mut other_table = match (&args.inpmode, &args.inpfile) {
        (InputMode::Table, Some(other)) if other != &args.vis => {
            let other = MeasurementSet::open(other)?;
            Some(other.flag_cmd_table())
        }
        _ => None,
    };
    let input = match args.inpmode {
        InputMode::Table => match other_table.as_mut() {
            Some(t) => FlagCmdInput::Table(t),
            None => FlagCmdInput::OwnTable,
        },
        InputMode::File => match &args.inpfile {
            Some(f) => FlagCmdInput::File(f.clone()),
            None => return Err("--inpfile is needed with --inpmode file".into()),
        },
        InputMode::Xml => {
            FlagCmdInput::Xml(args.inpfile.clone().unwrap_or_else(|| args.vis.clone()))
        }
        InputMode::CmdList => FlagCmdInput::CmdList(args.command.clone()),
    };
    debug!("Input mode: {:?}", args.inpmode);

    let opts = DispatchOptions {
        action: args.action,
        tablerows: args.tablerows,
        use_applied: args.useapplied,
        reasons: args.reason,
        antennas: args.ants,
        tbuff: args.tbuff,
        flag_backup: args.flagbackup,
        write_flags: args.writeflags,
        clear_all: args.clearall,
        rowlist: args.rowlist,
        save_pars: args.savepars,
        outfile: args.outfile,
        ..Default::default()
    };

    let progress_bar = ProgressBar::with_draw_target(
        Some(0),
        if args.no_progress_bars {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stdout()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template(
                "{msg:17}: [{wide_bar:.blue}] {pos:2}/{len:2} agents ({elapsed_precise}<{eta_precise})",
            )?
            .progress_chars("=> "),
    )
    .with_message("Setting up");

    let mut session = Session::new(&mut flag_cmd_table, &mut engine, time_span);
    session.plotter = Some(&mut plotter);
    session.progress_bar = Some(progress_bar);

    if let Outcome::Extracted(flag_cmds) = session.dispatch(input, &opts)? {
        info!("Extracted {} flag commands", flag_cmds.len());
        for (id, record) in &flag_cmds {
            info!("{id}: {} reason='{}'", record.command, record.reason);
        }
    }
    Ok(())
}

fn setup_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.init();
}
