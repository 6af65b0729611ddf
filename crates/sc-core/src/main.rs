//! Scriptcast Core - validated script dispatch to live clients
//!
//! The main entry point for sc-core, handling:
//! - Client listing from the native bridge
//! - Compile checks and validated dispatch
//! - The interactive operator console
//! - Configuration inspection

use clap::{Args, Parser, Subcommand};
use sc_common::{format_error_human, ClientId, Error, OutputFormat, StructuredError, SCHEMA_VERSION};
use sc_core::boundary::{self, Boundary};
use sc_core::config::{load_config, ResolvedConfig};
use sc_core::console::Console;
use sc_core::dispatch::{read_script, CompileStatus, DispatchOptions, DispatchResult, ScriptDispatcher};
use sc_core::exit_codes::ExitCode;
use sc_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel, Stage,
};
use sc_core::poller::{ChangeHook, Poller};
use sc_core::registry::{RefreshReport, SharedRegistry};
use sc_core::render::{render_clients, render_compile_status, render_dispatch};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};

/// Scriptcast Core - validate scripts and dispatch them to selected clients
#[derive(Parser)]
#[command(name = "sc-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to scriptcast.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "human")]
    format: OutputFormat,

    /// Log level (overrides SC_LOG and -v/-q)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh once and list tracked clients
    Clients,

    /// Ask the validator whether a script compiles
    Check(CheckArgs),

    /// Validate a script, then execute it on every listed client
    Run(RunArgs),

    /// Interactive selection and dispatch with periodic refresh
    Console,

    /// Configuration management
    Config(ConfigArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Script file, or - for stdin
    script: String,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Script file, or - for stdin
    script: String,

    /// Leave these client ids out of the target list
    #[arg(long, value_name = "ID")]
    exclude: Vec<i32>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show,
    /// Validate a configuration file
    Check {
        /// File to validate (defaults to the resolved one)
        path: Option<PathBuf>,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version also arrive here, on stdout.
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            let _ = err.print();
            std::process::exit(code.as_i32());
        }
    };

    // --log-level wins, then -q/-v, then SC_LOG / RUST_LOG.
    let flag_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    let log_config =
        LogConfig::from_env(cli.global.log_level.or(flag_level), cli.global.log_format);
    init_logging(&log_config);

    let ctx = LogContext::new(generate_run_id(), get_host_id());

    let exit_code = match cli.command {
        Commands::Clients => run_clients(&cli.global, &ctx),
        Commands::Check(args) => run_check(&cli.global, &ctx, &args),
        Commands::Run(args) => run_dispatch(&cli.global, &ctx, &args),
        Commands::Console => run_console(&cli.global, &ctx),
        Commands::Config(args) => run_config(&cli.global, &args),
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    sc_core::log_event!(
        ctx,
        DEBUG,
        event_names::RUN_FINISHED,
        Stage::Init,
        "run finished",
        exit_code = exit_code.as_i32()
    );
    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Shared setup
// ============================================================================

/// Bridge, registry and dispatcher wired from one configuration.
struct Session {
    config: ResolvedConfig,
    boundary: Arc<dyn Boundary>,
    registry: SharedRegistry,
}

impl Session {
    fn open(global: &GlobalOpts, ctx: &LogContext) -> Result<Self, Error> {
        let config = load(global, ctx)?;
        let boundary = boundary::open(&config.settings.boundary).map_err(|err| {
            sc_core::log_event!(
                ctx,
                WARN,
                event_names::BOUNDARY_UNAVAILABLE,
                Stage::Init,
                "native bridge unavailable",
                error = tracing::field::display(&err)
            );
            Error::from(err)
        })?;
        sc_core::log_event!(
            ctx,
            DEBUG,
            event_names::BOUNDARY_INITIALIZED,
            Stage::Init,
            "bridge ready",
            bridge = boundary.name()
        );
        Ok(Session {
            config,
            boundary,
            registry: SharedRegistry::new(),
        })
    }

    fn max_records(&self) -> usize {
        self.config.settings.refresh.max_scan_records
    }

    fn refresh(&self) -> Result<RefreshReport, Error> {
        self.registry
            .refresh_from(self.boundary.as_ref(), self.max_records())
            .map_err(Error::from)
    }

    fn dispatcher(&self) -> ScriptDispatcher {
        ScriptDispatcher::new(
            Arc::clone(&self.boundary),
            DispatchOptions::from(&self.config.settings),
        )
    }
}

fn load(global: &GlobalOpts, ctx: &LogContext) -> Result<ResolvedConfig, Error> {
    let config = load_config(global.config.as_deref()).map_err(|err| {
        sc_core::log_event!(
            ctx,
            ERROR,
            event_names::CONFIG_ERROR,
            Stage::Init,
            "configuration rejected",
            error = tracing::field::display(&err)
        );
        Error::from(err)
    })?;

    let snapshot = config.snapshot();
    match &snapshot.path {
        Some(path) => sc_core::log_event!(
            ctx,
            INFO,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "configuration loaded",
            path = path.as_str(),
            config_source = snapshot.source.as_str(),
            hash = snapshot.content_hash.as_deref().unwrap_or("")
        ),
        None => sc_core::log_event!(
            ctx,
            INFO,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "using built-in configuration"
        ),
    }
    Ok(config)
}

/// Print an error in the requested format and pick its exit code.
fn fail(global: &GlobalOpts, err: &Error) -> ExitCode {
    if global.format.is_machine() {
        eprintln!("{}", StructuredError::from(err).to_json());
    } else {
        let color = !global.no_color && std::io::stderr().is_terminal();
        eprintln!("{}", format_error_human(err, color));
    }
    ExitCode::from(err)
}

// ============================================================================
// Commands
// ============================================================================

fn run_clients(global: &GlobalOpts, ctx: &LogContext) -> ExitCode {
    let session = match Session::open(global, ctx) {
        Ok(s) => s,
        Err(e) => return fail(global, &e),
    };
    if let Err(e) = session.refresh() {
        return fail(global, &e);
    }
    println!("{}", render_clients(&session.registry.clients(), global.format));
    ExitCode::Clean
}

fn run_check(global: &GlobalOpts, ctx: &LogContext, args: &CheckArgs) -> ExitCode {
    let source = match read_script(&args.script) {
        Ok(s) => s,
        Err(e) => return fail(global, &Error::Io(e)),
    };
    let session = match Session::open(global, ctx) {
        Ok(s) => s,
        Err(e) => return fail(global, &e),
    };

    match session.dispatcher().check_compilable(&source) {
        Ok(status) => {
            println!("{}", render_compile_status(&status, global.format));
            match status {
                CompileStatus::Success => ExitCode::Clean,
                CompileStatus::CompileError { .. } => ExitCode::CompileRejected,
            }
        }
        Err(e) => fail(global, &Error::from(e)),
    }
}

fn run_dispatch(global: &GlobalOpts, ctx: &LogContext, args: &RunArgs) -> ExitCode {
    let source = match read_script(&args.script) {
        Ok(s) => s,
        Err(e) => return fail(global, &Error::Io(e)),
    };
    let session = match Session::open(global, ctx) {
        Ok(s) => s,
        Err(e) => return fail(global, &e),
    };
    if let Err(e) = session.refresh() {
        return fail(global, &e);
    }

    // Unknown ids are reported but do not stop the dispatch.
    for &id in &args.exclude {
        if let Err(err) = session.registry.set_selected(ClientId(id), false) {
            sc_core::log_event!(
                ctx,
                WARN,
                event_names::SELECTION_UNKNOWN_CLIENT,
                Stage::Select,
                "excluded id is not tracked",
                client_id = id
            );
            let err = Error::from(err);
            if global.format.is_machine() {
                eprintln!("{}", StructuredError::from(&err).to_json());
            } else {
                eprintln!("{}", format_error_human(&err, false));
            }
        }
    }

    match session.dispatcher().dispatch(&source, &session.registry) {
        Ok(result) => {
            println!("{}", render_dispatch(&result, global.format));
            match result {
                DispatchResult::Sent { .. } => ExitCode::Dispatched,
                DispatchResult::Rejected { .. } => ExitCode::CompileRejected,
            }
        }
        Err(e) => fail(global, &Error::from(e)),
    }
}

fn run_console(global: &GlobalOpts, ctx: &LogContext) -> ExitCode {
    let session = match Session::open(global, ctx) {
        Ok(s) => s,
        Err(e) => return fail(global, &e),
    };

    let (changes_tx, changes_rx) = mpsc::channel();
    let hook: ChangeHook = Box::new(move |report: &RefreshReport| {
        let _ = changes_tx.send(report.clone());
    });
    let poller = match Poller::start(
        session.registry.clone(),
        Arc::clone(&session.boundary),
        session.config.settings.refresh_interval(),
        session.max_records(),
        Some(hook),
    ) {
        Ok(p) => p,
        Err(e) => return fail(global, &Error::Io(e)),
    };

    let dispatcher = session.dispatcher();
    let stdin = std::io::stdin();
    let interactive = stdin.is_terminal();
    let result = Console::new(
        session.registry.clone(),
        &dispatcher,
        Arc::clone(&session.boundary),
        session.max_records(),
        stdin.lock(),
        std::io::stdout(),
    )
    .with_change_feed(changes_rx)
    .with_prompt(interactive)
    .run();

    let stats = poller.stop();
    match result {
        Ok(summary) => {
            sc_core::log_event!(
                ctx,
                INFO,
                event_names::RUN_FINISHED,
                Stage::Console,
                "console closed",
                commands = summary.commands,
                dispatched = summary.dispatched,
                refresh_ticks = stats.ticks,
                refresh_failures = stats.failures
            );
            ExitCode::Clean
        }
        Err(e) => fail(global, &Error::Io(e)),
    }
}

fn run_config(global: &GlobalOpts, args: &ConfigArgs) -> ExitCode {
    match &args.command {
        ConfigCommands::Show => run_config_show(global),
        ConfigCommands::Check { path } => {
            run_config_check(global, path.as_deref().or(global.config.as_deref()))
        }
    }
}

/// Display the resolved configuration (defaults included).
fn run_config_show(global: &GlobalOpts) -> ExitCode {
    let config = match load_config(global.config.as_deref()) {
        Ok(c) => c,
        Err(e) => return fail(global, &Error::from(e)),
    };
    let snapshot = config.snapshot();

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "source": {
                    "path": &snapshot.path,
                    "kind": &snapshot.source,
                    "hash": &snapshot.content_hash,
                    "using_defaults": snapshot.path.is_none(),
                },
                "settings": &config.settings,
            });
            let text = if global.format == OutputFormat::Json {
                serde_json::to_string_pretty(&response)
            } else {
                serde_json::to_string(&response)
            };
            match text {
                Ok(text) => println!("{}", text),
                Err(e) => return fail(global, &Error::Json(e)),
            }
        }
        OutputFormat::Summary => {
            println!(
                "config: {} (refresh {}ms)",
                snapshot.path.as_deref().unwrap_or("built-in defaults"),
                snapshot.summary.refresh_interval_ms
            );
        }
        OutputFormat::Md | OutputFormat::Human => {
            println!("# sc-core config show");
            println!();
            match &snapshot.path {
                Some(path) => {
                    println!("Source: {} ({})", path, snapshot.source);
                    println!("Hash: {}", snapshot.content_hash.as_deref().unwrap_or("n/a"));
                }
                None => println!("Source: **built-in defaults** (no scriptcast.json found)"),
            }
            println!("Schema version: {}", snapshot.schema_version);
            println!();
            println!("refresh.interval_ms        {}", snapshot.summary.refresh_interval_ms);
            println!("refresh.max_scan_records   {}", snapshot.summary.max_scan_records);
            println!("boundary.validate_timeout  {}ms", snapshot.summary.validate_timeout_ms);
            println!("boundary.execute_timeout   {}ms", snapshot.summary.execute_timeout_ms);
            println!("boundary.success_marker    {:?}", config.settings.boundary.success_marker);
            if let Some(lib) = &config.settings.boundary.library_path {
                println!("boundary.library_path      {}", lib);
            }
            println!("dispatch.allow_empty       {}", snapshot.summary.allow_empty_targets);
        }
    }

    ExitCode::Clean
}

/// Validate a configuration file.
fn run_config_check(global: &GlobalOpts, path: Option<&std::path::Path>) -> ExitCode {
    let config = match load_config(path) {
        Ok(c) => c,
        Err(e) => return fail(global, &Error::from(e)),
    };
    let snapshot = config.snapshot();

    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let response = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": "valid",
                "path": &snapshot.path,
                "using_defaults": snapshot.path.is_none(),
            });
            println!("{}", response);
        }
        OutputFormat::Summary => println!("config check: OK"),
        OutputFormat::Md | OutputFormat::Human => {
            println!("Status: ✓ Valid");
            match &snapshot.path {
                Some(path) => println!("File: {}", path),
                None => println!("File: using built-in defaults"),
            }
        }
    }
    ExitCode::Clean
}

fn print_version(global: &GlobalOpts) {
    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => {
            let version_info = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "sc_core_version": env!("CARGO_PKG_VERSION"),
                "native": cfg!(feature = "native"),
            });
            println!("{}", version_info);
        }
        _ => {
            println!("sc-core {}", env!("CARGO_PKG_VERSION"));
            println!("schema version: {}", SCHEMA_VERSION);
            if !cfg!(feature = "native") {
                println!("native bridge: not built in");
            }
        }
    }
}
