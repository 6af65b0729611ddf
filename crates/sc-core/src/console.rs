//! Interactive operator loop.
//!
//! Reads one command per line, applies it to the shared registry or hands a
//! script to the dispatcher, and writes the outcome. Membership changes seen
//! by the background poller are reported before the next command runs.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use sc_common::{format_error_human, ClientId, OutputFormat};
use serde::Serialize;

use crate::boundary::Boundary;
use crate::dispatch::{read_script, CompileStatus, DispatchResult, ScriptDispatcher};
use crate::logging::event_names;
use crate::registry::{RefreshReport, RegistryError, SharedRegistry};
use crate::render::{render_clients, render_compile_status, render_dispatch, render_refresh};

const HELP: &str = "\
commands:
  list                 show tracked clients
  select <id>...       mark clients as targets
  deselect <id>...     unmark clients
  toggle <id>...       flip selection
  all | none           select or deselect every client
  refresh              re-read the client list now
  check <file>         ask the validator about a script
  run <file>           validate, then execute on selected clients
  help                 this text
  quit                 leave";

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Select(Vec<ClientId>),
    Deselect(Vec<ClientId>),
    Toggle(Vec<ClientId>),
    SelectAll,
    SelectNone,
    Refresh,
    Check(String),
    Run(String),
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();
        // Paths keep their inner spacing; only the ends are trimmed.
        let tail = line
            .trim_start()
            .strip_prefix(verb)
            .unwrap_or_default()
            .trim();

        let ids = |verb: &str| -> Result<Vec<ClientId>, String> {
            if rest.is_empty() {
                return Err(format!("{} needs at least one client id", verb));
            }
            rest.iter()
                .map(|word| {
                    word.parse::<ClientId>()
                        .map_err(|_| format!("not a client id: {}", word))
                })
                .collect()
        };
        let path = |verb: &str| -> Result<String, String> {
            if tail.is_empty() {
                Err(format!("{} needs a script path", verb))
            } else {
                Ok(tail.to_string())
            }
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "list" | "ls" => Command::List,
            "select" | "sel" => Command::Select(ids("select")?),
            "deselect" | "unsel" => Command::Deselect(ids("deselect")?),
            "toggle" => Command::Toggle(ids("toggle")?),
            "all" => Command::SelectAll,
            "none" => Command::SelectNone,
            "refresh" => Command::Refresh,
            "check" => Command::Check(path("check")?),
            "run" => Command::Run(path("run")?),
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(format!("unknown command: {} (try 'help')", other)),
        };
        Ok(Some(command))
    }

    fn name(&self) -> &'static str {
        match self {
            Command::List => "list",
            Command::Select(_) => "select",
            Command::Deselect(_) => "deselect",
            Command::Toggle(_) => "toggle",
            Command::SelectAll => "all",
            Command::SelectNone => "none",
            Command::Refresh => "refresh",
            Command::Check(_) => "check",
            Command::Run(_) => "run",
            Command::Help => "help",
            Command::Quit => "quit",
        }
    }
}

/// Counters for one console session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub commands: u64,
    pub dispatched: u64,
    pub rejected: u64,
    pub failures: u64,
}

/// Operator loop over a line source and an output sink.
pub struct Console<'a, R, W> {
    registry: SharedRegistry,
    dispatcher: &'a ScriptDispatcher,
    boundary: Arc<dyn Boundary>,
    max_records: usize,
    changes: Option<Receiver<RefreshReport>>,
    prompt: bool,
    input: R,
    output: W,
    summary: SessionSummary,
}

impl<'a, R: BufRead, W: Write> Console<'a, R, W> {
    pub fn new(
        registry: SharedRegistry,
        dispatcher: &'a ScriptDispatcher,
        boundary: Arc<dyn Boundary>,
        max_records: usize,
        input: R,
        output: W,
    ) -> Self {
        Console {
            registry,
            dispatcher,
            boundary,
            max_records,
            changes: None,
            prompt: false,
            input,
            output,
            summary: SessionSummary::default(),
        }
    }

    /// Report membership changes arriving on `changes` between commands.
    pub fn with_change_feed(mut self, changes: Receiver<RefreshReport>) -> Self {
        self.changes = Some(changes);
        self
    }

    /// Print `> ` before reading each line.
    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }

    /// Run until `quit` or end of input.
    pub fn run(mut self) -> io::Result<SessionSummary> {
        let mut line = String::new();
        loop {
            self.drain_changes()?;
            if self.prompt {
                write!(self.output, "> ")?;
                self.output.flush()?;
            }

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }

            let command = match Command::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(message) => {
                    writeln!(self.output, "{}", message)?;
                    continue;
                }
            };

            self.summary.commands += 1;
            tracing::debug!(
                target: event_names::CONSOLE_COMMAND,
                command = command.name(),
                "console command"
            );
            if command == Command::Quit {
                break;
            }
            self.execute(command)?;
        }
        self.output.flush()?;
        Ok(self.summary)
    }

    fn drain_changes(&mut self) -> io::Result<()> {
        let Some(changes) = &self.changes else {
            return Ok(());
        };
        let notes: Vec<String> = changes.try_iter().filter_map(|r| render_refresh(&r)).collect();
        for note in notes {
            writeln!(self.output, "{}", note)?;
        }
        Ok(())
    }

    fn execute(&mut self, command: Command) -> io::Result<()> {
        match command {
            Command::List => self.list(),
            Command::Select(ids) => self.each_id(&ids, |reg, id| reg.set_selected(id, true)),
            Command::Deselect(ids) => self.each_id(&ids, |reg, id| reg.set_selected(id, false)),
            Command::Toggle(ids) => self.each_id(&ids, |reg, id| reg.toggle(id).map(|_| ())),
            Command::SelectAll => {
                let changed = self.registry.select_all();
                self.selection_changed(changed)
            }
            Command::SelectNone => {
                let changed = self.registry.deselect_all();
                self.selection_changed(changed)
            }
            Command::Refresh => self.refresh(),
            Command::Check(path) => self.check(&path),
            Command::Run(path) => self.run_script(&path),
            Command::Help => writeln!(self.output, "{}", HELP),
            Command::Quit => Ok(()),
        }
    }

    fn list(&mut self) -> io::Result<()> {
        let clients = self.registry.clients();
        writeln!(self.output, "{}", render_clients(&clients, OutputFormat::Human))
    }

    fn selection_changed(&mut self, changed: usize) -> io::Result<()> {
        tracing::debug!(target: event_names::SELECTION_CHANGED, changed, "selection changed");
        self.list()
    }

    fn each_id<F>(&mut self, ids: &[ClientId], apply: F) -> io::Result<()>
    where
        F: Fn(&SharedRegistry, ClientId) -> Result<(), RegistryError>,
    {
        let mut changed = 0;
        for &id in ids {
            match apply(&self.registry, id) {
                Ok(()) => {
                    changed += 1;
                    tracing::debug!(
                        target: event_names::SELECTION_CHANGED,
                        client_id = id.0,
                        "selection changed"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        target: event_names::SELECTION_UNKNOWN_CLIENT,
                        client_id = id.0,
                        "selection names an untracked client"
                    );
                    self.summary.failures += 1;
                    writeln!(
                        self.output,
                        "{}",
                        format_error_human(&sc_common::Error::from(err), false)
                    )?;
                }
            }
        }
        if changed > 0 {
            self.list()?;
        }
        Ok(())
    }

    fn refresh(&mut self) -> io::Result<()> {
        match self
            .registry
            .refresh_from(self.boundary.as_ref(), self.max_records)
        {
            Ok(report) => match render_refresh(&report) {
                Some(note) => writeln!(self.output, "{}", note),
                None => writeln!(self.output, "clients unchanged"),
            },
            Err(err) => {
                self.summary.failures += 1;
                self.report_error(sc_common::Error::from(err))
            }
        }
    }

    fn load(&mut self, path: &str) -> io::Result<Option<String>> {
        match read_script(path) {
            Ok(source) => Ok(Some(source)),
            Err(err) => {
                self.summary.failures += 1;
                self.report_error(sc_common::Error::Io(err))?;
                Ok(None)
            }
        }
    }

    fn check(&mut self, path: &str) -> io::Result<()> {
        let Some(source) = self.load(path)? else {
            return Ok(());
        };
        match self.dispatcher.check_compilable(&source) {
            Ok(status) => {
                if let CompileStatus::CompileError { .. } = status {
                    self.summary.rejected += 1;
                }
                writeln!(
                    self.output,
                    "{}",
                    render_compile_status(&status, OutputFormat::Human)
                )
            }
            Err(err) => {
                self.summary.failures += 1;
                self.report_error(err.into())
            }
        }
    }

    fn run_script(&mut self, path: &str) -> io::Result<()> {
        let Some(source) = self.load(path)? else {
            return Ok(());
        };
        match self.dispatcher.dispatch(&source, &self.registry) {
            Ok(result) => {
                match result {
                    DispatchResult::Sent { .. } => self.summary.dispatched += 1,
                    DispatchResult::Rejected { .. } => self.summary.rejected += 1,
                }
                writeln!(self.output, "{}", render_dispatch(&result, OutputFormat::Human))
            }
            Err(err) => {
                self.summary.failures += 1;
                self.report_error(err.into())
            }
        }
    }

    fn report_error(&mut self, err: sc_common::Error) -> io::Result<()> {
        writeln!(self.output, "{}", format_error_human(&err, false))
    }
}
