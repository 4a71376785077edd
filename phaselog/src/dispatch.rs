// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level application and command routing.

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Subcommand};
use phaselog_metadata::{PhaselogExitCode, RunInfoSummary};
use phaselog_runner::{
    config::{ConfigOverrides, PhaselogConfig},
    errors::EventReadError,
    events::RunnerEvent,
    helpers::plural,
    reporter::{SessionAggregator, SummaryDisplayer},
    router::{LogStyles, Severity},
    session::SessionContext,
};
use std::{fs::File, io::BufReader};
use tracing::{info, warn};

/// Per-test log routing and phase lifecycle tracking.
///
/// Replays test runner events into per-phase log files, a session export document and an
/// optional JUnit report, and summarizes existing session exports.
#[derive(Debug, clap::Parser)]
#[command(
    name = "phaselog",
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct PhaselogApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl PhaselogApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::Replay(opts) => opts.exec(output, output_writer),
            Command::Summary(opts) => opts.exec(output, output_writer),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Drive a session from a JSON lines event file.
    ///
    /// Writes per-phase log files, the session export document and, if configured, a JUnit
    /// report, then prints the session summary.
    Replay(ReplayOpts),

    /// Print the summary table of a session export document.
    Summary(SummaryOpts),
}

/// Configuration options for phaselog.
#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Config file [default: workspace-root/.config/phaselog.toml].
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// The phaselog profile to use.
    #[arg(long, short = 'P', env = "PHASELOG_PROFILE")]
    profile: Option<String>,

    /// Workspace root that relative paths are resolved against [default: current directory].
    #[arg(long, value_name = "DIR")]
    workspace_root: Option<Utf8PathBuf>,

    /// Directory for per-phase logs and exports, overriding the profile's log-dir.
    #[arg(long, value_name = "DIR")]
    log_dir: Option<Utf8PathBuf>,

    /// Minimum severity to record, overriding the profile's level.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<Severity>,
}

impl ConfigOpts {
    fn workspace_root(&self) -> Result<Utf8PathBuf> {
        if let Some(root) = &self.workspace_root {
            return Ok(root.clone());
        }
        let cwd = std::env::current_dir().map_err(|err| ExpectedError::CurrentDirFailed { err })?;
        Utf8PathBuf::try_from(cwd)
            .map_err(|err| ExpectedError::WorkspaceRootInvalidUtf8 { path: err.into_path_buf() })
    }

    fn make_config(&self, workspace_root: &Utf8Path) -> Result<PhaselogConfig> {
        Ok(PhaselogConfig::from_sources(
            workspace_root,
            self.config_file.as_deref(),
        )?)
    }

    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            log_dir: self.log_dir.clone(),
            level: self.log_level,
        }
    }
}

#[derive(Debug, Args)]
struct ReplayOpts {
    /// JSON lines file of runner events.
    #[arg(value_name = "EVENTS")]
    events: Utf8PathBuf,

    #[clap(flatten)]
    config: ConfigOpts,
}

impl ReplayOpts {
    fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let events = read_events(&self.events)?;

        let workspace_root = self.config.workspace_root()?;
        let config = self.config.make_config(&workspace_root)?;
        let profile = config.profile(
            self.config
                .profile
                .as_deref()
                .unwrap_or(PhaselogConfig::DEFAULT_PROFILE),
        )?;

        let mut styles = LogStyles::default();
        if output.color.should_colorize(supports_color::Stream::Stdout) {
            styles.colorize();
        }
        let settings = profile.session_settings(&self.config.overrides(), styles);

        let mut session = SessionContext::new(settings, output_writer.cmd_output());
        session
            .replay(&events)
            .map_err(|err| ExpectedError::replay_error(&self.events, err))?;
        let outputs = session.finish()?;

        let faults = session.faults().len();
        if faults > 0 {
            warn!(
                "{faults} {} recorded while replaying `{}`; some log files may be incomplete",
                plural::faults_str(faults),
                self.events,
            );
        }
        if output.verbose {
            for path in outputs.export.iter().chain(&outputs.junit) {
                info!("wrote {path}");
            }
        }

        let aggregator = session.aggregate();
        write_summary(&aggregator, output, output_writer)?;
        Ok(exit_code(&aggregator))
    }
}

#[derive(Debug, Args)]
struct SummaryOpts {
    /// Session export document to summarize.
    #[arg(value_name = "EXPORT")]
    export: Utf8PathBuf,
}

impl SummaryOpts {
    fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let summary = RunInfoSummary::read_from(&self.export)?;
        let aggregator = SessionAggregator::from_summary(&summary);
        write_summary(&aggregator, output, output_writer)?;
        Ok(exit_code(&aggregator))
    }
}

fn read_events(path: &Utf8Path) -> Result<Vec<RunnerEvent>> {
    let file = File::open(path)
        .map_err(|err| ExpectedError::event_read_error(path, EventReadError::Io(err)))?;
    RunnerEvent::read_from(BufReader::new(file))
        .map_err(|err| ExpectedError::event_read_error(path, err))
}

fn write_summary(
    aggregator: &SessionAggregator,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<()> {
    let mut displayer = SummaryDisplayer::new();
    if output.color.should_colorize(supports_color::Stream::Stdout) {
        displayer.colorize();
    }
    displayer
        .write_to(aggregator, output_writer.stdout_writer())
        .map_err(ExpectedError::write_output_error)
}

fn exit_code(aggregator: &SessionAggregator) -> i32 {
    if !aggregator.has_results() {
        PhaselogExitCode::NO_TESTS_RUN
    } else if aggregator.has_failures() {
        PhaselogExitCode::TEST_RUN_FAILED
    } else {
        PhaselogExitCode::OK
    }
}
