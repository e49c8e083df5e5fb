//! The conformance command-line interface.
//!
//! `run` drives an external compiler through the JSON-lines process adapter
//! and prints a per-case report; `list` shows what discovery would run.

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::adapter::{process::ProcessAdapter, SystemUnderTest};
use crate::cli::args::{Command, CommonArgs, ConformanceArgs};
use crate::fixtures::{default_ignore, discover_suite_cases, register_fixture_suite, FixtureLayout};
use crate::normalize::normalize_name;
use crate::scenarios::{Scenario, ScenarioSuite};
use crate::settings::{HarnessSettings, SuiteSelector};
use crate::suite::SuiteRunner;
use crate::{err_msg, HarnessError};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    init_tracing();
    let args = ConformanceArgs::parse();

    let result = match args.command {
        Command::Run {
            common,
            timeout_ms,
            no_color,
            sut,
        } => handle_run(&common, timeout_ms, no_color, sut),
        Command::List { common } => handle_list(&common),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{:?}", miette::Report::new(error));
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries only the report. `RUST_LOG` overrides
/// the default `warn` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .try_init();
}

/// Loads the settings file, if any, and applies command-line overrides.
pub fn resolve_settings(common: &CommonArgs) -> Result<HarnessSettings, HarnessError> {
    let mut settings = match &common.settings {
        Some(path) => HarnessSettings::load(path)?,
        None => HarnessSettings::default(),
    };
    if let Some(root) = &common.fixtures {
        settings.fixture_root = root.clone();
    }
    if !common.suites.is_empty() {
        settings.suites = common.suites.clone();
    }
    Ok(settings)
}

fn handle_run(
    common: &CommonArgs,
    timeout_ms: Option<u64>,
    no_color: bool,
    sut_command: Vec<String>,
) -> Result<ExitCode, HarnessError> {
    let mut settings = resolve_settings(common)?;
    if !sut_command.is_empty() {
        settings.sut_command = sut_command;
    }
    if timeout_ms.is_some() {
        settings.case_timeout_ms = timeout_ms;
    }
    if no_color {
        settings.use_colors = false;
    }

    if settings.sut_command.is_empty() {
        return Err(HarnessError::Settings {
            path: common.settings.clone().unwrap_or_else(|| PathBuf::from("<command line>")),
            message: "no compiler command given; pass it after `--` or set sut_command".into(),
        });
    }
    let adapter = Arc::new(ProcessAdapter::new(settings.sut_command.as_slice())?);
    info!(program = %adapter.program().display(), "using process adapter");

    let runner = build_runner(&settings, Arc::clone(&adapter) as Arc<dyn SystemUnderTest>)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| err_msg!(Internal, "cannot start runtime: {}", e))?;
    let report = runtime.block_on(async {
        let report = runner.run().await;
        if let Err(error) = adapter.shutdown().await {
            warn!(%error, "compiler did not shut down cleanly");
        }
        report
    });

    output::print_report(&report, settings.use_colors)
        .map_err(|e| err_msg!(Internal, "cannot write report: {}", e))?;

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Registers every selected suite against `sut`.
pub fn build_runner(
    settings: &HarnessSettings,
    sut: Arc<dyn SystemUnderTest>,
) -> Result<SuiteRunner, HarnessError> {
    let layout = FixtureLayout::new(&settings.fixture_root);
    let mut runner = SuiteRunner::new().with_case_timeout(settings.case_timeout());
    for selector in settings.selected_suites() {
        debug!(suite = selector.key(), "registering suite");
        match selector {
            SuiteSelector::Scenarios => {
                ScenarioSuite::new(Arc::clone(&sut), layout.import_dir())
                    .register(&mut runner, selector.suite_name());
            }
            _ => register_fixture_suite(
                &mut runner,
                selector,
                &layout,
                Arc::clone(&sut),
                settings.extra_ignore_for(selector),
            )?,
        }
    }
    Ok(runner)
}

fn handle_list(common: &CommonArgs) -> Result<ExitCode, HarnessError> {
    let settings = resolve_settings(common)?;
    let layout = FixtureLayout::new(&settings.fixture_root);
    let mut stdout = io::stdout().lock();

    for selector in settings.selected_suites() {
        let ids: Vec<String> = match selector {
            SuiteSelector::Scenarios => Scenario::ALL.iter().map(|s| s.id().to_string()).collect(),
            _ => discover_suite_cases(selector, &layout)?
                .into_iter()
                .map(|case| case.id)
                .collect(),
        };
        let ignore: BTreeSet<String> = default_ignore(selector)
            .iter()
            .map(|entry| normalize_name(entry))
            .chain(settings.extra_ignore_for(selector).iter().map(|e| normalize_name(e)))
            .collect();
        output::write_listing(&mut stdout, selector.suite_name(), &ids, |id| {
            ignore.contains(&normalize_name(id))
        })
        .map_err(|e| err_msg!(Internal, "cannot write listing: {}", e))?;
    }
    Ok(ExitCode::SUCCESS)
}

