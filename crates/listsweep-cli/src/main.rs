//! Listsweep CLI: bulk removal from a Watch later list
//!
//! ## Usage
//!
//! ```bash
//! listsweep --headed --user-data-dir ~/.listsweep list
//! listsweep select-all
//! listsweep delete              # asks first; Ctrl-C stops after the current item
//! listsweep stats
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use listsweep::{JsonFileStore, Store, SweepConfig};
use listsweep_cli::{
    load_statistics, Cli, CliConfig, CliError, CliResult, Commands, ProgressReporter, Verbosity,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    // Build configuration from CLI args
    let config = build_config(&cli);
    init_logging(&config);

    let reporter = Arc::new(ProgressReporter::new(
        config.color.should_color(),
        config.verbosity.is_quiet(),
    ));
    let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(&config.state_path));

    if matches!(cli.command, Commands::Stats) {
        return run_stats(store.as_ref());
    }

    let sweep = load_sweep_config(&cli, &config)?;
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::unavailable(format!("Failed to create runtime: {e}")))?;
    rt.block_on(live::run(&cli, &sweep, store, reporter))
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
        .with_json_logs(cli.json_logs)
        .with_state_path(&cli.state)
        .with_config_path(cli.config.clone())
}

fn init_logging(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_directive()));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(config.color.should_color())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if let Err(err) = result {
        eprintln!("logging disabled: {err}");
    }
}

fn load_sweep_config(cli: &Cli, config: &CliConfig) -> CliResult<SweepConfig> {
    let mut sweep = match config.config_path {
        Some(ref path) => SweepConfig::load(path).map_err(|e| {
            CliError::config(format!("{}: {e}", path.display()))
        })?,
        None => SweepConfig::default(),
    };
    if let Some(ref url) = cli.url {
        sweep.page_url.clone_from(url);
    }
    Ok(sweep)
}

fn run_stats(store: &dyn Store) -> CliResult<()> {
    let summary = load_statistics(store)?.summary(chrono::Utc::now());
    println!("{summary}");
    Ok(())
}

#[cfg(feature = "browser")]
mod live {
    use std::sync::Arc;

    use listsweep::{Automation, Browser, BrowserConfig, Store, SweepConfig};
    use listsweep_cli::{dispatch, Cli, CliResult, HostCoordinator, ProgressReporter};

    fn browser_config(cli: &Cli) -> BrowserConfig {
        let mut config = BrowserConfig::default().with_headless(!cli.headed);
        if cli.no_sandbox {
            config = config.with_no_sandbox();
        }
        if let Some(ref path) = cli.chromium_path {
            config = config.with_chromium_path(path);
        }
        if let Some(ref dir) = cli.user_data_dir {
            config = config.with_user_data_dir(dir);
        }
        if let Some(ref endpoint) = cli.connect {
            config = config.with_connect(endpoint);
        }
        config
    }

    pub async fn run(
        cli: &Cli,
        sweep: &SweepConfig,
        store: Arc<dyn Store>,
        reporter: Arc<ProgressReporter>,
    ) -> CliResult<()> {
        let browser = Browser::start(browser_config(cli)).await?;
        let driver = browser.open(&sweep.page_url).await?;

        let coordinator = Arc::new(HostCoordinator::new(store.clone(), reporter.clone()));
        let mut automation = Automation::builder(driver)
            .with_config(sweep)
            .with_store(store)
            .with_ui(reporter.clone())
            .with_coordinator(coordinator)
            .build();
        automation.attach().await;

        let interrupt = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %err, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        let result = dispatch(&cli.command, &mut automation, &reporter, interrupt).await;

        if let Err(err) = browser.close().await {
            tracing::warn!(error = %err, "browser did not close cleanly");
        }
        if let Some(output) = result? {
            println!("{output}");
        }
        Ok(())
    }
}

#[cfg(not(feature = "browser"))]
mod live {
    use std::sync::Arc;

    use listsweep::{Store, SweepConfig};
    use listsweep_cli::{Cli, CliError, CliResult, ProgressReporter};

    pub async fn run(
        _cli: &Cli,
        _sweep: &SweepConfig,
        _store: Arc<dyn Store>,
        _reporter: Arc<ProgressReporter>,
    ) -> CliResult<()> {
        Err(CliError::unavailable(
            "this build has no browser support; rebuild with --features browser",
        ))
    }
}
