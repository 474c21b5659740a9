use anyhow::{Context, Result};
use applybot_common::observability::{LogConfig, init_logging};
use applybot_config::ApplybotConfig;
use applybot_core::{AuthGate, DiscoveryOnly, ListingLocator, RunState, Runner, SessionStore};
use applybot_drivers::browser::driver::ApplyDriver;
use clap::Parser;
use cli::{Cli, Command, launch_options};
use tracing::{info, warn};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.load_config()?;

    let log_path = init_logging(LogConfig {
        app_name: "applybot",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
    })?;
    info!(target: "app", log = %log_path.display(), "applybot starting");

    match &cli.command {
        Command::History => history(&cfg),
        Command::Search { keyword, location } => search(&cfg, keyword, location).await,
        Command::Run { .. } => run(&cfg).await,
    }
}

fn history(cfg: &ApplybotConfig) -> Result<()> {
    let store = SessionStore::new(&cfg.store.path);
    let records = store
        .records()
        .with_context(|| format!("failed to read {}", store.path().display()))?;
    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    info!(target: "app.history", count = records.len(), "history printed");
    Ok(())
}

async fn search(cfg: &ApplybotConfig, keyword: &str, location: &str) -> Result<()> {
    let driver = ApplyDriver::launch(&launch_options(cfg)).await?;
    let gate = AuthGate::from_settings(&cfg.site, &cfg.auth);
    let locator = ListingLocator::from_settings(&cfg.site, &cfg.listing);

    let outcome = locator.locate(driver.page(), &gate, keyword, location).await;
    driver.close().await?;

    let listings = outcome?;
    println!(
        "{}",
        serde_json::json!({
            "keyword": keyword,
            "location": location,
            "url": locator.search_url(keyword, location),
            "count": listings.len(),
            "matched_by": listings.matched_by(),
        })
    );
    Ok(())
}

async fn run(cfg: &ApplybotConfig) -> Result<()> {
    let driver = ApplyDriver::launch(&launch_options(cfg)).await?;
    let runner = Runner::from_config(cfg, DiscoveryOnly);
    let state = RunState::restore(SessionStore::new(&cfg.store.path), cfg.run.max_applications);

    let outcome = tokio::select! {
        outcome = runner.run(driver.page(), state) => Some(outcome),
        _ = tokio::signal::ctrl_c() => {
            warn!(target: "app.run", "interrupted; closing browser");
            None
        }
    };
    if let Err(err) = driver.close().await {
        warn!(target: "app.run", error = %err, "browser did not close cleanly");
    }

    if let Some(outcome) = outcome {
        let (_, report) = outcome?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
