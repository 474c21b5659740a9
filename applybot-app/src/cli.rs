//! Command-line surface.
use applybot_common::BotError;
use applybot_config::{ApplybotConfig, ApplybotConfigLoader, DEFAULT_CONFIG_FILE, user_config_path};
use applybot_drivers::browser::driver::LaunchOptions;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "applybot", version, about = "Search job listings and keep a ledger of applications")]
pub struct Cli {
    /// YAML config file; without it `./applybot.yaml` and the per-user file are tried
    #[arg(long, short, global = true, env = "APPLYBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long, global = true, default_value_t = false)]
    pub headless: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Search every configured keyword and location
    Run {
        /// Override run.max_applications
        #[arg(long)]
        max_applications: Option<usize>,
    },
    /// Look for listings on a single search page
    Search {
        #[arg(long)]
        keyword: String,
        #[arg(long)]
        location: String,
    },
    /// Print the jobs already recorded as applied
    History,
}

impl Cli {
    /// Load config from `--config` when given, otherwise from the optional
    /// per-user and working-directory files (the latter wins).
    pub fn load_config(&self) -> applybot_common::Result<ApplybotConfig> {
        let loader = match &self.config {
            Some(path) => ApplybotConfigLoader::new().with_file(path),
            None => {
                let mut loader = ApplybotConfigLoader::new();
                if let Some(user) = user_config_path() {
                    loader = loader.with_optional_file(user);
                }
                loader.with_optional_file(DEFAULT_CONFIG_FILE)
            }
        };
        let mut cfg = loader
            .load()
            .map_err(|err| BotError::Config(err.to_string()))?;
        if self.headless {
            cfg.browser.headless = true;
        }
        if let Command::Run {
            max_applications: Some(ceiling),
        } = &self.command
        {
            cfg.run.max_applications = *ceiling;
        }
        Ok(cfg)
    }
}

pub fn launch_options(cfg: &ApplybotConfig) -> LaunchOptions {
    let browser = &cfg.browser;
    LaunchOptions {
        webdriver_url: browser.webdriver_url.clone(),
        headless: browser.headless,
        stealth_level: browser.stealth,
        page_load_timeout: browser.page_load_timeout(),
        script_timeout: browser.script_timeout(),
        implicit_wait: browser.implicit_wait(),
        navigation_jitter_ms: browser.navigation_jitter_ms,
    }
}
