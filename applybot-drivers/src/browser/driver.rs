use crate::browser::{
    behavioral::BehavioralEngine,
    page::ApplyPage,
    session::BrowserSession,
    stealth::{chrome_options, StealthScripts},
};
use anyhow::{Context, Result};
use applybot_common::StealthLevel;
use fantoccini::{Client, ClientBuilder};
use std::time::Duration;
use tracing::info;
use url::Url;
use webdriver::capabilities::Capabilities;

/// Everything needed to open a configured browser session.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth_level: StealthLevel,
    pub page_load_timeout: Duration,
    pub script_timeout: Duration,
    pub implicit_wait: Duration,
    pub navigation_jitter_ms: (u64, u64),
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: false,
            stealth_level: StealthLevel::Balanced,
            page_load_timeout: Duration::from_secs(30),
            script_timeout: Duration::from_secs(30),
            implicit_wait: Duration::ZERO,
            navigation_jitter_ms: (300, 1200),
        }
    }
}

/// Thin wrapper around a `fantoccini` WebDriver client.
pub struct ApplyDriver {
    pub client: Client,
    page: ApplyPage,
}

impl ApplyDriver {
    /// Connect to a running WebDriver service (Chromedriver by default) and
    /// apply timeouts and the initial stealth script.
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let endpoint = Url::parse(&options.webdriver_url)
            .with_context(|| format!("invalid webdriver url: {}", options.webdriver_url))?;

        let mut caps = Capabilities::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            chrome_options(options.stealth_level, options.headless),
        );

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(endpoint.as_str())
            .await
            .with_context(|| format!("failed to connect to webdriver at {endpoint}"))?;

        let page = ApplyPage::new(
            client.clone(),
            options.stealth_level,
            BehavioralEngine::new(options.navigation_jitter_ms),
        );
        page.configure_timeouts(
            options.page_load_timeout,
            options.script_timeout,
            Some(options.implicit_wait),
        )
        .await?;
        page.execute(StealthScripts::webdriver_flag(), vec![]).await?;

        info!(
            target: "browser.driver",
            endpoint = %endpoint,
            headless = options.headless,
            stealth = ?options.stealth_level,
            "browser session ready"
        );

        Ok(Self { client, page })
    }

    /// The tab all navigation happens in.
    pub fn page(&self) -> &ApplyPage {
        &self.page
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}
