use crate::browser::{
    behavioral::BehavioralEngine,
    session::{BrowserSession, PageElement},
    stealth::StealthScripts,
};
use anyhow::Result;
use applybot_common::StealthLevel;
use async_trait::async_trait;
use fantoccini::{
    elements::Element,
    error::{CmdError, ErrorStatus},
    wd::TimeoutConfiguration,
    Client, Locator,
};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// fantoccini-backed browser tab.
#[derive(Clone)]
pub struct ApplyPage {
    pub(crate) client: Client,
    pub(crate) stealth_level: StealthLevel,
    pub(crate) behavioral_engine: BehavioralEngine,
}

impl ApplyPage {
    pub fn new(
        client: Client,
        stealth_level: StealthLevel,
        behavioral_engine: BehavioralEngine,
    ) -> Self {
        Self {
            client,
            stealth_level,
            behavioral_engine,
        }
    }

    /// Run the stealth scripts for the configured level on the current page.
    ///
    /// A failing script only weakens stealth, so it is logged and skipped.
    async fn apply_stealth(&self) {
        for script in StealthScripts::for_level(self.stealth_level) {
            if let Err(err) = self.client.execute(script, vec![]).await {
                warn!(target: "browser.stealth", error = %err, "stealth script failed");
            }
        }
    }

    /// Set page-load, script and implicit-wait timeouts in one call.
    pub async fn configure_timeouts(
        &self,
        page_load: Duration,
        script: Duration,
        implicit: Option<Duration>,
    ) -> Result<()> {
        let timeouts = TimeoutConfiguration::new(Some(script), Some(page_load), implicit);
        self.client.update_timeouts(timeouts).await?;
        Ok(())
    }

    fn wrap(elements: Vec<Element>) -> Vec<ApplyNode> {
        elements.into_iter().map(ApplyNode::new).collect()
    }
}

#[async_trait]
impl BrowserSession for ApplyPage {
    type Element = ApplyNode;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.behavioral_engine.before_navigation().await;
        debug!(target: "browser.navigate", %url, "goto");
        self.client.goto(url).await?;
        self.apply_stealth().await;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<ApplyNode>> {
        let elements = self.client.find_all(Locator::Css(selector)).await?;
        Ok(Self::wrap(elements))
    }

    async fn find_all_by_tag(&self, tag: &str) -> Result<Vec<ApplyNode>> {
        // a bare tag name is a valid CSS type selector
        let elements = self.client.find_all(Locator::Css(tag)).await?;
        Ok(Self::wrap(elements))
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        Ok(self.client.execute(script, args).await?)
    }

    async fn set_timeouts(&self, page_load: Duration, script: Duration) -> Result<()> {
        self.configure_timeouts(page_load, script, None).await
    }

    fn is_session_lost(&self, err: &anyhow::Error) -> bool {
        is_session_lost(err)
    }
}

/// Classify WebDriver failures that leave nothing to drive.
///
/// A dead session or closed window is reported by the WebDriver itself; a
/// crashed chromedriver shows up as a failed or lost connection.
pub fn is_session_lost(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<CmdError>() {
        Some(CmdError::Standard(wd)) => matches!(
            wd.error,
            ErrorStatus::InvalidSessionId | ErrorStatus::NoSuchWindow
        ),
        Some(CmdError::Lost(_) | CmdError::Failed(_) | CmdError::FailedC(_)) => true,
        _ => false,
    }
}

// =========================
// ApplyNode Definition
// =========================

#[derive(Clone)]
/// A DOM element on an [`ApplyPage`].
pub struct ApplyNode {
    pub element: Element,
}

impl ApplyNode {
    pub fn new(element: Element) -> Self {
        Self { element }
    }
}

#[async_trait]
impl PageElement for ApplyNode {
    async fn is_visible(&self) -> Result<bool> {
        self.element.is_displayed().await.map_err(anyhow::Error::from)
    }

    async fn text(&self) -> Result<String> {
        self.element.text().await.map_err(anyhow::Error::from)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.element.attr(name).await.map_err(anyhow::Error::from)
    }
}
