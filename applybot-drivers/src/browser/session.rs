//! The browser capabilities the detection core relies on.
//!
//! Implemented by [`crate::browser::page::ApplyPage`] for a live WebDriver
//! session and by fakes in tests.
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// A handle to one DOM element on the current page.
#[async_trait]
pub trait PageElement: Clone + Send + Sync {
    async fn is_visible(&self) -> Result<bool>;

    /// Rendered text of the element and its descendants.
    async fn text(&self) -> Result<String>;

    async fn attribute(&self, name: &str) -> Result<Option<String>>;
}

/// A driven browser tab.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    type Element: PageElement;

    async fn navigate(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// All elements matching a CSS selector; an empty vec when nothing matches.
    async fn find_all(&self, selector: &str) -> Result<Vec<Self::Element>>;

    async fn find_all_by_tag(&self, tag: &str) -> Result<Vec<Self::Element>>;

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value>;

    async fn set_timeouts(&self, page_load: Duration, script: Duration) -> Result<()>;

    /// Whether `err`, returned by this session, means the browser is gone.
    fn is_session_lost(&self, _err: &anyhow::Error) -> bool {
        false
    }
}
