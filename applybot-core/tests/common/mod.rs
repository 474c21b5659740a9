#![allow(dead_code)]

use anyhow::{Result, anyhow};
use applybot_drivers::browser::session::{BrowserSession, PageElement};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub tag: &'static str,
    pub text: String,
    pub visible: bool,
    pub attrs: HashMap<String, String>,
    pub broken: bool,
}

impl FakeElement {
    pub fn card(text: &str) -> Self {
        Self {
            tag: "div",
            text: text.to_string(),
            visible: true,
            attrs: HashMap::new(),
            broken: false,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.attrs.insert("data-job-id".to_string(), id.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Every read on this element fails.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

#[async_trait]
impl PageElement for FakeElement {
    async fn is_visible(&self) -> Result<bool> {
        if self.broken {
            return Err(anyhow!("stale element reference"));
        }
        Ok(self.visible)
    }

    async fn text(&self) -> Result<String> {
        if self.broken {
            return Err(anyhow!("stale element reference"));
        }
        Ok(self.text.clone())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        if self.broken {
            return Err(anyhow!("stale element reference"));
        }
        Ok(self.attrs.get(name).cloned())
    }
}

/// Marker error the fake classifies as a dead browser.
#[derive(Debug, thiserror::Error)]
#[error("browser session lost")]
pub struct Lost;

#[derive(Debug, Clone)]
pub enum Query {
    Found(Vec<FakeElement>),
    Fails(String),
}

#[derive(Default)]
struct State {
    current_url: String,
    selectors: HashMap<String, Query>,
    tags: HashMap<String, Vec<FakeElement>>,
    /// URLs the browser "lands on" instead of the requested one, consumed per navigation.
    landings: VecDeque<String>,
    navigate_failures: VecDeque<anyhow::Error>,
    url_fails: bool,
    navigations: Vec<String>,
    queries: Vec<String>,
}

/// A single page whose DOM is whatever the test put in it.
#[derive(Default)]
pub struct FakeSession {
    state: Mutex<State>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selector(self, selector: &str, elements: Vec<FakeElement>) -> Self {
        self.lock()
            .selectors
            .insert(selector.to_string(), Query::Found(elements));
        self
    }

    pub fn with_failing_selector(self, selector: &str) -> Self {
        self.lock().selectors.insert(
            selector.to_string(),
            Query::Fails(format!("invalid selector: {selector}")),
        );
        self
    }

    pub fn with_tag(self, tag: &str, elements: Vec<FakeElement>) -> Self {
        self.lock().tags.insert(tag.to_string(), elements);
        self
    }

    pub fn landing_on(self, url: &str) -> Self {
        self.lock().landings.push_back(url.to_string());
        self
    }

    pub fn failing_navigation(self, err: anyhow::Error) -> Self {
        self.lock().navigate_failures.push_back(err);
        self
    }

    pub fn with_failing_url(self) -> Self {
        self.lock().url_fails = true;
        self
    }

    pub fn set_current_url(&self, url: &str) {
        self.lock().current_url = url.to_string();
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.lock().queries.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake session poisoned")
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.lock();
        state.navigations.push(url.to_string());
        if let Some(err) = state.navigate_failures.pop_front() {
            return Err(err);
        }
        let landed = state.landings.pop_front().unwrap_or_else(|| url.to_string());
        state.current_url = landed;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let state = self.lock();
        if state.url_fails {
            return Err(anyhow!("no such window"));
        }
        Ok(state.current_url.clone())
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<FakeElement>> {
        let mut state = self.lock();
        state.queries.push(selector.to_string());
        match state.selectors.get(selector) {
            Some(Query::Found(elements)) => Ok(elements.clone()),
            Some(Query::Fails(reason)) => Err(anyhow!(reason.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn find_all_by_tag(&self, tag: &str) -> Result<Vec<FakeElement>> {
        let mut state = self.lock();
        state.queries.push(format!("<{tag}>"));
        Ok(state.tags.get(tag).cloned().unwrap_or_default())
    }

    async fn execute(&self, _script: &str, _args: Vec<Value>) -> Result<Value> {
        Ok(Value::Null)
    }

    async fn set_timeouts(&self, _page_load: Duration, _script: Duration) -> Result<()> {
        Ok(())
    }

    fn is_session_lost(&self, err: &anyhow::Error) -> bool {
        err.downcast_ref::<Lost>().is_some()
    }
}

pub fn cards(prefix: &str, n: usize) -> Vec<FakeElement> {
    (0..n)
        .map(|i| FakeElement::card(&format!("{prefix} {i}\nCompany {i}")).with_id(&format!("{prefix}-{i}")))
        .collect()
}
