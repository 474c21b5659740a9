//! Finds job listings on a results page whose markup is not under our control.
//!
//! Detection is an ordered cascade of [`DetectionStrategy`] values reduced with
//! a short-circuit: the first strategy that finds anything wins and the rest
//! are never consulted. Structural CSS selectors come first; a loose
//! text-content heuristic sits at the end to survive a full redesign.
use crate::auth::AuthGate;
use applybot_common::BotError;
use applybot_config::{HeuristicSettings, ListingSettings, SiteSettings};
use applybot_drivers::browser::session::{BrowserSession, PageElement};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Result of running one strategy.
#[derive(Debug)]
pub enum Detection<E> {
    Found(Vec<E>),
    NotFound,
    /// The probe itself failed; the cascade treats this like `NotFound`.
    ProbeError(String),
}

/// Content rule for the fallback strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHeuristic {
    pub container_tag: String,
    /// Text must be strictly longer than this many characters.
    pub min_text_len: usize,
    pub required_token: String,
    pub any_of: Vec<String>,
}

impl Default for ContentHeuristic {
    fn default() -> Self {
        Self::from_settings(&HeuristicSettings::default())
    }
}

impl ContentHeuristic {
    pub fn from_settings(settings: &HeuristicSettings) -> Self {
        Self {
            container_tag: settings.container_tag.clone(),
            min_text_len: settings.min_text_len,
            required_token: settings.required_token.to_lowercase(),
            any_of: settings.any_of.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    pub fn matches_text(&self, text: &str) -> bool {
        if text.chars().count() <= self.min_text_len {
            return false;
        }
        let lower = text.to_lowercase();
        lower.contains(&self.required_token) && self.any_of.iter().any(|t| lower.contains(t))
    }

    async fn scan<S: BrowserSession>(&self, session: &S) -> Detection<S::Element> {
        let containers = match session.find_all_by_tag(&self.container_tag).await {
            Ok(containers) => containers,
            Err(err) => return Detection::ProbeError(err.to_string()),
        };

        let mut matched = Vec::new();
        for element in containers {
            // unreadable elements are simply not candidates
            if !matches!(element.is_visible().await, Ok(true)) {
                continue;
            }
            match element.text().await {
                Ok(text) if self.matches_text(&text) => matched.push((element, text)),
                _ => {}
            }
        }

        let matched = innermost(matched);
        if matched.is_empty() {
            Detection::NotFound
        } else {
            Detection::Found(matched)
        }
    }
}

/// Drop containers that wrap another match, and repeats of the same text.
///
/// Nested `div`s around one card all pass the content rule; only the
/// innermost one is the listing.
fn innermost<E>(matched: Vec<(E, String)>) -> Vec<E> {
    let texts: Vec<String> = matched.iter().map(|(_, text)| text.trim().to_string()).collect();
    matched
        .into_iter()
        .enumerate()
        .filter(|(i, _)| {
            let text = &texts[*i];
            let wraps_another = texts
                .iter()
                .any(|other| other.len() < text.len() && text.contains(other.as_str()));
            let repeats_earlier = texts[..*i].iter().any(|earlier| earlier == text);
            !wraps_another && !repeats_earlier
        })
        .map(|(_, (element, _))| element)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionStrategy {
    Selector(String),
    ContentHeuristic(ContentHeuristic),
}

impl DetectionStrategy {
    pub fn label(&self) -> String {
        match self {
            DetectionStrategy::Selector(css) => css.clone(),
            DetectionStrategy::ContentHeuristic(rule) => {
                format!("heuristic:{}", rule.container_tag)
            }
        }
    }

    pub async fn detect<S: BrowserSession>(&self, session: &S) -> Detection<S::Element> {
        match self {
            DetectionStrategy::Selector(css) => match session.find_all(css).await {
                Ok(elements) if !elements.is_empty() => Detection::Found(elements),
                Ok(_) => Detection::NotFound,
                Err(err) => Detection::ProbeError(err.to_string()),
            },
            DetectionStrategy::ContentHeuristic(rule) => rule.scan(session).await,
        }
    }
}

/// Listings found by one search, and which strategy found them.
#[derive(Debug)]
pub struct ListingSet<E> {
    elements: Vec<E>,
    matched_by: Option<String>,
}

impl<E> ListingSet<E> {
    pub fn empty() -> Self {
        Self {
            elements: Vec::new(),
            matched_by: None,
        }
    }

    fn found(elements: Vec<E>, matched_by: String) -> Self {
        Self {
            elements,
            matched_by: Some(matched_by),
        }
    }

    pub fn is_found(&self) -> bool {
        !self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[E] {
        &self.elements
    }

    pub fn matched_by(&self) -> Option<&str> {
        self.matched_by.as_deref()
    }

    pub fn into_elements(self) -> Vec<E> {
        self.elements
    }
}

/// Fill `{keyword}` and `{location}` in `template`.
///
/// The keyword is lower-cased with spaces turned into hyphens; the location is
/// only lower-cased.
pub fn build_search_url(template: &str, keyword: &str, location: &str) -> String {
    let keyword = keyword.trim().to_lowercase().replace(' ', "-");
    let location = location.trim().to_lowercase();
    template
        .replace("{keyword}", &keyword)
        .replace("{location}", &location)
}

pub struct ListingLocator {
    search_url_template: String,
    strategies: Vec<DetectionStrategy>,
    settle_delay: Duration,
}

impl ListingLocator {
    pub fn new(search_url_template: impl Into<String>, strategies: Vec<DetectionStrategy>) -> Self {
        Self {
            search_url_template: search_url_template.into(),
            strategies,
            settle_delay: Duration::from_secs(5),
        }
    }

    /// Selectors in configured order, then the heuristic if enabled.
    pub fn from_settings(site: &SiteSettings, listing: &ListingSettings) -> Self {
        let mut strategies: Vec<DetectionStrategy> = listing
            .selectors
            .iter()
            .map(|css| DetectionStrategy::Selector(css.clone()))
            .collect();
        if listing.heuristic.enabled {
            strategies.push(DetectionStrategy::ContentHeuristic(
                ContentHeuristic::from_settings(&listing.heuristic),
            ));
        }
        Self::new(site.search_url_template.clone(), strategies).with_settle_delay(site.settle_delay())
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn strategies(&self) -> &[DetectionStrategy] {
        &self.strategies
    }

    pub fn search_url(&self, keyword: &str, location: &str) -> String {
        build_search_url(&self.search_url_template, keyword, location)
    }

    /// Run the cascade against whatever page is loaded.
    pub async fn detect<S: BrowserSession>(&self, session: &S) -> ListingSet<S::Element> {
        for strategy in &self.strategies {
            let label = strategy.label();
            match strategy.detect(session).await {
                Detection::Found(elements) => {
                    info!(target: "locator.detect", strategy = %label, count = elements.len(), "listings found");
                    return ListingSet::found(elements, label);
                }
                Detection::NotFound => {
                    debug!(target: "locator.detect", strategy = %label, "no match");
                }
                Detection::ProbeError(reason) => {
                    warn!(target: "locator.detect", strategy = %label, %reason, "strategy failed");
                }
            }
        }
        ListingSet::empty()
    }

    /// Navigate to the search page for one (keyword, location) pair and detect
    /// listings there.
    ///
    /// Navigation faults degrade to an empty set. Only a lost browser session
    /// is returned as an error.
    pub async fn locate<S: BrowserSession>(
        &self,
        session: &S,
        gate: &AuthGate,
        keyword: &str,
        location: &str,
    ) -> Result<ListingSet<S::Element>, BotError> {
        let url = self.search_url(keyword, location);
        info!(target: "locator.locate", %keyword, %location, %url, "searching");

        if let Err(err) = self.navigate_settled(session, &url).await {
            return degrade(session, err);
        }

        let landed = match session.current_url().await {
            Ok(landed) => landed,
            Err(err) => return degrade(session, err),
        };
        if gate.is_login_page(&landed) {
            warn!(target: "locator.locate", %landed, "redirected to login page");
            gate.await_manual_authentication(session, gate.window()).await;
            if let Err(err) = self.navigate_settled(session, &url).await {
                return degrade(session, err);
            }
        }

        let listings = self.detect(session).await;
        if listings.is_found() {
            info!(target: "locator.locate", %keyword, %location, count = listings.len(), "search complete");
        } else {
            warn!(target: "locator.locate", %keyword, %location, "no listings found");
        }
        Ok(listings)
    }

    async fn navigate_settled<S: BrowserSession>(&self, session: &S, url: &str) -> anyhow::Result<()> {
        session.navigate(url).await?;
        if !self.settle_delay.is_zero() {
            sleep(self.settle_delay).await;
        }
        Ok(())
    }
}

/// Lift a browser failure into [`BotError`], asking the session whether the
/// browser is gone.
pub(crate) fn classify<S: BrowserSession>(session: &S, err: anyhow::Error) -> BotError {
    if session.is_session_lost(&err) {
        BotError::SessionLost(format!("{err:#}"))
    } else {
        BotError::Driver(err)
    }
}

fn degrade<S: BrowserSession>(
    session: &S,
    err: anyhow::Error,
) -> Result<ListingSet<S::Element>, BotError> {
    let err = classify(session, err);
    if err.is_fatal() {
        return Err(err);
    }
    warn!(target: "locator.locate", error = %err, "navigation failed; skipping search");
    Ok(ListingSet::empty())
}
