//! Decides whether the browser session is logged in.
//!
//! Authentication is a prioritized OR over independent signals. A signal that
//! faults (a WebDriver error, a bad selector) counts as a miss and evaluation
//! moves on, so no single piece of site markup is load-bearing.
use applybot_config::{AuthSettings, SiteSettings};
use applybot_drivers::browser::session::{BrowserSession, PageElement};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Stand-in deadline for windows too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSignal {
    /// The current URL contains this fragment.
    UrlContains(String),
    /// Some element matching one of these selectors is visible.
    VisibleAny {
        name: String,
        selectors: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    Matched,
    Missed,
    Faulted(String),
}

impl SignalOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, SignalOutcome::Matched)
    }
}

impl AuthSignal {
    pub fn name(&self) -> &str {
        match self {
            AuthSignal::UrlContains(_) => "url",
            AuthSignal::VisibleAny { name, .. } => name.as_str(),
        }
    }

    pub async fn evaluate<S: BrowserSession>(&self, session: &S) -> SignalOutcome {
        match self {
            AuthSignal::UrlContains(fragment) => match session.current_url().await {
                Ok(url) if url.contains(fragment.as_str()) => SignalOutcome::Matched,
                Ok(_) => SignalOutcome::Missed,
                Err(err) => SignalOutcome::Faulted(err.to_string()),
            },
            AuthSignal::VisibleAny { selectors, .. } => {
                let mut fault = None;
                for selector in selectors {
                    let elements = match session.find_all(selector).await {
                        Ok(elements) => elements,
                        Err(err) => {
                            debug!(target: "auth.signal", %selector, error = %err, "selector faulted");
                            fault = Some(format!("{selector}: {err}"));
                            continue;
                        }
                    };
                    for element in &elements {
                        match element.is_visible().await {
                            Ok(true) => return SignalOutcome::Matched,
                            Ok(false) => {}
                            Err(err) => fault = Some(format!("{selector}: {err}")),
                        }
                    }
                }
                fault.map_or(SignalOutcome::Missed, SignalOutcome::Faulted)
            }
        }
    }
}

pub struct AuthGate {
    login_url: String,
    login_marker: String,
    signals: Vec<AuthSignal>,
    window: Duration,
    poll_interval: Duration,
}

impl AuthGate {
    pub fn new(login_url: impl Into<String>, signals: Vec<AuthSignal>) -> Self {
        Self {
            login_url: login_url.into(),
            login_marker: "login".to_string(),
            signals,
            window: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
        }
    }

    pub fn from_settings(site: &SiteSettings, auth: &AuthSettings) -> Self {
        let signals = vec![
            AuthSignal::UrlContains(auth.authenticated_url_fragment.clone()),
            AuthSignal::VisibleAny {
                name: "profile".to_string(),
                selectors: auth.profile_selectors.clone(),
            },
            AuthSignal::VisibleAny {
                name: "navigation".to_string(),
                selectors: auth.navigation_selectors.clone(),
            },
        ];
        Self::new(site.login_url.clone(), signals)
            .with_login_marker(site.login_marker.clone())
            .with_window(auth.window())
            .with_poll_interval(auth.poll_interval())
    }

    pub fn with_login_marker(mut self, marker: impl Into<String>) -> Self {
        self.login_marker = marker.into().to_lowercase();
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn signals(&self) -> &[AuthSignal] {
        &self.signals
    }

    /// Default manual-login window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether `url` looks like the site's login surface.
    pub fn is_login_page(&self, url: &str) -> bool {
        !self.login_marker.is_empty() && url.to_lowercase().contains(&self.login_marker)
    }

    /// Evaluate the signals in order; true on the first match.
    pub async fn is_authenticated<S: BrowserSession>(&self, session: &S) -> bool {
        for signal in &self.signals {
            match signal.evaluate(session).await {
                SignalOutcome::Matched => {
                    info!(target: "auth.check", signal = signal.name(), "session authenticated");
                    return true;
                }
                SignalOutcome::Missed => {
                    debug!(target: "auth.check", signal = signal.name(), "signal missed");
                }
                SignalOutcome::Faulted(reason) => {
                    warn!(target: "auth.check", signal = signal.name(), %reason, "signal faulted");
                }
            }
        }
        false
    }

    /// Open the login page and wait up to `window` for someone to log in by hand.
    ///
    /// Signals are polled while waiting so a quick login returns early; the
    /// last check happens when the window closes.
    pub async fn await_manual_authentication<S: BrowserSession>(
        &self,
        session: &S,
        window: Duration,
    ) -> bool {
        info!(
            target: "auth.wait",
            url = %self.login_url,
            window_secs = window.as_secs(),
            "please log in within the window"
        );
        if let Err(err) = session.navigate(&self.login_url).await {
            warn!(target: "auth.wait", error = %err, "could not open login page");
            return false;
        }

        let now = Instant::now();
        let deadline = now.checked_add(window).unwrap_or_else(|| now + FAR_FUTURE);
        let interval = self.poll_interval.max(MIN_POLL_INTERVAL);
        loop {
            if self.is_authenticated(session).await {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(target: "auth.wait", "login window elapsed without an authenticated session");
                return false;
            }
            sleep((deadline - now).min(interval)).await;
        }
    }
}
