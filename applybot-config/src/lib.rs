//! Loader for applybot configuration with YAML + environment overlays.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. built-in defaults (every field has one, so an empty file is valid)
//! 2. YAML files attached with [`ApplybotConfigLoader::with_file`] or
//!    [`ApplybotConfigLoader::with_optional_file`]
//! 3. inline YAML from [`ApplybotConfigLoader::with_yaml_str`]
//! 4. `APPLYBOT__SECTION__FIELD` environment variables
//!
//! String values may reference other environment variables as `${VAR}`; these
//! are expanded after merging.
use applybot_common::StealthLevel;
use applybot_common::observability::LogFormat;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "APPLYBOT";

pub const DEFAULT_CONFIG_FILE: &str = "applybot.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApplybotConfig {
    pub version: Option<String>,
    pub run: RunSettings,
    pub browser: BrowserSettings,
    pub site: SiteSettings,
    pub auth: AuthSettings,
    pub listing: ListingSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

/// What to search for and how many applications to make.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub max_applications: usize,
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    /// Answers handed to the application step for form fields.
    pub default_answers: BTreeMap<String, String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        let keywords = [
            "Marketing",
            "sales",
            "crm",
            "product",
            "manufacturing",
            "purchase",
            "distribution",
            "product development",
        ];
        let answers = [
            ("notice_period", "Immediate"),
            ("current_ctc", "0"),
            ("expected_ctc", "4"),
            ("total_experience", "0"),
            ("current_location", "Hyderabad"),
            ("preferred_location", "Hyderabad, Bengaluru, Visakhapatnam"),
            ("reason_for_change", "Looking for better growth opportunities"),
            ("skills", "Team Management, Communication, Strategic Planning"),
            ("languages", "English, Hindi, Telugu"),
            ("willing_to_relocate", "Yes"),
            ("highest_qualification", "B.Tech"),
            ("current_company", "Fresher"),
            ("current_designation", "Fresher"),
        ];
        Self {
            max_applications: 1000,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            locations: ["Hyderabad", "Bengaluru", "Visakhapatnam"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_answers: answers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth: StealthLevel,
    pub page_load_timeout_secs: u64,
    pub script_timeout_secs: u64,
    /// WebDriver implicit wait. Every auth and listing selector that misses
    /// blocks for this long, so a non-zero value slows each login poll by
    /// up to `selectors * implicit_wait_secs`.
    pub implicit_wait_secs: u64,
    /// Random pause before each navigation, in milliseconds.
    pub navigation_jitter_ms: (u64, u64),
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: false,
            stealth: StealthLevel::Balanced,
            page_load_timeout_secs: 30,
            script_timeout_secs: 30,
            implicit_wait_secs: 0,
            navigation_jitter_ms: (300, 1200),
        }
    }
}

impl BrowserSettings {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    pub fn implicit_wait(&self) -> Duration {
        Duration::from_secs(self.implicit_wait_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub login_url: String,
    /// Must contain `{keyword}` and `{location}` placeholders.
    pub search_url_template: String,
    /// Case-insensitive URL fragment that marks a login page.
    pub login_marker: String,
    pub settle_delay_secs: u64,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            login_url: "https://www.naukri.com/nlogin/login".into(),
            search_url_template: "https://www.naukri.com/{keyword}-jobs-in-{location}".into(),
            login_marker: "login".into(),
            settle_delay_secs: 5,
        }
    }
}

impl SiteSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub window_secs: u64,
    pub poll_interval_secs: u64,
    pub authenticated_url_fragment: String,
    pub profile_selectors: Vec<String>,
    pub navigation_selectors: Vec<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            window_secs: 60,
            poll_interval_secs: 5,
            authenticated_url_fragment: "my.naukri.com".into(),
            profile_selectors: strings(&[
                ".nI-gNb-drawer__bars",
                ".user-name",
                ".nI-gNb-menu__title",
                ".nI-gNb-profile__image",
                ".nI-gNb-profile__name",
                ".nI-gNb-profile__email",
                ".nI-gNb-profile__menu",
                ".nI-gNb-profile__menu-item",
            ]),
            navigation_selectors: strings(&[
                ".nI-gNb-menu__title",
                ".nI-gNb-menu__item",
                ".nI-gNb-menu__item--active",
                ".nI-gNb-menu__item--selected",
            ]),
        }
    }
}

impl AuthSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingSettings {
    /// Cascade of job-card selectors, most specific first.
    pub selectors: Vec<String>,
    pub heuristic: HeuristicSettings,
    /// Attributes consulted, in order, for a listing's external id.
    pub job_id_attributes: Vec<String>,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            selectors: strings(&[
                "article.jobTuple",
                "div.jobTuple",
                ".job-tuple",
                ".jobTupleHeader",
                "[data-job-id]",
                "div.tuple",
                ".job-container",
                ".job-card",
            ]),
            heuristic: HeuristicSettings::default(),
            job_id_attributes: strings(&["data-job-id"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeuristicSettings {
    pub enabled: bool,
    pub container_tag: String,
    /// Text must be strictly longer than this many characters.
    pub min_text_len: usize,
    pub required_token: String,
    pub any_of: Vec<String>,
}

impl Default for HeuristicSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            container_tag: "div".into(),
            min_text_len: 10,
            required_token: "years".into(),
            any_of: strings(&["experience", "salary", "apply", "job"]),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("naukri_applied_jobs.csv"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::Text,
            stderr: true,
            filter: "info".into(),
        }
    }
}

/// Semantic problems found after the sources deserialized cleanly.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("site.search_url_template must contain `{0}`")]
    MissingPlaceholder(&'static str),
    #[error("listing has no detection strategy: no selectors and heuristic disabled")]
    NoDetectionStrategy,
    #[error("run.max_applications must be greater than zero")]
    ZeroCeiling,
}

impl ApplybotConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        for placeholder in ["{keyword}", "{location}"] {
            if !self.site.search_url_template.contains(placeholder) {
                return Err(InvalidConfig::MissingPlaceholder(placeholder));
            }
        }
        if self.listing.selectors.is_empty() && !self.listing.heuristic.enabled {
            return Err(InvalidConfig::NoDetectionStrategy);
        }
        if self.run.max_applications == 0 {
            return Err(InvalidConfig::ZeroCeiling);
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Per-user fallback location, e.g. `~/.config/applybot/applybot.yaml`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("applybot").join(DEFAULT_CONFIG_FILE))
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct ApplybotConfigLoader {
    files: Vec<(PathBuf, bool)>,
    inline: Vec<String>,
}

impl Default for ApplybotConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplybotConfigLoader {
    /// Start from defaults; `APPLYBOT__` env overrides are always applied last.
    ///
    /// ```
    /// use applybot_config::ApplybotConfigLoader;
    ///
    /// let config = ApplybotConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.run.max_applications, 1000);
    /// ```
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            inline: Vec::new(),
        }
    }

    /// Attach a required YAML/TOML/JSON file; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files.push((path.as_ref().to_path_buf(), true));
        self
    }

    /// Attach a file that is silently skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files.push((path.as_ref().to_path_buf(), false));
        self
    }

    /// Merge an inline YAML snippet (tests, CLI overrides).
    ///
    /// ```
    /// use applybot_config::ApplybotConfigLoader;
    ///
    /// let cfg = ApplybotConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// run:
    ///   keywords: ["crm"]
    ///   locations: ["Pune"]
    /// listing:
    ///   selectors: [".card"]
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.run.keywords, vec!["crm"]);
    /// assert_eq!(cfg.listing.selectors, vec![".card"]);
    /// assert!(cfg.listing.heuristic.enabled);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.inline.push(yaml.to_string());
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders, and deserialize.
    pub fn load(self) -> Result<ApplybotConfig, ConfigError> {
        let mut builder = Config::builder();
        for (path, required) in &self.files {
            builder = builder.add_source(File::from(path.as_path()).required(*required));
        }
        for yaml in &self.inline {
            builder = builder.add_source(File::from_str(yaml, config::FileFormat::Yaml));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("run.keywords")
                .with_list_parse_key("run.locations")
                .with_list_parse_key("listing.selectors"),
        );

        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: ApplybotConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        typed
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(typed)
    }
}
