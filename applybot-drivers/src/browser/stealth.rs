use applybot_common::StealthLevel;
use serde_json::{json, Value};

/// Construct Chrome command‑line arguments for a given stealth level.
pub fn build_chrome_arguments(level: StealthLevel, headless: bool) -> Vec<String> {
    let mut args: Vec<String> = [
        "--start-maximized",
        "--disable-notifications",
        "--disable-blink-features=AutomationControlled",
        "--disable-popup-blocking",
        "--disable-gpu",
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--disable-software-rasterizer",
        "--disable-extensions",
        "--disable-infobars",
        "--disable-session-crashed-bubble",
        "--disable-features=TranslateUI",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if level == StealthLevel::Maximum {
        args.push("--disable-features=IsolateOrigins,site-per-process".to_string());
    }
    if headless {
        args.push("--headless=new".to_string());
    }
    args
}

/// The `goog:chromeOptions` capability value.
pub fn chrome_options(level: StealthLevel, headless: bool) -> Value {
    json!({
        "args": build_chrome_arguments(level, headless),
        "excludeSwitches": ["enable-logging", "enable-automation"],
        "useAutomationExtension": false,
    })
}

/// JavaScript evasions applied after each navigation.
pub struct StealthScripts;

impl StealthScripts {
    pub fn webdriver_flag() -> &'static str {
        "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });"
    }

    pub fn core_evasions() -> &'static str {
        r#"
            Object.defineProperty(navigator, 'plugins', { get: () => [1,2,3] });
            Object.defineProperty(navigator, 'languages', {
                get: () => ['en-US', 'en']
            });
            if (!window.chrome) window.chrome = { runtime: {} };
        "#
    }

    pub fn webgl_evasions() -> &'static str {
        r#"
            const getParameter = WebGLRenderingContext.prototype.getParameter;
            WebGLRenderingContext.prototype.getParameter = function(parameter) {
                if (parameter === 37445) return 'Intel Inc.';
                if (parameter === 37446) return 'Intel Iris OpenGL Engine';
                return getParameter.call(this, parameter);
            };
        "#
    }

    /// Scripts to run for `level`, in order.
    pub fn for_level(level: StealthLevel) -> Vec<&'static str> {
        match level {
            StealthLevel::Lightweight => vec![Self::webdriver_flag()],
            StealthLevel::Balanced => vec![Self::webdriver_flag(), Self::core_evasions()],
            StealthLevel::Maximum => vec![
                Self::webdriver_flag(),
                Self::core_evasions(),
                Self::webgl_evasions(),
            ],
        }
    }
}
