use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page as CrPage;
use rand::Rng;

use crate::error::{Error, Result};

/// Default user agent in stealth mode (desktop Chrome on macOS).
pub const STEALTH_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/145.0.0.0 Safari/537.36";

/// Key-only Chrome flags for stealth mode.
/// chromiumoxide adds the `--` prefix, so keys must NOT include it.
pub fn stealth_key_args() -> Vec<&'static str> {
    vec![
        "disable-infobars",
        "disable-default-apps",
        "disable-component-update",
        "no-first-run",
    ]
}

/// Key-value stealth flags.
pub fn stealth_kv_args(user_agent: &str) -> Vec<(&'static str, String)> {
    vec![
        ("disable-blink-features", "AutomationControlled".to_string()),
        ("user-agent", user_agent.to_string()),
        ("lang", "en-US".to_string()),
    ]
}

/// Register the evasion script so it runs before any site script in every
/// document of the page, subframes included.
pub async fn apply_stealth(page: &CrPage) -> Result<()> {
    let params = AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_JS);
    page.execute(params)
        .await
        .map_err(|e| Error::Js(format!("Failed to inject stealth script: {e}")))?;
    Ok(())
}

/// Patches the properties most commonly probed by ATS bot checks.
static STEALTH_JS: &str = r#"
(() => {
    const define = (target, key, getter) => {
        try {
            Object.defineProperty(target, key, { get: getter, configurable: true, enumerable: true });
        } catch (_) {}
    };

    // Automated Chrome reports webdriver = true.
    define(Navigator.prototype, 'webdriver', () => false);

    if (!window.chrome) {
        window.chrome = {
            runtime: { connect() {}, sendMessage() {} },
            loadTimes() { return {}; },
            csi() { return {}; },
        };
    }

    define(navigator, 'languages', () => ['en-US', 'en']);

    if (!navigator.hardwareConcurrency) {
        define(navigator, 'hardwareConcurrency', () => 8);
    }

    // An empty PluginArray is a classic headless tell.
    if (navigator.plugins && navigator.plugins.length === 0) {
        const plugins = Object.create(PluginArray.prototype);
        ['Chrome PDF Plugin', 'Chrome PDF Viewer', 'Native Client'].forEach((name, i) => {
            const plugin = Object.create(Plugin.prototype);
            Object.defineProperty(plugin, 'name', { value: name, enumerable: true });
            plugins[i] = plugin;
        });
        Object.defineProperty(plugins, 'length', { value: 3 });
        plugins.item = function (i) { return this[i] || null; };
        plugins.namedItem = function (n) {
            for (let i = 0; i < this.length; i++) if (this[i].name === n) return this[i];
            return null;
        };
        plugins.refresh = function () {};
        define(navigator, 'plugins', () => plugins);
    }

    const query = window.Permissions && window.Permissions.prototype.query;
    if (query) {
        window.Permissions.prototype.query = function (parameters) {
            if (parameters && parameters.name === 'notifications') {
                return Promise.resolve({ state: Notification.permission });
            }
            return query.call(this, parameters);
        };
    }

    if (window.outerWidth === 0) define(window, 'outerWidth', () => window.innerWidth);
    if (window.outerHeight === 0) define(window, 'outerHeight', () => window.innerHeight + 85);
})();
"#;

/// Human-like timing between interactions.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    keystroke_ms: (u64, u64),
}

impl Pacing {
    /// Keystroke delay range in milliseconds; the bounds may come in either order.
    pub fn new((min, max): (u64, u64)) -> Self {
        Self {
            keystroke_ms: (min.min(max), max.max(min)),
        }
    }

    /// No delays at all; used by tests and non-interactive runs.
    pub fn instant() -> Self {
        Self::new((0, 0))
    }

    pub fn is_instant(&self) -> bool {
        self.keystroke_ms.1 == 0
    }

    pub async fn keystroke(&self) {
        self.random_delay(self.keystroke_ms.0, self.keystroke_ms.1).await;
    }

    /// Pause between fields, roughly the time a person takes to move on.
    pub async fn between_fields(&self) {
        if !self.is_instant() {
            self.random_delay(250, 900).await;
        }
    }

    /// Pause after a navigation or reveal before reading the DOM.
    pub async fn settle(&self) {
        if !self.is_instant() {
            self.random_delay(600, 1500).await;
        }
    }

    async fn random_delay(&self, min: u64, max: u64) {
        if max == 0 {
            return;
        }
        let ms = rand::thread_rng().gen_range(min..=max);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// Split text into the chunks inserted per keystroke. Long answers go in
    /// word-sized chunks so a cover letter does not take minutes to type.
    pub fn chunks(&self, text: &str) -> Vec<String> {
        if self.is_instant() {
            return vec![text.to_string()];
        }
        if text.chars().count() <= 160 {
            return text.chars().map(|c| c.to_string()).collect();
        }
        let mut chunks = Vec::new();
        let mut current = String::new();
        for c in text.chars() {
            current.push(c);
            if c.is_whitespace() && current.chars().count() >= 8 {
                chunks.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new((30, 120))
    }
}
