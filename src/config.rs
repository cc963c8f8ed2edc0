use std::time::Duration;

use crate::browser::StealthBrowser;
use crate::error::Result;
use crate::schema::{WaitStrategy, DEFAULT_LOAD_TIMEOUT_MS};

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Headed by default: headless Chrome leaks fingerprints and the filler
    /// needs a window the applicant can review.
    pub headless: bool,
    pub stealth: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_path: Option<String>,
    /// Overrides the stealth user agent.
    pub user_agent: Option<String>,
    /// Readiness condition awaited after each navigation during extraction.
    pub wait_strategy: WaitStrategy,
    /// Ceiling for every navigation and interaction (default: 30s).
    pub load_timeout: Duration,
    /// Per-keystroke delay range in milliseconds. `(0, 0)` disables pacing.
    pub typing_delay_ms: (u64, u64),
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            stealth: true,
            viewport_width: 1440,
            viewport_height: 900,
            chrome_path: None,
            user_agent: None,
            wait_strategy: WaitStrategy::default(),
            load_timeout: Duration::from_millis(DEFAULT_LOAD_TIMEOUT_MS),
            typing_delay_ms: (30, 120),
        }
    }
}

pub struct BrowserBuilder {
    config: BrowserConfig,
}

impl BrowserBuilder {
    pub fn new() -> Self {
        Self {
            config: BrowserConfig::default(),
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn stealth(mut self, stealth: bool) -> Self {
        self.config.stealth = stealth;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    pub fn wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.config.wait_strategy = strategy;
        self
    }

    /// Set the ceiling for navigations and field interactions.
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.config.load_timeout = timeout;
        self
    }

    /// Set the random per-keystroke delay range. Pass `(0, 0)` for instant typing.
    pub fn typing_delay_ms(mut self, min: u64, max: u64) -> Self {
        self.config.typing_delay_ms = (min.min(max), max.max(min));
        self
    }

    pub fn build_config(self) -> BrowserConfig {
        self.config
    }

    pub async fn build(self) -> Result<StealthBrowser> {
        StealthBrowser::launch(self.build_config()).await
    }
}

impl Default for BrowserBuilder {
    fn default() -> Self {
        Self::new()
    }
}
