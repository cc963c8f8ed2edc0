use std::path::PathBuf;

use chromiumoxide::browser::{Browser as CrBrowser, BrowserConfig as CrBrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use rand::Rng;
use tracing::{debug, warn};

use crate::config::{BrowserBuilder, BrowserConfig};
use crate::error::{Error, Result};
use crate::page::Page;
use crate::stealth::{self, Pacing};

/// Chrome flags that improve load time without affecting page behavior.
const PERF_ARGS: &[&str] = &[
    "disable-extensions",
    "metrics-recording-only",
    "mute-audio",
    "no-default-browser-check",
    "disable-client-side-phishing-detection",
    "disable-prompt-on-repost",
];

/// One Chrome process with its own throwaway profile, so cookies and storage
/// are never shared between sessions.
pub struct StealthBrowser {
    browser: CrBrowser,
    stealth: bool,
    config: BrowserConfig,
    profile_dir: PathBuf,
    _handler_task: tokio::task::JoinHandle<()>,
}

impl StealthBrowser {
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder::new()
    }

    pub async fn launch(config: BrowserConfig) -> Result<Self> {
        let profile_dir = std::env::temp_dir().join(format!(
            "ats-autofill-{}-{:016x}",
            std::process::id(),
            rand::thread_rng().gen::<u64>()
        ));

        let mut builder = CrBrowserConfig::builder().user_data_dir(&profile_dir);

        if config.headless {
            builder = builder.new_headless_mode().no_sandbox();
        } else {
            builder = builder.with_head().no_sandbox();
        }

        for arg in PERF_ARGS {
            builder = builder.arg(*arg);
        }

        // chromiumoxide adds the `--` prefix automatically
        if config.stealth {
            let user_agent = config
                .user_agent
                .as_deref()
                .unwrap_or(stealth::STEALTH_USER_AGENT);
            for arg in stealth::stealth_key_args() {
                builder = builder.arg(arg);
            }
            for (key, value) in stealth::stealth_kv_args(user_agent) {
                builder = builder.arg((key, value.as_str()));
            }
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder = builder.viewport(Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: false,
            has_touch: false,
        });

        let cr_config = builder.build().map_err(Error::Launch)?;

        let (browser, mut handler) = CrBrowser::launch(cr_config)
            .await
            .map_err(|e| Error::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        debug!(profile = %profile_dir.display(), headless = config.headless, "browser launched");

        Ok(Self {
            browser,
            stealth: config.stealth,
            config,
            profile_dir,
            _handler_task: handler_task,
        })
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn pacing(&self) -> Pacing {
        Pacing::new(self.config.typing_delay_ms)
    }

    /// Open a blank tab with the stealth script registered, ready to navigate.
    pub async fn open_page(&self) -> Result<Page> {
        let cr_page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Navigation(e.to_string()))?;

        if self.stealth {
            stealth::apply_stealth(&cr_page).await?;
        }

        Ok(Page::new(cr_page, self.config.load_timeout))
    }

    /// Shut Chrome down and remove the session profile.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser did not close cleanly");
        }
        let _ = self.browser.wait().await;
    }
}

impl Drop for StealthBrowser {
    fn drop(&mut self) {
        self._handler_task.abort();
        let _ = std::fs::remove_dir_all(&self.profile_dir);
    }
}
