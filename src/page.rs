use std::path::Path;
use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page as CrPage;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::element::Element;
use crate::error::{Error, Result};
use crate::js::{self, DocumentRoot};
use crate::schema::WaitStrategy;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Quiet period without new resource entries that counts as network idle.
const NETWORK_QUIET: Duration = Duration::from_millis(500);

/// Wrapper around a chromiumoxide Page, scoped to the document holding the form.
pub struct Page {
    inner: CrPage,
    timeout: Duration,
    root: DocumentRoot,
}

impl Page {
    pub(crate) fn new(inner: CrPage, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            root: DocumentRoot::Top,
        }
    }

    pub fn inner(&self) -> &CrPage {
        &self.inner
    }

    pub fn root(&self) -> &DocumentRoot {
        &self.root
    }

    pub fn set_root(&mut self, root: DocumentRoot) {
        self.root = root;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Navigate and wait for `strategy`, bounded by the page timeout. Resets the
    /// document root and returns the final URL after redirects.
    pub async fn navigate(&mut self, url: &str, strategy: WaitStrategy) -> Result<String> {
        self.root = DocumentRoot::Top;
        let started = Instant::now();

        match strategy {
            WaitStrategy::Load | WaitStrategy::NetworkIdle => {
                tokio::time::timeout(self.timeout, self.inner.goto(url))
                    .await
                    .map_err(|_| self.nav_timeout(url))?
                    .map_err(|e| Error::Navigation(format!("{url}: {e}")))?;
            }
            WaitStrategy::DomContentLoaded => {
                let response = tokio::time::timeout(self.timeout, self.inner.execute(NavigateParams::new(url)))
                    .await
                    .map_err(|_| self.nav_timeout(url))?
                    .map_err(|e| Error::Navigation(format!("{url}: {e}")))?;
                if let Some(error) = response.result.error_text.as_ref() {
                    return Err(Error::Navigation(format!("{url}: {error}")));
                }
            }
        }

        self.wait_until_ready(strategy, url, started).await?;
        let final_url = self.url().await?;
        debug!(requested = url, final_url = %final_url, ?strategy, elapsed_ms = started.elapsed().as_millis() as u64, "navigated");
        Ok(final_url)
    }

    async fn wait_until_ready(&self, strategy: WaitStrategy, url: &str, started: Instant) -> Result<()> {
        let mut readiness = Readiness::new(strategy, Instant::now());

        loop {
            // A client-side redirect destroys the execution context mid-poll;
            // that only means the next document is still loading.
            let sample = match self.ready_sample(strategy).await {
                Ok(sample) => Some(sample),
                Err(e) => {
                    debug!(url, error = %e, "document not scriptable yet");
                    None
                }
            };
            if readiness.observe(sample, Instant::now()) {
                return Ok(());
            }
            if started.elapsed() >= self.timeout {
                return Err(self.nav_timeout(url));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn ready_sample(&self, strategy: WaitStrategy) -> Result<(String, usize)> {
        let state: String = self.evaluate_top("document.readyState").await?;
        let resources = match strategy {
            WaitStrategy::NetworkIdle => {
                self.evaluate_top("performance.getEntriesByType('resource').length")
                    .await?
            }
            _ => 0,
        };
        Ok((state, resources))
    }

    fn nav_timeout(&self, url: &str) -> Error {
        Error::Navigation(format!("{url}: timed out after {}ms", self.timeout.as_millis()))
    }

    pub async fn url(&self) -> Result<String> {
        self.inner
            .url()
            .await
            .map_err(|e| Error::Navigation(e.to_string()))?
            .ok_or_else(|| Error::Navigation("No URL found".into()))
    }

    // ── Evaluation ──────────────────────────────────────────────────

    /// Evaluate an expression against the top document and decode its value.
    pub async fn evaluate_top<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let result = tokio::time::timeout(self.timeout, self.inner.evaluate(expression))
            .await
            .map_err(|_| Error::InteractionTimeout(truncate(expression)))?
            .map_err(|e| Error::Js(e.to_string()))?;
        result.into_value::<T>().map_err(|e| Error::Js(e.to_string()))
    }

    /// Run `body` with `doc` bound to the form document and decode the JSON it returns.
    pub async fn evaluate_scoped<T: DeserializeOwned>(&self, body: &str) -> Result<T> {
        self.evaluate_in(&self.root, body).await
    }

    /// Like [`Page::evaluate_scoped`] with an explicit document root.
    pub async fn evaluate_in<T: DeserializeOwned>(&self, root: &DocumentRoot, body: &str) -> Result<T> {
        let script = js::scoped(root, body)?;
        let json: String = self.evaluate_top(&script).await?;
        Ok(serde_json::from_str(&json)?)
    }

    // ── Input ───────────────────────────────────────────────────────

    /// Insert text into the focused element as if typed (fires `input` events).
    pub async fn insert_text(&self, text: &str) -> Result<()> {
        tokio::time::timeout(self.timeout, self.inner.execute(InsertTextParams::new(text)))
            .await
            .map_err(|_| Error::InteractionTimeout("text input".into()))??;
        Ok(())
    }

    /// Attach `path` to the file input held in `slot`.
    pub async fn set_input_files(&self, slot: &str, path: &Path) -> Result<()> {
        let expression = format!("(window.__atsSlots || {{}})[{}]", js::literal(slot)?);
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(false)
            .build()
            .map_err(Error::Js)?;
        let handle = self
            .inner
            .evaluate_expression(params)
            .await
            .map_err(|e| Error::Js(e.to_string()))?;
        let object_id = handle
            .object()
            .object_id
            .clone()
            .ok_or_else(|| Error::Js(format!("no element bound to slot {slot}")))?;

        let params = SetFileInputFilesParams::builder()
            .files(vec![path.to_string_lossy().into_owned()])
            .object_id(object_id)
            .build()
            .map_err(Error::Js)?;
        tokio::time::timeout(self.timeout, self.inner.execute(params))
            .await
            .map_err(|_| Error::InteractionTimeout(format!("file upload {}", path.display())))??;
        Ok(())
    }

    // ── Element Queries ─────────────────────────────────────────────

    /// Find an element in the top document.
    pub async fn find_element(&self, selector: &str) -> Result<Element> {
        let el = self
            .inner
            .find_element(selector)
            .await
            .map_err(|e| Error::Js(format!("{selector}: {e}")))?;
        Ok(Element::new(el))
    }
}

/// Readiness bookkeeping for one navigation. Samples are `(readyState,
/// resource count)`; a failed sample restarts the network quiet period.
struct Readiness {
    strategy: WaitStrategy,
    last_resources: Option<usize>,
    quiet_since: Instant,
}

impl Readiness {
    fn new(strategy: WaitStrategy, now: Instant) -> Self {
        Self {
            strategy,
            last_resources: None,
            quiet_since: now,
        }
    }

    fn observe(&mut self, sample: Option<(String, usize)>, now: Instant) -> bool {
        let Some((state, resources)) = sample else {
            self.last_resources = None;
            self.quiet_since = now;
            return false;
        };
        match self.strategy {
            WaitStrategy::DomContentLoaded => state != "loading",
            WaitStrategy::Load => state == "complete",
            WaitStrategy::NetworkIdle => {
                if self.last_resources != Some(resources) {
                    self.last_resources = Some(resources);
                    self.quiet_since = now;
                }
                state == "complete" && now.duration_since(self.quiet_since) >= NETWORK_QUIET
            }
        }
    }
}

fn truncate(script: &str) -> String {
    let line = script.lines().next().unwrap_or_default();
    line.chars().take(80).collect()
}
