//! Form filling: descriptor with values in, per-field report out.
//!
//! The filler never submits. It leaves the session open in a [`FilledForm`]
//! so a person can review the page and press submit themselves.

mod live;
pub mod matching;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::browser::StealthBrowser;
use crate::config::BrowserConfig;
use crate::error::{Error, Result};
use crate::extract::frames;
use crate::page::Page;
use crate::reveal::{self, Revealed};
use crate::schema::{FieldDescriptor, FieldType, FormDescriptor, LocatorHint};
use crate::stealth::Pacing;

pub use self::live::LiveSurface;
use self::matching::{checkbox_intent, match_option, Expected};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    Applied,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldReason {
    NoValue,
    Unresolvable,
    NoMatchingOption,
    VerificationMismatch,
    FileNotFound,
    InteractionTimeout,
    InteractionError,
}

impl FieldReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldReason::NoValue => "no_value",
            FieldReason::Unresolvable => "unresolvable",
            FieldReason::NoMatchingOption => "no_matching_option",
            FieldReason::VerificationMismatch => "verification_mismatch",
            FieldReason::FileNotFound => "file_not_found",
            FieldReason::InteractionTimeout => "interaction_timeout",
            FieldReason::InteractionError => "interaction_error",
        }
    }
}

impl std::fmt::Display for FieldReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReport {
    pub status: FieldStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FieldReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FieldReport {
    pub fn applied() -> Self {
        Self {
            status: FieldStatus::Applied,
            reason: None,
            detail: None,
        }
    }

    pub fn skipped(reason: FieldReason) -> Self {
        Self {
            status: FieldStatus::Skipped,
            reason: Some(reason),
            detail: None,
        }
    }

    pub fn failed(reason: FieldReason, detail: impl Into<String>) -> Self {
        Self {
            status: FieldStatus::Failed,
            reason: Some(reason),
            detail: Some(detail.into()),
        }
    }

    fn from_error(error: &Error) -> Self {
        let reason = match error {
            Error::InteractionTimeout(_) => FieldReason::InteractionTimeout,
            _ => FieldReason::InteractionError,
        };
        Self::failed(reason, error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillResult {
    pub source_url: String,
    /// Every required field was applied.
    pub success: bool,
    pub per_field_status: BTreeMap<String, FieldReport>,
}

impl FillResult {
    pub fn status(&self, id: &str) -> Option<&FieldReport> {
        self.per_field_status.get(id)
    }

    pub fn count(&self, status: FieldStatus) -> usize {
        self.per_field_status.values().filter(|r| r.status == status).count()
    }
}

/// What a control reports after it was filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ReadBack {
    Text(String),
    /// Selected option or radio label; `None` when nothing is selected.
    Choice(Option<String>),
    Checked(bool),
    Files(Vec<String>),
}

impl std::fmt::Display for ReadBack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadBack::Text(v) => write!(f, "{v:?}"),
            ReadBack::Choice(Some(v)) => write!(f, "{v:?}"),
            ReadBack::Choice(None) => f.write_str("nothing selected"),
            ReadBack::Checked(v) => write!(f, "{v}"),
            ReadBack::Files(names) => write!(f, "{names:?}"),
        }
    }
}

/// The document a form is filled on. Targets are held in named slots: a
/// successful [`FormSurface::locate`] binds the slot used by every later call.
#[async_trait]
pub trait FormSurface: Send + Sync {
    /// Resolve `hint` and return how many targets matched. The slot is bound
    /// only when exactly one target (for radios, one group) matched.
    async fn locate(&self, slot: &str, hint: &LocatorHint, field_type: FieldType) -> Result<usize>;

    async fn enter_text(&self, slot: &str, text: &str) -> Result<()>;

    /// Set the value directly, firing `input` and `change`.
    async fn set_value(&self, slot: &str, value: &str) -> Result<()>;

    /// Visible option texts of a dropdown, or option labels of a radio group.
    async fn choices(&self, slot: &str, field_type: FieldType) -> Result<Vec<String>>;

    async fn choose(&self, slot: &str, field_type: FieldType, index: usize) -> Result<()>;

    async fn set_checked(&self, slot: &str, checked: bool) -> Result<()>;

    async fn attach(&self, slot: &str, path: &Path) -> Result<()>;

    async fn read_back(&self, slot: &str, field_type: FieldType) -> Result<ReadBack>;
}

/// Fill every field of `descriptor` on `surface`. Field failures are recorded
/// and never stop the remaining fields.
pub async fn fill_fields<S>(surface: &S, descriptor: &FormDescriptor, pacing: &Pacing) -> FillResult
where
    S: FormSurface + ?Sized,
{
    let mut per_field_status = BTreeMap::new();
    for field in &descriptor.fields {
        let report = if field.value.trim().is_empty() {
            FieldReport::skipped(FieldReason::NoValue)
        } else {
            let report = fill_field(surface, field)
                .await
                .unwrap_or_else(|e| FieldReport::from_error(&e));
            pacing.between_fields().await;
            report
        };

        match report.status {
            FieldStatus::Applied => debug!(field = %field.id, "applied"),
            _ if field.required => warn!(
                field = %field.id,
                status = ?report.status,
                reason = ?report.reason,
                detail = report.detail.as_deref().unwrap_or(""),
                "required field not applied"
            ),
            _ => debug!(field = %field.id, status = ?report.status, reason = ?report.reason, "field not applied"),
        }
        per_field_status.insert(field.id.clone(), report);
    }

    let success = descriptor
        .fields
        .iter()
        .filter(|f| f.required)
        .all(|f| matches!(per_field_status.get(&f.id), Some(r) if r.status == FieldStatus::Applied));

    FillResult {
        source_url: descriptor.source_url.clone(),
        success,
        per_field_status,
    }
}

async fn resolve<S>(surface: &S, field: &FieldDescriptor) -> bool
where
    S: FormSurface + ?Sized,
{
    for hint in &field.locator_hints {
        match surface.locate(&field.id, hint, field.field_type).await {
            Ok(1) => {
                debug!(field = %field.id, strategy = hint.strategy(), "located");
                return true;
            }
            Ok(n) => debug!(field = %field.id, strategy = hint.strategy(), matches = n, "hint not unique"),
            Err(e) => debug!(field = %field.id, strategy = hint.strategy(), error = %e, "hint failed"),
        }
    }
    false
}

async fn fill_field<S>(surface: &S, field: &FieldDescriptor) -> Result<FieldReport>
where
    S: FormSurface + ?Sized,
{
    if !resolve(surface, field).await {
        return Ok(FieldReport::skipped(FieldReason::Unresolvable));
    }

    let slot = field.id.as_str();
    let value = field.value.trim();
    let expected = match field.field_type {
        FieldType::Text | FieldType::Email | FieldType::Url | FieldType::Textarea => {
            surface.enter_text(slot, value).await?;
            Expected::Text(value.to_string())
        }
        FieldType::Phone => {
            surface.enter_text(slot, value).await?;
            Expected::Phone(value.to_string())
        }
        FieldType::Date => {
            surface.set_value(slot, value).await?;
            Expected::Text(value.to_string())
        }
        FieldType::Dropdown | FieldType::Radio => {
            let choices = surface.choices(slot, field.field_type).await?;
            let Some(index) = match_option(&choices, value) else {
                return Ok(FieldReport::failed(
                    FieldReason::NoMatchingOption,
                    format!("no option matches {value:?}"),
                ));
            };
            surface.choose(slot, field.field_type, index).await?;
            Expected::Choice(choices[index].clone())
        }
        FieldType::Checkbox => {
            let checked = checkbox_intent(value);
            surface.set_checked(slot, checked).await?;
            Expected::Checked(checked)
        }
        FieldType::File => {
            let path = match std::fs::canonicalize(value) {
                Ok(path) if path.is_file() => path,
                _ => {
                    return Ok(FieldReport::failed(FieldReason::FileNotFound, value.to_string()));
                }
            };
            surface.attach(slot, &path).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Expected::File(name)
        }
    };

    let read = surface.read_back(slot, field.field_type).await?;
    if expected.matches(&read) {
        Ok(FieldReport::applied())
    } else {
        Ok(FieldReport::failed(
            FieldReason::VerificationMismatch,
            format!("expected {expected}, read {read}"),
        ))
    }
}

pub struct FormFiller {
    config: BrowserConfig,
}

impl FormFiller {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Launch a fresh session, re-acquire the form and fill it. The returned
    /// [`FilledForm`] keeps the browser open for review.
    #[instrument(skip_all, fields(url = %descriptor.source_url))]
    pub async fn fill(&self, descriptor: &FormDescriptor) -> Result<FilledForm> {
        descriptor.validate()?;
        let browser = StealthBrowser::launch(self.config.clone()).await?;
        let page = match prepare(&browser, descriptor).await {
            Ok(page) => page,
            Err(e) => {
                browser.close().await;
                return Err(e);
            }
        };

        let pacing = browser.pacing();
        let surface = LiveSurface::new(&page, pacing);
        let result = fill_fields(&surface, descriptor, &pacing).await;

        info!(
            target: "ats_autofill::filled",
            url = %result.source_url,
            success = result.success,
            applied = result.count(FieldStatus::Applied),
            skipped = result.count(FieldStatus::Skipped),
            failed = result.count(FieldStatus::Failed),
            "form filled"
        );
        Ok(FilledForm { browser, page, result })
    }
}

/// Load the source page and point it at the form document.
async fn prepare(browser: &StealthBrowser, descriptor: &FormDescriptor) -> Result<Page> {
    let context = &descriptor.form_context;
    let pacing = browser.pacing();
    let mut page = browser.open_page().await?;
    page.set_timeout(context.load_timeout());

    page.navigate(&descriptor.source_url, context.wait_strategy).await?;
    pacing.settle().await;

    if let Some(text) = &context.reveal_text {
        match reveal::reveal(&page, Some(text)).await? {
            Some(Revealed::Link(href)) => {
                page.navigate(&href, context.wait_strategy).await?;
            }
            Some(Revealed::Clicked(_)) => {}
            None => warn!(text = %text, "reveal trigger not found; trying the form anyway"),
        }
        pacing.settle().await;
    }

    frames::reacquire(&mut page, context).await?;
    if context.frame_url.is_some() && !context.frame_accessible {
        pacing.settle().await;
    }
    Ok(page)
}

/// A filled form still open in its browser session.
pub struct FilledForm {
    browser: StealthBrowser,
    page: Page,
    result: FillResult,
}

impl FilledForm {
    pub fn result(&self) -> &FillResult {
        &self.result
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// End the review session and return the report.
    pub async fn close(self) -> FillResult {
        let FilledForm { browser, page, result } = self;
        drop(page);
        browser.close().await;
        result
    }
}
