//! The Form Descriptor: the serializable contract between extraction and filling.
//!
//! A descriptor is produced once by [`crate::FormExtractor`], persisted as JSON,
//! populated by an external actor (which may only touch `fields[*].value`) and
//! consumed by [`crate::FormFiller`]. Counts are cached for readers of the file
//! and are re-checked by [`FormDescriptor::validate`] whenever a descriptor
//! crosses a serialization boundary.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 30_000;

/// Page readiness condition awaited after navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitStrategy {
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[default]
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

impl std::str::FromStr for WaitStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "load" => Ok(Self::Load),
            "domcontentloaded" => Ok(Self::DomContentLoaded),
            "networkidle" => Ok(Self::NetworkIdle),
            other => Err(format!("unknown wait strategy: {other}")),
        }
    }
}

/// How to re-acquire the document that holds the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormContext {
    pub is_iframe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_selector: Option<String>,
    /// `src` of the form frame. Cross-origin frames are re-opened by URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_url: Option<String>,
    #[serde(default)]
    pub frame_accessible: bool,
    pub wait_strategy: WaitStrategy,
    pub load_timeout_ms: u64,
    /// Text of an in-page trigger that must be clicked before controls appear.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal_text: Option<String>,
}

impl FormContext {
    pub fn top_level(wait_strategy: WaitStrategy, load_timeout_ms: u64) -> Self {
        Self {
            is_iframe: false,
            frame_selector: None,
            frame_url: None,
            frame_accessible: false,
            wait_strategy,
            load_timeout_ms,
            reveal_text: None,
        }
    }

    pub fn load_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.load_timeout_ms)
    }
}

impl Default for FormContext {
    fn default() -> Self {
        Self::top_level(WaitStrategy::default(), DEFAULT_LOAD_TIMEOUT_MS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Email,
    Phone,
    Url,
    Textarea,
    Dropdown,
    Checkbox,
    Radio,
    File,
    Date,
}

impl FieldType {
    pub fn has_options(self) -> bool {
        matches!(self, FieldType::Dropdown | FieldType::Radio)
    }

    /// Types committed by typing characters into the control.
    pub fn is_typed(self) -> bool {
        matches!(
            self,
            FieldType::Text | FieldType::Email | FieldType::Phone | FieldType::Url | FieldType::Textarea
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Url => "url",
            FieldType::Textarea => "textarea",
            FieldType::Dropdown => "dropdown",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::File => "file",
            FieldType::Date => "date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy for finding a field again on a freshly rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum LocatorHint {
    Css { selector: String },
    Label { text: String },
    Position { path: String },
}

impl LocatorHint {
    pub fn strategy(&self) -> &'static str {
        match self {
            LocatorHint::Css { .. } => "css",
            LocatorHint::Label { .. } => "label",
            LocatorHint::Position { .. } => "position",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub id: String,
    pub question: String,
    pub field_type: FieldType,
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub locator_hints: Vec<LocatorHint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDescriptor {
    pub source_url: String,
    pub form_context: FormContext,
    pub fields: Vec<FieldDescriptor>,
    pub total_fields: usize,
    pub required_fields: usize,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub job_title: String,
    pub extracted_at: DateTime<Utc>,
}

impl FormDescriptor {
    pub fn new(
        source_url: impl Into<String>,
        form_context: FormContext,
        fields: Vec<FieldDescriptor>,
        company: impl Into<String>,
        job_title: impl Into<String>,
    ) -> Self {
        let required_fields = fields.iter().filter(|f| f.required).count();
        Self {
            source_url: source_url.into(),
            form_context,
            total_fields: fields.len(),
            required_fields,
            fields,
            company: company.into(),
            job_title: job_title.into(),
            extracted_at: Utc::now(),
        }
    }

    /// The explicit "no form found" result.
    pub fn empty(source_url: impl Into<String>, form_context: FormContext) -> Self {
        Self::new(source_url, form_context, Vec::new(), "", "")
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Set the answer for one field. Values are the only mutable part of a
    /// persisted descriptor.
    pub fn set_value(&mut self, id: &str, value: impl Into<String>) -> Result<()> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| Error::InvalidDescriptor(format!("unknown field id: {id}")))?;
        field.value = value.into();
        Ok(())
    }

    pub fn with_values(mut self, values: &HashMap<String, String>) -> Result<Self> {
        for (id, value) in values {
            self.set_value(id, value.clone())?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_fields != self.fields.len() {
            return Err(Error::InvalidDescriptor(format!(
                "totalFields is {} but {} fields are present",
                self.total_fields,
                self.fields.len()
            )));
        }
        let required = self.fields.iter().filter(|f| f.required).count();
        if self.required_fields != required {
            return Err(Error::InvalidDescriptor(format!(
                "requiredFields is {} but {required} fields are required",
                self.required_fields
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.id.as_str()) {
                return Err(Error::InvalidDescriptor(format!("duplicate field id: {}", field.id)));
            }
            if field.field_type.has_options() == field.options.is_empty() {
                return Err(Error::InvalidDescriptor(format!(
                    "field {} of type {} has {} options",
                    field.id,
                    field.field_type,
                    field.options.len()
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        self.validate()?;
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let descriptor: Self = serde_json::from_str(json)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// File name used when persisting:
    /// `form_<company-or-host>_<timestamp>_<url tag>.json`, with millisecond
    /// precision and a short hash of `source_url`.
    pub fn file_name(&self) -> String {
        let subject = if self.company.trim().is_empty() {
            url::Url::parse(&self.source_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_default()
        } else {
            self.company.clone()
        };
        let mut slug = crate::extract::classify::slugify(&subject);
        if slug.is_empty() {
            slug = "form".into();
        }
        let mut hasher = Sha1::new();
        hasher.update(self.source_url.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        format!(
            "form_{}_{}_{}.json",
            slug,
            self.extracted_at.format("%Y%m%d_%H%M%S_%3f"),
            &digest[..8]
        )
    }

    /// Write the descriptor into `dir` and return the file path. Existing
    /// files are never overwritten; a clash gets a `_2`, `_3`, ... suffix.
    pub fn save_in(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let json = self.to_json()?;
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let name = self.file_name();
        let stem = name.trim_end_matches(".json");
        let mut attempt = 1;
        loop {
            let path = if attempt == 1 {
                dir.join(&name)
            } else {
                dir.join(format!("{stem}_{attempt}.json"))
            };
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(json.as_bytes())?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: &str, field_type: FieldType, required: bool) -> FieldDescriptor {
        FieldDescriptor {
            id: id.into(),
            question: id.replace('_', " "),
            field_type,
            required,
            options: if field_type.has_options() {
                vec!["Yes".into(), "No".into()]
            } else {
                Vec::new()
            },
            value: String::new(),
            locator_hints: vec![LocatorHint::Css {
                selector: format!("[name=\"{id}\"]"),
            }],
        }
    }

    #[test]
    fn counts_follow_fields() {
        let d = FormDescriptor::new(
            "https://example.com/jobs/1",
            FormContext::default(),
            vec![
                field("first_name", FieldType::Text, true),
                field("sponsorship", FieldType::Radio, false),
                field("resume", FieldType::File, true),
            ],
            "Example",
            "Engineer",
        );
        assert_eq!(d.total_fields, 3);
        assert_eq!(d.required_fields, 2);
        d.validate().unwrap();
    }

    #[test]
    fn validate_rejects_stale_counts() {
        let mut d = FormDescriptor::new(
            "https://example.com",
            FormContext::default(),
            vec![field("email", FieldType::Email, true)],
            "",
            "",
        );
        d.required_fields = 0;
        assert!(matches!(d.validate(), Err(Error::InvalidDescriptor(_))));
    }

    #[test]
    fn validate_rejects_options_on_text() {
        let mut f = field("name", FieldType::Text, false);
        f.options = vec!["x".into()];
        let d = FormDescriptor::new("https://example.com", FormContext::default(), vec![f], "", "");
        assert!(d.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let d = FormDescriptor::new(
            "https://example.com",
            FormContext::default(),
            vec![field("a", FieldType::Text, false), field("a", FieldType::Email, false)],
            "",
            "",
        );
        assert!(d.validate().is_err());
    }

    #[test]
    fn set_value_rejects_unknown_id() {
        let mut d = FormDescriptor::empty("https://example.com", FormContext::default());
        assert!(d.set_value("missing", "x").is_err());
    }

    #[test]
    fn wait_strategy_uses_lowercase_names() {
        let json = serde_json::to_string(&WaitStrategy::DomContentLoaded).unwrap();
        assert_eq!(json, "\"domcontentloaded\"");
        assert_eq!("networkidle".parse::<WaitStrategy>().unwrap(), WaitStrategy::NetworkIdle);
        assert!("idle".parse::<WaitStrategy>().is_err());
    }

    #[test]
    fn locator_hint_is_tagged_by_strategy() {
        let hint = LocatorHint::Label { text: "Email".into() };
        let json = serde_json::to_value(&hint).unwrap();
        assert_eq!(json["strategy"], "label");
        assert_eq!(json["text"], "Email");
    }

    #[test]
    fn file_name_prefers_company_then_host() {
        let mut d = FormDescriptor::empty("https://boards.greenhouse.io/acme/jobs/1", FormContext::default());
        assert!(d.file_name().starts_with("form_boards_greenhouse_io_"));
        d.company = "Acme Corp".into();
        assert!(d.file_name().starts_with("form_acme_corp_"));
        assert!(d.file_name().ends_with(".json"));
    }

    #[test]
    fn same_company_same_instant_gets_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = FormDescriptor::empty("https://boards.greenhouse.io/acme/jobs/1", FormContext::default());
        first.company = "Acme".into();
        let mut second = first.clone();
        second.source_url = "https://boards.greenhouse.io/acme/jobs/2".into();

        assert_ne!(first.file_name(), second.file_name());
        let a = first.save_in(dir.path()).unwrap();
        let b = second.save_in(dir.path()).unwrap();
        assert_ne!(a, b);
        assert_eq!(FormDescriptor::load(&a).unwrap().source_url, first.source_url);
        assert_eq!(FormDescriptor::load(&b).unwrap().source_url, second.source_url);
    }

    #[test]
    fn saving_twice_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let d = FormDescriptor::empty("https://example.com/jobs/7", FormContext::default());
        let a = d.save_in(dir.path()).unwrap();
        let b = d.save_in(dir.path()).unwrap();
        assert_ne!(a, b);
        assert!(b.to_string_lossy().ends_with("_2.json"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
