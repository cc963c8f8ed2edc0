//! Deciding which document holds the application form.

use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::js::{self, DocumentRoot};
use crate::page::Page;
use crate::schema::FormContext;

/// URL fragments of hosted ATS forms commonly embedded through an iframe.
pub const ATS_FINGERPRINTS: &[&str] = &[
    "greenhouse.io",
    "lever.co",
    "myworkdayjobs.com",
    "workday.com",
    "icims.com",
    "smartrecruiters.com",
    "ashbyhq.com",
    "jobvite.com",
    "bamboohr.com",
    "taleo.net",
    "successfactors",
    "breezy.hr",
    "workable.com",
    "recruitee.com",
    "jazzhr.com",
    "applytojob.com",
    "/embed/job_app",
];

/// Minimum number of controls for an unrecognised frame to count as a form.
pub const DENSITY_THRESHOLD: usize = 3;

/// What the top document reports about one `<iframe>`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameProbe {
    /// Absolute frame URL.
    pub src: String,
    /// `src` as written in the markup, possibly relative.
    pub src_attr: String,
    pub dom_id: String,
    pub name: String,
    pub path: String,
    /// Same-origin and scriptable from the parent.
    pub accessible: bool,
    pub controls: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormSource {
    Top,
    /// Same-origin frame scanned in place.
    Frame { selector: String, url: Option<String> },
    /// Cross-origin frame opened directly by URL.
    Promoted { selector: String, url: String },
}

impl FormSource {
    pub fn context(&self, base: &FormContext) -> FormContext {
        let mut context = base.clone();
        match self {
            FormSource::Top => {
                context.is_iframe = false;
                context.frame_selector = None;
                context.frame_url = None;
                context.frame_accessible = false;
            }
            FormSource::Frame { selector, url } => {
                context.is_iframe = true;
                context.frame_selector = Some(selector.clone());
                context.frame_url = url.clone();
                context.frame_accessible = true;
            }
            FormSource::Promoted { selector, url } => {
                context.is_iframe = true;
                context.frame_selector = Some(selector.clone());
                context.frame_url = Some(url.clone());
                context.frame_accessible = false;
            }
        }
        context
    }
}

pub fn matches_fingerprint(src: &str) -> bool {
    let src = src.to_ascii_lowercase();
    ATS_FINGERPRINTS.iter().any(|f| src.contains(f))
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

pub fn frame_selector(probe: &FrameProbe) -> String {
    if !probe.dom_id.is_empty() {
        format!("iframe[id=\"{}\"]", quote(&probe.dom_id))
    } else if !probe.name.is_empty() {
        format!("iframe[name=\"{}\"]", quote(&probe.name))
    } else if !probe.src_attr.is_empty() {
        format!("iframe[src=\"{}\"]", quote(&probe.src_attr))
    } else {
        probe.path.clone()
    }
}

fn source_for(probe: &FrameProbe) -> Option<FormSource> {
    let selector = frame_selector(probe);
    if probe.accessible {
        let url = (!probe.src.is_empty()).then(|| probe.src.clone());
        return Some(FormSource::Frame { selector, url });
    }
    if probe.src.starts_with("http://") || probe.src.starts_with("https://") {
        return Some(FormSource::Promoted {
            selector,
            url: probe.src.clone(),
        });
    }
    None
}

/// Candidate documents in the order they should be scanned: fingerprinted
/// frames, then dense scriptable frames (densest first), then the top document.
pub fn candidate_sources(frames: &[FrameProbe]) -> Vec<FormSource> {
    let mut sources: Vec<FormSource> = frames
        .iter()
        .filter(|f| matches_fingerprint(&f.src))
        .filter_map(source_for)
        .collect();

    let mut dense: Vec<&FrameProbe> = frames
        .iter()
        .filter(|f| !matches_fingerprint(&f.src) && f.accessible && f.controls >= DENSITY_THRESHOLD)
        .collect();
    dense.sort_by(|a, b| b.controls.cmp(&a.controls));
    sources.extend(dense.into_iter().filter_map(source_for));

    sources.push(FormSource::Top);
    sources
}

pub(crate) const PROBE_JS: &str = r#"
    return Array.from(doc.querySelectorAll('iframe')).map((f) => {
        let inner = null;
        try { inner = f.contentDocument; } catch (_) {}
        const controls = inner
            ? Array.from(inner.querySelectorAll(
                'input:not([type=hidden]):not([type=submit]):not([type=button]):not([type=reset]):not([type=image]), select, textarea'
              )).filter((el) => !el.disabled).length
            : 0;
        return {
            src: f.getAttribute('src') ? f.src : '',
            srcAttr: f.getAttribute('src') || '',
            domId: f.id || '',
            name: f.getAttribute('name') || '',
            path: domPath(f),
            accessible: !!inner,
            controls,
        };
    });
"#;

pub(crate) async fn probe(page: &Page) -> Result<Vec<FrameProbe>> {
    page.evaluate_in(&DocumentRoot::Top, PROBE_JS).await
}

/// Point `page` at the form document described by `context` on a freshly
/// loaded source page.
pub(crate) async fn reacquire(page: &mut Page, context: &FormContext) -> Result<()> {
    if !context.is_iframe {
        page.set_root(DocumentRoot::Top);
        return Ok(());
    }

    if context.frame_accessible {
        if let Some(selector) = &context.frame_selector {
            if wait_for_frame(page, selector).await? {
                debug!(selector = %selector, "form frame re-acquired");
                page.set_root(DocumentRoot::Frame(selector.clone()));
                return Ok(());
            }
        }
    }

    if let Some(url) = &context.frame_url {
        info!(url = %url, "opening form frame directly");
        page.navigate(url, context.wait_strategy).await?;
        return Ok(());
    }

    Err(Error::FrameResolution(format!(
        "frame {:?} not found and no frame URL recorded",
        context.frame_selector
    )))
}

async fn wait_for_frame(page: &Page, selector: &str) -> Result<bool> {
    let check = format!(
        "(() => {{ const f = document.querySelector({}); try {{ return !!(f && f.contentDocument && f.contentDocument.readyState !== 'loading'); }} catch (_) {{ return false; }} }})()",
        js::literal(selector)?
    );
    let started = Instant::now();
    while started.elapsed() < page.timeout() {
        if page.evaluate_top::<bool>(&check).await? {
            return Ok(true);
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
    Ok(false)
}
