//! Form extraction: URL in, [`FormDescriptor`] out.

pub mod classify;
pub mod frames;
mod scan;

use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::browser::StealthBrowser;
use crate::config::BrowserConfig;
use crate::error::Result;
use crate::js::DocumentRoot;
use crate::page::Page;
use crate::reveal::{self, Revealed};
use crate::schema::{FieldDescriptor, FormContext, FormDescriptor};
use crate::stealth::Pacing;

use self::frames::FormSource;

pub struct FormExtractor {
    config: BrowserConfig,
}

impl FormExtractor {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Extract the application form behind `url` in a fresh, isolated session.
    ///
    /// A page without a recognisable form yields an empty descriptor, not an
    /// error. Only navigation and browser failures are reported as `Err`.
    pub async fn extract(&self, url: &str) -> Result<FormDescriptor> {
        let browser = StealthBrowser::launch(self.config.clone()).await?;
        let outcome = self.extract_with(&browser, url).await;
        browser.close().await;
        outcome
    }

    /// Extract several URLs concurrently, each in its own browser.
    /// Results come back in completion order.
    pub async fn extract_all(&self, urls: &[String], concurrency: usize) -> Vec<(String, Result<FormDescriptor>)> {
        futures::stream::iter(urls.iter().cloned())
            .map(|url| async move {
                let outcome = self.extract(&url).await;
                (url, outcome)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    /// Extract using an already launched browser.
    #[instrument(skip(self, browser))]
    pub async fn extract_with(&self, browser: &StealthBrowser, url: &str) -> Result<FormDescriptor> {
        let pacing = browser.pacing();
        let strategy = self.config.wait_strategy;
        let mut page = browser.open_page().await?;
        let mut context = FormContext::top_level(strategy, self.config.load_timeout.as_millis() as u64);

        let mut source_url = page.navigate(url, strategy).await?;
        pacing.settle().await;

        let mut located = locate_form(&mut page, &source_url, &context, &pacing).await?;

        if located.is_none() {
            page.set_root(DocumentRoot::Top);
            match reveal::reveal(&page, None).await? {
                Some(Revealed::Link(href)) => {
                    source_url = page.navigate(&href, strategy).await?;
                }
                Some(Revealed::Clicked(text)) => {
                    pacing.settle().await;
                    let current = page.url().await?;
                    if current != source_url {
                        // The trigger routed to a page of its own.
                        source_url = current;
                    } else {
                        context.reveal_text = Some(text);
                    }
                }
                None => {}
            }
            pacing.settle().await;
            located = locate_form(&mut page, &source_url, &context, &pacing).await?;
        }

        let Some((source, fields)) = located else {
            info!(url = %source_url, "no application form found");
            context.reveal_text = None;
            return Ok(FormDescriptor::empty(source_url, context));
        };

        let context = source.context(&context);
        let meta: PageMeta = match page.evaluate_in(&DocumentRoot::Top, META_JS).await {
            Ok(meta) => meta,
            Err(e) => {
                debug!(error = %e, "page metadata unavailable");
                PageMeta::default()
            }
        };

        let descriptor = FormDescriptor::new(
            source_url.clone(),
            context,
            fields,
            infer_company(&source_url, &meta.site_name),
            meta.job_title(),
        );
        info!(
            url = %source_url,
            total = descriptor.total_fields,
            required = descriptor.required_fields,
            iframe = descriptor.form_context.is_iframe,
            "form extracted"
        );
        Ok(descriptor)
    }
}

/// Scan candidate documents until one yields fields. The page is left on the
/// winning document; on a miss it is back on `source_url`'s top document.
async fn locate_form(
    page: &mut Page,
    source_url: &str,
    context: &FormContext,
    pacing: &Pacing,
) -> Result<Option<(FormSource, Vec<FieldDescriptor>)>> {
    page.set_root(DocumentRoot::Top);
    let probes = frames::probe(page).await?;
    let candidates = frames::candidate_sources(&probes);
    debug!(frames = probes.len(), candidates = candidates.len(), "frame candidates");

    for source in candidates {
        let controls = match &source {
            FormSource::Top => {
                page.set_root(DocumentRoot::Top);
                scan::scan_controls(page).await?
            }
            FormSource::Frame { selector, .. } => {
                page.set_root(DocumentRoot::Frame(selector.clone()));
                match scan::scan_controls(page).await {
                    Ok(controls) => controls,
                    Err(e) => {
                        debug!(selector = %selector, error = %e, "frame not scannable");
                        continue;
                    }
                }
            }
            FormSource::Promoted { url, .. } => {
                if let Err(e) = page.navigate(url, context.wait_strategy).await {
                    warn!(url = %url, error = %e, "could not open form frame");
                    page.navigate(source_url, context.wait_strategy).await?;
                    continue;
                }
                pacing.settle().await;
                scan::scan_controls(page).await?
            }
        };

        let fields = classify::build_fields(&controls);
        if !fields.is_empty() {
            debug!(?source, controls = controls.len(), fields = fields.len(), "form located");
            return Ok(Some((source, fields)));
        }

        if matches!(source, FormSource::Promoted { .. }) {
            page.navigate(source_url, context.wait_strategy).await?;
        }
    }

    warn!(url = %source_url, "no document with form controls (frame resolution failed)");
    page.set_root(DocumentRoot::Top);
    Ok(None)
}

const META_JS: &str = r#"
    const meta = (p) => {
        const m = doc.querySelector('meta[property="' + p + '"]');
        return m ? norm(m.getAttribute('content')) : '';
    };
    const h1 = doc.querySelector('h1');
    return {
        title: norm(doc.title),
        heading: h1 ? norm(h1.innerText || h1.textContent) : '',
        siteName: meta('og:site_name'),
        ogTitle: meta('og:title'),
    };
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PageMeta {
    title: String,
    heading: String,
    site_name: String,
    og_title: String,
}

impl PageMeta {
    fn job_title(&self) -> String {
        [&self.heading, &self.og_title, &self.title]
            .into_iter()
            .find(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_default()
    }
}

/// Best-effort company name: `og:site_name`, then the company slug of known
/// ATS URL shapes, then the registrable label of the host.
pub fn infer_company(source_url: &str, site_name: &str) -> String {
    if !site_name.trim().is_empty() {
        return site_name.trim().to_string();
    }
    let Ok(url) = url::Url::parse(source_url) else {
        return String::new();
    };
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let first_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next())
        .unwrap_or_default()
        .to_string();

    let path_hosts = ["greenhouse.io", "jobs.lever.co", "jobs.ashbyhq.com", "apply.workable.com"];
    let subdomain_hosts = ["myworkdayjobs.com", "bamboohr.com"];

    let slug = if path_hosts.iter().any(|h| host.ends_with(h)) && first_segment != "embed" {
        first_segment
    } else if let Some(suffix) = subdomain_hosts.iter().find(|h| host.ends_with(*h)) {
        host.trim_end_matches(suffix).split('.').next().unwrap_or_default().to_string()
    } else {
        let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
        if labels.len() >= 2 {
            labels[labels.len() - 2].to_string()
        } else {
            labels.first().map(|l| l.to_string()).unwrap_or_default()
        }
    };
    title_case(&slug)
}

fn title_case(slug: &str) -> String {
    slug.split(|c: char| c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
