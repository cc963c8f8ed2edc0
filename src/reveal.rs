//! "Apply" triggers that must be activated before the form renders.

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::js::{self, DocumentRoot};
use crate::page::Page;

const TRIGGER_ATTR: &str = "data-ats-reveal";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revealed {
    /// The trigger was a link; the form lives at this URL.
    Link(String),
    /// The trigger was clicked in place; its text is recorded for replay.
    Clicked(String),
}

#[derive(Debug, Deserialize)]
struct Trigger {
    text: String,
    href: Option<String>,
}

/// Finds a visible apply trigger. With `wanted`, only an exact (case-insensitive)
/// text match counts. Submit buttons of existing forms are never candidates.
const FIND_TRIGGER_JS: &str = r#"
    const pattern = /^(apply|apply now|apply here|apply online|apply for this (job|position|role)|apply to this job|start (your )?application|i'?m interested|continue to application)$/i;
    const matches = (text) => WANTED === null ? pattern.test(text) : text.toLowerCase() === WANTED.toLowerCase();
    doc.querySelectorAll('[' + ATTR + ']').forEach((el) => el.removeAttribute(ATTR));
    const target = Array.from(doc.querySelectorAll('a, button, [role="button"]'))
        .filter((el) => !(el.tagName === 'BUTTON' && el.type === 'submit' && el.form))
        .filter((el) => !el.disabled && shown(el))
        .find((el) => matches(norm(el.innerText || el.textContent)));
    if (!target) return null;
    const raw = target.tagName === 'A' ? (target.getAttribute('href') || '') : '';
    const link = raw && !raw.startsWith('#') && !raw.toLowerCase().startsWith('javascript:');
    target.setAttribute(ATTR, '1');
    return { text: norm(target.innerText || target.textContent), href: link ? target.href : null };
"#;

const CLICK_TRIGGER_JS: &str = r#"
    const el = doc.querySelector('[' + ATTR + ']');
    if (!el) return false;
    el.removeAttribute(ATTR);
    el.scrollIntoView({ block: 'center' });
    el.click();
    return true;
"#;

/// Activate an apply trigger in the top document, if one exists.
pub async fn reveal(page: &Page, wanted: Option<&str>) -> Result<Option<Revealed>> {
    let wanted_js = match wanted {
        Some(text) => js::literal(text)?,
        None => "null".to_string(),
    };
    let prelude = format!("const WANTED = {wanted_js}; const ATTR = {};", js::literal(TRIGGER_ATTR)?);
    let trigger: Option<Trigger> = page
        .evaluate_in(&DocumentRoot::Top, &format!("{prelude}{FIND_TRIGGER_JS}"))
        .await?;

    let Some(trigger) = trigger else {
        debug!(?wanted, "no apply trigger found");
        return Ok(None);
    };

    if let Some(href) = trigger.href {
        info!(text = %trigger.text, href = %href, "following apply link");
        return Ok(Some(Revealed::Link(href)));
    }

    info!(text = %trigger.text, "clicking apply trigger");
    let real_click = match page.find_element(&format!("[{TRIGGER_ATTR}]")).await {
        Ok(element) => element.click().await.is_ok(),
        Err(_) => false,
    };
    if !real_click {
        page.evaluate_in::<bool>(&DocumentRoot::Top, &format!("{prelude}{CLICK_TRIGGER_JS}"))
            .await?;
    }
    Ok(Some(Revealed::Clicked(trigger.text)))
}
