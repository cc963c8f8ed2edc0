//! In-page helper script shared by extraction and filling.
//!
//! Both sides must derive labels, visibility and DOM paths identically,
//! otherwise a label hint recorded at extraction would never match at fill
//! time. Every script built here runs against `doc`, the document that holds
//! the form (the top document or a same-origin frame's document).

use crate::error::Result;

/// Where the form document lives relative to the tab's top document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRoot {
    Top,
    /// A same-origin `<iframe>` addressed by CSS selector.
    Frame(String),
}

impl DocumentRoot {
    pub fn is_top(&self) -> bool {
        matches!(self, DocumentRoot::Top)
    }

    pub(crate) fn expression(&self) -> Result<String> {
        Ok(match self {
            DocumentRoot::Top => "document".to_string(),
            DocumentRoot::Frame(selector) => format!(
                "((() => {{ const f = document.querySelector({}); try {{ return f ? f.contentDocument : null; }} catch (_) {{ return null; }} }})())",
                serde_json::to_string(selector)?
            ),
        })
    }
}

/// Wrap `body` (statements ending in `return ...;`) so it runs with `doc` and
/// the helpers in scope and yields its result as a JSON string.
pub(crate) fn scoped(root: &DocumentRoot, body: &str) -> Result<String> {
    Ok(format!(
        r#"JSON.stringify((() => {{
    const doc = {root};
    if (!doc) throw new Error('form document is not available');
    {HELPERS}
    {body}
}})())"#,
        root = root.expression()?,
    ))
}

/// Quote a Rust string as a JS string literal.
pub(crate) fn literal(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

const HELPERS: &str = r#"
    const win = doc.defaultView || window;
    const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
    const clean = (s) => norm((s || '').replace(/\*/g, ' ')).replace(/[\s:]+$/, '').toLowerCase();
    const CONTROLS = 'input, select, textarea';
    const SKIPPED_INPUTS = ['hidden', 'submit', 'button', 'reset', 'image'];
    const slots = (window.__atsSlots = window.__atsSlots || {});

    const isControl = (el) =>
        el.matches(CONTROLS) && !(el.tagName === 'INPUT' && SKIPPED_INPUTS.includes((el.type || '').toLowerCase()));

    const shown = (el) => {
        if (!el || !el.getBoundingClientRect) return false;
        const style = win.getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden') return false;
        const r = el.getBoundingClientRect();
        return r.width > 0 && r.height > 0;
    };

    const labelText = (label) => {
        const copy = label.cloneNode(true);
        copy.querySelectorAll('select, textarea, option, input').forEach((c) => c.remove());
        return norm(copy.textContent);
    };

    const labelElement = (el) => {
        if (el.id) {
            const byFor = doc.querySelector('label[for="' + CSS.escape(el.id) + '"]');
            if (byFor) return byFor;
        }
        return el.closest('label');
    };

    // File, checkbox and radio inputs are often hidden behind a styled label.
    const visible = (el) => {
        if (shown(el)) return true;
        const t = (el.type || '').toLowerCase();
        if (['file', 'checkbox', 'radio'].includes(t)) {
            const label = labelElement(el);
            return !!label && shown(label);
        }
        return false;
    };

    const usable = (el) => isControl(el) && !el.disabled && visible(el);

    const explicitLabel = (el) => {
        const label = labelElement(el);
        return label ? labelText(label) : '';
    };

    const ariaText = (el) => {
        const direct = norm(el.getAttribute('aria-label'));
        if (direct) return direct;
        const ids = norm(el.getAttribute('aria-labelledby'));
        if (!ids) return '';
        return norm(ids.split(' ').map((id) => doc.getElementById(id)).filter(Boolean)
            .map((n) => n.textContent).join(' '));
    };

    const precedingText = (el) => {
        let node = el;
        for (let depth = 0; depth < 3 && node && node !== doc.body; depth++) {
            let sib = node.previousSibling;
            while (sib) {
                if (sib.nodeType === 3) {
                    const t = norm(sib.textContent);
                    if (t) return t.slice(0, 200);
                } else if (sib.nodeType === 1 && !sib.matches('script, style, button')) {
                    if (sib.matches(CONTROLS) || sib.querySelector(CONTROLS)) return '';
                    const t = norm(sib.innerText || sib.textContent);
                    if (t) return t.slice(0, 200);
                }
                sib = sib.previousSibling;
            }
            node = node.parentElement;
        }
        return '';
    };

    const radioGroup = (radio) => {
        if (!radio.name) return [radio];
        const scope = radio.form || doc;
        return Array.from(scope.querySelectorAll('input[type="radio"]'))
            .filter((r) => r.name === radio.name);
    };

    const groupContainer = (radios) => {
        let node = radios[0].parentElement;
        while (node && node !== doc.body && !radios.every((r) => node.contains(r))) {
            node = node.parentElement;
        }
        return node;
    };

    const groupLabel = (radio) => {
        const fieldset = radio.closest('fieldset');
        if (fieldset) {
            const legend = fieldset.querySelector('legend');
            if (legend && norm(legend.textContent)) return norm(legend.textContent);
        }
        const group = radio.closest('[role="radiogroup"]');
        if (group && ariaText(group)) return ariaText(group);
        const radios = radioGroup(radio);
        let container = groupContainer(radios);
        // Climb past wrappers that hold only the radios themselves.
        for (let i = 0; i < 2 && container && container !== doc.body; i++) {
            const text = precedingText(container);
            if (text) return text;
            container = container.parentElement;
        }
        return '';
    };

    const optionLabel = (radio) => explicitLabel(radio) || ariaText(radio) || norm(radio.value);

    const questionOf = (el) => {
        if ((el.type || '').toLowerCase() === 'radio') return groupLabel(el);
        return explicitLabel(el) || ariaText(el) || precedingText(el) || norm(el.getAttribute('placeholder'));
    };

    const domPath = (el) => {
        const parts = [];
        let node = el;
        while (node && node.nodeType === 1 && node !== doc.body && node !== doc.documentElement) {
            let index = 1;
            let sib = node.previousElementSibling;
            while (sib) {
                if (sib.tagName === node.tagName) index++;
                sib = sib.previousElementSibling;
            }
            parts.unshift(node.tagName.toLowerCase() + ':nth-of-type(' + index + ')');
            node = node.parentElement;
        }
        return ['body'].concat(parts).join(' > ');
    };
"#;
