use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{FormSurface, ReadBack};
use crate::error::{Error, Result};
use crate::js;
use crate::page::Page;
use crate::schema::{FieldType, LocatorHint};
use crate::stealth::Pacing;

const TARGET_ATTR: &str = "data-ats-target";

/// Helpers for scripts that act on a bound slot. `target` is the element, or
/// the array of radios for a radio group.
const SLOT_JS: &str = r#"
    const target = slots[SLOT];
    if (!target) throw new Error('slot ' + SLOT + ' is not bound');
    const setNative = (el, value) => {
        const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value');
        if (desc && desc.set) desc.set.call(el, value); else el.value = value;
    };
    const fire = (el, type) => el.dispatchEvent(new Event(type, { bubbles: true }));
"#;

const LOCATE_JS: &str = r#"
    const query = (selector) => {
        try { return Array.from(doc.querySelectorAll(selector)); } catch (_) { return []; }
    };
    let found;
    if (HINT.strategy === 'css') {
        found = query(HINT.selector).filter(usable);
    } else if (HINT.strategy === 'position') {
        found = query(HINT.path).filter(usable);
    } else {
        const want = clean(HINT.text);
        found = Array.from(doc.querySelectorAll(CONTROLS)).filter((el) => usable(el) && clean(questionOf(el)) === want);
    }
    if (KIND === 'radio') {
        const radios = found.filter((el) => (el.type || '').toLowerCase() === 'radio');
        const groups = new Set(radios.map((r) => r.name || r));
        if (groups.size === 1) slots[SLOT] = radioGroup(radios[0]).filter((r) => !r.disabled);
        return groups.size;
    }
    if (found.length === 1) slots[SLOT] = found[0];
    return found.length;
"#;

const FOCUS_JS: &str = r#"
    target.scrollIntoView({ block: 'center' });
    target.focus();
    if (target.value) {
        setNative(target, '');
        fire(target, 'input');
    }
    return doc.activeElement === target;
"#;

const COMMIT_JS: &str = r#"
    fire(target, 'change');
    target.blur();
    return true;
"#;

const SET_VALUE_JS: &str = r#"
    target.scrollIntoView({ block: 'center' });
    target.focus();
    setNative(target, VALUE);
    fire(target, 'input');
    fire(target, 'change');
    target.blur();
    return true;
"#;

const CHOICES_JS: &str = r#"
    if (KIND === 'radio') return target.map((r) => optionLabel(r));
    return Array.from(target.options).map((o) => (o.disabled ? '' : norm(o.text)));
"#;

const SELECT_JS: &str = r#"
    const option = target.options[INDEX];
    if (!option) throw new Error('option ' + INDEX + ' is gone');
    target.scrollIntoView({ block: 'center' });
    target.focus();
    setNative(target, option.value);
    target.selectedIndex = INDEX;
    fire(target, 'input');
    fire(target, 'change');
    target.blur();
    return true;
"#;

const IS_CHECKED_JS: &str = "return !!target.checked;";

/// Marks the element to click so the top document can address it by selector.
/// Returns false when it is hidden and a synthetic click is needed instead.
const MARK_JS: &str = r#"
    doc.querySelectorAll('[' + ATTR + ']').forEach((el) => el.removeAttribute(ATTR));
    const el = INDEX === null ? target : target[INDEX];
    el.scrollIntoView({ block: 'center' });
    if (!shown(el)) return false;
    el.setAttribute(ATTR, '1');
    return true;
"#;

const UNMARK_JS: &str = r#"
    doc.querySelectorAll('[' + ATTR + ']').forEach((el) => el.removeAttribute(ATTR));
    return true;
"#;

const CLICK_JS: &str = r#"
    const el = INDEX === null ? target : target[INDEX];
    el.removeAttribute(ATTR);
    el.click();
    return true;
"#;

const READ_BACK_JS: &str = r#"
    switch (KIND) {
        case 'radio': {
            const picked = target.find((r) => r.checked);
            return { kind: 'choice', value: picked ? optionLabel(picked) : null };
        }
        case 'dropdown': {
            const option = target.options[target.selectedIndex];
            return { kind: 'choice', value: option ? norm(option.text) : null };
        }
        case 'checkbox':
            return { kind: 'checked', value: !!target.checked };
        case 'file':
            return { kind: 'files', value: Array.from(target.files || []).map((f) => f.name) };
        default:
            return { kind: 'text', value: target.value || '' };
    }
"#;

/// [`FormSurface`] over a live page, typing with human pacing.
pub struct LiveSurface<'a> {
    page: &'a Page,
    pacing: Pacing,
}

impl<'a> LiveSurface<'a> {
    pub fn new(page: &'a Page, pacing: Pacing) -> Self {
        Self { page, pacing }
    }

    async fn run<T: DeserializeOwned>(&self, slot: &str, prelude: &str, body: &str) -> Result<T> {
        let script = format!("const SLOT = {};\n{prelude}\n{SLOT_JS}\n{body}", js::literal(slot)?);
        self.page.evaluate_scoped(&script).await
    }

    /// Click the slot's element (or radio `index`) with a real mouse event when
    /// it is visible in the top document, else with a synthetic click.
    async fn click(&self, slot: &str, index: Option<usize>) -> Result<()> {
        let prelude = format!(
            "const INDEX = {}; const ATTR = {};",
            index.map_or_else(|| "null".to_string(), |i| i.to_string()),
            js::literal(TARGET_ATTR)?
        );
        let marked: bool = self.run(slot, &prelude, MARK_JS).await?;
        if marked && self.page.root().is_top() {
            match self.page.find_element(&format!("[{TARGET_ATTR}]")).await {
                Ok(element) => match element.click().await {
                    Ok(()) => {
                        let _: bool = self.run(slot, &prelude, UNMARK_JS).await?;
                        return Ok(());
                    }
                    Err(e) => debug!(slot, error = %e, "mouse click failed, using a synthetic click"),
                },
                Err(e) => debug!(slot, error = %e, "marked element not found"),
            }
        }
        let _: bool = self.run(slot, &prelude, CLICK_JS).await?;
        Ok(())
    }
}

fn kind(field_type: FieldType) -> Result<String> {
    js::literal(field_type.as_str())
}

#[async_trait]
impl FormSurface for LiveSurface<'_> {
    async fn locate(&self, slot: &str, hint: &LocatorHint, field_type: FieldType) -> Result<usize> {
        let script = format!(
            "const SLOT = {}; const HINT = {}; const KIND = {};\n{LOCATE_JS}",
            js::literal(slot)?,
            serde_json::to_string(hint)?,
            kind(field_type)?
        );
        self.page.evaluate_scoped(&script).await
    }

    async fn enter_text(&self, slot: &str, text: &str) -> Result<()> {
        let focused: bool = self.run(slot, "", FOCUS_JS).await?;
        if !focused {
            return Err(Error::Js("control did not take focus".into()));
        }
        for chunk in self.pacing.chunks(text) {
            self.page.insert_text(&chunk).await?;
            self.pacing.keystroke().await;
        }
        let _: bool = self.run(slot, "", COMMIT_JS).await?;
        Ok(())
    }

    async fn set_value(&self, slot: &str, value: &str) -> Result<()> {
        let prelude = format!("const VALUE = {};", js::literal(value)?);
        let _: bool = self.run(slot, &prelude, SET_VALUE_JS).await?;
        Ok(())
    }

    async fn choices(&self, slot: &str, field_type: FieldType) -> Result<Vec<String>> {
        let prelude = format!("const KIND = {};", kind(field_type)?);
        self.run(slot, &prelude, CHOICES_JS).await
    }

    async fn choose(&self, slot: &str, field_type: FieldType, index: usize) -> Result<()> {
        if field_type == FieldType::Radio {
            return self.click(slot, Some(index)).await;
        }
        let prelude = format!("const INDEX = {index};");
        let _: bool = self.run(slot, &prelude, SELECT_JS).await?;
        Ok(())
    }

    async fn set_checked(&self, slot: &str, checked: bool) -> Result<()> {
        let current: bool = self.run(slot, "", IS_CHECKED_JS).await?;
        if current != checked {
            self.click(slot, None).await?;
        }
        Ok(())
    }

    async fn attach(&self, slot: &str, path: &Path) -> Result<()> {
        self.page.set_input_files(slot, path).await?;
        let _: bool = self.run(slot, "", "fire(target, 'input'); fire(target, 'change'); return true;").await?;
        Ok(())
    }

    async fn read_back(&self, slot: &str, field_type: FieldType) -> Result<ReadBack> {
        let prelude = format!("const KIND = {};", kind(field_type)?);
        self.run(slot, &prelude, READ_BACK_JS).await
    }
}
