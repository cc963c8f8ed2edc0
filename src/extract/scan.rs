use crate::error::Result;
use crate::extract::classify::RawControl;
use crate::page::Page;

/// Snapshot every usable control of the form document in DOM order.
const SCAN_JS: &str = r#"
    const out = [];
    doc.querySelectorAll(CONTROLS).forEach((el) => {
        if (!usable(el)) return;
        const tag = el.tagName.toLowerCase();
        const type = tag === 'input' ? (el.type || 'text').toLowerCase() : '';
        const radio = type === 'radio';
        const group = radio ? el.closest('[role="radiogroup"]') : null;
        const ariaRequired = (node) => !!node && (node.getAttribute('aria-required') || '').toLowerCase() === 'true';
        out.push({
            tag,
            inputType: type,
            name: el.getAttribute('name') || '',
            domId: el.id || '',
            label: radio ? optionLabel(el) : explicitLabel(el),
            ariaLabel: radio ? '' : ariaText(el),
            precedingText: radio ? '' : precedingText(el),
            placeholder: norm(el.getAttribute('placeholder')),
            groupLabel: radio ? groupLabel(el) : '',
            requiredAttr: el.hasAttribute('required'),
            ariaRequired: ariaRequired(el) || ariaRequired(group),
            options: tag === 'select'
                ? Array.from(el.options).map((o) => ({ text: norm(o.text), value: o.value, disabled: o.disabled }))
                : [],
            domPath: domPath(el),
        });
    });
    return out;
"#;

pub(crate) async fn scan_controls(page: &Page) -> Result<Vec<RawControl>> {
    page.evaluate_scoped(SCAN_JS).await
}
