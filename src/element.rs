use chromiumoxide::element::Element as CrElement;

use crate::error::Result;

/// Wrapper around a chromiumoxide Element in the top document. Clicks through
/// it are real mouse events rather than synthetic `el.click()` calls.
pub struct Element {
    inner: CrElement,
}

impl Element {
    pub(crate) fn new(inner: CrElement) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &CrElement {
        &self.inner
    }

    /// Scroll into view, move the pointer over the element and click it.
    pub async fn click(&self) -> Result<()> {
        self.inner.scroll_into_view().await?;
        self.inner.hover().await?;
        self.inner.click().await?;
        Ok(())
    }
}
