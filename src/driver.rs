use async_trait::async_trait;

use crate::error::Result;

/// Raw browser capability the exporter drives.
///
/// Implementations report a handle invalidated by a re-render as
/// [`crate::error::ExportError::TransientElement`]; every other failure is
/// [`crate::error::ExportError::Driver`].
#[async_trait]
pub trait Driver: Send + Sync + Sized {
    type Element: Send + Sync;

    /// Starts navigation and returns once the browser reports the document loaded.
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn find(&self, selector: &str) -> Result<Vec<Self::Element>>;

    async fn find_within(&self, parent: &Self::Element, selector: &str)
    -> Result<Vec<Self::Element>>;

    /// Rendered text of the element.
    async fn read_text(&self, element: &Self::Element) -> Result<String>;

    async fn read_attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    async fn read_property(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<serde_json::Value>>;

    async fn type_text(&self, element: &Self::Element, text: &str) -> Result<()>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    /// Releases the browser. Called exactly once, on every exit path.
    async fn close(self) -> Result<()>;
}
