//! Element handles the status glue writes into
//!
//! Browser builds implement [`ElementHandle`] for `web_sys::Element`; the CLI
//! and the tests use [`MemoryElement`].

use super::class_list::{has_class, with_class, without_class};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::sync::Arc;

/// Minimal DOM surface: text, inner content and the class list.
///
/// Methods take `&self` because DOM handles mutate through shared references.
pub trait ElementHandle {
    /// Replace the element's text content
    fn set_text(&self, text: &str);

    /// Replace the element's inner content with pre-rendered markup
    fn set_inner_html(&self, html: &str);

    fn class_name(&self) -> String;

    fn set_class_name(&self, value: &str);

    /// Add `class` unless already present
    fn add_class(&self, class: &str) {
        let current = self.class_name();
        if let Cow::Owned(updated) = with_class(&current, class) {
            self.set_class_name(&updated);
        }
    }

    /// Remove `class`; no-op when absent
    fn remove_class(&self, class: &str) {
        let current = self.class_name();
        if let Cow::Owned(updated) = without_class(&current, class) {
            self.set_class_name(&updated);
        }
    }

    fn has_class(&self, class: &str) -> bool {
        has_class(&self.class_name(), class)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementContent {
    pub text: String,
    pub class_name: String,
}

/// In-memory element. Clones share the same content.
#[derive(Clone, Debug, Default)]
pub struct MemoryElement {
    inner: Arc<Mutex<ElementContent>>,
}

impl MemoryElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class_name(class_name: &str) -> Self {
        let el = Self::new();
        el.inner.lock().class_name = class_name.to_string();
        el
    }

    /// Current text or inner content
    pub fn text(&self) -> String {
        self.inner.lock().text.clone()
    }

    pub fn snapshot(&self) -> ElementContent {
        self.inner.lock().clone()
    }
}

impl ElementHandle for MemoryElement {
    fn set_text(&self, text: &str) {
        self.inner.lock().text = text.to_string();
    }

    fn set_inner_html(&self, html: &str) {
        self.inner.lock().text = html.to_string();
    }

    fn class_name(&self) -> String {
        self.inner.lock().class_name.clone()
    }

    fn set_class_name(&self, value: &str) {
        self.inner.lock().class_name = value.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_class_twice_leaves_one() {
        let el = MemoryElement::with_class_name("info");
        el.add_class("xconn");
        el.add_class("xconn");
        assert_eq!(el.class_name(), "info xconn");
    }

    #[test]
    fn remove_missing_class_keeps_value() {
        let el = MemoryElement::with_class_name("a  b");
        el.remove_class("xconn");
        // untouched, even the double space
        assert_eq!(el.class_name(), "a  b");
    }

    #[test]
    fn clones_share_content() {
        let el = MemoryElement::new();
        let view = el.clone();
        el.set_inner_html("<b>3 files</b>");
        assert_eq!(view.text(), "<b>3 files</b>");
        assert_eq!(
            view.snapshot(),
            ElementContent {
                text: "<b>3 files</b>".into(),
                class_name: String::new(),
            }
        );
    }
}
