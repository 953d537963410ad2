//! Space-separated CSS class list editing
//!
//! Works on the raw `className` string so the same rules apply to browser
//! elements and to in-memory elements.

use std::borrow::Cow;

/// Check whether `class` is one of the tokens in `class_name`
pub fn has_class(class_name: &str, class: &str) -> bool {
    class_name.split_whitespace().any(|c| c == class)
}

/// Return `class_name` with `class` appended.
///
/// Borrowed when the class is already present, so callers can skip the
/// write-back. Other classes keep their order.
pub fn with_class<'a>(class_name: &'a str, class: &str) -> Cow<'a, str> {
    if class.is_empty() || has_class(class_name, class) {
        return Cow::Borrowed(class_name);
    }
    let mut tokens: Vec<&str> = class_name.split_whitespace().collect();
    tokens.push(class);
    Cow::Owned(tokens.join(" "))
}

/// Return `class_name` without any occurrence of `class`.
///
/// Borrowed when the class is absent (removal is a no-op).
pub fn without_class<'a>(class_name: &'a str, class: &str) -> Cow<'a, str> {
    if !has_class(class_name, class) {
        return Cow::Borrowed(class_name);
    }
    let tokens: Vec<&str> = class_name
        .split_whitespace()
        .filter(|c| *c != class)
        .collect();
    Cow::Owned(tokens.join(" "))
}
