//! Short CSS-like selectors used to label captured events.

use crate::{Document, NodeId};

const RECORDER_ANCESTOR_LEVELS: usize = 3;
const RECORDER_MAX_CLASSES: usize = 3;

/// Selector flavour; the two collectors trade specificity differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorStyle {
    /// One ancestor level, full class list.
    Heatmap,
    /// Up to three ancestor levels, at most three classes per element.
    Recorder,
}

impl SelectorStyle {
    fn ancestor_levels(self) -> usize {
        match self {
            SelectorStyle::Heatmap => 1,
            SelectorStyle::Recorder => RECORDER_ANCESTOR_LEVELS,
        }
    }

    fn max_classes(self) -> Option<usize> {
        match self {
            SelectorStyle::Heatmap => None,
            SelectorStyle::Recorder => Some(RECORDER_MAX_CLASSES),
        }
    }
}

/// Resolves a selector for `node`.
///
/// An element with an `id` resolves to `#id` with no ancestor context.
/// Otherwise the element's class list (or tag) is prefixed with
/// `parentTag:nth-child(N) > ` per ancestor level, where `N` counts only
/// same-tag siblings. `<body>` and `<html>` resolve to their bare tag.
/// Text nodes resolve through their parent element; unknown nodes resolve to
/// an empty string.
pub fn resolve_selector(document: &Document, node: NodeId, style: SelectorStyle) -> String {
    let Some(element_node) = document.nearest_element(node) else {
        return String::new();
    };
    let Some(element) = document.element(element_node) else {
        return String::new();
    };

    if is_root_container(&element.tag) {
        return element.tag.clone();
    }
    if let Some(id) = element.id() {
        return format!("#{id}");
    }

    let mut selector = own_label(document, element_node, style);
    let mut current = element_node;
    for _ in 0..style.ancestor_levels() {
        let Some(parent) = document.parent(current) else {
            break;
        };
        let Some(parent_tag) = document.tag(parent) else {
            break;
        };
        selector = format!(
            "{parent_tag}:nth-child({}) > {selector}",
            document.same_tag_position(current)
        );
        if is_root_container(parent_tag) {
            break;
        }
        current = parent;
    }
    selector
}

fn own_label(document: &Document, node: NodeId, style: SelectorStyle) -> String {
    let Some(element) = document.element(node) else {
        return String::new();
    };
    let classes = element.classes();
    if classes.is_empty() {
        return element.tag.clone();
    }
    let limit = style.max_classes().unwrap_or(classes.len());
    classes
        .iter()
        .take(limit)
        .map(|class| format!(".{class}"))
        .collect()
}

fn is_root_container(tag: &str) -> bool {
    tag == "body" || tag == "html"
}
