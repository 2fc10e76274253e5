//! Integration tests for selector determinism across document shapes.

use pulse_dom::{Document, SelectorStyle, resolve_selector};

#[test]
fn selector_resolution_tests_id_is_terminal() {
    let mut document = Document::new();
    let nav = document
        .append_element(document.body(), "nav", &[("class", "top")])
        .expect("nav should append");
    let link = document
        .append_element(nav, "a", &[("id", "x"), ("class", "one two")])
        .expect("link should append");

    assert_eq!(resolve_selector(&document, link, SelectorStyle::Heatmap), "#x");
}

#[test]
fn selector_resolution_tests_counts_same_tag_siblings_only() {
    let mut document = Document::new();
    let list = document
        .append_element(document.body(), "ul", &[])
        .expect("list should append");
    document.append_text(list, "  ").expect("whitespace should append");
    document
        .append_element(list, "li", &[])
        .expect("first item should append");
    document.append_text(list, "  ").expect("whitespace should append");
    let second = document
        .append_element(list, "li", &[("class", "class1 class2")])
        .expect("second item should append");

    assert_eq!(
        resolve_selector(&document, second, SelectorStyle::Heatmap),
        "ul:nth-child(2) > .class1.class2"
    );
}

#[test]
fn selector_resolution_tests_text_targets_resolve_through_parent() {
    let mut document = Document::new();
    let button = document
        .append_element(document.body(), "button", &[])
        .expect("button should append");
    let label = document.append_text(button, "Buy").expect("label should append");

    assert_eq!(
        resolve_selector(&document, label, SelectorStyle::Heatmap),
        "body:nth-child(1) > button"
    );
}

#[test]
fn selector_resolution_tests_is_stable_after_unrelated_mutation() {
    let mut document = Document::new();
    let body = document.body();
    document.append_element(body, "div", &[]).expect("first div");
    let target = document
        .append_element(body, "div", &[("class", "hero")])
        .expect("target div");
    let before = resolve_selector(&document, target, SelectorStyle::Recorder);

    document.append_element(body, "p", &[]).expect("paragraph");
    document.append_text(body, "tail").expect("text");

    assert_eq!(resolve_selector(&document, target, SelectorStyle::Recorder), before);
    assert_eq!(before, "body:nth-child(2) > .hero");
}
