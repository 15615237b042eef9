//! Plain-text extraction from markdown.

use comrak::{
    Arena,
    nodes::{AstNode, NodeValue},
    parse_document,
};

use super::prepass::replace_sentinels;
use crate::util::text::{collapse_whitespace, normalize_escaped_newlines};

/// Reduce markdown to a single line of plain text.
pub(crate) fn strip(markdown: &str, options: &comrak::Options<'static>) -> String {
    let normalized = normalize_escaped_newlines(markdown);
    let without_markers = replace_sentinels(&normalized, |_| String::new());

    let arena = Arena::new();
    let root = parse_document(&arena, &without_markers, options);

    let mut text = String::new();
    collect_text(root, &mut text);
    collapse_whitespace(&text)
}

fn collect_text<'a>(node: &'a AstNode<'a>, buffer: &mut String) {
    let is_block = {
        let data = node.data.borrow();
        match &data.value {
            NodeValue::Text(text) => buffer.push_str(text),
            NodeValue::Code(code) => buffer.push_str(&code.literal),
            NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
            _ => {}
        }
        data.value.block()
    };

    let mut child = node.first_child();
    while let Some(next) = child {
        collect_text(next, buffer);
        child = next.next_sibling();
    }

    if is_block {
        buffer.push(' ');
    }
}
