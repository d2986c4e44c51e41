//! Plain-text projection of post bodies for search indexing.

use blog_shared::{BlockContent, Body, ContentNode};

/// Flatten a post body into a single searchable string.
///
/// Text fragments are every node's own text in depth-first pre-order and
/// every markdown block verbatim, in block order. Blank fragments are
/// skipped; the rest are joined with one space and the result is trimmed.
pub fn flatten(body: Option<&Body>) -> String {
    let Some(body) = body else {
        return String::new();
    };

    let mut fragments = Vec::new();
    for block in body.blocks() {
        match &block.content {
            BlockContent::Nodes(nodes) => collect_node_text(nodes, &mut fragments),
            BlockContent::Text(text) => fragments.push(text.as_str()),
            BlockContent::None => {}
        }
    }

    fragments
        .into_iter()
        .filter(|fragment| !fragment.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn collect_node_text<'a>(nodes: &'a [ContentNode], out: &mut Vec<&'a str>) {
    for node in nodes {
        if let Some(text) = node.own_text() {
            out.push(text);
        }
        collect_node_text(node.children(), out);
    }
}
