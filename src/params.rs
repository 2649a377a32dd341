//! Parameter extraction.
//!
//! Once the matcher settles on a trie node, the chain of nodes from the root
//! down to it determines which parts bound which params. Nodes do not store
//! param names; the extractor recovers them by re-parsing each node's
//! template at a running byte offset. Extraction is resumable: validators
//! run mid-search against a chain prefix, and the returned [`ExtractCursor`]
//! lets the remainder of the branch continue without re-decoding earlier
//! parts.

use std::collections::HashMap;

use crate::quoter::{decode, DecodeError};
use crate::segment::parse_segment;
use crate::tree::{Node, NodeId, NodeKind};

/// Resumable extraction position: next chain entry, next matched part, and
/// the byte offset of the next segment within the deepest node's template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExtractCursor {
    pub chain_idx: usize,
    pub part_idx: usize,
    pub tmpl_offset: usize,
}

impl Default for ExtractCursor {
    fn default() -> Self {
        ExtractCursor {
            chain_idx: 0,
            part_idx: 0,
            // templates start with '/'
            tmpl_offset: 1,
        }
    }
}

/// Chain of node ids from just below the trie root down to `node`.
pub(crate) fn build_chain(nodes: &[Node], node: NodeId) -> Vec<NodeId> {
    let mut chain = Vec::with_capacity(nodes[node].depth as usize);
    let mut cur = node;

    while nodes[cur].parent.is_some() {
        chain.push(cur);
        cur = nodes[cur].parent.unwrap_or(cur);
    }

    chain.reverse();
    chain
}

pub(crate) fn is_skipped(skipped: u64, depth: u32) -> bool {
    depth < 64 && skipped & (1 << depth) != 0
}

/// Whether a chain node consumes one matched part.
fn consumes_part(node: &Node, skipped: u64) -> bool {
    match node.kind {
        NodeKind::Static | NodeKind::Param => true,
        NodeKind::OptionalParam => !is_skipped(skipped, node.depth),
        NodeKind::Wildcard | NodeKind::Index | NodeKind::Pathless => false,
    }
}

/// Decodes and collects params along `chain`, resuming at `cursor`.
///
/// `parts` are the raw (still percent-encoded) path parts, `skipped` the
/// bitmask of optional-param depths the match skipped, and `limit` the
/// number of parts the candidate has consumed so far — a wildcard claims
/// everything up to `limit` minus whatever the template segments after it
/// need. Malformed percent-encoding fails the whole extraction.
pub(crate) fn extract_params(
    nodes: &[Node],
    chain: &[NodeId],
    parts: &[&str],
    skipped: u64,
    limit: usize,
    mut cursor: ExtractCursor,
    params: &mut HashMap<String, String>,
) -> Result<ExtractCursor, DecodeError> {
    while cursor.chain_idx < chain.len() {
        let node = &nodes[chain[cursor.chain_idx]];
        let tmpl = node.full_path.as_str();

        match node.kind {
            NodeKind::Static => {
                let span = parse_segment(tmpl, cursor.tmpl_offset);
                cursor.tmpl_offset = span.end + 1;
                cursor.part_idx += 1;
            }

            NodeKind::Param => {
                let span = parse_segment(tmpl, cursor.tmpl_offset);
                let raw = parts[cursor.part_idx];
                let value = strip_literals(
                    raw,
                    span.prefix_end - span.start,
                    span.end - span.suffix_start,
                );
                params.insert(span.value(tmpl).to_owned(), decode(value)?.into_owned());
                cursor.tmpl_offset = span.end + 1;
                cursor.part_idx += 1;
            }

            NodeKind::OptionalParam => {
                let span = parse_segment(tmpl, cursor.tmpl_offset);
                if !is_skipped(skipped, node.depth) {
                    let raw = parts[cursor.part_idx];
                    let value = strip_literals(
                        raw,
                        span.prefix_end - span.start,
                        span.end - span.suffix_start,
                    );
                    params.insert(span.value(tmpl).to_owned(), decode(value)?.into_owned());
                    cursor.part_idx += 1;
                }
                cursor.tmpl_offset = span.end + 1;
            }

            NodeKind::Wildcard => {
                let span = parse_segment(tmpl, cursor.tmpl_offset);
                let after = chain[cursor.chain_idx + 1..]
                    .iter()
                    .filter(|&&id| consumes_part(&nodes[id], skipped))
                    .count();
                let claim_end = limit.saturating_sub(after).max(cursor.part_idx);

                let prefix_len = span.prefix_end - span.start;
                let suffix_len = span.end - span.suffix_start;
                let claimed = &parts[cursor.part_idx..claim_end];

                let mut splat = String::new();
                for (i, raw) in claimed.iter().enumerate() {
                    let mut piece = *raw;
                    if i == 0 {
                        piece = strip_literals(piece, prefix_len, 0);
                    }
                    if i + 1 == claimed.len() {
                        piece = strip_literals(piece, 0, suffix_len);
                    }
                    if i > 0 {
                        splat.push('/');
                    }
                    splat.push_str(&decode(piece)?);
                }

                params.insert("_splat".to_owned(), splat.clone());
                params.insert("*".to_owned(), splat);
                cursor.tmpl_offset = span.end + 1;
                cursor.part_idx = claim_end;
            }

            // an index stands for the trailing '/', a pathless layer adds
            // no template segment; neither consumes a part
            NodeKind::Index | NodeKind::Pathless => {}
        }

        cursor.chain_idx += 1;
    }

    Ok(cursor)
}

fn strip_literals(raw: &str, prefix_len: usize, suffix_len: usize) -> &str {
    let start = prefix_len.min(raw.len());
    let end = raw.len().saturating_sub(suffix_len).max(start);
    raw.get(start..end).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;
    use crate::tree::{process_route_tree, ProcessedTree, Route};

    fn tree_of(paths: &[&str]) -> ProcessedTree {
        let root = Rc::new(
            Route::new("/")
                .with_id("__root__")
                .with_children(paths.iter().map(|p| Rc::new(Route::new(*p))).collect()),
        );
        process_route_tree(&root)
    }

    fn terminal_of(tree: &ProcessedTree, full_path: &str) -> NodeId {
        (0..tree.nodes.len())
            .find(|&id| tree.nodes[id].full_path == full_path && tree.nodes[id].terminal.is_some())
            .unwrap()
    }

    #[test]
    fn extracts_param_and_static_chain() {
        let tree = tree_of(&["/users/$id/posts"]);
        let node = terminal_of(&tree, "/users/$id/posts");
        let chain = build_chain(&tree.nodes, node);

        let parts = ["users", "42", "posts"];
        let mut params = HashMap::new();
        let cursor = extract_params(
            &tree.nodes,
            &chain,
            &parts,
            0,
            parts.len(),
            ExtractCursor::default(),
            &mut params,
        )
        .unwrap();

        assert_eq!(params["id"], "42");
        assert_eq!(cursor.part_idx, 3);
    }

    #[test]
    fn strips_prefix_suffix_and_decodes() {
        let tree = tree_of(&["/img-{$name}.jpg"]);
        let node = terminal_of(&tree, "/img-{$name}.jpg");
        let chain = build_chain(&tree.nodes, node);

        let parts = ["img-a%20b.jpg"];
        let mut params = HashMap::new();
        extract_params(
            &tree.nodes,
            &chain,
            &parts,
            0,
            1,
            ExtractCursor::default(),
            &mut params,
        )
        .unwrap();

        assert_eq!(params["name"], "a b");
    }

    #[test]
    fn wildcard_claims_up_to_trailing_template() {
        let tree = tree_of(&["/{$}/c/file"]);
        let node = terminal_of(&tree, "/{$}/c/file");
        let chain = build_chain(&tree.nodes, node);

        let parts = ["a", "b", "c", "file"];
        let mut params = HashMap::new();
        extract_params(
            &tree.nodes,
            &chain,
            &parts,
            0,
            parts.len(),
            ExtractCursor::default(),
            &mut params,
        )
        .unwrap();

        assert_eq!(params["_splat"], "a/b");
        assert_eq!(params["*"], "a/b");
    }

    #[test]
    fn skipped_optional_extracts_nothing() {
        let tree = tree_of(&["/{-$lang}/home"]);
        let node = terminal_of(&tree, "/{-$lang}/home");
        let chain = build_chain(&tree.nodes, node);

        // optional node is at depth 1; bit 1 marks it skipped
        let parts = ["home"];
        let mut params = HashMap::new();
        extract_params(
            &tree.nodes,
            &chain,
            &parts,
            1 << 1,
            parts.len(),
            ExtractCursor::default(),
            &mut params,
        )
        .unwrap();

        assert!(params.is_empty());
    }

    #[test]
    fn resumes_from_cursor() {
        let tree = tree_of(&["/a/$x/$y"]);
        let node = terminal_of(&tree, "/a/$x/$y");
        let chain = build_chain(&tree.nodes, node);

        let parts = ["a", "one", "two"];
        let mut params = HashMap::new();

        // stop after the first two chain nodes
        let cursor = extract_params(
            &tree.nodes,
            &chain[..2],
            &parts,
            0,
            2,
            ExtractCursor::default(),
            &mut params,
        )
        .unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params["x"], "one");

        extract_params(&tree.nodes, &chain, &parts, 0, 3, cursor, &mut params).unwrap();
        assert_eq!(params["y"], "two");
    }

    #[test]
    fn malformed_encoding_fails() {
        let tree = tree_of(&["/$x"]);
        let node = terminal_of(&tree, "/$x");
        let chain = build_chain(&tree.nodes, node);

        let parts = ["%zz"];
        let mut params = HashMap::new();
        let result = extract_params(
            &tree.nodes,
            &chain,
            &parts,
            0,
            1,
            ExtractCursor::default(),
            &mut params,
        );
        assert!(result.is_err());
    }
}
