//! Prioritized route matching.
//!
//! [`find_route_match`] runs a depth-first search over the trie with an
//! explicit candidate stack. Children are explored most-specific first
//! (exact-case static, case-folded static, params, optionals, wildcards,
//! index), and a settled match is only replaced by a *strictly better* one
//! under the specificity ordering, so exploration order decides ties.
//! Backtracking makes less specific alternatives reachable whenever a branch
//! dead-ends or a validator rejects it.

use std::collections::HashMap;
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use serde_json::Value;

use crate::params::{build_chain, extract_params, ExtractCursor};
use crate::quoter::decode;
use crate::tree::{Node, NodeId, NodeKind, ProcessedTree, Route, RouteMask, ROOT};

/// A successful match of a path against a processed route tree.
#[derive(Debug)]
pub struct RouteMatch {
    pub route: Rc<Route>,
    /// Raw params, percent-decoded. Splat values appear under both `_splat`
    /// and `*`; a fuzzy match stores the unmatched remainder under `**`.
    pub params: HashMap<String, String>,
    /// Merged validator output along the matched branch, when any ran.
    pub parsed_params: Option<Value>,
    flat_idx: usize,
    ancestors: OnceCell<Vec<Rc<Route>>>,
}

impl RouteMatch {
    /// Routes from the root down to and including the matched route.
    /// Materialized from the tree's flat table on first access.
    pub fn ancestors(&self, tree: &ProcessedTree) -> &[Rc<Route>] {
        self.ancestors.get_or_init(|| {
            let mut chain = Vec::new();
            let mut cur = Some(self.flat_idx);
            while let Some(idx) = cur {
                chain.push(Rc::clone(&tree.flat[idx].route));
                cur = tree.flat[idx].parent;
            }
            chain.reverse();
            chain
        })
    }
}

/// A successful mask match from [`find_flat_match`].
#[derive(Debug)]
pub struct FlatMatch<'t> {
    pub mask: &'t RouteMask,
    pub params: HashMap<String, String>,
}

/// Matches `path` against the tree, returning the most specific route.
///
/// With `fuzzy` set, a path with no exact match falls back to the deepest
/// routed node whose prefix it matched; the unmatched remainder is stored in
/// the `**` param. Index routes and the root never fuzzy-match.
///
/// Results (hits and misses both) are memoized per tree in an LRU keyed by
/// the fuzzy flag and the path.
pub fn find_route_match(path: &str, tree: &ProcessedTree, fuzzy: bool) -> Option<Rc<RouteMatch>> {
    let key = format!("{}:{}", u8::from(fuzzy), path);
    if let Some(hit) = tree.match_cache.borrow_mut().get(&key) {
        return hit.clone();
    }

    let result = find_route_match_uncached(path, tree, fuzzy, true);
    tree.match_cache.borrow_mut().set(key, result.clone());
    result
}

pub(crate) fn find_route_match_uncached(
    path: &str,
    tree: &ProcessedTree,
    fuzzy: bool,
    root_index_shortcut: bool,
) -> Option<Rc<RouteMatch>> {
    let found = search(tree, ROOT, path, fuzzy, root_index_shortcut)?;
    Some(Rc::new(RouteMatch {
        route: Rc::clone(&tree.flat[found.terminal].route),
        params: found.params,
        parsed_params: found.parsed,
        flat_idx: found.terminal,
        ancestors: OnceCell::new(),
    }))
}

/// Matches `path` against the tree's processed route masks.
pub fn find_flat_match<'t>(path: &str, tree: &'t ProcessedTree) -> Option<FlatMatch<'t>> {
    let root = tree.mask_root?;
    let found = search(tree, root, path, false, false)?;
    Some(FlatMatch {
        mask: &tree.masks[found.terminal],
        params: found.params,
    })
}

/// Specificity of a settled candidate: static parts, then param parts, then
/// optionals consumed, then index over non-index, then depth. Compared
/// lexicographically; a new candidate must be strictly greater to replace
/// the incumbent.
type Rank = (u32, u32, u32, bool, u32);

struct Found {
    terminal: usize,
    params: HashMap<String, String>,
    parsed: Option<Value>,
}

/// Params gathered by a validator part-way down a branch, reused by deeper
/// validators and the final extraction.
struct Checked {
    params: HashMap<String, String>,
    parsed: Option<Value>,
    cursor: ExtractCursor,
}

#[derive(Clone)]
struct Candidate {
    node: NodeId,
    part_idx: usize,
    statics: u32,
    dynamics: u32,
    optionals: u32,
    /// Bitmask of optional-param depths skipped on this branch.
    skipped: u64,
    checked: Option<Rc<Checked>>,
}

struct Settled {
    terminal: usize,
    rank: Rank,
    params: HashMap<String, String>,
    parsed: Option<Value>,
}

struct FuzzyCandidate {
    terminal: usize,
    rank: Rank,
    cand: Candidate,
}

fn search(
    tree: &ProcessedTree,
    root: NodeId,
    path: &str,
    fuzzy: bool,
    root_index_shortcut: bool,
) -> Option<Found> {
    let nodes = &tree.nodes[..];
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trailing = !trimmed.is_empty() && trimmed.ends_with('/');
    let parts: Vec<&str> = trimmed.split('/').filter(|p| !p.is_empty()).collect();
    let mut lower: Vec<Option<String>> = vec![None; parts.len()];

    if root_index_shortcut && parts.is_empty() && !trailing {
        if let Some(ix) = nodes[root].index {
            if let Some(terminal) = nodes[ix].terminal {
                if !nodes[ix].has_validator() {
                    return Some(Found {
                        terminal,
                        params: HashMap::new(),
                        parsed: None,
                    });
                }
            }
        }
    }

    let mut stack = vec![Candidate {
        node: root,
        part_idx: 0,
        statics: 0,
        dynamics: 0,
        optionals: 0,
        skipped: 0,
        checked: None,
    }];
    let mut best: Option<Settled> = None;
    let mut best_fuzzy: Option<FuzzyCandidate> = None;

    while let Some(mut cand) = stack.pop() {
        let node = &nodes[cand.node];

        if cand.node != root && node.has_validator() {
            match run_validator(nodes, &cand, &parts) {
                Ok(checked) => cand.checked = Some(Rc::new(checked)),
                Err(()) => continue,
            }
        }

        let exhausted = cand.part_idx == parts.len();

        if let Some(terminal) = node.terminal {
            let accepts = exhausted
                && (!trailing || matches!(node.kind, NodeKind::Index | NodeKind::Wildcard));

            if accepts {
                let rank = (
                    cand.statics,
                    cand.dynamics,
                    cand.optionals,
                    node.kind == NodeKind::Index,
                    node.depth,
                );
                if best.as_ref().map_or(true, |b| rank > b.rank) {
                    if let Ok((params, parsed)) = finish(nodes, &cand, &parts) {
                        best = Some(Settled {
                            terminal,
                            rank,
                            params,
                            parsed,
                        });
                    }
                }
            } else if fuzzy && cand.node != root && node.kind != NodeKind::Index {
                let rank = (cand.statics, cand.dynamics, cand.optionals, false, node.depth);
                if best_fuzzy.as_ref().map_or(true, |b| rank > b.rank) {
                    best_fuzzy = Some(FuzzyCandidate {
                        terminal,
                        rank,
                        cand: cand.clone(),
                    });
                }
            }
        }

        // Children are pushed least-specific first so pops explore the most
        // specific alternative next.

        if exhausted {
            if let Some(ix) = node.index {
                stack.push(Candidate {
                    node: ix,
                    ..cand.clone()
                });
            }
        }

        for &wc in node.wildcard.iter().rev() {
            let remaining = parts.len() - cand.part_idx;
            // shorter claims pushed first: the longest viable claim pops first
            for claim in 0..=remaining {
                if wildcard_claim_fits(&nodes[wc], &parts, &mut lower, cand.part_idx, claim) {
                    stack.push(Candidate {
                        node: wc,
                        part_idx: cand.part_idx + claim,
                        ..cand.clone()
                    });
                }
            }
        }

        for &opt in node.optional.iter().rev() {
            let o = &nodes[opt];
            // skip branch first so the consuming branch pops before it
            if o.depth < 64 {
                stack.push(Candidate {
                    node: opt,
                    skipped: cand.skipped | 1 << o.depth,
                    ..cand.clone()
                });
            }
            if !exhausted && literal_fits(o, &parts, &mut lower, cand.part_idx) {
                stack.push(Candidate {
                    node: opt,
                    part_idx: cand.part_idx + 1,
                    optionals: cand.optionals + 1,
                    ..cand.clone()
                });
            }
        }

        if !exhausted {
            for &dy in node.dynamic.iter().rev() {
                if literal_fits(&nodes[dy], &parts, &mut lower, cand.part_idx) {
                    stack.push(Candidate {
                        node: dy,
                        part_idx: cand.part_idx + 1,
                        dynamics: cand.dynamics + 1,
                        ..cand.clone()
                    });
                }
            }

            if !node.stat_insensitive.is_empty() {
                let key = lower_part(&parts, &mut lower, cand.part_idx);
                if let Some(&st) = node.stat_insensitive.get(key) {
                    stack.push(Candidate {
                        node: st,
                        part_idx: cand.part_idx + 1,
                        statics: cand.statics + 1,
                        ..cand.clone()
                    });
                }
            }

            if let Some(&st) = node.stat.get(parts[cand.part_idx]) {
                stack.push(Candidate {
                    node: st,
                    part_idx: cand.part_idx + 1,
                    statics: cand.statics + 1,
                    ..cand.clone()
                });
            }
        }

        for &pl in node.pathless.iter().rev() {
            stack.push(Candidate {
                node: pl,
                ..cand.clone()
            });
        }
    }

    if let Some(settled) = best {
        return Some(Found {
            terminal: settled.terminal,
            params: settled.params,
            parsed: settled.parsed,
        });
    }

    let fb = best_fuzzy?;
    let (mut params, parsed) = finish(nodes, &fb.cand, &parts).ok()?;

    let mut rest = String::new();
    for (i, raw) in parts[fb.cand.part_idx..].iter().enumerate() {
        if i > 0 {
            rest.push('/');
        }
        rest.push_str(&decode(raw).ok()?);
    }
    params.insert("**".to_owned(), rest);

    Some(Found {
        terminal: fb.terminal,
        params,
        parsed,
    })
}

/// Extracts the remaining params for a settled candidate, resuming from its
/// last validator checkpoint. A decode failure disqualifies the candidate.
fn finish(
    nodes: &[Node],
    cand: &Candidate,
    parts: &[&str],
) -> Result<(HashMap<String, String>, Option<Value>), ()> {
    let chain = build_chain(nodes, cand.node);
    let (mut params, parsed, cursor) = match &cand.checked {
        Some(checked) => (
            checked.params.clone(),
            checked.parsed.clone(),
            checked.cursor,
        ),
        None => (HashMap::new(), None, ExtractCursor::default()),
    };

    extract_params(
        nodes,
        &chain,
        parts,
        cand.skipped,
        cand.part_idx,
        cursor,
        &mut params,
    )
    .map_err(|_| ())?;

    Ok((params, parsed))
}

/// Runs the validator owned by the candidate's node against the params
/// gathered so far. `Err` disqualifies the candidate.
fn run_validator(nodes: &[Node], cand: &Candidate, parts: &[&str]) -> Result<Checked, ()> {
    let node = &nodes[cand.node];
    let chain = build_chain(nodes, cand.node);
    let (mut params, mut parsed, cursor) = match &cand.checked {
        Some(checked) => (
            checked.params.clone(),
            checked.parsed.clone(),
            checked.cursor,
        ),
        None => (HashMap::new(), None, ExtractCursor::default()),
    };

    let cursor = extract_params(
        nodes,
        &chain,
        parts,
        cand.skipped,
        cand.part_idx,
        cursor,
        &mut params,
    )
    .map_err(|_| ())?;

    let parse = node.parse.as_ref().ok_or(())?;
    let value = parse(&params).map_err(|_| ())?;
    merge_parsed(&mut parsed, value);

    Ok(Checked {
        params,
        parsed,
        cursor,
    })
}

/// Validator outputs along a branch merge key-wise when both are objects;
/// anything else replaces the accumulated value.
fn merge_parsed(parsed: &mut Option<Value>, value: Value) {
    let merged = match (parsed.take(), value) {
        (Some(Value::Object(mut acc)), Value::Object(new)) => {
            acc.extend(new);
            Value::Object(acc)
        }
        (_, value) => value,
    };
    *parsed = Some(merged);
}

fn lower_part<'l>(parts: &[&str], lower: &'l mut [Option<String>], idx: usize) -> &'l str {
    if lower[idx].is_none() {
        lower[idx] = Some(parts[idx].to_lowercase());
    }
    lower[idx].as_deref().unwrap_or_default()
}

/// Whether one part satisfies a param/optional node's literal prefix and
/// suffix, honoring the node's case sensitivity.
fn literal_fits(node: &Node, parts: &[&str], lower: &mut [Option<String>], idx: usize) -> bool {
    if node.prefix.is_none() && node.suffix.is_none() {
        return true;
    }

    let part: &str = if node.case_sensitive {
        parts[idx]
    } else {
        lower_part(parts, lower, idx)
    };

    if let Some(prefix) = &node.prefix {
        if !part.starts_with(prefix.as_str()) {
            return false;
        }
    }
    if let Some(suffix) = &node.suffix {
        if !part.ends_with(suffix.as_str()) {
            return false;
        }
    }
    true
}

/// Whether a wildcard node can claim `claim` parts starting at `start`. The
/// literal prefix binds the first claimed part and the suffix the last; an
/// empty claim needs neither.
fn wildcard_claim_fits(
    node: &Node,
    parts: &[&str],
    lower: &mut [Option<String>],
    start: usize,
    claim: usize,
) -> bool {
    if claim == 0 {
        return node.prefix.is_none() && node.suffix.is_none();
    }

    if let Some(prefix) = &node.prefix {
        let first: &str = if node.case_sensitive {
            parts[start]
        } else {
            lower_part(parts, lower, start)
        };
        if !first.starts_with(prefix.as_str()) {
            return false;
        }
    }

    if let Some(suffix) = &node.suffix {
        let last_idx = start + claim - 1;
        let last: &str = if node.case_sensitive {
            parts[last_idx]
        } else {
            lower_part(parts, lower, last_idx)
        };
        if !last.ends_with(suffix.as_str()) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{
        process_route_masks, process_route_tree, ParamsParseError, ParamsParseFn, ProcessedTree,
        RouteOptions,
    };
    use serde_json::json;

    fn leaf(path: &str) -> Rc<Route> {
        Rc::new(Route::new(path))
    }

    fn tree_of(paths: &[&str]) -> ProcessedTree {
        let root = Rc::new(
            Route::new("/")
                .with_id("__root__")
                .with_children(paths.iter().map(|p| leaf(p)).collect()),
        );
        process_route_tree(&root)
    }

    fn tree_of_routes(children: Vec<Rc<Route>>) -> ProcessedTree {
        let root = Rc::new(Route::new("/").with_id("__root__").with_children(children));
        process_route_tree(&root)
    }

    fn matched(tree: &ProcessedTree, path: &str) -> Option<String> {
        find_route_match(path, tree, false).map(|m| m.route.id.clone())
    }

    fn matched_fuzzy(tree: &ProcessedTree, path: &str) -> Option<String> {
        find_route_match(path, tree, true).map(|m| m.route.id.clone())
    }

    fn params_of(tree: &ProcessedTree, path: &str) -> HashMap<String, String> {
        find_route_match(path, tree, false).unwrap().params.clone()
    }

    fn int_validator(key: &'static str) -> ParamsParseFn {
        Rc::new(move |params: &HashMap<String, String>| {
            let raw = params.get(key).cloned().unwrap_or_default();
            let n: i64 = raw
                .parse()
                .map_err(|_| ParamsParseError::new("not a number"))?;
            Ok(json!({ key: n }))
        })
    }

    fn validated(path: &str, parse: ParamsParseFn) -> Rc<Route> {
        Rc::new(Route::new(path).with_options(RouteOptions {
            params_parse: Some(parse),
            skip_route_on_parse_error: true,
            ..RouteOptions::default()
        }))
    }

    #[test]
    fn index_route_matches_root() {
        let tree = tree_of(&["/", "/$id"]);
        assert_eq!(matched(&tree, "/"), Some("/".to_owned()));
    }

    #[test]
    fn static_beats_param() {
        let tree = tree_of(&["/a/$id", "/a/b"]);
        assert_eq!(matched(&tree, "/a/b"), Some("/a/b".to_owned()));
        assert_eq!(matched(&tree, "/a/c"), Some("/a/$id".to_owned()));
    }

    #[test]
    fn param_beats_optional() {
        let tree = tree_of(&["/a/{-$b}/c", "/a/$b/c"]);
        assert_eq!(matched(&tree, "/a/x/c"), Some("/a/$b/c".to_owned()));
    }

    #[test]
    fn more_statics_win() {
        let tree = tree_of(&["/a/{-$b}/$c", "/a/$b/c"]);
        assert_eq!(matched(&tree, "/a/x/c"), Some("/a/$b/c".to_owned()));
    }

    #[test]
    fn equal_rank_prefers_earlier_static_segments() {
        let tree = tree_of(&["/{-$a}/{-$b}/{-$c}/d/e", "/{-$a}/{-$b}/c/d/{-$e}"]);
        assert_eq!(
            matched(&tree, "/a/b/c/d/e"),
            Some("/{-$a}/{-$b}/c/d/{-$e}".to_owned())
        );
    }

    #[test]
    fn deeper_match_wins_at_equal_rank() {
        let tree = tree_of(&["/a", "/a/$"]);
        assert_eq!(matched(&tree, "/a"), Some("/a/$".to_owned()));
    }

    #[test]
    fn no_match_returns_none() {
        let tree = tree_of(&["/a/b"]);
        assert_eq!(matched(&tree, "/a"), None);
        assert_eq!(matched(&tree, "/a/b/c"), None);
        assert_eq!(matched(&tree, "/x"), None);
    }

    #[test]
    fn prefixed_param_beats_plain_param() {
        let tree = tree_of(&["/a/$x", "/a/b{$x}"]);
        let m = find_route_match("/a/bfoo", &tree, false).unwrap();
        assert_eq!(m.route.id, "/a/b{$x}");
        assert_eq!(m.params["x"], "foo");
    }

    #[test]
    fn longer_prefix_explored_first() {
        let tree = tree_of(&["/a/b{$b}bbb", "/a/bbb{$b}b"]);
        assert_eq!(matched(&tree, "/a/bbbbb"), Some("/a/bbb{$b}b".to_owned()));
    }

    #[test]
    fn suffixed_param() {
        let tree = tree_of(&["/img/{$name}.jpg", "/img/$name"]);
        let m = find_route_match("/img/photo.jpg", &tree, false).unwrap();
        assert_eq!(m.route.id, "/img/{$name}.jpg");
        assert_eq!(m.params["name"], "photo");
    }

    #[test]
    fn empty_param_value_with_prefix_and_suffix() {
        let tree = tree_of(&["/prefix{$id}suffix"]);
        let m = find_route_match("/prefixsuffix", &tree, false).unwrap();
        assert_eq!(m.params["id"], "");
    }

    #[test]
    fn case_sensitive_static_competes_with_insensitive() {
        let sensitive = Rc::new(Route::new("/FOO").with_options(RouteOptions {
            case_sensitive: Some(true),
            ..RouteOptions::default()
        }));
        let tree = tree_of_routes(vec![sensitive, leaf("/foo")]);

        assert_eq!(matched(&tree, "/FOO"), Some("/FOO".to_owned()));
        assert_eq!(matched(&tree, "/Foo"), Some("/foo".to_owned()));
        assert_eq!(matched(&tree, "/foo"), Some("/foo".to_owned()));
    }

    #[test]
    fn case_sensitive_static_dead_end_backtracks() {
        let sensitive = Rc::new(
            Route::new("/foo")
                .with_id("/foo-sensitive")
                .with_options(RouteOptions {
                    case_sensitive: Some(true),
                    ..RouteOptions::default()
                })
                .with_children(vec![leaf("/foo/b")]),
        );
        let insensitive =
            Rc::new(Route::new("/Foo").with_children(vec![Rc::new(Route::new("/Foo/a"))]));
        let tree = tree_of_routes(vec![sensitive, insensitive]);

        assert_eq!(matched(&tree, "/foo/a"), Some("/Foo/a".to_owned()));
        assert_eq!(matched(&tree, "/foo/b"), Some("/foo/b".to_owned()));
    }

    #[test]
    fn case_sensitive_param_wins_over_longer_insensitive_prefix() {
        let sensitive = Rc::new(Route::new("/A{$id}B").with_options(RouteOptions {
            case_sensitive: Some(true),
            ..RouteOptions::default()
        }));
        let tree = tree_of_routes(vec![sensitive, leaf("/aa{$id}bb")]);

        assert_eq!(matched(&tree, "/AAABBB"), Some("/A{$id}B".to_owned()));
        assert_eq!(matched(&tree, "/aaabbb"), Some("/aa{$id}bb".to_owned()));
    }

    #[test]
    fn trailing_slash_only_matches_index_or_wildcard() {
        let tree = tree_of(&["/a", "/b/", "/c/$"]);
        assert_eq!(matched(&tree, "/a/"), None);
        assert_eq!(matched(&tree, "/b/"), Some("/b/".to_owned()));
        assert_eq!(matched(&tree, "/b"), Some("/b/".to_owned()));
        assert_eq!(matched(&tree, "/c/"), Some("/c/$".to_owned()));
    }

    #[test]
    fn index_beats_plain_route_at_same_path() {
        let tree = tree_of(&["/dashboard", "/dashboard/"]);
        assert_eq!(matched(&tree, "/dashboard"), Some("/dashboard/".to_owned()));
        assert_eq!(matched(&tree, "/dashboard/"), Some("/dashboard/".to_owned()));
    }

    #[test]
    fn optional_param_consumed_or_skipped() {
        let tree = tree_of(&["/{-$lang}/about"]);
        assert_eq!(matched(&tree, "/about"), Some("/{-$lang}/about".to_owned()));
        let m = find_route_match("/en/about", &tree, false).unwrap();
        assert_eq!(m.params["lang"], "en");
        assert!(!params_of(&tree, "/about").contains_key("lang"));
    }

    #[test]
    fn earlier_optional_consumes_first() {
        let tree = tree_of(&["/{-$a}/{-$b}"]);
        let m = find_route_match("/x", &tree, false).unwrap();
        assert_eq!(m.params.get("a").map(String::as_str), Some("x"));
        assert_eq!(m.params.get("b"), None);
    }

    #[test]
    fn wildcard_claims_remainder() {
        let tree = tree_of(&["/files/$"]);
        let m = find_route_match("/files/a/b/c", &tree, false).unwrap();
        assert_eq!(m.params["_splat"], "a/b/c");
        assert_eq!(m.params["*"], "a/b/c");
    }

    #[test]
    fn wildcard_matches_empty_remainder() {
        let tree = tree_of(&["/files/$"]);
        let m = find_route_match("/files", &tree, false).unwrap();
        assert_eq!(m.params["_splat"], "");
    }

    #[test]
    fn wildcard_with_literals_needs_at_least_one_part() {
        let tree = tree_of(&["/a/d-{$}"]);
        assert_eq!(matched(&tree, "/a"), None);
        let m = find_route_match("/a/d-x/y", &tree, false).unwrap();
        assert_eq!(m.params["_splat"], "x/y");
    }

    #[test]
    fn wildcard_suffix_binds_last_part() {
        let tree = tree_of(&["/logs/{$}.txt"]);
        let m = find_route_match("/logs/2024/app.txt", &tree, false).unwrap();
        assert_eq!(m.params["_splat"], "2024/app");
        assert_eq!(matched(&tree, "/logs/2024/app.log"), None);
    }

    #[test]
    fn wildcard_with_trailing_template_segments() {
        let tree = tree_of(&["/{$}/c/file"]);
        let m = find_route_match("/a/b/c/file", &tree, false).unwrap();
        assert_eq!(m.params["_splat"], "a/b");
        assert_eq!(matched(&tree, "/a/b/c"), None);
    }

    #[test]
    fn static_child_beats_wildcard_claim() {
        let tree = tree_of(&["/docs/$", "/docs/intro"]);
        assert_eq!(matched(&tree, "/docs/intro"), Some("/docs/intro".to_owned()));
        assert_eq!(matched(&tree, "/docs/other"), Some("/docs/$".to_owned()));
    }

    #[test]
    fn pathless_layout_is_transparent() {
        let child = Rc::new(Route::new("/hello").with_id("/_layout/hello"));
        let layout = Rc::new(Route {
            id: "/_layout".to_owned(),
            path: None,
            full_path: "/".to_owned(),
            children: vec![child],
            options: RouteOptions::default(),
        });
        let tree = tree_of_routes(vec![layout]);

        assert_eq!(matched(&tree, "/hello"), Some("/_layout/hello".to_owned()));
    }

    #[test]
    fn params_decode_reserved_characters() {
        let tree = tree_of(&["/users/$id"]);
        assert_eq!(params_of(&tree, "/users/a%20b")["id"], "a b");
        assert_eq!(
            params_of(&tree, "/users/framework%2Freact")["id"],
            "framework/react"
        );
        assert_eq!(params_of(&tree, "/users/%E4%BD%A0%E5%A5%BD")["id"], "你好");
    }

    #[test]
    fn splat_decodes_each_part() {
        let tree = tree_of(&["/files/$"]);
        assert_eq!(
            params_of(&tree, "/files/a%20b/c%2Fd")["_splat"],
            "a b/c/d"
        );
    }

    #[test]
    fn malformed_encoding_disqualifies() {
        let tree = tree_of(&["/users/$id"]);
        assert_eq!(matched(&tree, "/users/%zz"), None);
        // static parts never decode, so they are unaffected
        let tree = tree_of(&["/a"]);
        assert_eq!(matched(&tree, "/a"), Some("/a".to_owned()));
    }

    #[test]
    fn validator_success_populates_parsed_params() {
        let tree = tree_of_routes(vec![validated("/users/$userId", int_validator("userId"))]);
        let m = find_route_match("/users/123", &tree, false).unwrap();
        assert_eq!(m.params["userId"], "123");
        assert_eq!(m.parsed_params, Some(json!({ "userId": 123 })));
    }

    #[test]
    fn validator_failure_falls_back_to_sibling() {
        let tree = tree_of_routes(vec![
            validated("/users/$userId", int_validator("userId")),
            leaf("/users/$username"),
        ]);

        assert_eq!(
            matched(&tree, "/users/123"),
            Some("/users/$userId".to_owned())
        );
        let m = find_route_match("/users/alice", &tree, false).unwrap();
        assert_eq!(m.route.id, "/users/$username");
        assert_eq!(m.parsed_params, None);
    }

    #[test]
    fn validator_without_skip_flag_is_not_consulted() {
        let failing: ParamsParseFn = Rc::new(|_| Err(ParamsParseError::new("always")));
        let route = Rc::new(Route::new("/users/$id").with_options(RouteOptions {
            params_parse: Some(failing),
            skip_route_on_parse_error: false,
            ..RouteOptions::default()
        }));
        let tree = tree_of_routes(vec![route]);

        let m = find_route_match("/users/anything", &tree, false).unwrap();
        assert_eq!(m.route.id, "/users/$id");
        assert_eq!(m.parsed_params, None);
    }

    #[test]
    fn empty_param_value_still_validated() {
        let nonempty: ParamsParseFn = Rc::new(|params: &HashMap<String, String>| {
            if params.get("id").map_or(true, |v| v.is_empty()) {
                Err(ParamsParseError::new("empty"))
            } else {
                Ok(json!({ "id": params["id"] }))
            }
        });
        let tree = tree_of_routes(vec![
            validated("/prefix{$id}suffix", nonempty),
            leaf("/prefixsuffix"),
        ]);

        assert_eq!(
            matched(&tree, "/prefixsuffix"),
            Some("/prefixsuffix".to_owned())
        );
        assert_eq!(
            matched(&tree, "/prefixXsuffix"),
            Some("/prefix{$id}suffix".to_owned())
        );
    }

    #[test]
    fn parent_validator_gates_children() {
        let child = Rc::new(Route::new("/$orgId/settings"));
        let parent = Rc::new(
            Route::new("/$orgId")
                .with_options(RouteOptions {
                    params_parse: Some(int_validator("orgId")),
                    skip_route_on_parse_error: true,
                    ..RouteOptions::default()
                })
                .with_children(vec![child]),
        );
        let slug = Rc::new(Route::new("/$slug").with_id("/$slug").with_children(vec![
            Rc::new(Route::new("/$slug/about")),
        ]));
        let tree = tree_of_routes(vec![parent, slug]);

        assert_eq!(
            matched(&tree, "/123/settings"),
            Some("/$orgId/settings".to_owned())
        );
        assert_eq!(
            matched(&tree, "/my-org/about"),
            Some("/$slug/about".to_owned())
        );
        assert_eq!(matched(&tree, "/my-org/settings"), None);
    }

    #[test]
    fn pathless_layout_validator_gates_children() {
        let reject: ParamsParseFn = Rc::new(|_| Err(ParamsParseError::new("nope")));
        let child = Rc::new(Route::new("/hello").with_id("/_gate/hello"));
        let layout = Rc::new(Route {
            id: "/_gate".to_owned(),
            path: None,
            full_path: "/".to_owned(),
            children: vec![child],
            options: RouteOptions {
                params_parse: Some(reject),
                skip_route_on_parse_error: true,
                ..RouteOptions::default()
            },
        });
        let tree = tree_of_routes(vec![layout, leaf("/hello")]);

        // the layout's validator rejects, so its subtree is unreachable and
        // the plain sibling wins
        assert_eq!(matched(&tree, "/hello"), Some("/hello".to_owned()));
    }

    #[test]
    fn nested_validators_merge_parsed_params() {
        let child = validated("/$org/$repo", int_validator("repo"));
        let parent = Rc::new(
            Route::new("/$org")
                .with_options(RouteOptions {
                    params_parse: Some(int_validator("org")),
                    skip_route_on_parse_error: true,
                    ..RouteOptions::default()
                })
                .with_children(vec![child]),
        );
        let tree = tree_of_routes(vec![parent]);

        let m = find_route_match("/1/2", &tree, false).unwrap();
        assert_eq!(m.parsed_params, Some(json!({ "org": 1, "repo": 2 })));
    }

    #[test]
    fn validated_sibling_tried_before_plain() {
        // both are bare params at the same depth; the validated node sorts
        // first and wins when its validator accepts
        let tree = tree_of_routes(vec![leaf("/$name"), validated("/$id", int_validator("id"))]);
        assert_eq!(matched(&tree, "/42"), Some("/$id".to_owned()));
        assert_eq!(matched(&tree, "/abc"), Some("/$name".to_owned()));
    }

    #[test]
    fn parse_priority_orders_validated_siblings() {
        let low = Rc::new(Route::new("/$a").with_options(RouteOptions {
            params_parse: Some(int_validator("a")),
            skip_route_on_parse_error: true,
            parse_error_priority: 1,
            ..RouteOptions::default()
        }));
        let high = Rc::new(Route::new("/$b").with_options(RouteOptions {
            params_parse: Some(int_validator("b")),
            skip_route_on_parse_error: true,
            parse_error_priority: 2,
            ..RouteOptions::default()
        }));
        let tree = tree_of_routes(vec![low, high]);

        assert_eq!(matched(&tree, "/7"), Some("/$b".to_owned()));
    }

    #[test]
    fn optional_param_validator_with_static_fallback() {
        let langs: ParamsParseFn = Rc::new(|params: &HashMap<String, String>| {
            match params.get("lang").map(String::as_str) {
                None | Some("en") | Some("fr") => Ok(json!({})),
                Some(other) => Err(ParamsParseError::new(format!("bad lang {other}"))),
            }
        });
        let tree = tree_of_routes(vec![validated("/{-$lang}/home", langs), leaf("/home")]);

        // the optional-param route matches deeper, and validation accepts
        // the skipped case
        assert_eq!(matched(&tree, "/home"), Some("/{-$lang}/home".to_owned()));
        assert_eq!(
            matched(&tree, "/en/home"),
            Some("/{-$lang}/home".to_owned())
        );
        assert_eq!(matched(&tree, "/xx/home"), None);
    }

    #[test]
    fn wildcard_validator_rejecting_claim() {
        let txt_only: ParamsParseFn = Rc::new(|params: &HashMap<String, String>| {
            if params.get("_splat").map_or(false, |s| s.ends_with(".txt")) {
                Ok(json!({}))
            } else {
                Err(ParamsParseError::new("not a txt file"))
            }
        });
        let tree = tree_of_routes(vec![validated("/files/$", txt_only), leaf("/files")]);

        assert_eq!(
            matched(&tree, "/files/docs/readme.txt"),
            Some("/files/$".to_owned())
        );
        assert_eq!(matched(&tree, "/files/photo.jpg"), None);
        assert_eq!(
            matched_fuzzy(&tree, "/files/photo.jpg"),
            Some("/files".to_owned())
        );
    }

    #[test]
    fn fuzzy_finds_deepest_partial_match() {
        let tree = tree_of(&["/a", "/a/b", "/a/b/c"]);
        let m = find_route_match("/a/b/x/y", &tree, true).unwrap();
        assert_eq!(m.route.id, "/a/b");
        assert_eq!(m.params["**"], "x/y");
    }

    #[test]
    fn fuzzy_never_matches_index_or_root() {
        let tree = tree_of(&["/dashboard/"]);
        assert_eq!(matched_fuzzy(&tree, "/dashboard/x"), None);

        let tree = tree_of(&["/"]);
        assert_eq!(matched_fuzzy(&tree, "/x"), None);
    }

    #[test]
    fn fuzzy_decodes_remainder() {
        let tree = tree_of(&["/a"]);
        let m = find_route_match("/a/b%20c/d%2Fe", &tree, true).unwrap();
        assert_eq!(m.params["**"], "b c/d/e");
    }

    #[test]
    fn fuzzy_prefers_exact_match() {
        let tree = tree_of(&["/a", "/a/b"]);
        assert_eq!(matched_fuzzy(&tree, "/a/b"), Some("/a/b".to_owned()));
    }

    #[test]
    fn repeated_lookups_hit_the_cache() {
        let tree = tree_of(&["/users/$id"]);
        let first = find_route_match("/users/1", &tree, false).unwrap();
        let second = find_route_match("/users/1", &tree, false).unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        // fuzzy and exact lookups are cached separately
        let fuzzy = find_route_match("/users/1", &tree, true).unwrap();
        assert!(!Rc::ptr_eq(&first, &fuzzy));
    }

    #[test]
    fn root_shortcut_agrees_with_full_search() {
        for paths in [&["/", "/a"][..], &["/{-$x}", "/"][..]] {
            let tree = tree_of(paths);
            let with = find_route_match_uncached("/", &tree, false, true);
            let without = find_route_match_uncached("/", &tree, false, false);
            assert_eq!(
                with.as_ref().map(|m| m.route.id.clone()),
                without.as_ref().map(|m| m.route.id.clone())
            );
        }
    }

    #[test]
    fn param_names_follow_the_matched_route() {
        let tree = tree_of(&["/$one/a/b", "/$two/a/c"]);

        let m = find_route_match("/2/a/c", &tree, false).unwrap();
        assert_eq!(m.route.id, "/$two/a/c");
        assert_eq!(m.params.get("two").map(String::as_str), Some("2"));
        assert!(!m.params.contains_key("one"));
    }

    #[test]
    fn competing_optional_chains_extract_their_own_names() {
        let tree = tree_of(&["/{-$year}/{-$month}/{-$day}", "/{-$language}/"]);

        let m = find_route_match("/sv", &tree, false).unwrap();
        assert_eq!(m.route.id, "/{-$language}/");
        assert_eq!(m.params.get("language").map(String::as_str), Some("sv"));
        assert!(!m.params.contains_key("year"));
    }

    #[test]
    fn pathless_layout_itself_never_matches() {
        let layout = Route {
            id: "/_auth".to_owned(),
            path: None,
            full_path: "/".to_owned(),
            children: vec![Rc::new(Route::new("/profile").with_id("/_auth/profile"))],
            options: RouteOptions::default(),
        };
        let tree = tree_of_routes(vec![Rc::new(layout)]);

        assert_eq!(matched(&tree, "/profile"), Some("/_auth/profile".to_owned()));
        assert_eq!(matched(&tree, "/"), None);
        assert_eq!(matched_fuzzy(&tree, "/x"), None);
    }

    #[test]
    fn ancestors_walk_from_root() {
        let grandchild = Rc::new(Route::new("/a/b/c"));
        let child = Rc::new(Route::new("/a/b").with_children(vec![grandchild]));
        let parent = Rc::new(Route::new("/a").with_children(vec![child]));
        let tree = tree_of_routes(vec![parent]);

        let m = find_route_match("/a/b/c", &tree, false).unwrap();
        let ids: Vec<_> = m.ancestors(&tree).iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, ["__root__", "/a", "/a/b", "/a/b/c"]);
    }

    #[test]
    fn flat_match_over_route_masks() {
        let mut tree = tree_of(&["/posts/$postId"]);
        process_route_masks(
            vec![
                crate::tree::RouteMask::new("/posts/$postId/deep"),
                crate::tree::RouteMask::new("/gallery/$"),
            ],
            &mut tree,
        );

        let m = find_flat_match("/posts/5/deep", &tree).unwrap();
        assert_eq!(m.mask.from, "/posts/$postId/deep");
        assert_eq!(m.params["postId"], "5");

        let m = find_flat_match("/gallery/a/b", &tree).unwrap();
        assert_eq!(m.params["_splat"], "a/b");

        assert!(find_flat_match("/nope", &tree).is_none());
    }
}
