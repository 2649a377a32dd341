//! Route tree indexing.
//!
//! [`process_route_tree`] walks a tree of [`Route`]s and builds a segment
//! trie over their full paths. Each trie node groups its children by kind:
//! exact-case and case-folded static maps, and sorted lists of required
//! params, optional params, and wildcards, so the matcher can visit the most
//! specific alternative first. Index nodes stand in for a trailing `/`, and
//! pathless nodes anchor layout routes that contribute no path of their own.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::rc::Rc;

use tracing::error;

use crate::lru::LruCache;
use crate::matcher::RouteMatch;
use crate::path::trim_path_right;
use crate::segment::{parse_segment, SegmentKind, SegmentSpan};

/// Capacity of the per-tree match memoization cache.
const MATCH_CACHE_CAPACITY: usize = 1000;

/// Error produced by a route's params validator.
#[derive(Debug, Clone)]
pub struct ParamsParseError {
    message: String,
}

impl ParamsParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParamsParseError {
            message: message.into(),
        }
    }
}

impl fmt::Display for ParamsParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid path params: {}", self.message)
    }
}

impl std::error::Error for ParamsParseError {}

/// Per-route params validator. Receives the raw decoded params gathered on
/// the way to the route's node and returns a parsed value (normally a JSON
/// object) or an error.
pub type ParamsParseFn =
    Rc<dyn Fn(&HashMap<String, String>) -> Result<serde_json::Value, ParamsParseError>>;

/// Per-route matching options.
#[derive(Clone, Default)]
pub struct RouteOptions {
    /// Overrides the tree-wide case sensitivity for this route's own
    /// segments.
    pub case_sensitive: Option<bool>,
    /// Validator over the raw params extracted for this route.
    pub params_parse: Option<ParamsParseFn>,
    /// When set, a validator error disqualifies this route during matching
    /// and the search falls back to the next candidate. Without it the
    /// validator is never consulted at match time.
    pub skip_route_on_parse_error: bool,
    /// Orders otherwise-identical validated siblings; higher first.
    pub parse_error_priority: i32,
}

impl fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptions")
            .field("case_sensitive", &self.case_sensitive)
            .field("params_parse", &self.params_parse.is_some())
            .field("skip_route_on_parse_error", &self.skip_route_on_parse_error)
            .field("parse_error_priority", &self.parse_error_priority)
            .finish()
    }
}

/// One route definition in the input tree.
///
/// `full_path` is the accumulated path from the root; a child's `full_path`
/// is expected to extend its parent's. `id` must be unique across the tree.
/// A final id segment starting with `_` marks a pathless layout route when
/// the route has children.
#[derive(Debug)]
pub struct Route {
    pub id: String,
    /// Own path relative to the parent; `None` for purely structural routes.
    pub path: Option<String>,
    pub full_path: String,
    pub children: Vec<Rc<Route>>,
    pub options: RouteOptions,
}

impl Route {
    /// Creates a leaf route whose id equals its path.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Route {
            id: path.clone(),
            path: Some(path.clone()),
            full_path: path,
            children: Vec::new(),
            options: RouteOptions::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_children(mut self, children: Vec<Rc<Route>>) -> Self {
        self.children = children;
        self
    }

    pub fn with_options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }
}

/// A flattened route-mask template, matched via [`crate::find_flat_match`].
#[derive(Debug, Clone)]
pub struct RouteMask {
    pub from: String,
    pub case_sensitive: Option<bool>,
}

impl RouteMask {
    pub fn new(from: impl Into<String>) -> Self {
        RouteMask {
            from: from.into(),
            case_sensitive: None,
        }
    }
}

pub(crate) type NodeId = usize;

/// Arena index of the route trie's root node.
pub(crate) const ROOT: NodeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Static,
    Param,
    Wildcard,
    OptionalParam,
    Index,
    Pathless,
}

pub(crate) struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub depth: u32,
    /// Template path from the root up to and including this node's segment.
    pub full_path: String,
    pub case_sensitive: bool,
    /// Literal prefix/suffix of a param or wildcard segment, lowercased for
    /// case-insensitive nodes. `None` when absent.
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Static children by exact literal.
    pub stat: HashMap<String, NodeId>,
    /// Case-insensitive static children by lowercased literal.
    pub stat_insensitive: HashMap<String, NodeId>,
    pub dynamic: Vec<NodeId>,
    pub optional: Vec<NodeId>,
    pub wildcard: Vec<NodeId>,
    pub pathless: Vec<NodeId>,
    pub index: Option<NodeId>,
    /// Index into the owning table (flat routes, or masks for a mask trie)
    /// when a route terminates here.
    pub terminal: Option<usize>,
    pub parse: Option<ParamsParseFn>,
    pub skip_on_parse_error: bool,
    pub parse_priority: i32,
}

impl Node {
    fn new(
        kind: NodeKind,
        parent: Option<NodeId>,
        depth: u32,
        full_path: String,
        case_sensitive: bool,
    ) -> Self {
        Node {
            kind,
            parent,
            depth,
            full_path,
            case_sensitive,
            prefix: None,
            suffix: None,
            stat: HashMap::new(),
            stat_insensitive: HashMap::new(),
            dynamic: Vec::new(),
            optional: Vec::new(),
            wildcard: Vec::new(),
            pathless: Vec::new(),
            index: None,
            terminal: None,
            parse: None,
            skip_on_parse_error: false,
            parse_priority: 0,
        }
    }

    pub(crate) fn prefix_len(&self) -> usize {
        self.prefix.as_ref().map_or(0, |p| p.len())
    }

    pub(crate) fn suffix_len(&self) -> usize {
        self.suffix.as_ref().map_or(0, |s| s.len())
    }

    /// Whether arriving at this node runs a validator that can disqualify
    /// the candidate.
    pub(crate) fn has_validator(&self) -> bool {
        self.skip_on_parse_error && self.parse.is_some()
    }
}

pub(crate) struct FlatRoute {
    pub route: Rc<Route>,
    pub parent: Option<usize>,
}

/// A processed route tree: the trie arena plus flat route tables and the
/// match memoization cache.
///
/// The engine is single-threaded by design; routes are shared via `Rc` and
/// the cache lives behind a `RefCell`.
pub struct ProcessedTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) flat: Vec<FlatRoute>,
    pub(crate) case_sensitive: bool,
    routes_by_id: HashMap<String, usize>,
    routes_by_path: HashMap<String, usize>,
    pub(crate) masks: Vec<RouteMask>,
    pub(crate) mask_root: Option<NodeId>,
    pub(crate) match_cache: RefCell<LruCache<String, Option<Rc<RouteMatch>>>>,
}

impl ProcessedTree {
    pub fn route_by_id(&self, id: &str) -> Option<&Rc<Route>> {
        self.routes_by_id.get(id).map(|&idx| &self.flat[idx].route)
    }

    /// Looks up a route by its full path, ignoring a trailing slash. When
    /// both `/a` and `/a/` exist the trailing-slash (index) route wins.
    pub fn route_by_path(&self, path: &str) -> Option<&Rc<Route>> {
        self.routes_by_path
            .get(trim_path_right(path))
            .map(|&idx| &self.flat[idx].route)
    }

    pub(crate) fn flat_index_of(&self, id: &str) -> Option<usize> {
        self.routes_by_id.get(id).copied()
    }
}

/// Indexes a route tree with case-insensitive matching by default.
pub fn process_route_tree(root: &Rc<Route>) -> ProcessedTree {
    process_route_tree_with(root, false, |_, _| {})
}

/// Indexes a route tree.
///
/// `case_sensitive` sets the tree-wide default, overridable per route via
/// [`RouteOptions::case_sensitive`]. `on_route` is invoked once per route in
/// registration (depth-first, pre-order) order with its flat index.
///
/// Optional parameters nested deeper than 64 path segments cannot be skipped
/// during matching; trees that deep are outside the supported envelope and
/// trip a debug assertion.
///
/// # Panics
/// Panics when two routes share an id.
pub fn process_route_tree_with(
    root: &Rc<Route>,
    case_sensitive: bool,
    mut on_route: impl FnMut(&Rc<Route>, usize),
) -> ProcessedTree {
    let mut ctx = BuildCtx {
        nodes: vec![Node::new(
            NodeKind::Static,
            None,
            0,
            "/".to_owned(),
            case_sensitive,
        )],
        flat: Vec::new(),
        routes_by_id: HashMap::new(),
        routes_by_path: HashMap::new(),
        case_sensitive,
    };

    ctx.insert_route(root, None, ROOT, 1, true, &mut on_route);
    sort_children(&mut ctx.nodes);

    ProcessedTree {
        nodes: ctx.nodes,
        flat: ctx.flat,
        case_sensitive,
        routes_by_id: ctx.routes_by_id,
        routes_by_path: ctx.routes_by_path,
        masks: Vec::new(),
        mask_root: None,
        match_cache: RefCell::new(LruCache::new(MATCH_CACHE_CAPACITY)),
    }
}

/// Indexes `masks` into a secondary trie on `tree`, shared with the route
/// arena, for [`crate::find_flat_match`] lookups.
pub fn process_route_masks(masks: Vec<RouteMask>, tree: &mut ProcessedTree) {
    let root = match tree.mask_root {
        Some(root) => root,
        None => {
            let root = tree.nodes.len();
            tree.nodes.push(Node::new(
                NodeKind::Static,
                None,
                0,
                "/".to_owned(),
                tree.case_sensitive,
            ));
            tree.mask_root = Some(root);
            root
        }
    };

    for mask in masks {
        let case_sensitive = mask.case_sensitive.unwrap_or(tree.case_sensitive);
        let idx = tree.masks.len();
        insert_mask(&mut tree.nodes, root, &mask.from, case_sensitive, idx);
        tree.masks.push(mask);
    }

    sort_children(&mut tree.nodes);
}

struct BuildCtx {
    nodes: Vec<Node>,
    flat: Vec<FlatRoute>,
    routes_by_id: HashMap<String, usize>,
    routes_by_path: HashMap<String, usize>,
    case_sensitive: bool,
}

impl BuildCtx {
    fn insert_route(
        &mut self,
        route: &Rc<Route>,
        parent_flat: Option<usize>,
        start_node: NodeId,
        start_offset: usize,
        is_root: bool,
        on_route: &mut dyn FnMut(&Rc<Route>, usize),
    ) {
        if self.routes_by_id.contains_key(&route.id) {
            error!("duplicate route id: {}", route.id);
            panic!("duplicate route id: {}", route.id);
        }

        let flat_idx = self.flat.len();
        self.flat.push(FlatRoute {
            route: Rc::clone(route),
            parent: parent_flat,
        });
        self.routes_by_id.insert(route.id.clone(), flat_idx);
        on_route(route, flat_idx);

        let case_sensitive = route.options.case_sensitive.unwrap_or(self.case_sensitive);
        let path = route.full_path.as_str();
        // "/" itself counts: a non-root route at "/" is the root index route
        let ends_with_slash = path.ends_with('/');
        let pathless = !is_root && !route.children.is_empty() && id_tail_is_pathless(&route.id);

        let mut node = start_node;
        let mut offset = start_offset.min(path.len());

        while offset < path.len() {
            let span = parse_segment(path, offset);
            let next = span.end + 1;

            if span.start == span.end {
                // duplicate slash
                offset = next;
                continue;
            }

            // Options belong to the node a route terminates on; with a
            // trailing slash or a pathless layout that node comes later.
            let opts = if span.end == path.len() && !pathless && !ends_with_slash {
                Some(&route.options)
            } else {
                None
            };

            node = self.child_for_segment(node, path, span, case_sensitive, opts);
            offset = next;
        }

        if pathless {
            let depth = self.nodes[node].depth + 1;
            let pl = self.nodes.len();
            let mut pathless_node = Node::new(
                NodeKind::Pathless,
                Some(node),
                depth,
                path.to_owned(),
                case_sensitive,
            );
            apply_options(&mut pathless_node, &route.options);
            self.nodes.push(pathless_node);
            self.nodes[node].pathless.push(pl);
            // A layout with no own path contributes structure only; it must
            // not become matchable itself.
            if route.path.as_deref().map_or(false, |p| !p.is_empty()) {
                self.nodes[pl].terminal = Some(flat_idx);
            }
            node = pl;
        } else if !is_root {
            if ends_with_slash {
                let ix = self.index_child(node, path, case_sensitive, &route.options);
                if self.nodes[ix].terminal.is_none() {
                    self.nodes[ix].terminal = Some(flat_idx);
                }
            } else if route.path.as_deref().map_or(false, |p| !p.is_empty())
                && self.nodes[node].terminal.is_none()
            {
                self.nodes[node].terminal = Some(flat_idx);
            }
        }

        if route.path.is_some() {
            self.register_by_path(path, ends_with_slash, flat_idx);
        }

        let child_offset = if path.len() <= 1 {
            1
        } else if ends_with_slash {
            path.len()
        } else {
            path.len() + 1
        };
        for child in &route.children {
            self.insert_route(child, Some(flat_idx), node, child_offset, false, on_route);
        }
    }

    /// Finds or creates the child of `parent` for one parsed segment.
    /// `opts` is present only for the segment a route terminates on; reuse
    /// of param/wildcard siblings requires identical validator identity, so
    /// differently-validated `$x` siblings stay distinct nodes.
    fn child_for_segment(
        &mut self,
        parent: NodeId,
        path: &str,
        span: SegmentSpan,
        case_sensitive: bool,
        opts: Option<&RouteOptions>,
    ) -> NodeId {
        let depth = self.nodes[parent].depth + 1;
        let full_path = path[..span.end].to_owned();

        if span.kind == SegmentKind::Static {
            let literal = span.value(path);
            let key = if case_sensitive {
                literal.to_owned()
            } else {
                literal.to_lowercase()
            };

            let existing = if case_sensitive {
                self.nodes[parent].stat.get(&key).copied()
            } else {
                self.nodes[parent].stat_insensitive.get(&key).copied()
            };

            if let Some(id) = existing {
                if let Some(opts) = opts {
                    if self.nodes[id].parse.is_none() {
                        apply_options(&mut self.nodes[id], opts);
                    }
                }
                return id;
            }

            let id = self.nodes.len();
            let mut node = Node::new(
                NodeKind::Static,
                Some(parent),
                depth,
                full_path,
                case_sensitive,
            );
            if let Some(opts) = opts {
                apply_options(&mut node, opts);
            }
            self.nodes.push(node);

            if case_sensitive {
                self.nodes[parent].stat.insert(key, id);
            } else {
                self.nodes[parent].stat_insensitive.insert(key, id);
            }
            return id;
        }

        let kind = match span.kind {
            SegmentKind::Param => NodeKind::Param,
            SegmentKind::Wildcard => NodeKind::Wildcard,
            SegmentKind::OptionalParam => NodeKind::OptionalParam,
            SegmentKind::Static => unreachable!(),
        };

        let prefix = normalize_literal(span.prefix(path), case_sensitive);
        let suffix = normalize_literal(span.suffix(path), case_sensitive);
        let name = span.value(path);
        let (wanted_parse, wanted_skip, wanted_priority) = match opts {
            Some(opts) => (
                opts.params_parse.clone(),
                opts.skip_route_on_parse_error,
                opts.parse_error_priority,
            ),
            None => (None, false, 0),
        };

        let list = match kind {
            NodeKind::Param => &self.nodes[parent].dynamic,
            NodeKind::Wildcard => &self.nodes[parent].wildcard,
            _ => &self.nodes[parent].optional,
        };

        for &id in list {
            let node = &self.nodes[id];
            if node.case_sensitive == case_sensitive
                && node.prefix == prefix
                && node.suffix == suffix
                && (kind == NodeKind::Wildcard || node_param_name(node) == name)
                && node.skip_on_parse_error == wanted_skip
                && parse_fns_eq(&node.parse, &wanted_parse)
            {
                return id;
            }
        }

        debug_assert!(
            kind != NodeKind::OptionalParam || depth < 64,
            "optional params deeper than 64 segments cannot be skipped during matching"
        );

        let id = self.nodes.len();
        let mut node = Node::new(kind, Some(parent), depth, full_path, case_sensitive);
        node.prefix = prefix;
        node.suffix = suffix;
        node.parse = wanted_parse;
        node.skip_on_parse_error = wanted_skip;
        node.parse_priority = wanted_priority;
        self.nodes.push(node);

        let list = match kind {
            NodeKind::Param => &mut self.nodes[parent].dynamic,
            NodeKind::Wildcard => &mut self.nodes[parent].wildcard,
            _ => &mut self.nodes[parent].optional,
        };
        list.push(id);
        id
    }

    fn index_child(
        &mut self,
        parent: NodeId,
        path: &str,
        case_sensitive: bool,
        opts: &RouteOptions,
    ) -> NodeId {
        if let Some(ix) = self.nodes[parent].index {
            return ix;
        }

        let depth = self.nodes[parent].depth + 1;
        let id = self.nodes.len();
        let mut node = Node::new(
            NodeKind::Index,
            Some(parent),
            depth,
            path.to_owned(),
            case_sensitive,
        );
        apply_options(&mut node, opts);
        self.nodes.push(node);
        self.nodes[parent].index = Some(id);
        id
    }

    fn register_by_path(&mut self, path: &str, ends_with_slash: bool, flat_idx: usize) {
        let key = trim_path_right(path).to_owned();
        match self.routes_by_path.entry(key) {
            Entry::Occupied(mut entry) => {
                let old = &self.flat[*entry.get()].route;
                let old_slash = old.full_path.ends_with('/');
                // index (trailing slash) routes win; otherwise the later
                // registration does
                if ends_with_slash || !old_slash {
                    entry.insert(flat_idx);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(flat_idx);
            }
        }
    }
}

fn insert_mask(nodes: &mut Vec<Node>, root: NodeId, from: &str, case_sensitive: bool, idx: usize) {
    let mut ctx = MaskCtx { nodes };
    let path = from;
    let ends_with_slash = path.len() > 1 && path.ends_with('/');

    let mut node = root;
    let mut offset = 1.min(path.len());
    while offset < path.len() {
        let span = parse_segment(path, offset);
        let next = span.end + 1;
        if span.start == span.end {
            offset = next;
            continue;
        }
        node = ctx.child_for_segment(node, path, span, case_sensitive);
        offset = next;
    }

    if ends_with_slash {
        let ix = ctx.index_child(node, path, case_sensitive);
        if ctx.nodes[ix].terminal.is_none() {
            ctx.nodes[ix].terminal = Some(idx);
        }
    } else if node != root && ctx.nodes[node].terminal.is_none() {
        ctx.nodes[node].terminal = Some(idx);
    }
}

/// Mask insertion shares the route trie's node shapes but carries no
/// validators or pathless layers.
struct MaskCtx<'a> {
    nodes: &'a mut Vec<Node>,
}

impl MaskCtx<'_> {
    fn child_for_segment(
        &mut self,
        parent: NodeId,
        path: &str,
        span: SegmentSpan,
        case_sensitive: bool,
    ) -> NodeId {
        let depth = self.nodes[parent].depth + 1;
        let full_path = path[..span.end].to_owned();

        if span.kind == SegmentKind::Static {
            let literal = span.value(path);
            let key = if case_sensitive {
                literal.to_owned()
            } else {
                literal.to_lowercase()
            };
            let existing = if case_sensitive {
                self.nodes[parent].stat.get(&key).copied()
            } else {
                self.nodes[parent].stat_insensitive.get(&key).copied()
            };
            if let Some(id) = existing {
                return id;
            }

            let id = self.nodes.len();
            self.nodes.push(Node::new(
                NodeKind::Static,
                Some(parent),
                depth,
                full_path,
                case_sensitive,
            ));
            if case_sensitive {
                self.nodes[parent].stat.insert(key, id);
            } else {
                self.nodes[parent].stat_insensitive.insert(key, id);
            }
            return id;
        }

        let kind = match span.kind {
            SegmentKind::Param => NodeKind::Param,
            SegmentKind::Wildcard => NodeKind::Wildcard,
            SegmentKind::OptionalParam => NodeKind::OptionalParam,
            SegmentKind::Static => unreachable!(),
        };
        let prefix = normalize_literal(span.prefix(path), case_sensitive);
        let suffix = normalize_literal(span.suffix(path), case_sensitive);
        let name = span.value(path);

        let list = match kind {
            NodeKind::Param => &self.nodes[parent].dynamic,
            NodeKind::Wildcard => &self.nodes[parent].wildcard,
            _ => &self.nodes[parent].optional,
        };
        for &id in list {
            let node = &self.nodes[id];
            if node.case_sensitive == case_sensitive
                && node.prefix == prefix
                && node.suffix == suffix
                && (kind == NodeKind::Wildcard || node_param_name(node) == name)
                && node.parse.is_none()
            {
                return id;
            }
        }

        let id = self.nodes.len();
        let mut node = Node::new(kind, Some(parent), depth, full_path, case_sensitive);
        node.prefix = prefix;
        node.suffix = suffix;
        self.nodes.push(node);

        let list = match kind {
            NodeKind::Param => &mut self.nodes[parent].dynamic,
            NodeKind::Wildcard => &mut self.nodes[parent].wildcard,
            _ => &mut self.nodes[parent].optional,
        };
        list.push(id);
        id
    }

    fn index_child(&mut self, parent: NodeId, path: &str, case_sensitive: bool) -> NodeId {
        if let Some(ix) = self.nodes[parent].index {
            return ix;
        }
        let depth = self.nodes[parent].depth + 1;
        let id = self.nodes.len();
        self.nodes.push(Node::new(
            NodeKind::Index,
            Some(parent),
            depth,
            path.to_owned(),
            case_sensitive,
        ));
        self.nodes[parent].index = Some(id);
        id
    }
}

fn apply_options(node: &mut Node, opts: &RouteOptions) {
    node.parse = opts.params_parse.clone();
    node.skip_on_parse_error = opts.skip_route_on_parse_error;
    node.parse_priority = opts.parse_error_priority;
}

fn parse_fns_eq(a: &Option<ParamsParseFn>, b: &Option<ParamsParseFn>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// Recovers the parameter name of a dynamic/optional node by re-parsing the
/// last segment of its template path. Nodes do not store names; reuse of a
/// sibling requires the names to agree so `$one` and `$two` stay distinct.
fn node_param_name(node: &Node) -> &str {
    let start = node.full_path.rfind('/').map_or(0, |i| i + 1);
    let span = parse_segment(&node.full_path, start);
    span.value(&node.full_path)
}

fn normalize_literal(literal: &str, case_sensitive: bool) -> Option<String> {
    if literal.is_empty() {
        None
    } else if case_sensitive {
        Some(literal.to_owned())
    } else {
        Some(literal.to_lowercase())
    }
}

fn id_tail_is_pathless(id: &str) -> bool {
    id.trim_end_matches('/')
        .rsplit('/')
        .next()
        .map_or(false, |seg| seg.starts_with('_'))
}

/// Orders sibling lists most-specific first: case-sensitive, then longer
/// prefix, longer suffix, validated before not, then explicit priority.
fn sibling_order(a: &Node, b: &Node) -> Ordering {
    b.case_sensitive
        .cmp(&a.case_sensitive)
        .then(b.prefix_len().cmp(&a.prefix_len()))
        .then(b.suffix_len().cmp(&a.suffix_len()))
        .then(b.has_validator().cmp(&a.has_validator()))
        .then(b.parse_priority.cmp(&a.parse_priority))
}

fn sort_children(nodes: &mut Vec<Node>) {
    for idx in 0..nodes.len() {
        let mut dynamic = mem::take(&mut nodes[idx].dynamic);
        dynamic.sort_by(|&a, &b| sibling_order(&nodes[a], &nodes[b]));
        nodes[idx].dynamic = dynamic;

        let mut optional = mem::take(&mut nodes[idx].optional);
        optional.sort_by(|&a, &b| sibling_order(&nodes[a], &nodes[b]));
        nodes[idx].optional = optional;

        let mut wildcard = mem::take(&mut nodes[idx].wildcard);
        wildcard.sort_by(|&a, &b| sibling_order(&nodes[a], &nodes[b]));
        nodes[idx].wildcard = wildcard;

        let mut pathless = mem::take(&mut nodes[idx].pathless);
        pathless.sort_by(|&a, &b| sibling_order(&nodes[a], &nodes[b]));
        nodes[idx].pathless = pathless;
    }
}
