//! Route tree construction and path matching.
//!
//! A tree of [`Route`]s is processed once into a segment trie
//! ([`process_route_tree`]), then matched against concrete pathnames with
//! [`find_route_match`]. Templates support static segments, params
//! (`$id`, `pre{$id}suf`), optional params (`{-$lang}`) and wildcards
//! (`$`, `pre{$}suf`); matches are ranked so that more specific templates
//! win. Matched params deserialize into typed values via serde
//! ([`RouteMatch::load`]).
//!
//! Trees hold `Rc` internals and are single-threaded; build one per thread.

#![deny(rust_2018_idioms, nonstandard_style)]

mod de;
mod lru;
mod matcher;
mod params;
mod path;
mod pattern;
mod quoter;
mod segment;
mod tree;

pub use self::de::ParamsDeserializer;
pub use self::lru::LruCache;
pub use self::matcher::{find_flat_match, find_route_match, FlatMatch, RouteMatch};
pub use self::path::{
    clean_path, exact_path_test, interpolate_path, join_paths, remove_trailing_slash,
    resolve_path, trim_path, trim_path_left, trim_path_right, InterpolateOptions,
    InterpolatedPath, ResolvePathCache, TrailingSlash,
};
#[allow(deprecated)]
pub use self::pattern::{
    match_by_path, match_pathname, parse_pathname, MatchPathOptions, ParsePathnameCache, Segment,
};
pub use self::quoter::DecodeError;
pub use self::segment::{parse_segment, SegmentKind, SegmentSpan};
pub use self::tree::{
    process_route_masks, process_route_tree, process_route_tree_with, ParamsParseError,
    ParamsParseFn, ProcessedTree, Route, RouteMask, RouteOptions,
};
