//! Path utilities: joining, trimming, relative resolution, and template
//! interpolation.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::lru::LruCache;
use crate::quoter::{encode_component, encode_path};
use crate::segment::{parse_segment, SegmentKind};

/// Collapses duplicate `/` separators.
pub fn clean_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;

    for ch in path.chars() {
        if ch == '/' {
            if !prev_slash {
                out.push(ch);
            }
            prev_slash = true;
        } else {
            out.push(ch);
            prev_slash = false;
        }
    }

    out
}

/// Joins path fragments with `/`, collapsing duplicate separators.
pub fn join_paths<I>(paths: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let joined = paths
        .into_iter()
        .map(|p| p.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join("/");
    clean_path(&joined)
}

/// Strips leading slashes; `/` itself is kept.
pub fn trim_path_left(path: &str) -> &str {
    if path == "/" {
        path
    } else {
        path.trim_start_matches('/')
    }
}

/// Strips trailing slashes; `/` itself is kept.
pub fn trim_path_right(path: &str) -> &str {
    if path == "/" {
        path
    } else {
        path.trim_end_matches('/')
    }
}

/// Strips slashes from both ends; `/` itself is kept.
pub fn trim_path(path: &str) -> &str {
    trim_path_right(trim_path_left(path))
}

/// Removes a trailing slash unless the value is `/` itself or the
/// application basepath.
pub fn remove_trailing_slash(value: &str, basepath: &str) -> String {
    if value.len() > 1 && value.ends_with('/') && value != basepath {
        value[..value.len() - 1].to_owned()
    } else {
        value.to_owned()
    }
}

/// Compares two paths ignoring a trailing slash (the basepath keeps its).
pub fn exact_path_test(a: &str, b: &str, basepath: &str) -> bool {
    remove_trailing_slash(a, basepath) == remove_trailing_slash(b, basepath)
}

/// Trailing-slash policy for [`resolve_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingSlash {
    Always,
    Never,
    Preserve,
}

/// Memoization cache for [`resolve_path`], keyed by `(base, to)`. The policy
/// is not part of the key; use one cache per policy.
pub type ResolvePathCache = RefCell<LruCache<(String, String), String>>;

/// Resolves `to` against `base`.
///
/// An absolute `to` discards the base; `.` segments are dropped and `..`
/// segments pop one resolved segment (stopping at the root). Param,
/// optional, and wildcard segments are re-emitted in canonical form, so
/// resolution normalizes template spelling as well.
///
/// # Examples
/// ```
/// use route_trie::{resolve_path, TrailingSlash};
///
/// let resolved = resolve_path("/a/b/c", "../d", TrailingSlash::Never, None);
/// assert_eq!(resolved, "/a/b/d");
/// assert_eq!(resolve_path("/a/b", "/x", TrailingSlash::Never, None), "/x");
/// ```
pub fn resolve_path(
    base: &str,
    to: &str,
    trailing_slash: TrailingSlash,
    cache: Option<&ResolvePathCache>,
) -> String {
    if let Some(cache) = cache {
        let key = (base.to_owned(), to.to_owned());
        if let Some(hit) = cache.borrow_mut().get(&key) {
            return hit.clone();
        }
        let resolved = resolve_path_impl(base, to, trailing_slash);
        cache.borrow_mut().set(key, resolved.clone());
        return resolved;
    }

    resolve_path_impl(base, to, trailing_slash)
}

fn resolve_path_impl(base: &str, to: &str, trailing_slash: TrailingSlash) -> String {
    let mut segments: Vec<&str> = if to.starts_with('/') {
        Vec::new()
    } else {
        base.split('/').filter(|s| !s.is_empty()).collect()
    };

    for seg in to.split('/').filter(|s| !s.is_empty()) {
        match seg {
            ".." => {
                segments.pop();
            }
            "." => {}
            seg => segments.push(seg),
        }
    }

    let mut out = String::with_capacity(base.len() + to.len());
    for seg in &segments {
        out.push('/');
        push_canonical_segment(&mut out, seg);
    }

    if out.is_empty() {
        out.push('/');
    }

    let wants_trailing = match trailing_slash {
        TrailingSlash::Always => true,
        TrailingSlash::Never => false,
        TrailingSlash::Preserve => {
            if to.is_empty() {
                base.len() > 1 && base.ends_with('/')
            } else {
                to.len() > 1 && to.ends_with('/')
            }
        }
    };
    if wants_trailing && out != "/" {
        out.push('/');
    }

    out
}

/// Re-emits one resolved segment, normalizing param/wildcard spellings
/// (`{$id}` becomes `$id`, literal-free `{-$x}`/`{$}` forms stay braced).
fn push_canonical_segment(out: &mut String, seg: &str) {
    let span = parse_segment(seg, 0);
    let prefix = span.prefix(seg);
    let suffix = span.suffix(seg);

    match span.kind {
        SegmentKind::Static => out.push_str(seg),
        SegmentKind::Param => {
            if prefix.is_empty() && suffix.is_empty() {
                out.push('$');
                out.push_str(span.value(seg));
            } else {
                out.push_str(prefix);
                out.push_str("{$");
                out.push_str(span.value(seg));
                out.push('}');
                out.push_str(suffix);
            }
        }
        SegmentKind::OptionalParam => {
            out.push_str(prefix);
            out.push_str("{-$");
            out.push_str(span.value(seg));
            out.push('}');
            out.push_str(suffix);
        }
        SegmentKind::Wildcard => {
            if prefix.is_empty() && suffix.is_empty() {
                out.push('$');
            } else {
                out.push_str(prefix);
                out.push_str("{$}");
                out.push_str(suffix);
            }
        }
    }
}

/// Options for [`interpolate_path`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InterpolateOptions<'a> {
    /// Keep wildcard placeholders in the output instead of substituting.
    pub leave_wildcards: bool,
    /// Keep param placeholders in the output instead of substituting.
    pub leave_params: bool,
    /// Re-decodes selected escape sequences after encoding, e.g.
    /// `"%40" => "@"` to keep `@` readable in handles.
    pub decode_char_map: Option<&'a HashMap<String, String>>,
}

/// Result of [`interpolate_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpolatedPath {
    pub path: String,
    /// Params actually substituted into the template.
    pub used_params: HashMap<String, String>,
    /// Set when a required param or splat had no (non-empty, for splats)
    /// value; the output keeps the placeholder as a best effort.
    pub is_missing_params: bool,
}

/// Substitutes `params` into a route template.
///
/// Param values are component-encoded, splat values path-encoded (keeping
/// `/`). Missing optional params collapse, keeping any literal prefix and
/// suffix. The splat value is read from `_splat`, falling back to `*`.
pub fn interpolate_path(
    template: &str,
    params: &HashMap<String, String>,
    opts: &InterpolateOptions<'_>,
) -> InterpolatedPath {
    let mut segments: Vec<String> = Vec::new();
    let mut used_params = HashMap::new();
    let mut is_missing_params = false;

    let mut offset = 0;
    while offset < template.len() {
        let span = parse_segment(template, offset);
        let raw = &template[span.start..span.end];
        let prefix = span.prefix(template);
        let suffix = span.suffix(template);

        match span.kind {
            SegmentKind::Static => segments.push(raw.to_owned()),

            SegmentKind::Param => {
                if opts.leave_params {
                    segments.push(raw.to_owned());
                } else {
                    let name = span.value(template);
                    match params.get(name) {
                        Some(value) => {
                            used_params.insert(name.to_owned(), value.clone());
                            let encoded = encode_param(value, opts.decode_char_map);
                            segments.push(format!("{prefix}{encoded}{suffix}"));
                        }
                        None => {
                            is_missing_params = true;
                            segments.push(raw.to_owned());
                        }
                    }
                }
            }

            SegmentKind::OptionalParam => {
                if opts.leave_params {
                    segments.push(raw.to_owned());
                } else {
                    let name = span.value(template);
                    match params.get(name) {
                        Some(value) => {
                            used_params.insert(name.to_owned(), value.clone());
                            let encoded = encode_param(value, opts.decode_char_map);
                            segments.push(format!("{prefix}{encoded}{suffix}"));
                        }
                        None if !prefix.is_empty() || !suffix.is_empty() => {
                            segments.push(format!("{prefix}{suffix}"));
                        }
                        None => {} // segment collapses entirely
                    }
                }
            }

            SegmentKind::Wildcard => {
                if opts.leave_wildcards {
                    segments.push(raw.to_owned());
                } else {
                    let splat = params.get("_splat").or_else(|| params.get("*"));
                    match splat {
                        Some(value) if !value.is_empty() => {
                            used_params.insert("_splat".to_owned(), value.clone());
                            used_params.insert("*".to_owned(), value.clone());
                            let encoded = encode_path(value);
                            segments.push(format!("{prefix}{encoded}{suffix}"));
                        }
                        _ => {
                            is_missing_params = true;
                            if !prefix.is_empty() || !suffix.is_empty() {
                                segments.push(format!("{prefix}{suffix}"));
                            }
                        }
                    }
                }
            }
        }

        offset = span.end + 1;
    }

    if template.len() > 1 && template.ends_with('/') {
        segments.push(String::new());
    }

    let mut path = clean_path(&segments.join("/"));
    if path.is_empty() {
        path.push('/');
    }

    InterpolatedPath {
        path,
        used_params,
        is_missing_params,
    }
}

fn encode_param(value: &str, decode_char_map: Option<&HashMap<String, String>>) -> String {
    let mut encoded = encode_component(value);
    if let Some(map) = decode_char_map {
        for (from, to) in map {
            encoded = encoded.replace(from.as_str(), to.as_str());
        }
    }
    encoded
}
