//! Single-template path matching.
//!
//! This is the predecessor of the trie matcher: one template, one path, one
//! answer. It survives for callers that match ad-hoc patterns outside a
//! route tree (masks excluded, which go through the trie). Parsed segment
//! lists can be memoized in a caller-supplied LRU keyed by the raw pathname.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::lru::LruCache;
use crate::path::trim_path_right;
use crate::quoter::{decode, decode_uri};
use crate::segment::{parse_segment, SegmentKind};

/// One parsed pathname segment. Values are kept raw (percent-escapes intact);
/// a lone `/` value marks a leading or trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub value: String,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

/// Memoization cache for [`parse_pathname`], keyed by the raw pathname.
pub type ParsePathnameCache = RefCell<LruCache<String, Rc<Vec<Segment>>>>;

/// Splits a pathname into typed segments.
///
/// A leading `/` and a trailing `/` (on non-root paths) each produce a
/// `Static` segment with value `/`. Segment values stay raw; param and splat
/// values are decoded at match time instead.
pub fn parse_pathname(pathname: &str, cache: Option<&ParsePathnameCache>) -> Rc<Vec<Segment>> {
    if let Some(cache) = cache {
        if let Some(hit) = cache.borrow_mut().get(&pathname.to_owned()) {
            return Rc::clone(hit);
        }
        let parsed = Rc::new(parse_pathname_impl(pathname));
        cache.borrow_mut().set(pathname.to_owned(), Rc::clone(&parsed));
        return parsed;
    }

    Rc::new(parse_pathname_impl(pathname))
}

fn parse_pathname_impl(pathname: &str) -> Vec<Segment> {
    if pathname.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();

    if pathname.starts_with('/') {
        segments.push(slash_segment());
    }

    let mut offset = 0;
    while offset < pathname.len() {
        let span = parse_segment(pathname, offset);
        offset = span.end + 1;
        if span.start == span.end {
            continue;
        }

        let value = match span.kind {
            SegmentKind::Wildcard => "$".to_owned(),
            _ => span.value(pathname).to_owned(),
        };

        segments.push(Segment {
            kind: span.kind,
            value,
            prefix: non_empty(span.prefix(pathname)),
            suffix: non_empty(span.suffix(pathname)),
        });
    }

    if pathname.len() > 1 && pathname.ends_with('/') {
        segments.push(slash_segment());
    }

    segments
}

fn slash_segment() -> Segment {
    Segment {
        kind: SegmentKind::Static,
        value: "/".to_owned(),
        prefix: None,
        suffix: None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_owned())
    }
}

/// Options for [`match_pathname`] and [`match_by_path`].
#[derive(Debug, Clone, Default)]
pub struct MatchPathOptions {
    pub to: String,
    pub case_sensitive: bool,
    pub fuzzy: bool,
}

/// Matches `pathname` under `basepath` against a single template.
#[deprecated = "superseded by the trie matcher; use `process_route_tree` and `find_route_match`"]
pub fn match_pathname(
    basepath: &str,
    pathname: &str,
    opts: &MatchPathOptions,
    cache: Option<&ParsePathnameCache>,
) -> Option<HashMap<String, String>> {
    let pathname = if basepath == "/" {
        pathname
    } else {
        let rest = pathname.strip_prefix(trim_path_right(basepath))?;
        if rest.is_empty() {
            "/"
        } else {
            rest
        }
    };

    #[allow(deprecated)]
    match_by_path(pathname, opts, cache)
}

/// Matches a full pathname against a single template.
#[deprecated = "superseded by the trie matcher; use `process_route_tree` and `find_route_match`"]
pub fn match_by_path(
    pathname: &str,
    opts: &MatchPathOptions,
    cache: Option<&ParsePathnameCache>,
) -> Option<HashMap<String, String>> {
    let base = parse_pathname(pathname, cache);
    let route = parse_pathname(&opts.to, cache);
    is_match(&base, &route, opts.fuzzy, opts.case_sensitive)
}

fn is_match(
    base: &[Segment],
    route: &[Segment],
    fuzzy: bool,
    case_sensitive: bool,
) -> Option<HashMap<String, String>> {
    let mut params = HashMap::new();
    let mut bi = 0;
    let mut ri = 0;

    while bi < base.len() || ri < route.len() {
        let Some(rs) = route.get(ri) else {
            // template exhausted; a leftover trailing slash is fine, more
            // than that only matches fuzzily
            if base[bi..].iter().all(|s| s.value == "/") {
                break;
            }
            if fuzzy {
                let rest: Vec<&str> = base[bi..]
                    .iter()
                    .filter(|s| s.value != "/")
                    .map(|s| s.value.as_str())
                    .collect();
                params.insert("**".to_owned(), rest.join("/"));
                return Some(params);
            }
            return None;
        };

        match rs.kind {
            SegmentKind::Wildcard => {
                let rest: Vec<&Segment> = base[bi..].iter().filter(|s| s.value != "/").collect();

                if rest.is_empty() {
                    if rs.prefix.is_some() || rs.suffix.is_some() {
                        return None;
                    }
                    params.insert("_splat".to_owned(), String::new());
                    params.insert("*".to_owned(), String::new());
                    return Some(params);
                }

                let first = &rest[0].value;
                let last = &rest[rest.len() - 1].value;
                if !fix_matches(first, &rs.prefix, true, case_sensitive)
                    || !fix_matches(last, &rs.suffix, false, case_sensitive)
                {
                    return None;
                }

                // the splat decodes as a whole path: escapes resolve but
                // reserved punctuation like %2F stays encoded
                let joined = rest
                    .iter()
                    .map(|s| s.value.as_str())
                    .collect::<Vec<_>>()
                    .join("/");
                let mut splat = match decode_uri(&joined) {
                    Ok(decoded) => decoded.into_owned(),
                    Err(_) => joined,
                };
                if let Some(p) = &rs.prefix {
                    if splat.starts_with(p.as_str()) {
                        splat.drain(..p.len());
                    }
                }
                if let Some(s) = &rs.suffix {
                    if splat.ends_with(s.as_str()) {
                        splat.truncate(splat.len() - s.len());
                    }
                }

                params.insert("_splat".to_owned(), splat.clone());
                params.insert("*".to_owned(), splat);
                return Some(params);
            }

            SegmentKind::Static => {
                let Some(bs) = base.get(bi) else {
                    return None;
                };
                let matches = if rs.value == "/" {
                    bs.value == "/"
                } else if case_sensitive {
                    bs.value == rs.value
                } else {
                    bs.value.to_lowercase() == rs.value.to_lowercase()
                };
                if !matches {
                    return None;
                }
                bi += 1;
                ri += 1;
            }

            SegmentKind::Param => {
                let Some(bs) = base.get(bi) else {
                    return None;
                };
                if bs.value == "/" {
                    return None;
                }
                let stripped = strip_fix(&bs.value, &rs.prefix, &rs.suffix, case_sensitive)?;
                params.insert(rs.value.clone(), decode_part(stripped));
                bi += 1;
                ri += 1;
            }

            SegmentKind::OptionalParam => {
                let consumable = base.get(bi).filter(|bs| bs.value != "/");
                let Some(bs) = consumable else {
                    ri += 1;
                    continue;
                };

                match strip_fix(&bs.value, &rs.prefix, &rs.suffix, case_sensitive) {
                    None => {
                        // literal mismatch: the optional is skipped
                        ri += 1;
                    }
                    Some(stripped) => {
                        // look ahead: a following static that wants this
                        // exact part claims it instead
                        let claimed_by_static = route.get(ri + 1).map_or(false, |next| {
                            next.kind == SegmentKind::Static
                                && next.value != "/"
                                && if case_sensitive {
                                    next.value == bs.value
                                } else {
                                    next.value.to_lowercase() == bs.value.to_lowercase()
                                }
                        });

                        if claimed_by_static {
                            ri += 1;
                        } else {
                            params.insert(rs.value.clone(), decode_part(stripped));
                            bi += 1;
                            ri += 1;
                        }
                    }
                }
            }
        }
    }

    Some(params)
}

/// Decodes one captured param value; malformed escapes fall back to the raw
/// text rather than failing the match.
fn decode_part(value: &str) -> String {
    decode(value)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| value.to_owned())
}

/// Checks a literal prefix (`leading`) or suffix against one raw part.
fn fix_matches(value: &str, fix: &Option<String>, leading: bool, case_sensitive: bool) -> bool {
    let Some(fix) = fix else {
        return true;
    };
    if case_sensitive {
        if leading {
            value.starts_with(fix.as_str())
        } else {
            value.ends_with(fix.as_str())
        }
    } else {
        let value = value.to_lowercase();
        let fix = fix.to_lowercase();
        if leading {
            value.starts_with(&fix)
        } else {
            value.ends_with(&fix)
        }
    }
}

fn strip_fix<'v>(
    value: &'v str,
    prefix: &Option<String>,
    suffix: &Option<String>,
    case_sensitive: bool,
) -> Option<&'v str> {
    if !fix_matches(value, prefix, true, case_sensitive)
        || !fix_matches(value, suffix, false, case_sensitive)
    {
        return None;
    }

    let start = prefix.as_ref().map_or(0, |p| p.len()).min(value.len());
    let end = value
        .len()
        .saturating_sub(suffix.as_ref().map_or(0, |s| s.len()))
        .max(start);
    value.get(start..end).or(Some(""))
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;

    fn matches(pathname: &str, to: &str) -> Option<HashMap<String, String>> {
        match_by_path(
            pathname,
            &MatchPathOptions {
                to: to.to_owned(),
                ..MatchPathOptions::default()
            },
            None,
        )
    }

    #[test]
    fn parses_pathname_segments() {
        let segs = parse_pathname("/users/$id/", None);
        let kinds: Vec<_> = segs.iter().map(|s| (s.kind, s.value.clone())).collect();
        assert_eq!(
            kinds,
            vec![
                (SegmentKind::Static, "/".to_owned()),
                (SegmentKind::Static, "users".to_owned()),
                (SegmentKind::Param, "id".to_owned()),
                (SegmentKind::Static, "/".to_owned()),
            ]
        );
    }

    #[test]
    fn parse_keeps_raw_values() {
        let segs = parse_pathname("/a%20b", None);
        assert_eq!(segs[1].value, "a%20b");
    }

    #[test]
    fn param_values_decode_at_match_time() {
        let params = matches("/users/a%20b", "/users/$id").unwrap();
        assert_eq!(params["id"], "a b");
    }

    #[test]
    fn splat_decodes_like_a_path() {
        // %20 resolves, the encoded separator survives
        let params = matches("/files/a%20b/c%2Fd", "/files/$").unwrap();
        assert_eq!(params["_splat"], "a b/c%2Fd");
    }

    #[test]
    fn parse_keeps_prefix_and_suffix() {
        let segs = parse_pathname("/img-{$id}.jpg", None);
        assert_eq!(segs[1].prefix.as_deref(), Some("img-"));
        assert_eq!(segs[1].suffix.as_deref(), Some(".jpg"));
    }

    #[test]
    fn parse_uses_cache() {
        let cache: ParsePathnameCache = RefCell::new(LruCache::new(8));
        let a = parse_pathname("/a/b", Some(&cache));
        let b = parse_pathname("/a/b", Some(&cache));
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn static_and_param_match() {
        let params = matches("/users/42", "/users/$id").unwrap();
        assert_eq!(params["id"], "42");
        assert!(matches("/users", "/users/$id").is_none());
        assert!(matches("/users/42/x", "/users/$id").is_none());
    }

    #[test]
    fn case_sensitivity_flag() {
        let opts = MatchPathOptions {
            to: "/Users".to_owned(),
            case_sensitive: true,
            ..MatchPathOptions::default()
        };
        assert!(match_by_path("/users", &opts, None).is_none());
        assert!(match_by_path("/Users", &opts, None).is_some());
        assert!(matches("/USERS", "/users").is_some());
    }

    #[test]
    fn optional_param_consumed_or_skipped() {
        let params = matches("/en/about", "/{-$lang}/about").unwrap();
        assert_eq!(params["lang"], "en");

        let params = matches("/about", "/{-$lang}/about").unwrap();
        assert!(!params.contains_key("lang"));
    }

    #[test]
    fn optional_look_ahead_lets_static_claim_the_part() {
        // "about" must bind the static segment, not the optional param
        let params = matches("/about/team", "/{-$lang}/about/team").unwrap();
        assert!(!params.contains_key("lang"));
    }

    #[test]
    fn wildcard_captures_remainder() {
        let params = matches("/files/a/b", "/files/$").unwrap();
        assert_eq!(params["_splat"], "a/b");
        assert_eq!(params["*"], "a/b");

        let params = matches("/files", "/files/$").unwrap();
        assert_eq!(params["_splat"], "");
    }

    #[test]
    fn wildcard_literals() {
        let params = matches("/doc-a/b.txt", "/doc-{$}.txt").unwrap();
        assert_eq!(params["_splat"], "a/b");
        assert!(matches("/doc-a/b.log", "/doc-{$}.txt").is_none());
    }

    #[test]
    fn fuzzy_collects_remainder() {
        let opts = MatchPathOptions {
            to: "/a".to_owned(),
            fuzzy: true,
            ..MatchPathOptions::default()
        };
        let params = match_by_path("/a/b/c", &opts, None).unwrap();
        assert_eq!(params["**"], "b/c");

        assert!(matches("/a/b/c", "/a").is_none());
    }

    #[test]
    fn trailing_slash_tolerated_when_template_ends() {
        assert!(matches("/a/", "/a").is_some());
    }

    #[test]
    fn basepath_is_stripped() {
        let opts = MatchPathOptions {
            to: "/users/$id".to_owned(),
            ..MatchPathOptions::default()
        };
        let params = match_pathname("/app", "/app/users/7", &opts, None).unwrap();
        assert_eq!(params["id"], "7");
        assert!(match_pathname("/app", "/other/users/7", &opts, None).is_none());
    }
}
