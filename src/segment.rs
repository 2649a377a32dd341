//! Path segment scanning.
//!
//! A route template is a `/`-separated list of segments. Each segment is one
//! of four kinds:
//!
//! - static text: `users`
//! - required param: `$id`, or with surrounding literals `prefix{$id}suffix`
//! - optional param: `{-$id}`, optionally `prefix{-$id}suffix`
//! - wildcard: `$`, or with surrounding literals `prefix{$}suffix`
//!
//! [`parse_segment`] classifies a single segment without allocating: it
//! returns a [`SegmentSpan`] of byte offsets into the template, and the
//! caller slices out the pieces it needs.

/// Kind of a single path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Literal text, matched exactly (or case-folded).
    Static,
    /// `$name` or `prefix{$name}suffix`; consumes exactly one part.
    Param,
    /// `$` or `prefix{$}suffix`; consumes zero or more trailing parts.
    Wildcard,
    /// `{-$name}` or `prefix{-$name}suffix`; consumes zero or one part.
    OptionalParam,
}

/// Offsets of one parsed segment within its template string.
///
/// All offsets are absolute byte positions into the template that was passed
/// to [`parse_segment`]. The literal prefix occupies `start..prefix_end`, the
/// value (param name, or the full text for static segments) occupies
/// `value_start..value_end`, and the literal suffix occupies
/// `suffix_start..end`. Absent pieces are empty ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpan {
    pub kind: SegmentKind,
    pub start: usize,
    pub prefix_end: usize,
    pub value_start: usize,
    pub value_end: usize,
    pub suffix_start: usize,
    /// End of the segment: the position of the next `/`, or the end of the
    /// template.
    pub end: usize,
}

impl SegmentSpan {
    /// Literal prefix before a braced param/wildcard marker.
    pub fn prefix<'p>(&self, path: &'p str) -> &'p str {
        &path[self.start..self.prefix_end]
    }

    /// Param name, or the full text for static segments.
    pub fn value<'p>(&self, path: &'p str) -> &'p str {
        &path[self.value_start..self.value_end]
    }

    /// Literal suffix after a braced param/wildcard marker.
    pub fn suffix<'p>(&self, path: &'p str) -> &'p str {
        &path[self.suffix_start..self.end]
    }

    pub fn has_prefix(&self) -> bool {
        self.prefix_end > self.start
    }

    pub fn has_suffix(&self) -> bool {
        self.suffix_start < self.end
    }
}

/// Parses the segment of `path` beginning at byte offset `start`.
///
/// `start` must sit just past a `/` (or at the start of the template). The
/// returned span's `end` points at the terminating `/` or the end of the
/// string, so repeated calls with `span.end + 1` walk a whole template.
///
/// Malformed brace forms (`{$`, `{-$!}`, ...) fall back to static text, as
/// does an empty segment.
pub fn parse_segment(path: &str, start: usize) -> SegmentSpan {
    let end = path[start..]
        .find('/')
        .map_or(path.len(), |pos| start + pos);
    let part = &path[start..end];

    let static_span = SegmentSpan {
        kind: SegmentKind::Static,
        start,
        prefix_end: start,
        value_start: start,
        value_end: end,
        suffix_start: end,
        end,
    };

    if part.is_empty() {
        return static_span;
    }

    // A bare `{$}` marker anywhere makes the segment a wildcard; surrounding
    // text becomes its literal prefix/suffix. Checked before the param forms
    // so `a{$}b{$c}` is a wildcard, mirroring the template grammar.
    if let Some(at) = part.find("{$}") {
        return SegmentSpan {
            kind: SegmentKind::Wildcard,
            start,
            prefix_end: start + at,
            value_start: start + at,
            value_end: start + at + 3,
            suffix_start: start + at + 3,
            end,
        };
    }

    if let Some(span) = find_braced(start, end, part, "{-$", SegmentKind::OptionalParam) {
        return span;
    }

    if let Some(span) = find_braced(start, end, part, "{$", SegmentKind::Param) {
        return span;
    }

    let bytes = part.as_bytes();
    if bytes[0] == b'$' {
        if part.len() > 1 {
            // `$name` with no brace: the whole remainder is the name, any
            // characters allowed.
            return SegmentSpan {
                kind: SegmentKind::Param,
                start,
                prefix_end: start,
                value_start: start + 1,
                value_end: end,
                suffix_start: end,
                end,
            };
        }

        return SegmentSpan {
            kind: SegmentKind::Wildcard,
            start,
            prefix_end: start,
            value_start: start,
            value_end: end,
            suffix_start: end,
            end,
        };
    }

    static_span
}

/// Scans `part` for the first `marker` followed by an identifier and a
/// closing `}`; later occurrences are tried when an earlier one is not
/// well-formed.
fn find_braced(
    start: usize,
    end: usize,
    part: &str,
    marker: &str,
    kind: SegmentKind,
) -> Option<SegmentSpan> {
    let mut from = 0;

    while let Some(rel) = part[from..].find(marker) {
        let at = from + rel;
        let name_start = at + marker.len();

        if let Some(name_len) = ident_len(&part[name_start..]) {
            if part.as_bytes().get(name_start + name_len) == Some(&b'}') {
                return Some(SegmentSpan {
                    kind,
                    start,
                    prefix_end: start + at,
                    value_start: start + name_start,
                    value_end: start + name_start + name_len,
                    suffix_start: start + name_start + name_len + 1,
                    end,
                });
            }
        }

        from = at + 1;
    }

    None
}

/// Length of the identifier at the start of `s`, if any. Identifiers start
/// with an ASCII letter, `_`, or `$`, and continue with those plus digits.
fn ident_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let first = *bytes.first()?;

    if !(first.is_ascii_alphabetic() || first == b'_' || first == b'$') {
        return None;
    }

    let len = bytes
        .iter()
        .take_while(|&&b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
        .count();

    Some(len)
}
