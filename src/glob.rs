//! Glob patterns
//!
//! Supports `*`, `?`, `[...]` classes, `**` across directories, `{a,b}`
//! alternation and the extglob operators `@(..)`, `?(..)`, `+(..)`, `*(..)`
//! and `!(..)`. Braces are expanded up front so each alternative is a
//! separate glob. A pattern is matched one path segment at a time, and a
//! segment starting with `.` is only matched by a pattern segment that
//! starts with a literal `.`.

use regex::Regex;

use crate::error::{ResolveError, Result};

/// One compiled brace alternative of a pattern
#[derive(Debug, Clone)]
pub struct Glob {
    segments: Vec<Segment>,
    /// No `/` in the pattern: match against the file name only
    basename: bool,
}

#[derive(Debug, Clone)]
enum Segment {
    Globstar,
    Match {
        regex: Regex,
        /// Body of `!(..)` operators; a name matching it is rejected
        excluded: Option<Regex>,
        dot: bool,
    },
}

impl Glob {
    /// Compile `pattern` into one glob per brace alternative
    pub fn compile(pattern: &str) -> Result<Vec<Glob>> {
        expand_braces(pattern.trim_start_matches("./"))
            .iter()
            .map(|alternative| {
                Self::compile_one(alternative).map_err(|reason| ResolveError::Pattern {
                    pattern: pattern.to_string(),
                    reason,
                })
            })
            .collect()
    }

    fn compile_one(pattern: &str) -> std::result::Result<Self, String> {
        let segments = split_segments(pattern)
            .iter()
            .map(|s| Segment::compile(s))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let basename = matches!(segments.as_slice(), [Segment::Match { .. }]);
        Ok(Self { segments, basename })
    }

    pub fn is_match(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').collect();
        if self.basename {
            parts
                .last()
                .is_some_and(|name| match_segments(&self.segments, &[*name]))
        } else {
            match_segments(&self.segments, &parts)
        }
    }
}

impl Segment {
    fn compile(text: &str) -> std::result::Result<Self, String> {
        if text == "**" {
            return Ok(Self::Globstar);
        }

        let chars: Vec<char> = text.chars().collect();
        let (positive, negated) = translate(&chars, Negation::Wildcard)?;
        let excluded = if negated {
            let (body, _) = translate(&chars, Negation::Body)?;
            Some(anchored(&body)?)
        } else {
            None
        };

        Ok(Self::Match {
            regex: anchored(&positive)?,
            excluded,
            dot: text.starts_with('.') || text.starts_with("\\."),
        })
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Globstar => !is_hidden(name),
            Self::Match {
                regex,
                excluded,
                dot,
            } => {
                if is_hidden(name) && !dot {
                    return false;
                }
                regex.is_match(name) && !excluded.as_ref().is_some_and(|r| r.is_match(name))
            }
        }
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn anchored(body: &str) -> std::result::Result<Regex, String> {
    Regex::new(&format!("^(?:{})$", body)).map_err(|e| e.to_string())
}

fn match_segments(segments: &[Segment], parts: &[&str]) -> bool {
    match segments.split_first() {
        None => parts.is_empty(),
        Some((Segment::Globstar, rest)) => {
            // `**` consumes zero or more visible directories
            for skip in 0..=parts.len() {
                if match_segments(rest, &parts[skip..]) {
                    return true;
                }
                if skip == parts.len() || is_hidden(parts[skip]) {
                    return false;
                }
            }
            false
        }
        Some((segment, rest)) => match parts.split_first() {
            Some((name, tail)) => segment.matches(name) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// How `!(..)` is rendered: as "anything" for the positive regex, or as
/// its own body for the exclusion regex.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Negation {
    Wildcard,
    Body,
}

/// Translate one segment to a regex body. Returns whether it used `!(..)`.
fn translate(chars: &[char], negation: Negation) -> std::result::Result<(String, bool), String> {
    let mut pos = 0;
    let mut out = String::new();
    let negated = translate_seq(chars, &mut pos, false, negation, &mut out)?;
    Ok((out, negated))
}

fn translate_seq(
    chars: &[char],
    pos: &mut usize,
    nested: bool,
    negation: Negation,
    out: &mut String,
) -> std::result::Result<bool, String> {
    let mut negated = false;

    while let Some(&c) = chars.get(*pos) {
        *pos += 1;
        match c {
            '\\' => match chars.get(*pos) {
                Some(&next) => {
                    *pos += 1;
                    push_literal(out, next);
                }
                None => push_literal(out, '\\'),
            },
            ')' if nested => return Ok(negated),
            '|' if nested => out.push('|'),
            '@' | '?' | '+' | '*' | '!' if chars.get(*pos) == Some(&'(') => {
                *pos += 1;
                let mut inner = String::new();
                negated |= translate_seq(chars, pos, true, negation, &mut inner)?;
                match c {
                    '@' => out.push_str(&format!("(?:{})", inner)),
                    '?' => out.push_str(&format!("(?:{})?", inner)),
                    '+' => out.push_str(&format!("(?:{})+", inner)),
                    '*' => out.push_str(&format!("(?:{})*", inner)),
                    _ => {
                        negated = true;
                        match negation {
                            Negation::Wildcard => out.push_str(".*"),
                            Negation::Body => out.push_str(&format!("(?:{})", inner)),
                        }
                    }
                }
            }
            '*' => {
                while chars.get(*pos) == Some(&'*') {
                    *pos += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => translate_class(chars, pos, out)?,
            _ => push_literal(out, c),
        }
    }

    if nested {
        Err("unclosed `(`".to_string())
    } else {
        Ok(negated)
    }
}

/// Translate a `[...]` class; `pos` points just past the `[`
fn translate_class(chars: &[char], pos: &mut usize, out: &mut String) -> std::result::Result<(), String> {
    let mut class = String::from("[");
    if matches!(chars.get(*pos), Some('!') | Some('^')) {
        class.push('^');
        *pos += 1;
    }

    let start = *pos;
    while let Some(&c) = chars.get(*pos) {
        *pos += 1;
        match c {
            ']' if *pos - 1 > start => {
                class.push(']');
                out.push_str(&class);
                return Ok(());
            }
            '\\' => {
                if let Some(&next) = chars.get(*pos) {
                    *pos += 1;
                    if matches!(next, '[' | ']' | '\\' | '^' | '-' | '&' | '~') {
                        class.push('\\');
                    }
                    class.push(next);
                }
            }
            '[' | ']' | '^' | '&' | '~' => {
                class.push('\\');
                class.push(c);
            }
            _ => class.push(c),
        }
    }

    Err("unclosed `[`".to_string())
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Split on `/` outside classes and extglob groups
fn split_segments(pattern: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_class = false;
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                continue;
            }
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => depth += 1,
            ')' if !in_class => depth = depth.saturating_sub(1),
            '/' if !in_class && depth == 0 => {
                segments.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }

    segments.push(current);
    segments
}

/// Expand `{a,b}` groups into separate patterns. Groups without a
/// top-level comma are kept as literal text.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((open, close, commas)) = find_brace_group(pattern) else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];

    let mut bounds = vec![open];
    bounds.extend(commas);
    bounds.push(close);

    bounds
        .windows(2)
        .flat_map(|w| expand_braces(&format!("{}{}{}", prefix, &pattern[w[0] + 1..w[1]], suffix)))
        .collect()
}

fn find_brace_group(pattern: &str) -> Option<(usize, usize, Vec<usize>)> {
    let bytes = pattern.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => {
                if let Some((close, commas)) = match_brace(bytes, i) {
                    if !commas.is_empty() {
                        return Some((i, close, commas));
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Find the `}` closing the group at `open` and its top-level commas
fn match_brace(bytes: &[u8], open: usize) -> Option<(usize, Vec<usize>)> {
    let mut depth = 0usize;
    let mut commas = Vec::new();
    let mut i = open;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((i, commas));
                }
            }
            b',' if depth == 1 => commas.push(i),
            _ => {}
        }
        i += 1;
    }

    None
}
