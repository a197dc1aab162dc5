//! Graphite path globs
//!
//! Supported syntax within a dotted path: `*` (one or more characters of a
//! single segment), `?` (exactly one character), `[0-9]` (digit range) and
//! `{a,b}` (alternatives). Anything else outside `[A-Za-z0-9_-.]` is
//! rejected.

use crate::error::{Result, StorageError};
use regex::Regex;

/// Compiled glob matching whole paths
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
    depth: usize,
    exact: bool,
}

impl GlobPattern {
    pub fn new(glob: &str) -> Result<Self> {
        if glob.is_empty() {
            return Err(StorageError::IndexError("empty query".to_string()));
        }

        let bytes = glob.as_bytes();
        let mut out = String::with_capacity(glob.len() * 2 + 2);
        let mut exact = true;
        let mut i = 0;

        out.push('^');
        while i < bytes.len() {
            let c = bytes[i];
            match c {
                b'.' => {
                    out.push_str(r"\.");
                    i += 1;
                }
                b'*' => {
                    exact = false;
                    out.push_str("[^.]+");
                    i += 1;
                }
                b'?' => {
                    exact = false;
                    out.push_str("[^.]");
                    i += 1;
                }
                b'[' => {
                    exact = false;
                    i = push_range(glob, i, &mut out)?;
                }
                b'{' => {
                    exact = false;
                    i = push_alternatives(glob, i, &mut out)?;
                }
                c if is_path_char(c) => {
                    out.push(c as char);
                    i += 1;
                }
                other => {
                    return Err(StorageError::IndexError(format!(
                        "invalid character '{}' in query '{}'",
                        other as char, glob
                    )))
                }
            }
        }
        out.push('$');

        let regex = Regex::new(&out).map_err(|e| StorageError::IndexError(e.to_string()))?;

        Ok(Self {
            source: glob.to_string(),
            regex,
            depth: glob.matches('.').count(),
            exact,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Number of dots; matches are nodes at this depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True when the glob has no wildcards
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Equivalent regex source, usable by backends with POSIX-style regex
    pub fn regex_str(&self) -> &str {
        self.regex.as_str()
    }
}

fn is_path_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_'
}

/// `[a-b]` where a and b are digits and a < b
fn push_range(glob: &str, start: usize, out: &mut String) -> Result<usize> {
    let bad = || StorageError::IndexError(format!("bad range in query '{}'", glob));
    let body = glob.as_bytes().get(start..start + 5).ok_or_else(bad)?;

    match body {
        [b'[', lo, b'-', hi, b']'] if lo.is_ascii_digit() && hi.is_ascii_digit() && hi > lo => {
            out.push('[');
            out.push(*lo as char);
            out.push('-');
            out.push(*hi as char);
            out.push(']');
            Ok(start + 5)
        }
        _ => Err(bad()),
    }
}

/// `{a,b,c}` with alphanumeric alternatives
fn push_alternatives(glob: &str, start: usize, out: &mut String) -> Result<usize> {
    let rest = &glob[start + 1..];
    let end = rest
        .find('}')
        .ok_or_else(|| StorageError::IndexError(format!("unclosed '{{' in query '{}'", glob)))?;
    let body = &rest[..end];

    if body.is_empty() || !body.bytes().all(|c| c.is_ascii_alphanumeric() || c == b',') {
        return Err(StorageError::IndexError(format!(
            "bad alternatives in query '{}'",
            glob
        )));
    }

    out.push('(');
    out.push_str(&body.replace(',', "|"));
    out.push(')');
    Ok(start + 1 + end + 1)
}
