//! Import specifier scanner.
//!
//! Finds `import`/`export … from`, dynamic `import("…")` and
//! `require("…")` specifiers without parsing. Comments are blanked out
//! first so commented-out imports are not followed.

use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// How a specifier is loaded; selects `exports` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// `import`, `export … from` and `import()`.
    Import,
    /// `require()`.
    Require,
}

/// One specifier found in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub specifier: String,
    pub kind: ImportKind,
}

impl ImportRef {
    #[must_use]
    pub fn new(specifier: impl Into<String>, kind: ImportKind) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
        }
    }
}

/// File extensions the scanner understands.
pub const SCANNABLE_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx", "ts", "tsx", "mts", "cts"];

struct Patterns {
    from_clause: Regex,
    bare_import: Regex,
    dynamic_import: Regex,
    require: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                from_clause: Regex::new(
                    r#"\b(import|export)\s+([^;'"`()]*?)\bfrom\s*['"]([^'"\n]+)['"]"#,
                )
                .ok()?,
                bare_import: Regex::new(r#"\bimport\s*['"]([^'"\n]+)['"]"#).ok()?,
                dynamic_import: Regex::new(r#"\bimport\s*\(\s*['"`]([^'"`\n]+)['"`]\s*[,)]"#)
                    .ok()?,
                require: Regex::new(r#"\brequire\s*\(\s*['"`]([^'"`\n]+)['"`]\s*\)"#).ok()?,
            })
        })
        .as_ref()
}

/// Scan source code for import specifiers.
///
/// Returns specifiers in source order, deduplicated by specifier and kind.
/// Type-only imports and exports are skipped, as are template literals
/// with substitutions.
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ImportRef> {
    let Some(p) = patterns() else {
        return Vec::new();
    };
    let code = strip_comments(source);
    let mut found: Vec<(usize, ImportRef)> = Vec::new();

    for caps in p.from_clause.captures_iter(&code) {
        let clause = caps.get(2).map_or("", |m| m.as_str());
        if is_type_only(clause) {
            continue;
        }
        if let (Some(whole), Some(spec)) = (caps.get(0), caps.get(3)) {
            found.push((whole.start(), ImportRef::new(spec.as_str(), ImportKind::Import)));
        }
    }

    let singles = [
        (&p.bare_import, ImportKind::Import),
        (&p.dynamic_import, ImportKind::Import),
        (&p.require, ImportKind::Require),
    ];
    for (re, kind) in singles {
        for caps in re.captures_iter(&code) {
            if let (Some(whole), Some(spec)) = (caps.get(0), caps.get(1)) {
                found.push((whole.start(), ImportRef::new(spec.as_str(), kind)));
            }
        }
    }

    found.sort_by_key(|(offset, _)| *offset);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .map(|(_, r)| r)
        .filter(|r| !r.specifier.contains("${"))
        .filter(|r| seen.insert((r.specifier.clone(), r.kind)))
        .collect()
}

fn is_type_only(clause: &str) -> bool {
    let clause = clause.trim_start();
    match clause.strip_prefix("type") {
        Some(rest) => rest.starts_with(|c: char| c.is_whitespace() || c == '{' || c == '*'),
        None => false,
    }
}

/// Replace comments with spaces, leaving string and template literals intact.
fn strip_comments(source: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(char),
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::BlockComment;
                }
                '"' | '\'' | '`' => {
                    out.push(c);
                    state = State::Str(c);
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            State::Str(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote || (c == '\n' && quote != '`') {
                    state = State::Code;
                }
            }
        }
    }

    out
}
