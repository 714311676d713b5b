//! `package.json` `exports`/`imports` evaluation.
//!
//! Follows Node's rules: condition objects are matched in key order against
//! the active condition set (`default` always matches), arrays are tried in
//! order, and `*` pattern keys substitute into their targets. The most
//! specific pattern (longest prefix before `*`) wins.

use super::scan::ImportKind;
use serde_json::{Map, Value};

/// Conditions active for an import kind.
#[must_use]
pub fn conditions_for(kind: ImportKind) -> &'static [&'static str] {
    match kind {
        ImportKind::Import => &["node", "import", "default"],
        ImportKind::Require => &["node", "require", "default"],
    }
}

/// Resolve `subpath` (`"."` or `"./feature"`) through an `exports` field.
///
/// Returns the target relative to the package root (starting with `./`).
#[must_use]
pub fn resolve_exports(exports: &Value, subpath: &str, conditions: &[&str]) -> Option<String> {
    if let Some(obj) = exports.as_object() {
        if has_subpath_keys(obj) {
            return resolve_in_map(obj, subpath, conditions, false);
        }
    }

    // String, array, or a root-level conditions object
    (subpath == ".")
        .then(|| resolve_target(exports, None, conditions, false))
        .flatten()
}

/// Resolve a `#`-prefixed specifier through an `imports` field.
///
/// Targets may be package-relative (`./x.js`) or bare specifiers that are
/// resolved again by the caller.
#[must_use]
pub fn resolve_imports(imports: &Value, specifier: &str, conditions: &[&str]) -> Option<String> {
    if !specifier.starts_with('#') {
        return None;
    }
    resolve_in_map(imports.as_object()?, specifier, conditions, true)
}

fn has_subpath_keys(obj: &Map<String, Value>) -> bool {
    obj.keys().any(|k| k.starts_with('.'))
}

fn resolve_in_map(
    map: &Map<String, Value>,
    key: &str,
    conditions: &[&str],
    allow_bare: bool,
) -> Option<String> {
    if !key.contains('*') {
        if let Some(target) = map.get(key) {
            return resolve_target(target, None, conditions, allow_bare);
        }
    }

    let mut best: Option<(&str, &Value, &str)> = None;
    for (pattern, target) in map {
        let Some((prefix, suffix)) = pattern.split_once('*') else {
            continue;
        };
        if suffix.contains('*') {
            continue;
        }
        if key.len() < prefix.len() + suffix.len() + 1
            || !key.starts_with(prefix)
            || !key.ends_with(suffix)
        {
            continue;
        }
        let better = best.map_or(true, |(best_pattern, _, _)| {
            pattern_key_compare(pattern, best_pattern)
        });
        if better {
            let star = &key[prefix.len()..key.len() - suffix.len()];
            best = Some((pattern.as_str(), target, star));
        }
    }

    let (_, target, star) = best?;
    resolve_target(target, Some(star), conditions, allow_bare)
}

/// Whether pattern `a` is more specific than `b`.
fn pattern_key_compare(a: &str, b: &str) -> bool {
    let a_base = a.find('*').unwrap_or(a.len());
    let b_base = b.find('*').unwrap_or(b.len());
    if a_base != b_base {
        return a_base > b_base;
    }
    a.len() > b.len()
}

fn resolve_target(
    target: &Value,
    star: Option<&str>,
    conditions: &[&str],
    allow_bare: bool,
) -> Option<String> {
    match target {
        Value::String(s) => {
            let resolved = match star {
                Some(value) => s.replace('*', value),
                None => s.clone(),
            };
            valid_target(&resolved, allow_bare).then_some(resolved)
        }
        Value::Array(items) => items
            .iter()
            .find_map(|item| resolve_target(item, star, conditions, allow_bare)),
        Value::Object(obj) => obj
            .iter()
            .filter(|(cond, _)| cond.as_str() == "default" || conditions.contains(&cond.as_str()))
            .find_map(|(_, nested)| resolve_target(nested, star, conditions, allow_bare)),
        _ => None,
    }
}

fn valid_target(target: &str, allow_bare: bool) -> bool {
    if target.split('/').any(|segment| segment == ".." || segment == "node_modules") {
        return false;
    }
    if target.starts_with("./") {
        return true;
    }
    allow_bare && !target.starts_with('/') && !target.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const IMPORT: &[&str] = &["node", "import", "default"];
    const REQUIRE: &[&str] = &["node", "require", "default"];

    #[test]
    fn test_string_and_root_conditions() {
        assert_eq!(
            resolve_exports(&json!("./index.js"), ".", IMPORT),
            Some("./index.js".into())
        );
        assert_eq!(resolve_exports(&json!("./index.js"), "./x", IMPORT), None);

        let exports = json!({ "import": "./esm.mjs", "require": "./cjs.js" });
        assert_eq!(resolve_exports(&exports, ".", IMPORT), Some("./esm.mjs".into()));
        assert_eq!(resolve_exports(&exports, ".", REQUIRE), Some("./cjs.js".into()));
    }

    #[test]
    fn test_condition_key_order_wins() {
        // "default" listed first matches before "require"
        let exports = json!({ ".": { "default": "./d.js", "require": "./r.js" } });
        assert_eq!(resolve_exports(&exports, ".", REQUIRE), Some("./d.js".into()));

        let nested = json!({ ".": { "node": { "import": "./n.mjs", "require": "./n.cjs" }, "default": "./d.js" } });
        assert_eq!(resolve_exports(&nested, ".", REQUIRE), Some("./n.cjs".into()));

        let browser_only = json!({ ".": { "browser": "./b.js" } });
        assert_eq!(resolve_exports(&browser_only, ".", IMPORT), None);
    }

    #[test]
    fn test_subpaths_and_patterns() {
        let exports = json!({
            ".": "./index.js",
            "./feature": { "require": "./feature.cjs" },
            "./utils/*": "./dist/utils/*.js",
            "./utils/internal/*": null,
            "./*": "./dist/*.js"
        });
        assert_eq!(
            resolve_exports(&exports, "./feature", REQUIRE),
            Some("./feature.cjs".into())
        );
        assert_eq!(
            resolve_exports(&exports, "./utils/a", IMPORT),
            Some("./dist/utils/a.js".into())
        );
        assert_eq!(resolve_exports(&exports, "./utils/internal/x", IMPORT), None);
        assert_eq!(
            resolve_exports(&exports, "./other", IMPORT),
            Some("./dist/other.js".into())
        );
    }

    #[test]
    fn test_arrays_and_invalid_targets() {
        let exports = json!({ ".": ["../escape.js", "./ok.js"] });
        assert_eq!(resolve_exports(&exports, ".", IMPORT), Some("./ok.js".into()));
        assert_eq!(resolve_exports(&json!("index.js"), ".", IMPORT), None);
    }

    #[test]
    fn test_imports_field() {
        let imports = json!({
            "#dep": { "node": "dep-node", "default": "./polyfill.js" },
            "#internal/*": "./src/internal/*.js"
        });
        assert_eq!(
            resolve_imports(&imports, "#dep", IMPORT),
            Some("dep-node".into())
        );
        assert_eq!(
            resolve_imports(&imports, "#internal/a", REQUIRE),
            Some("./src/internal/a.js".into())
        );
        assert_eq!(resolve_imports(&imports, "dep", IMPORT), None);
    }
}
