//! Client-side bootstrap: the embedded tracker and polyfill sources and
//! the instantiation call that binds a tracker for one build.
//!
//! The sources refer to the tracker instance through a placeholder that is
//! replaced by the build's binding name (`sb<master hash>`), so several
//! embeds with different resource sets never share an instance.

use crate::resource::PendingSet;
use serde_json::Value;

/// Tracker constructor and its `onloadScript` / `loaded` methods.
pub const TRACKER_SOURCE: &str = include_str!("../assets/tracker.js");

/// Preload polyfill; only needed when styles are preloaded.
pub const PRELOAD_SOURCE: &str = include_str!("../assets/preload.js");

pub const INSTANCE_PLACEHOLDER: &str = "SHORTBREAD_INSTANCE";

/// Global name of the tracker instance for a master hash.
pub fn binding_name(master_hash: &str) -> String {
    format!("sb{master_hash}")
}

/// JSON literal safe to place inside an inline `<script>`.
fn literal(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// `var SHORTBREAD_INSTANCE = new Shortbread(set, hash, slot, callback);`
pub fn instantiation(
    pending: &PendingSet,
    master_hash: Option<&str>,
    slot: Option<&str>,
    callback: Option<&str>,
) -> String {
    format!(
        "var {INSTANCE_PLACEHOLDER} = new Shortbread({}, {}, {}, {});",
        literal(&pending.to_json()),
        literal(&Value::from(master_hash)),
        literal(&Value::from(slot)),
        literal(&Value::from(callback)),
    )
}

/// Drop indentation and blank lines. Line breaks are kept, so automatic
/// semicolon insertion sees the same source.
fn compact(source: &str) -> String {
    source
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// The complete inline `<script>` element for the initial fragment.
pub fn bootstrap(with_polyfill: bool, instantiation: &str, binding: &str) -> String {
    let mut source = String::with_capacity(
        TRACKER_SOURCE.len() + PRELOAD_SOURCE.len() + instantiation.len(),
    );
    source.push_str(TRACKER_SOURCE);
    if with_polyfill {
        source.push_str(PRELOAD_SOURCE);
    }
    source.push_str(instantiation);
    let source = compact(&source).replace(INSTANCE_PLACEHOLDER, binding);
    format!("<script>\"use strict\";{source}</script>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Weight;

    #[test]
    fn instantiation_literals() {
        let set = PendingSet::list(["a1", "b2"]);
        assert_eq!(
            instantiation(&set, Some("ff00"), None, Some("allLoaded")),
            r#"var SHORTBREAD_INSTANCE = new Shortbread(["a1","b2"], "ff00", null, "allLoaded");"#
        );

        let w = PendingSet::weighted([("a1", Weight::Required), ("p", Weight::Prefetch)]);
        assert_eq!(
            instantiation(&w, Some("ff00"), Some("main"), None),
            r#"var SHORTBREAD_INSTANCE = new Shortbread({"a1":1,"p":0}, "ff00", "main", null);"#
        );
    }

    #[test]
    fn script_close_tags_are_escaped() {
        let set = PendingSet::list(["a"]);
        let call = instantiation(&set, None, None, Some("</script>"));
        assert!(!call.contains("</script>"));
    }

    #[test]
    fn bootstrap_binds_placeholder_and_gates_polyfill() {
        let call = instantiation(&PendingSet::list(["a"]), Some("ff00"), None, None);
        let without = bootstrap(false, &call, "sbff00");
        assert!(without.starts_with("<script>\"use strict\";function Shortbread("));
        assert!(without.ends_with("</script>"));
        assert!(without.contains("var sbff00 = new Shortbread("));
        assert!(!without.contains(INSTANCE_PLACEHOLDER));
        assert!(!without.contains("relList"));

        let with = bootstrap(true, &call, "sbff00");
        assert!(with.contains("relList"));
        assert!(with.contains("sbff00.loaded(id)"));
    }
}
