//! Removal of authentication requirements from an `OpenAPI` document.
//!
//! The shim proxies anonymously, so security requirements would only make generated tools ask
//! for credentials that are stripped on the wire anyway.

use serde_json::Value;

/// Return a copy of `spec` without security requirements.
///
/// Removes the top-level `security`, `components.securitySchemes`, and `security` on every
/// operation object under `paths`. Everything else, key order included, is left untouched.
/// Non-object input is returned unchanged.
#[must_use]
pub fn without_security(spec: &Value) -> Value {
    let mut out = spec.clone();
    let removed = strip_security(&mut out);
    tracing::debug!(removed, "Stripped security requirements from OpenAPI spec");
    out
}

fn strip_security(spec: &mut Value) -> usize {
    let Some(root) = spec.as_object_mut() else {
        return 0;
    };

    // Map is an IndexMap (preserve_order); shift_remove keeps the remaining keys in place.
    let mut removed = usize::from(root.shift_remove("security").is_some());

    if let Some(components) = root.get_mut("components").and_then(Value::as_object_mut) {
        removed += usize::from(components.shift_remove("securitySchemes").is_some());
    }

    if let Some(paths) = root.get_mut("paths").and_then(Value::as_object_mut) {
        for path_item in paths.values_mut().filter_map(Value::as_object_mut) {
            for operation in path_item.values_mut().filter_map(Value::as_object_mut) {
                removed += usize::from(operation.shift_remove("security").is_some());
            }
        }
    }

    removed
}
