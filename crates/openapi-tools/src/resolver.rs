//! `OpenAPI` `$ref` resolution.
//!
//! `openapiv3` models references with `ReferenceOr<T>` but never follows them. The upstream
//! description is a single self-contained document, so only document-local refs (`#/...`) are
//! supported; anything else is reported as an error instead of being fetched.

use crate::error::{OpenApiToolsError, Result};
use openapiv3::ReferenceOr;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// How many nested schema `$ref`s are inlined before the remainder is replaced by `{}`.
///
/// Recursive schemas would otherwise expand forever.
pub const MAX_SCHEMA_INLINE_DEPTH: usize = 8;

/// Resolves local refs against the JSON form of the document they came from.
pub struct ComponentResolver<'a> {
    root: &'a Value,
}

impl<'a> ComponentResolver<'a> {
    #[must_use]
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// Follow a chain of refs until a concrete `T` is reached.
    ///
    /// # Errors
    ///
    /// Returns an error for non-local refs, dangling pointers, cycles, or targets that do not
    /// deserialize as `T`.
    pub fn resolve<T>(&self, item: &ReferenceOr<T>) -> Result<T>
    where
        T: DeserializeOwned + Clone,
    {
        let mut reference = match item {
            ReferenceOr::Item(value) => return Ok(value.clone()),
            ReferenceOr::Reference { reference } => reference.clone(),
        };

        let mut seen = HashSet::new();
        loop {
            if !seen.insert(reference.clone()) {
                return Err(OpenApiToolsError::OpenApi(format!(
                    "Cyclic $ref detected at '{reference}'"
                )));
            }

            let target = self.lookup(&reference)?;
            let next: ReferenceOr<T> = serde_json::from_value(target.clone()).map_err(|e| {
                OpenApiToolsError::OpenApi(format!("Failed to parse $ref target '{reference}': {e}"))
            })?;

            match next {
                ReferenceOr::Item(value) => return Ok(value),
                ReferenceOr::Reference { reference: r } => reference = r,
            }
        }
    }

    /// JSON Schema for `schema` with local refs inlined up to [`MAX_SCHEMA_INLINE_DEPTH`].
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be serialized or names a non-local ref.
    pub fn schema_json<T: serde::Serialize>(&self, schema: &T) -> Result<Value> {
        let mut value = serde_json::to_value(schema)?;
        self.inline_refs(&mut value, MAX_SCHEMA_INLINE_DEPTH)?;
        Ok(value)
    }

    fn inline_refs(&self, value: &mut Value, depth: usize) -> Result<()> {
        match value {
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    let mut target = if depth == 0 {
                        Value::Object(Map::new())
                    } else {
                        self.lookup(reference)?.clone()
                    };
                    if depth > 0 {
                        self.inline_refs(&mut target, depth - 1)?;
                    }
                    *value = target;
                    return Ok(());
                }
                for child in map.values_mut() {
                    self.inline_refs(child, depth)?;
                }
            }
            Value::Array(items) => {
                for child in items {
                    self.inline_refs(child, depth)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn lookup(&self, reference: &str) -> Result<&'a Value> {
        let Some(pointer) = reference.strip_prefix('#') else {
            return Err(OpenApiToolsError::OpenApi(format!(
                "Unsupported non-local $ref '{reference}'"
            )));
        };
        self.root.pointer(pointer).ok_or_else(|| {
            OpenApiToolsError::OpenApi(format!("Unresolvable $ref '{reference}'"))
        })
    }
}
