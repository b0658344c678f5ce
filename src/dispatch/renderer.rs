use std::error::Error as _;

use tera::{Context, Tera};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A mapping entry pointed at a path the payload does not contain.
    #[error("variable {name:?} did not resolve: payload has no value at {path:?}")]
    UnresolvedVariable { name: String, path: String },
    /// The template itself failed (syntax error, placeholder with no
    /// mapping, bad filter).
    #[error("template error: {0}")]
    Template(String),
}

/// Renders a routing's message template against an event payload.
///
/// Each entry of `mappings` (`placeholder name -> dot path`) is resolved
/// against the payload and fed to a one-off Tera render. Rendering is pure
/// and all-or-nothing: the same inputs always yield the same string, and
/// any unresolved placeholder fails the whole render rather than producing
/// partial output. Non-string mapping values are ignored.
pub fn render(
    template: &str,
    mappings: &serde_json::Value,
    payload: &serde_json::Value,
) -> Result<String, RenderError> {
    let mut context = Context::new();

    if let Some(entries) = mappings.as_object() {
        for (name, path_value) in entries {
            let Some(path) = path_value.as_str() else {
                continue;
            };
            let value =
                lookup_path(payload, path).ok_or_else(|| RenderError::UnresolvedVariable {
                    name: name.clone(),
                    path: path.to_string(),
                })?;
            context.insert(name, &value);
        }
    }

    Tera::one_off(template, &context, false).map_err(|err| {
        // Tera buries the interesting part ("variable not found") in the
        // error source chain.
        let mut detail = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }
        RenderError::Template(detail)
    })
}

/// Resolves a dot path (object keys and numeric array indices) into a JSON
/// value. An empty path resolves to nothing.
fn lookup_path(payload: &serde_json::Value, path: &str) -> Option<serde_json::Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = payload;
    for segment in path.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current.clone())
}
