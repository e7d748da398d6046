//! Prompt rendering
//!
//! The dispatcher treats rendering as an opaque pure function. The bundled
//! `VariableRenderer` substitutes `{{ dotted.path }}` placeholders from a JSON
//! value and fails on anything it cannot resolve.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Placeholder pattern, e.g. `{{ event.value }}`
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("PLACEHOLDER is a compile-time constant")
});

/// Valid variable path
static VARIABLE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*(\.[A-Za-z0-9_\-]+)*$")
        .expect("VARIABLE_PATH is a compile-time constant")
});

/// Rendering failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Placeholder refers to a value that is not present
    #[error("missing variable '{0}'")]
    MissingVariable(String),

    /// Placeholder is not a valid variable path
    #[error("invalid placeholder '{0}'")]
    InvalidPlaceholder(String),
}

/// Renders prompt templates
pub trait PromptRenderer: Send + Sync {
    /// Render `template` against `vars`
    fn render(&self, template: &str, vars: &serde_json::Value) -> Result<String, RenderError>;
}

/// `{{ path }}` substitution over a JSON value
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableRenderer;

impl VariableRenderer {
    fn lookup<'a>(vars: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
        path.split('.').try_fold(vars, |value, segment| match value {
            serde_json::Value::Object(map) => map.get(segment),
            serde_json::Value::Array(items) => {
                segment.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => None,
        })
    }
}

impl PromptRenderer for VariableRenderer {
    fn render(&self, template: &str, vars: &serde_json::Value) -> Result<String, RenderError> {
        let mut output = String::with_capacity(template.len());
        let mut last = 0;

        for captures in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(path)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let path = path.as_str();
            if !VARIABLE_PATH.is_match(path) {
                return Err(RenderError::InvalidPlaceholder(path.to_string()));
            }

            let value = Self::lookup(vars, path)
                .filter(|v| !v.is_null())
                .ok_or_else(|| RenderError::MissingVariable(path.to_string()))?;

            output.push_str(&template[last..whole.start()]);
            match value {
                serde_json::Value::String(s) => output.push_str(s),
                other => output.push_str(&other.to_string()),
            }
            last = whole.end();
        }

        output.push_str(&template[last..]);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> serde_json::Value {
        json!({
            "agent": {"id": "writer"},
            "event": {"name": "start", "value": "build a parser", "metadata": {"n": 3}},
            "variables": {"langs": ["rust", "go"]}
        })
    }

    #[test]
    fn test_render_substitutes() {
        let out = VariableRenderer
            .render(
                "{{agent.id}} handles {{ event.name }}: {{event.value}} ({{event.metadata.n}}, {{variables.langs.0}})",
                &vars(),
            )
            .unwrap();
        assert_eq!(out, "writer handles start: build a parser (3, rust)");
    }

    #[test]
    fn test_render_without_placeholders() {
        assert_eq!(VariableRenderer.render("plain", &vars()).unwrap(), "plain");
    }

    #[test]
    fn test_missing_variable() {
        let err = VariableRenderer
            .render("hello {{ agent.name }}", &vars())
            .unwrap_err();
        assert_eq!(err, RenderError::MissingVariable("agent.name".to_string()));
    }

    #[test]
    fn test_invalid_placeholder() {
        let err = VariableRenderer.render("{{ not valid }}", &vars()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidPlaceholder(_)));
    }
}
