//! Email body resolution and rendering.
//!
//! The body source is either the request's inline `body` or a named template
//! read from a [`TemplateStore`]. The source is rendered with [`tera`] against
//! the request's `data`, whose keys are title-cased first so templates can
//! reference them the Go way: `{{ .Name }}`.

pub mod store;

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tera::{Context, Tera};
use tracing::{debug, info};

use crate::error::SendError;
use crate::request::SendRequest;

pub use store::{DirTemplateStore, HttpTemplateStore, MemoryTemplateStore, TemplateStore};

/// A `{{ … }}` or `{% … %}` tag.
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}").expect("valid tag regex"));

/// A leading-dot variable reference such as `.Name`, not an attribute access.
static DOT_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(^|[^\w.\])'"])\.([A-Za-z_][A-Za-z0-9_]*)"#).expect("valid reference regex")
});

/// Resolves and renders the HTML body of a [`SendRequest`].
#[derive(Clone)]
pub struct TemplateResolver {
    store: Arc<dyn TemplateStore>,
}

impl TemplateResolver {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    /// Produce the fully rendered body for `request`.
    ///
    /// Fails with [`SendError::ReadTemplate`] when the named template cannot
    /// be fetched and [`SendError::Render`] when it cannot be rendered.
    pub async fn resolve(&self, request: &SendRequest) -> Result<String, SendError> {
        let source = match request.inline_body() {
            Some(body) => Cow::Borrowed(body),
            None => {
                let name = request.template_name().unwrap_or_default();
                Cow::Owned(self.read_template(name).await?)
            }
        };

        render(&source, &request.data)
    }

    async fn read_template(&self, name: &str) -> Result<String, SendError> {
        let bytes = self
            .store
            .read_all(name)
            .await
            .map_err(|source| SendError::ReadTemplate {
                name: name.to_string(),
                source,
            })?;

        info!(template = name, template_length = bytes.len(), "template_read");

        String::from_utf8(bytes)
            .map_err(|e| SendError::Render(format!("template {name} is not valid UTF-8: {e}")))
    }
}

/// Render `source` with `data` bound under title-cased keys.
///
/// Referencing a variable that is not bound is an error, including inside
/// `{% if %}` conditions. Keys that title-case to `True` or `False` cannot be
/// referenced. Bound values are HTML-escaped; markup in `source` itself is
/// emitted unchanged.
pub fn render(source: &str, data: &Map<String, Value>) -> Result<String, SendError> {
    let mut context = Context::new();
    for (key, value) in data {
        context.insert(title_case(key), value);
    }

    for name in dot_references(source) {
        if matches!(name, "True" | "False") {
            return Err(SendError::Render(format!(
                "variable {name:?} collides with a boolean literal"
            )));
        }
        if !context.contains_key(name) {
            return Err(SendError::Render(format!("variable {name:?} is not defined")));
        }
    }

    let source = normalize_references(source);
    debug!(
        variables = data.len(),
        source_length = source.len(),
        "template_render_start"
    );

    Tera::one_off(&source, &context, true).map_err(|e| SendError::Render(describe(&e)))
}

/// Capitalize the first letter of every word and lowercase the rest.
///
/// Words are runs of alphanumerics, `_` and `'`.
pub fn title_case(key: &str) -> String {
    let mut titled = String::with_capacity(key.len());
    let mut word_start = true;

    for c in key.chars() {
        if c.is_alphanumeric() || c == '_' || c == '\'' {
            if word_start {
                titled.extend(c.to_uppercase());
            } else {
                titled.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            titled.push(c);
            word_start = true;
        }
    }

    titled
}

/// Root names referenced with a leading dot inside tags.
fn dot_references(source: &str) -> Vec<&str> {
    TAG.find_iter(source)
        .flat_map(|tag| DOT_REFERENCE.captures_iter(tag.as_str()))
        .filter_map(|caps| caps.get(2).map(|name| name.as_str()))
        .collect()
}

/// Rewrite `{{ .Name }}` style references into plain tera identifiers.
fn normalize_references(source: &str) -> Cow<'_, str> {
    TAG.replace_all(source, |tag: &Captures| {
        DOT_REFERENCE.replace_all(&tag[0], "${1}${2}").into_owned()
    })
}

/// Flatten a tera error and its causes into one line.
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
