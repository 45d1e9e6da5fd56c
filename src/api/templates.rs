//! HTML pages rendered with handlebars.
//!
//! The `index`, `activate` and `protected` pages are embedded in the binary.
//! A templates directory replaces them and may add `protected_<page>` pages.

use anyhow::{bail, Context, Result};
use handlebars::{DirectorySourceOptions, Handlebars};
use serde::Serialize;
use std::path::Path;

use super::error::Error;

const EMBEDDED: [(&str, &str); 3] = [
    ("index", include_str!("../../templates/index.hbs")),
    ("activate", include_str!("../../templates/activate.hbs")),
    ("protected", include_str!("../../templates/protected.hbs")),
];

#[derive(Debug, Clone)]
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    /// Templates compiled into the binary.
    ///
    /// # Errors
    /// Returns an error if an embedded template does not parse.
    pub fn embedded() -> Result<Self> {
        let mut registry = Handlebars::new();
        for (name, source) in EMBEDDED {
            registry
                .register_template_string(name, source)
                .with_context(|| format!("Failed to parse embedded template {name}"))?;
        }
        Ok(Self { registry })
    }

    /// Load every `*.hbs` file under `path`; the file stem is the template name.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read or a template does not parse.
    pub fn from_dir(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            bail!("Templates path is not a directory: {}", path.display());
        }
        let mut registry = Handlebars::new();
        registry
            .register_templates_directory(path, DirectorySourceOptions::default())
            .with_context(|| format!("Failed to load templates from {}", path.display()))?;
        Ok(Self { registry })
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    /// # Errors
    /// [`Error::Internal`] when the template is missing or fails to render.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, Error> {
        self.registry
            .render(name, data)
            .with_context(|| format!("Failed to render template {name}"))
            .map_err(Error::Internal)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use uuid::Uuid;

    #[test]
    fn embedded_templates_render() {
        let templates = Templates::embedded().unwrap();
        assert!(templates.has("index"));
        assert!(templates.has("activate"));
        assert!(templates.has("protected"));

        let html = templates
            .render(
                "activate",
                &json!({"valid": false, "error_message": "Link expired"}),
            )
            .unwrap();
        assert!(html.contains("Link expired"));
    }

    #[test]
    fn values_are_html_escaped() {
        let templates = Templates::embedded().unwrap();
        let html = templates
            .render("protected", &json!({"user": "<script>"}))
            .unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<strong><script>"));
    }

    #[test]
    fn missing_template_is_internal_error() {
        let templates = Templates::embedded().unwrap();
        let err = templates.render("protected_admin", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn directory_templates_replace_embedded_ones() {
        let dir = std::env::temp_dir().join(format!("rpa-templates-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("protected_reports.hbs"), "reports for {{user}}").unwrap();

        let templates = Templates::from_dir(&dir).unwrap();
        let _ = fs::remove_dir_all(&dir);

        assert!(templates.has("protected_reports"));
        assert!(!templates.has("index"));
        assert_eq!(
            templates
                .render("protected_reports", &json!({"user": "alice"}))
                .unwrap(),
            "reports for alice"
        );
    }
}
