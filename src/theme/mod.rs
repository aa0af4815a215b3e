//! Template engine
//!
//! This module provides page rendering using Tera.
//! Features:
//! - Templates embedded in the binary from `templates/`
//! - Optional on-disk directory whose templates replace embedded ones by name
//! - Standard template variables (site name, current user)
//! - Fallback to an error page when rendering fails

use anyhow::Result;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};

use crate::models::User;

mod error;

pub use error::ThemeError;

/// Templates compiled into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Template engine for rendering pages
pub struct ThemeEngine {
    /// Tera template engine instance
    tera: Tera,
}

impl ThemeEngine {
    /// Create a template engine
    ///
    /// Embedded templates are loaded first. When `override_path` is set, every
    /// `.html` file below it replaces (or adds) the template with the same
    /// relative name.
    pub fn new(override_path: Option<&Path>) -> Result<Self> {
        let mut templates: BTreeMap<String, String> = BTreeMap::new();
        collect_embedded_templates(&mut templates)?;

        if let Some(dir) = override_path {
            if !dir.is_dir() {
                return Err(ThemeError::OverrideDirNotFound(dir.to_path_buf()).into());
            }
            let before = templates.len();
            collect_templates_from_dir(dir, dir, &mut templates)?;
            tracing::info!(
                "Loaded template overrides from {:?} ({} new names)",
                dir,
                templates.len() - before
            );
        }

        let mut tera = Tera::default();

        // Base templates first so `extends` resolves
        let (bases, rest): (Vec<_>, Vec<_>) = templates
            .into_iter()
            .partition(|(name, _)| name == "base.html" || name.ends_with("/base.html"));

        for (name, content) in bases.into_iter().chain(rest) {
            tera.add_raw_template(&name, &content).map_err(|e| {
                ThemeError::TemplateError(format!("Failed to add template {}: {}", name, e))
            })?;
        }

        tera.build_inheritance_chains().map_err(|e| {
            ThemeError::TemplateError(format!("Failed to build template inheritance: {}", e))
        })?;

        Ok(Self { tera })
    }

    /// Engine with only the embedded templates
    pub fn embedded() -> Result<Self> {
        Self::new(None)
    }

    /// Render a template with context
    ///
    /// Errors carry the whole Tera cause chain.
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            ThemeError::TemplateError(error_msg).into()
        })
    }

    /// Render a template with standard variables automatically added
    pub fn render_page(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        self.render(template, &standard_vars.extend(context))
    }

    /// Render a template, falling back to `error.html` and then to a bare
    /// HTML page. Never fails.
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(
                    "Failed to render template '{}': {}, trying error template",
                    template,
                    e
                );

                let mut error_context = context.clone();
                error_context.insert("status", "500");
                error_context.insert("error_message", "The page could not be displayed.");

                match self.render("error.html", &error_context) {
                    Ok(html) => html,
                    Err(error_template_err) => {
                        tracing::error!(
                            "Failed to render error template: {}, returning simple HTML error page",
                            error_template_err
                        );
                        simple_error_page("500", "The page could not be displayed.")
                    }
                }
            }
        }
    }

    /// Names of all loaded templates, sorted
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tera.get_template_names().map(String::from).collect();
        names.sort();
        names
    }
}

/// Minimal page used when even `error.html` cannot be rendered
pub fn simple_error_page(status: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{status}</title>
</head>
<body>
    <h1>{status}</h1>
    <p>{message}</p>
</body>
</html>"#,
        status = status,
        message = message
    )
}

fn collect_embedded_templates(templates: &mut BTreeMap<String, String>) -> Result<()> {
    for name in EmbeddedTemplates::iter() {
        let Some(file) = EmbeddedTemplates::get(&name) else {
            continue;
        };
        let content = String::from_utf8(file.data.into_owned()).map_err(|e| {
            ThemeError::TemplateError(format!("Template {} is not UTF-8: {}", name, e))
        })?;
        templates.insert(name.replace('\\', "/"), content);
    }
    Ok(())
}

/// Recursively collect `.html` files with names relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut BTreeMap<String, String>,
) -> Result<(), ThemeError> {
    for entry in fs::read_dir(current_path)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().map_or(false, |ext| ext == "html") {
            let relative_path = path.strip_prefix(base_path).map_err(|_| {
                ThemeError::TemplateError("Failed to get relative path".to_string())
            })?;

            // Forward slashes on every platform
            let template_name = relative_path.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)?;

            templates.insert(template_name, content);
        }
    }

    Ok(())
}

/// Standard template variables available on every page
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    /// Site title shown in the header
    pub site_name: String,
    /// Current logged-in user (optional)
    pub current_user: Option<CurrentUser>,
}

/// Current user information for templates
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

impl StandardTemplateVars {
    /// Create new standard template variables
    pub fn new(site_name: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            current_user: None,
        }
    }

    /// Set the current user
    pub fn with_user(mut self, user: Option<&User>) -> Self {
        self.current_user = user.map(CurrentUser::from);
        self
    }

    /// Copy of `context` with the standard variables added
    pub fn extend(&self, context: &TeraContext) -> TeraContext {
        let mut full_context = context.clone();
        full_context.insert("site_name", &self.site_name);
        if let Some(ref user) = self.current_user {
            full_context.insert("current_user", user);
        }
        full_context
    }
}
