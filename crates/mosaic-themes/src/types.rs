//! Core data types for the theme engine
//!
//! Themes are persisted as plain serde documents. The `is_active` flag is part
//! of the stored record but is only ever written by the
//! [`ActivationCoordinator`](crate::coordinator::ActivationCoordinator);
//! [`ThemeCreateInput`] and [`ThemePatch`] have no field for it.

use std::{fmt, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{Result, ThemeError},
    validator::ConfigSchema,
};

/// Longest accepted theme name
pub const MAX_NAME_LEN: usize = 64;

/// Opaque theme identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThemeId(String);

impl ThemeId {
    /// Generate a new random theme ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThemeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category of a UI building block supplied by a theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentCategory {
    Layout,
    Block,
    Widget,
}

impl ComponentCategory {
    pub const ALL: [ComponentCategory; 3] = [Self::Layout, Self::Block, Self::Widget];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Layout => "layout",
            Self::Block => "block",
            Self::Widget => "widget",
        }
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentCategory {
    type Err = ThemeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "layout" | "layouts" => Ok(Self::Layout),
            "block" | "blocks" => Ok(Self::Block),
            "widget" | "widgets" => Ok(Self::Widget),
            other => Err(ThemeError::validation(
                "category",
                format!("unknown component category '{}'", other),
            )),
        }
    }
}

/// Metadata and loader reference for one building block owned by a theme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub category: ComponentCategory,
    /// Unique within the category of the owning theme
    pub name: String,
    /// Loader reference, resolved lazily by a
    /// [`ComponentLoader`](crate::resolver::ComponentLoader)
    pub entry: String,
    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Schema of the props the component accepts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props_schema: Option<Value>,
}

impl ComponentDescriptor {
    pub fn new(category: ComponentCategory, name: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
            entry: entry.into(),
            label: None,
            props_schema: None,
        }
    }
}

/// Exposes a declared component under a second name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentAlias {
    pub category: ComponentCategory,
    pub alias: String,
    pub target: String,
}

impl ComponentAlias {
    pub fn new(category: ComponentCategory, alias: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            category,
            alias: alias.into(),
            target: target.into(),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// An installable theme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: ThemeId,
    /// Unique slug, immutable after creation
    pub name: String,
    pub display_name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// System themes cannot be deleted
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub is_active: bool,
    /// Validated configuration document
    #[serde(default = "empty_object")]
    pub config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<ConfigSchema>,
    #[serde(default)]
    pub components: Vec<ComponentDescriptor>,
    #[serde(default)]
    pub aliases: Vec<ComponentAlias>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`ThemeRegistry::register`](crate::registry::ThemeRegistry::register)
///
/// Also the on-disk manifest format read by
/// [`ManifestLoader`](crate::loader::ManifestLoader).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeCreateInput {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default = "empty_object")]
    pub config: Value,
    #[serde(default)]
    pub config_schema: Option<ConfigSchema>,
    #[serde(default)]
    pub components: Vec<ComponentDescriptor>,
    #[serde(default)]
    pub aliases: Vec<ComponentAlias>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

impl ThemeCreateInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            version: default_version(),
            author: None,
            description: None,
            is_system: false,
            config: empty_object(),
            config_schema: None,
            components: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_schema(mut self, schema: ConfigSchema) -> Self {
        self.config_schema = Some(schema);
        self
    }

    pub fn with_component(mut self, component: ComponentDescriptor) -> Self {
        self.components.push(component);
        self
    }

    pub fn with_alias(mut self, alias: ComponentAlias) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }

    /// Shallow-merge a patch: every field present in the patch replaces the
    /// input's field
    pub fn apply(&mut self, patch: ThemePatch) {
        let ThemePatch {
            display_name,
            version,
            author,
            description,
            config,
            config_schema,
            components,
            aliases,
        } = patch;

        if display_name.is_some() {
            self.display_name = display_name;
        }
        if let Some(version) = version {
            self.version = version;
        }
        if author.is_some() {
            self.author = author;
        }
        if description.is_some() {
            self.description = description;
        }
        if let Some(config) = config {
            self.config = config;
        }
        if config_schema.is_some() {
            self.config_schema = config_schema;
        }
        if let Some(components) = components {
            self.components = components;
        }
        if let Some(aliases) = aliases {
            self.aliases = aliases;
        }
    }
}

/// Partial update of the non-identity fields of a theme
///
/// `id`, `name`, `is_system` and `is_active` cannot be patched. Unknown keys
/// such as `is_active` are ignored when a patch is deserialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<ConfigSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ComponentDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<ComponentAlias>>,
}

impl ThemePatch {
    pub fn config(config: Value) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Shallow merge where fields set in `later` win
    pub fn merge(mut self, later: ThemePatch) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if later.$field.is_some() { self.$field = later.$field; })*
            };
        }
        take!(display_name, version, author, description, config, config_schema, components, aliases);
        self
    }

    /// Apply to a stored theme; does not touch identity or activation
    pub fn apply_to(self, theme: &mut Theme) {
        if let Some(display_name) = self.display_name {
            theme.display_name = display_name;
        }
        if let Some(version) = self.version {
            theme.version = version;
        }
        if self.author.is_some() {
            theme.author = self.author;
        }
        if self.description.is_some() {
            theme.description = self.description;
        }
        if let Some(config) = self.config {
            theme.config = config;
        }
        if self.config_schema.is_some() {
            theme.config_schema = self.config_schema;
        }
        if let Some(components) = self.components {
            theme.components = components;
        }
        if let Some(aliases) = self.aliases {
            theme.aliases = aliases;
        }
    }
}

/// Statically configured theme used when no active theme can be determined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackTheme {
    pub id: ThemeId,
    #[serde(default = "default_fallback_name")]
    pub name: String,
    /// Load path of the theme bundle
    pub path: PathBuf,
    #[serde(default = "empty_object")]
    pub config: Value,
    #[serde(default)]
    pub components: Vec<ComponentDescriptor>,
    #[serde(default)]
    pub aliases: Vec<ComponentAlias>,
}

fn default_fallback_name() -> String {
    "fallback".to_string()
}

impl FallbackTheme {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: ThemeId::from_string(id),
            name: default_fallback_name(),
            path: path.into(),
            config: empty_object(),
            components: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: ComponentDescriptor) -> Self {
        self.components.push(component);
        self
    }

    /// View the fallback as a theme record so components resolve through the
    /// same path as registered themes. The record is never persisted.
    pub fn to_theme(&self) -> Theme {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Theme {
            id: self.id.clone(),
            name: self.name.clone(),
            display_name: self.name.clone(),
            version: "0.0.0".to_string(),
            author: None,
            description: Some(format!("Fallback theme loaded from {}", self.path.display())),
            is_system: true,
            is_active: false,
            config: self.config.clone(),
            config_schema: None,
            components: self.components.clone(),
            aliases: self.aliases.clone(),
            created_at: epoch,
            updated_at: epoch,
        }
    }
}

impl Default for FallbackTheme {
    fn default() -> Self {
        Self::new("fallback", "themes/fallback")
    }
}

/// Result of resolving "the current theme"
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTheme {
    /// The registered theme with `is_active = true`
    Active(Theme),
    /// No active theme could be determined
    Fallback(FallbackTheme),
}

impl ResolvedTheme {
    pub fn id(&self) -> &ThemeId {
        match self {
            Self::Active(theme) => &theme.id,
            Self::Fallback(fallback) => &fallback.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Active(theme) => &theme.name,
            Self::Fallback(fallback) => &fallback.name,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn to_theme(&self) -> Theme {
        match self {
            Self::Active(theme) => theme.clone(),
            Self::Fallback(fallback) => fallback.to_theme(),
        }
    }
}

/// Check that a theme name is a slug: lowercase ASCII letters, digits, `-`
/// and `_`, starting with a letter or digit
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ThemeError::validation("name", "theme name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ThemeError::validation(
            "name",
            format!("theme name exceeds {} characters", MAX_NAME_LEN),
        ));
    }
    let valid_char = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_';
    if !name.chars().all(valid_char) || name.starts_with(['-', '_']) {
        return Err(ThemeError::validation(
            "name",
            format!(
                "invalid theme name '{}': use lowercase letters, digits, '-' and '_'",
                name
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!("block".parse::<ComponentCategory>().unwrap(), ComponentCategory::Block);
        assert_eq!("Layouts".parse::<ComponentCategory>().unwrap(), ComponentCategory::Layout);
        assert!("sidebar".parse::<ComponentCategory>().is_err());
    }

    #[test]
    fn test_category_serde() {
        let value = serde_json::to_value(ComponentCategory::Widget).unwrap();
        assert_eq!(value, json!("widget"));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("aurora").is_ok());
        assert!(validate_name("dark-mode_2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("Aurora").is_err());
        assert!(validate_name("-lead").is_err());
        assert!(validate_name("has space").is_err());
        assert!(validate_name(&"a".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_patch_merge_later_wins() {
        let first = ThemePatch {
            version: Some("1.0.0".to_string()),
            config: Some(json!({"a": 1})),
            ..ThemePatch::default()
        };
        let second = ThemePatch::config(json!({"a": 2, "b": 3}));

        let merged = first.merge(second);
        assert_eq!(merged.version.as_deref(), Some("1.0.0"));
        assert_eq!(merged.config, Some(json!({"a": 2, "b": 3})));
    }

    #[test]
    fn test_patch_ignores_activation_flag() {
        let patch: ThemePatch =
            serde_json::from_value(json!({"is_active": true, "version": "2.0.0"})).unwrap();
        assert_eq!(patch.version.as_deref(), Some("2.0.0"));
        assert_eq!(
            patch,
            ThemePatch {
                version: Some("2.0.0".to_string()),
                ..ThemePatch::default()
            }
        );
    }

    #[test]
    fn test_create_input_defaults() {
        let input: ThemeCreateInput = serde_yaml::from_str("name: aurora\n").unwrap();
        assert_eq!(input.version, "0.1.0");
        assert_eq!(input.config, json!({}));
        assert!(!input.is_system);
    }

    #[test]
    fn test_fallback_to_theme() {
        let fallback = FallbackTheme::new("fb", "/srv/themes/default")
            .with_component(ComponentDescriptor::new(ComponentCategory::Layout, "Page", "page.js"));
        let theme = fallback.to_theme();
        assert_eq!(theme.id.as_str(), "fb");
        assert!(theme.is_system);
        assert!(!theme.is_active);
        assert_eq!(theme.components.len(), 1);
        assert_eq!(theme.components[0].category, ComponentCategory::Layout);
    }
}
