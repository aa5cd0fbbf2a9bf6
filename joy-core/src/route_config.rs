//! Route configuration model.
//!
//! A [`RouteConfig`] is what users write: a map from [`FileCategory`] to a
//! partial [`CategoryConfig`]. [`expand`] backfills every declared category
//! from the category defaults table and validates the result, producing an
//! [`ExpandedRouteConfig`] that is frozen for the lifetime of the route.
//!
//! ```rust
//! use joy_core::route_config::{CategoryConfig, RouteConfig};
//!
//! let config = RouteConfig::new().image(CategoryConfig::new().with_max_file_count(4));
//! let expanded = config.expand().unwrap();
//! assert_eq!(expanded.to_json()["image"]["maxFileSize"], "4MB");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, ConfigResult};

/// The closed set of categories a route can accept.
///
/// All but `Blob` mirror a MIME major type. `Blob` is the catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Audio,
    Font,
    Text,
    Model,
    Application,
    Blob,
}

/// Defaults applied to a category the user declared without overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryDefaults {
    pub max_file_size: &'static str,
    pub max_file_count: u32,
}

impl FileCategory {
    pub const ALL: [FileCategory; 8] = [
        FileCategory::Image,
        FileCategory::Video,
        FileCategory::Audio,
        FileCategory::Font,
        FileCategory::Text,
        FileCategory::Model,
        FileCategory::Application,
        FileCategory::Blob,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Image => "image",
            FileCategory::Video => "video",
            FileCategory::Audio => "audio",
            FileCategory::Font => "font",
            FileCategory::Text => "text",
            FileCategory::Model => "model",
            FileCategory::Application => "application",
            FileCategory::Blob => "blob",
        }
    }

    /// Category for a MIME major type. `blob` is never a MIME type.
    pub fn from_major(major: &str) -> Option<Self> {
        let major = major.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| *c != FileCategory::Blob && c.as_str() == major)
    }

    /// Category defaults lookup.
    pub fn defaults(&self) -> CategoryDefaults {
        let max_file_size = match self {
            FileCategory::Image => "4MB",
            FileCategory::Video => "16MB",
            FileCategory::Audio => "8MB",
            FileCategory::Application => "8MB",
            FileCategory::Font => "2MB",
            FileCategory::Text => "4MB",
            FileCategory::Model => "16MB",
            FileCategory::Blob => "4MB",
        };
        CategoryDefaults {
            max_file_size,
            max_file_count: 1,
        }
    }

    /// `["{category}/*"]`
    pub fn default_accepted_files(&self) -> Vec<String> {
        vec![self.wildcard()]
    }

    pub fn wildcard(&self) -> String {
        format!("{}/*", self.as_str())
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The type of an inbound file as far as routing is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedType {
    /// Full MIME type, declared or looked up from the extension.
    pub mime: String,
    /// MIME major type, e.g. `image`.
    pub major: String,
    /// Matching category, if the major type is one of ours.
    pub category: Option<FileCategory>,
}

/// Classify a file from its declared MIME type, falling back to an
/// extension lookup on the file name when nothing was declared.
pub fn classify(declared: &str, name: &str) -> Option<DetectedType> {
    let declared = declared.trim();
    let mime = if declared.is_empty() {
        lookup_mime(name)?
    } else {
        declared.to_ascii_lowercase()
    };

    let major = mime.split('/').next().unwrap_or_default().to_string();
    if major.is_empty() {
        return None;
    }

    Some(DetectedType {
        category: FileCategory::from_major(&major),
        major,
        mime,
    })
}

/// Extension based MIME lookup (`photo.png` → `image/png`).
pub fn lookup_mime(name: &str) -> Option<String> {
    mime_guess::from_path(name)
        .first()
        .map(|m| m.essence_str().to_string())
}

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

fn size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\d+)(\.\d+)?\s*(B|KB|MB|GB)$").expect("valid regex")
    })
}

/// Parse a human size string into bytes, powers of 1024.
///
/// Units are case-insensitive, so `"1gb"` is one GiB.
pub fn file_size_to_bytes(input: &str) -> ConfigResult<u64> {
    let caps = size_pattern()
        .captures(input.trim())
        .ok_or_else(|| ConfigError::file_size(input))?;

    let unit = caps[3].to_ascii_uppercase();
    let idx = SIZE_UNITS
        .iter()
        .position(|u| *u == unit)
        .ok_or_else(|| ConfigError::file_size(input))?;
    let multiplier = 1024u64.pow(idx as u32);

    let whole: u64 = caps[1]
        .parse()
        .map_err(|_| ConfigError::file_size(input))?;

    match caps.get(2) {
        None => whole
            .checked_mul(multiplier)
            .ok_or_else(|| ConfigError::file_size(input)),
        Some(fraction) => {
            let value: f64 = format!("{whole}{}", fraction.as_str())
                .parse()
                .map_err(|_| ConfigError::file_size(input))?;
            Ok((value * multiplier as f64).floor() as u64)
        }
    }
}

/// User-facing, partial per-category config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_count: Option<u32>,

    /// MIME patterns scoped to the category, e.g. `image/png` or `image/*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_files: Option<Vec<String>>,
}

impl CategoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_file_size<S: Into<String>>(mut self, size: S) -> Self {
        self.max_file_size = Some(size.into());
        self
    }

    pub fn with_max_file_count(mut self, count: u32) -> Self {
        self.max_file_count = Some(count);
        self
    }

    pub fn with_accepted_files<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_files = Some(patterns.into_iter().map(Into::into).collect());
        self
    }
}

/// What a route accepts, as declared by the user.
///
/// A category mapped to `None` mirrors an explicit `null` in JSON input and
/// is rejected by [`expand`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteConfig {
    categories: BTreeMap<FileCategory, Option<CategoryConfig>>,
}

impl RouteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or replace) a category.
    pub fn with(mut self, category: FileCategory, config: CategoryConfig) -> Self {
        self.categories.insert(category, Some(config));
        self
    }

    pub fn image(self, config: CategoryConfig) -> Self {
        self.with(FileCategory::Image, config)
    }

    pub fn video(self, config: CategoryConfig) -> Self {
        self.with(FileCategory::Video, config)
    }

    pub fn audio(self, config: CategoryConfig) -> Self {
        self.with(FileCategory::Audio, config)
    }

    pub fn font(self, config: CategoryConfig) -> Self {
        self.with(FileCategory::Font, config)
    }

    pub fn text(self, config: CategoryConfig) -> Self {
        self.with(FileCategory::Text, config)
    }

    pub fn model(self, config: CategoryConfig) -> Self {
        self.with(FileCategory::Model, config)
    }

    pub fn application(self, config: CategoryConfig) -> Self {
        self.with(FileCategory::Application, config)
    }

    pub fn blob(self, config: CategoryConfig) -> Self {
        self.with(FileCategory::Blob, config)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn expand(&self) -> ConfigResult<ExpandedRouteConfig> {
        expand(self)
    }
}

/// A category with every field filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandedCategoryConfig {
    pub max_file_size: String,
    pub max_file_count: u32,
    pub accepted_files: Vec<String>,
}

impl ExpandedCategoryConfig {
    pub fn max_file_size_bytes(&self) -> ConfigResult<u64> {
        file_size_to_bytes(&self.max_file_size)
    }

    /// True when the patterns include `{category}/*`.
    pub fn accepts_any_of(&self, category: FileCategory) -> bool {
        let wildcard = category.wildcard();
        self.accepted_files.iter().any(|p| *p == wildcard)
    }
}

/// A fully specified route config. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpandedRouteConfig {
    categories: BTreeMap<FileCategory, ExpandedCategoryConfig>,
}

impl ExpandedRouteConfig {
    pub fn get(&self, category: FileCategory) -> Option<&ExpandedCategoryConfig> {
        self.categories.get(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileCategory, &ExpandedCategoryConfig)> {
        self.categories.iter().map(|(k, v)| (*k, v))
    }

    pub fn has_blob(&self) -> bool {
        self.categories.contains_key(&FileCategory::Blob)
    }

    /// Whether a client may pick more than one file for this route.
    pub fn accepts_multiple(&self) -> bool {
        self.categories
            .values()
            .map(|c| c.max_file_count as u64)
            .sum::<u64>()
            > 1
    }

    /// Every accepted MIME pattern across categories. The blob catch-all
    /// has no MIME pattern of its own and is left out.
    pub fn mime_types(&self) -> Vec<String> {
        self.categories
            .iter()
            .filter(|(category, _)| **category != FileCategory::Blob)
            .flat_map(|(_, c)| c.accepted_files.iter().cloned())
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Backfill category defaults onto a user config.
pub fn expand(input: &RouteConfig) -> ConfigResult<ExpandedRouteConfig> {
    if input.categories.is_empty() {
        return Err(ConfigError::invalid(
            "a route must declare at least one file category",
        ));
    }

    let mut categories = BTreeMap::new();
    for (category, value) in &input.categories {
        let Some(user) = value else {
            return Err(ConfigError::invalid(format!("{category} is null")));
        };
        let defaults = category.defaults();

        let max_file_size = user
            .max_file_size
            .clone()
            .unwrap_or_else(|| defaults.max_file_size.to_string());
        file_size_to_bytes(&max_file_size)?;

        let max_file_count = user.max_file_count.unwrap_or(defaults.max_file_count);
        if max_file_count == 0 {
            return Err(ConfigError::invalid(format!(
                "{category} maxFileCount must be positive"
            )));
        }

        let accepted_files = match (&user.accepted_files, category) {
            (Some(_), FileCategory::Blob) => {
                return Err(ConfigError::invalid("blob does not take acceptedFiles"));
            }
            (Some(patterns), _) => {
                let prefix = format!("{}/", category.as_str());
                if let Some(bad) = patterns.iter().find(|p| !p.starts_with(&prefix)) {
                    return Err(ConfigError::invalid(format!(
                        "{bad} is not a {category} type"
                    )));
                }
                patterns.clone()
            }
            (None, _) => category.default_accepted_files(),
        };

        categories.insert(
            *category,
            ExpandedCategoryConfig {
                max_file_size,
                max_file_count,
                accepted_files,
            },
        );
    }

    Ok(ExpandedRouteConfig { categories })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sizes_use_powers_of_1024() {
        assert_eq!(file_size_to_bytes("4MB").unwrap(), 4 * 1024 * 1024);
        assert_eq!(file_size_to_bytes("512B").unwrap(), 512);
        assert_eq!(file_size_to_bytes("2 KB").unwrap(), 2048);
        assert_eq!(file_size_to_bytes("1.5KB").unwrap(), 1536);
    }

    #[test]
    fn size_units_are_case_insensitive() {
        assert_eq!(file_size_to_bytes("1gb").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn malformed_sizes_are_rejected() {
        for bad in ["", "MB", "4TB", "four MB", "-1MB", "4 M B"] {
            assert_eq!(
                file_size_to_bytes(bad),
                Err(ConfigError::file_size(bad)),
                "{bad}"
            );
        }
    }

    #[test]
    fn expand_backfills_image_defaults() {
        let expanded = RouteConfig::new().image(CategoryConfig::new()).expand().unwrap();
        assert_eq!(
            expanded.to_json(),
            json!({"image": {"maxFileSize": "4MB", "maxFileCount": 1, "acceptedFiles": ["image/*"]}})
        );
    }

    #[test]
    fn user_overrides_win_field_by_field() {
        let expanded = RouteConfig::new()
            .video(CategoryConfig::new().with_max_file_count(3))
            .expand()
            .unwrap();
        let video = expanded.get(FileCategory::Video).unwrap();
        assert_eq!(video.max_file_size, "16MB");
        assert_eq!(video.max_file_count, 3);
        assert!(expanded.accepts_multiple());
    }

    #[test]
    fn empty_config_is_invalid() {
        assert!(matches!(
            RouteConfig::new().expand(),
            Err(ConfigError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn null_category_is_invalid() {
        let config: RouteConfig = serde_json::from_value(json!({"image": null})).unwrap();
        assert!(matches!(config.expand(), Err(ConfigError::InvalidConfig { .. })));
    }

    #[test]
    fn unscoped_accepted_files_are_invalid() {
        let config = RouteConfig::new().image(CategoryConfig::new().with_accepted_files(["video/mp4"]));
        assert!(matches!(config.expand(), Err(ConfigError::InvalidConfig { .. })));
    }

    #[test]
    fn bad_size_surfaces_at_expand() {
        let config = RouteConfig::new().audio(CategoryConfig::new().with_max_file_size("lots"));
        assert_eq!(config.expand(), Err(ConfigError::file_size("lots")));
    }

    #[test]
    fn config_parses_from_user_json() {
        let config: RouteConfig =
            serde_json::from_value(json!({"blob": {"maxFileSize": "1GB", "maxFileCount": 2}})).unwrap();
        let expanded = config.expand().unwrap();
        assert!(expanded.has_blob());
        assert!(expanded.mime_types().is_empty());

        let mixed = RouteConfig::new()
            .image(CategoryConfig::new())
            .blob(CategoryConfig::new())
            .expand()
            .unwrap();
        assert_eq!(mixed.mime_types(), vec!["image/*".to_string()]);
    }

    #[test]
    fn classify_prefers_declared_type() {
        let t = classify("image/png", "notes.txt").unwrap();
        assert_eq!(t.category, Some(FileCategory::Image));
        assert_eq!(t.mime, "image/png");

        let t = classify("", "notes.txt").unwrap();
        assert_eq!(t.category, Some(FileCategory::Text));

        let t = classify("message/rfc822", "mail.eml").unwrap();
        assert_eq!(t.major, "message");
        assert_eq!(t.category, None);

        assert!(classify("", "no-extension").is_none());
    }
}
