//! Client-side checks run on every selection before anything is sent.
//!
//! They mirror what the server verifies so users get feedback without a
//! round trip; the server still has the final word.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use joy_core::route_config::{classify, lookup_mime, ExpandedRouteConfig, FileCategory};
use joy_core::validators::{file_name_is_valid, FILE_NAME_MESSAGE};

use crate::types::{ClientFile, ErrorCode, FileRejection, UploaderError};

/// Pseudo type old Firefox reports for every dragged file.
const MOZ_FILE: &str = "application/x-moz-file";

/// Caller supplied check. `Some` rejects the file.
pub type FileValidator = Arc<dyn Fn(&ClientFile) -> Option<UploaderError> + Send + Sync>;

/// Limits applied to a selection.
#[derive(Clone, Default)]
pub struct ValidationRules {
    /// Patterns: `image/png`, `image/*` or `.png`.
    pub accept: Vec<String>,
    /// Skip type checks entirely (routes with a blob category).
    pub accept_all: bool,
    pub min_size: Option<u64>,
    /// Upper bound for files whose category has no limit of its own.
    pub max_size: Option<u64>,
    /// Per-category size limits, blob included.
    pub category_limits: BTreeMap<FileCategory, u64>,
    pub max_files: u32,
    pub multiple: bool,
    pub validator: Option<FileValidator>,
}

impl fmt::Debug for ValidationRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRules")
            .field("accept", &self.accept)
            .field("accept_all", &self.accept_all)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("category_limits", &self.category_limits)
            .field("max_files", &self.max_files)
            .field("multiple", &self.multiple)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl ValidationRules {
    /// Rules for a route as advertised by the route listing.
    pub fn from_config(config: &ExpandedRouteConfig) -> Self {
        let category_limits: BTreeMap<_, _> = config
            .iter()
            .filter_map(|(category, c)| c.max_file_size_bytes().ok().map(|max| (category, max)))
            .collect();

        Self {
            accept: config.mime_types(),
            accept_all: config.has_blob(),
            min_size: None,
            max_size: category_limits.values().copied().max(),
            category_limits,
            max_files: config.iter().map(|(_, c)| c.max_file_count).sum(),
            multiple: config.accepts_multiple(),
            validator: None,
        }
    }

    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = Some(min_size);
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&ClientFile) -> Option<UploaderError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Size limit for one file: its category's, else blob's, else the overall maximum.
    fn max_size_for(&self, file: &ClientFile) -> Option<u64> {
        let category = classify(&file.mime, &file.name).and_then(|t| t.category);
        category
            .and_then(|c| self.category_limits.get(&c))
            .or_else(|| self.category_limits.get(&FileCategory::Blob))
            .copied()
            .or(self.max_size)
    }
}

/// Whether `file` matches any accepted pattern.
pub fn file_type_is_acceptable(accept: &[String], file: &ClientFile, accept_all: bool) -> bool {
    if accept_all || accept.is_empty() {
        return true;
    }

    let name = file.name.to_lowercase();
    let mime = if file.mime.is_empty() {
        lookup_mime(&file.name).unwrap_or_default()
    } else {
        file.mime.to_lowercase()
    };
    if mime == MOZ_FILE {
        return true;
    }
    let base = mime.split('/').next().unwrap_or_default();

    accept.iter().any(|pattern| {
        let pattern = pattern.trim().to_lowercase();
        if pattern.starts_with('.') {
            name.ends_with(&pattern)
        } else if let Some(major) = pattern.strip_suffix("/*") {
            !base.is_empty() && base == major
        } else {
            mime == pattern
        }
    })
}

pub fn file_size_is_acceptable(
    file: &ClientFile,
    min_size: Option<u64>,
    max_size: Option<u64>,
) -> Result<(), UploaderError> {
    if let Some(min) = min_size.filter(|m| *m > 0) {
        if file.size < min {
            return Err(UploaderError::too_small(min));
        }
    }
    if let Some(max) = max_size.filter(|m| *m > 0) {
        if file.size > max {
            return Err(UploaderError::too_large(max));
        }
    }
    Ok(())
}

/// Every problem with a single file, in a stable order: caller validator,
/// name, type, then size.
pub fn validate_file(file: &ClientFile, rules: &ValidationRules) -> Vec<UploaderError> {
    let mut errors = Vec::new();

    if let Some(validator) = &rules.validator {
        if let Some(err) = validator(file) {
            errors.push(err);
        }
    }

    if !file_name_is_valid(&file.name) {
        errors.push(UploaderError::new(ErrorCode::FileNameInvalid, FILE_NAME_MESSAGE));
    }

    if !file_type_is_acceptable(&rules.accept, file, rules.accept_all) {
        errors.push(UploaderError::invalid_file_type(&rules.accept));
    }

    if let Err(err) = file_size_is_acceptable(file, rules.min_size, rules.max_size_for(file)) {
        errors.push(err);
    }

    errors
}

/// A selection split into files that may be uploaded and files that may not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub accepted: Vec<ClientFile>,
    pub rejected: Vec<FileRejection>,
}

/// Validate a whole selection. Breaking the cardinality rule rejects every
/// file with `too-many-files` and skips the per-file checks.
pub fn validate_files(files: Vec<ClientFile>, rules: &ValidationRules) -> Selection {
    let max_files = rules.max_files.max(1);
    let too_many = (!rules.multiple && files.len() > 1)
        || (rules.multiple && rules.max_files >= 1 && files.len() > rules.max_files as usize);

    if too_many {
        let limit = if rules.multiple { max_files } else { 1 };
        return Selection {
            accepted: Vec::new(),
            rejected: files
                .into_iter()
                .map(|file| FileRejection {
                    file,
                    errors: vec![UploaderError::too_many_files(limit)],
                })
                .collect(),
        };
    }

    let mut selection = Selection::default();
    for file in files {
        let errors = validate_file(&file, rules);
        if errors.is_empty() {
            selection.accepted.push(file);
        } else {
            selection.rejected.push(FileRejection { file, errors });
        }
    }
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use joy_core::route_config::{CategoryConfig, RouteConfig};

    fn file(name: &str, mime: &str, size: usize) -> ClientFile {
        ClientFile::new(name, mime, vec![0u8; size])
    }

    fn rules(config: RouteConfig) -> ValidationRules {
        ValidationRules::from_config(&config.expand().unwrap())
    }

    #[test]
    fn patterns_by_extension_wildcard_and_exact_type() {
        let accept = vec![".pdf".to_string(), "image/*".to_string(), "audio/mpeg".to_string()];

        assert!(file_type_is_acceptable(&accept, &file("Report.PDF", "", 1), false));
        assert!(file_type_is_acceptable(&accept, &file("cat.gif", "image/gif", 1), false));
        assert!(file_type_is_acceptable(&accept, &file("song.mp3", "audio/mpeg", 1), false));
        assert!(!file_type_is_acceptable(&accept, &file("song.wav", "audio/wav", 1), false));
        assert!(file_type_is_acceptable(&accept, &file("any", MOZ_FILE, 1), false));
        assert!(file_type_is_acceptable(&accept, &file("song.wav", "audio/wav", 1), true));
    }

    #[test]
    fn size_bounds_use_the_files_category() {
        let rules = rules(
            RouteConfig::new()
                .image(CategoryConfig::new().with_max_file_size("1KB"))
                .video(CategoryConfig::new().with_max_file_size("4KB")),
        )
        .with_min_size(2);

        assert!(validate_file(&file("a.png", "image/png", 1024), &rules).is_empty());
        assert_eq!(
            validate_file(&file("a.png", "image/png", 1025), &rules),
            vec![UploaderError::too_large(1024)]
        );
        assert!(validate_file(&file("a.mp4", "video/mp4", 2048), &rules).is_empty());
        assert_eq!(
            validate_file(&file("a.png", "image/png", 1), &rules)[0].message,
            "File too small. Minimum size allowed is 2 bytes."
        );
    }

    #[test]
    fn errors_accumulate_in_order() {
        let rules = rules(RouteConfig::new().image(CategoryConfig::new().with_max_file_size("1KB")))
            .with_validator(|f| {
                f.name
                    .starts_with("bad")
                    .then(|| UploaderError::new(ErrorCode::UploadError, "nope"))
            });

        let codes: Vec<_> = validate_file(&file("bad name.txt", "text/plain", 2048), &rules)
            .into_iter()
            .map(|e| e.code)
            .collect();
        assert_eq!(
            codes,
            vec![
                ErrorCode::UploadError,
                ErrorCode::FileNameInvalid,
                ErrorCode::InvalidFileType,
                ErrorCode::FileTooLarge
            ]
        );
    }

    #[test]
    fn single_file_route_rejects_every_file_of_a_pair() {
        let rules = rules(RouteConfig::new().image(CategoryConfig::new().with_max_file_count(1)));
        assert!(!rules.multiple);

        let selection = validate_files(
            vec![file("a.png", "image/png", 1), file("b.png", "image/png", 1)],
            &rules,
        );
        assert!(selection.accepted.is_empty());
        assert_eq!(selection.rejected.len(), 2);
        for rejection in &selection.rejected {
            assert_eq!(rejection.errors, vec![UploaderError::too_many_files(1)]);
        }
        assert_eq!(
            selection.rejected[0].errors[0].message,
            "Too many files. Maximum allowed is 1."
        );
    }

    #[test]
    fn multiple_route_splits_good_and_bad_files() {
        let rules = rules(RouteConfig::new().image(CategoryConfig::new().with_max_file_count(3)));
        assert!(rules.multiple);

        let selection = validate_files(
            vec![file("a.png", "image/png", 1), file("notes.txt", "text/plain", 1)],
            &rules,
        );
        assert_eq!(selection.accepted.len(), 1);
        assert_eq!(selection.rejected[0].errors[0].code, ErrorCode::InvalidFileType);
    }

    #[test]
    fn blob_routes_accept_any_type() {
        let rules = rules(RouteConfig::new().blob(CategoryConfig::new().with_max_file_count(2)));
        let selection = validate_files(vec![file("mail.eml", "message/rfc822", 10)], &rules);
        assert_eq!(selection.accepted.len(), 1);
    }
}
