//! Server-side file verification against an expanded route config.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::errors::ConfigError;
use crate::protocol::FileInfo;
use crate::route_config::{classify, ExpandedRouteConfig, FileCategory};

/// Why a batch of files was refused. Clients only ever see a generic
/// message; the detail goes to the logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("could not determine the type of {name}")]
    UnknownType { name: String },

    #[error("{mime} files are not accepted by this route")]
    CategoryNotAllowed { mime: String },

    #[error("too many {category} files: {count} > {max}")]
    TooManyFiles {
        category: FileCategory,
        count: usize,
        max: u32,
    },

    #[error("{name} is {size} bytes, {category} allows {max}")]
    FileTooLarge {
        name: String,
        size: u64,
        category: FileCategory,
        max: u64,
    },

    #[error("{name} ({mime}) is not an accepted {category} type")]
    TypeNotAccepted {
        name: String,
        mime: String,
        category: FileCategory,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

struct Bucketed<'a> {
    file: &'a FileInfo,
    mime: String,
}

/// Check a batch of files against a route.
///
/// Files are bucketed by detected category. A file whose category is not
/// declared lands in the `blob` bucket when the route has one. Per bucket the
/// count and size limits apply; MIME restrictions only apply to routes
/// without a `blob` catch-all.
pub fn verify_files(files: &[FileInfo], config: &ExpandedRouteConfig) -> Result<(), VerificationError> {
    let has_blob = config.has_blob();
    let mut buckets: BTreeMap<FileCategory, Vec<Bucketed<'_>>> = BTreeMap::new();

    for file in files {
        let detected = classify(&file.file_type, &file.name).ok_or_else(|| {
            VerificationError::UnknownType {
                name: file.name.clone(),
            }
        })?;

        let category = match detected.category {
            Some(c) if config.get(c).is_some() => c,
            _ if has_blob => FileCategory::Blob,
            _ => {
                return Err(VerificationError::CategoryNotAllowed {
                    mime: detected.mime,
                })
            }
        };

        buckets.entry(category).or_default().push(Bucketed {
            file,
            mime: detected.mime,
        });
    }

    for (category, entries) in &buckets {
        let Some(limits) = config.get(*category) else {
            return Err(VerificationError::CategoryNotAllowed {
                mime: category.wildcard(),
            });
        };

        if entries.len() > limits.max_file_count as usize {
            return Err(VerificationError::TooManyFiles {
                category: *category,
                count: entries.len(),
                max: limits.max_file_count,
            });
        }

        let max_bytes = limits.max_file_size_bytes()?;
        for entry in entries {
            if entry.file.size > max_bytes {
                return Err(VerificationError::FileTooLarge {
                    name: entry.file.name.clone(),
                    size: entry.file.size,
                    category: *category,
                    max: max_bytes,
                });
            }

            if has_blob || limits.accepts_any_of(*category) {
                continue;
            }

            if !limits.accepted_files.iter().any(|p| *p == entry.mime) {
                return Err(VerificationError::TypeNotAccepted {
                    name: entry.file.name.clone(),
                    mime: entry.mime.clone(),
                    category: *category,
                });
            }
        }
    }

    debug!(files = files.len(), buckets = buckets.len(), "files verified");
    Ok(())
}

/// `true` when the batch must be refused.
pub fn file_verification_failed(files: &[FileInfo], config: &ExpandedRouteConfig) -> bool {
    verify_files(files, config).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route_config::{CategoryConfig, RouteConfig};

    fn png(name: &str, size: u64) -> FileInfo {
        FileInfo::new(name, size, "image/png")
    }

    fn expanded(config: RouteConfig) -> ExpandedRouteConfig {
        config.expand().unwrap()
    }

    #[test]
    fn single_image_route_counts_every_file() {
        let config = expanded(RouteConfig::new().image(CategoryConfig::new().with_max_file_count(1)));

        assert!(!file_verification_failed(&[png("a.png", 10)], &config));
        assert!(matches!(
            verify_files(&[png("a.png", 10), png("b.png", 10)], &config),
            Err(VerificationError::TooManyFiles { count: 2, max: 1, .. })
        ));
    }

    #[test]
    fn oversize_files_fail() {
        let config = expanded(RouteConfig::new().image(CategoryConfig::new().with_max_file_size("1KB")));
        assert!(matches!(
            verify_files(&[png("a.png", 1025)], &config),
            Err(VerificationError::FileTooLarge { max: 1024, .. })
        ));
        assert!(!file_verification_failed(&[png("a.png", 1024)], &config));
    }

    #[test]
    fn undeclared_category_fails_without_blob() {
        let config = expanded(RouteConfig::new().image(CategoryConfig::new()));
        assert!(matches!(
            verify_files(&[FileInfo::new("song.mp3", 10, "audio/mpeg")], &config),
            Err(VerificationError::CategoryNotAllowed { .. })
        ));
    }

    #[test]
    fn specific_mime_list_is_enforced() {
        let config = expanded(
            RouteConfig::new().image(CategoryConfig::new().with_accepted_files(["image/png"])),
        );
        assert!(!file_verification_failed(&[png("a.png", 10)], &config));
        assert!(matches!(
            verify_files(&[FileInfo::new("a.gif", 10, "image/gif")], &config),
            Err(VerificationError::TypeNotAccepted { .. })
        ));
    }

    #[test]
    fn missing_type_falls_back_to_extension() {
        let config = expanded(
            RouteConfig::new().image(CategoryConfig::new().with_accepted_files(["image/png"])),
        );
        assert!(!file_verification_failed(&[FileInfo::new("a.png", 10, "")], &config));
        assert!(matches!(
            verify_files(&[FileInfo::new("mystery", 10, "")], &config),
            Err(VerificationError::UnknownType { .. })
        ));
    }

    #[test]
    fn blob_route_accepts_any_type_within_its_limits() {
        let config = expanded(
            RouteConfig::new().blob(CategoryConfig::new().with_max_file_size("1KB").with_max_file_count(2)),
        );

        let mixed = [
            FileInfo::new("notes.txt", 100, "text/plain"),
            FileInfo::new("mail.eml", 100, "message/rfc822"),
        ];
        assert!(!file_verification_failed(&mixed, &config));

        let too_big = [FileInfo::new("movie.mp4", 4096, "video/mp4")];
        assert!(matches!(
            verify_files(&too_big, &config),
            Err(VerificationError::FileTooLarge { category: FileCategory::Blob, .. })
        ));

        let too_many = [png("a.png", 1), png("b.png", 1), png("c.png", 1)];
        assert!(matches!(
            verify_files(&too_many, &config),
            Err(VerificationError::TooManyFiles { category: FileCategory::Blob, .. })
        ));
    }

    #[test]
    fn blob_skips_mime_lists_of_declared_categories() {
        let config = expanded(
            RouteConfig::new()
                .image(CategoryConfig::new().with_accepted_files(["image/png"]))
                .blob(CategoryConfig::new()),
        );
        assert!(!file_verification_failed(&[FileInfo::new("a.gif", 10, "image/gif")], &config));
    }
}
