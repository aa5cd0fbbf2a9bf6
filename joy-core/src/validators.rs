//! Name rules for folders, file names and object keys.

use std::sync::OnceLock;

use regex::Regex;

pub const FOLDER_NAME_MESSAGE: &str =
    "Folder name can only contain letters, numbers, dashes, and underscores, separated by single slashes.";

pub const FILE_NAME_MESSAGE: &str =
    "File name can only contain letters, numbers, dashes, underscores, and periods.";

fn folder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9_-]+(/[a-zA-Z0-9_-]+)*/?$").expect("valid regex")
    })
}

fn file_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.-]*$").expect("valid regex"))
}

fn object_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(([a-zA-Z0-9_-])+(/([a-zA-Z0-9_-]+))*/)?[a-zA-Z0-9_.-]*$")
            .expect("valid regex")
    })
}

/// `user_1/avatars` or `user_1/avatars/`.
pub fn folder_name_is_valid(folder: &str) -> bool {
    folder_pattern().is_match(folder)
}

pub fn file_name_is_valid(name: &str) -> bool {
    file_name_pattern().is_match(name)
}

/// Object key relative to the project: an optional folder path plus a file name.
pub fn object_key_is_valid(key: &str) -> bool {
    object_key_pattern().is_match(key)
}

/// `folder` + `/` + `name`, without doubling the slash.
pub fn object_key(folder: Option<&str>, name: &str) -> String {
    match folder.map(|f| f.trim_end_matches('/')).filter(|f| !f.is_empty()) {
        Some(folder) => format!("{folder}/{name}"),
        None => name.to_string(),
    }
}
