//! Local filesystem helpers used by the download path.
//!
//! - [`NameResolver`]: picks a free destination name when a file already exists
//! - [`sanitize_file_name`]: strips characters that are invalid in file names

mod name_resolver;

pub use name_resolver::NameResolver;

/// Characters rejected in file names on at least one supported platform.
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Removes characters that cannot appear in a file name.
///
/// Returns the name unchanged when it contains no such characters.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control() && !INVALID_FILE_NAME_CHARS.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_invalid_characters() {
        assert_eq!(sanitize_file_name("dir/sub\\a:b*?.txt"), "dirsubab.txt");
        assert_eq!(sanitize_file_name("plain.txt"), "plain.txt");
        assert_eq!(sanitize_file_name("tab\there"), "tabhere");
    }
}
