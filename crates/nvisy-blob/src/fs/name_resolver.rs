//! Collision-free destination file names.

use std::io;
use std::path::Path;

use crate::TRACING_TARGET_FS;

/// Resolves destination file names that do not collide with existing files.
///
/// The resolver only queries the filesystem; it never creates files. The check
/// and the later write are not atomic, so a file created concurrently between
/// the two may still be overwritten or cause the write to fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct NameResolver;

impl NameResolver {
    /// Returns `candidate` if `directory/candidate` is free, otherwise the first
    /// free `stem(k)extension` for `k = 1, 2, ...`.
    ///
    /// The extension is everything from the last `.` of the final path
    /// component (inclusive), so `report.tar.gz` resolves to
    /// `report.tar(1).gz`.
    pub async fn resolve(directory: &Path, candidate: &str) -> io::Result<String> {
        if !tokio::fs::try_exists(directory.join(candidate)).await? {
            return Ok(candidate.to_owned());
        }

        let (stem, extension) = split_extension(candidate);
        let mut index: u64 = 1;
        loop {
            let renamed = format!("{stem}({index}){extension}");
            if !tokio::fs::try_exists(directory.join(&renamed)).await? {
                tracing::debug!(
                    target: TRACING_TARGET_FS,
                    candidate,
                    renamed = %renamed,
                    "resolved colliding file name"
                );
                return Ok(renamed);
            }
            index += 1;
        }
    }
}

/// Splits `name` into stem and extension at the last `.` of its final path
/// component.
pub(crate) fn split_extension(name: &str) -> (&str, &str) {
    let start = name.rfind(['/', '\\']).map_or(0, |at| at + 1);
    match name[start..].rfind('.') {
        Some(at) => name.split_at(start + at),
        None => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn keeps_available_name() {
        let dir = TempDir::new().unwrap();
        let name = NameResolver::resolve(dir.path(), "new_file.txt").await.unwrap();
        assert_eq!(name, "new_file.txt");
    }

    #[tokio::test]
    async fn adds_number_in_parenthesis() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("existing_file.txt"), b"x").unwrap();

        let name = NameResolver::resolve(dir.path(), "existing_file.txt")
            .await
            .unwrap();
        assert_eq!(name, "existing_file(1).txt");
    }

    #[tokio::test]
    async fn increments_until_available() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("existing_file.txt"), b"x").unwrap();

        for expected in 1..=10 {
            let name = NameResolver::resolve(dir.path(), "existing_file.txt")
                .await
                .unwrap();
            assert_eq!(name, format!("existing_file({expected}).txt"));
            std::fs::write(dir.path().join(&name), b"x").unwrap();
        }
    }

    #[tokio::test]
    async fn fills_first_gap() {
        let dir = TempDir::new().unwrap();
        for name in ["data.csv", "data(1).csv", "data(3).csv"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let name = NameResolver::resolve(dir.path(), "data.csv").await.unwrap();
        assert_eq!(name, "data(2).csv");
    }

    #[tokio::test]
    async fn name_without_extension() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README"), b"x").unwrap();

        let name = NameResolver::resolve(dir.path(), "README").await.unwrap();
        assert_eq!(name, "README(1)");
    }

    #[test]
    fn splits_at_last_dot() {
        assert_eq!(split_extension("report.tar.gz"), ("report.tar", ".gz"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".env"), ("", ".env"));
    }

    #[test]
    fn extension_comes_from_final_component() {
        assert_eq!(split_extension("logs.2024/readme"), ("logs.2024/readme", ""));
        assert_eq!(split_extension("logs.2024/readme.md"), ("logs.2024/readme", ".md"));
        assert_eq!(split_extension("v1.2\\notes"), ("v1.2\\notes", ""));
    }

    #[tokio::test]
    async fn dotted_directory_keeps_suffix_on_file() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("logs.2024")).unwrap();
        std::fs::write(dir.path().join("logs.2024/readme"), b"x").unwrap();

        let name = NameResolver::resolve(dir.path(), "logs.2024/readme").await.unwrap();
        assert_eq!(name, "logs.2024/readme(1)");
    }
}
