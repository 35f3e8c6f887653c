//! Caller-selected policies for downloads and deletes.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// What to do when the download destination file already exists.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum FileExistsAction {
    /// Fail with a collision error.
    #[default]
    Error,
    /// Write to `name(1).ext`, incrementing the number until a free name is found.
    Rename,
    /// Overwrite the existing file.
    Overwrite,
}

/// What happens to blob snapshots when the blob is deleted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum SnapshotDeleteOption {
    /// Delete the base blob only; fails on the backend if snapshots exist.
    None,
    /// Delete the base blob together with its snapshots.
    #[default]
    IncludeSnapshots,
    /// Delete the snapshots and keep the base blob.
    DeleteSnapshotsOnly,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(FileExistsAction::from_str("rename").unwrap(), FileExistsAction::Rename);
        assert_eq!(
            SnapshotDeleteOption::from_str("DELETESNAPSHOTSONLY").unwrap(),
            SnapshotDeleteOption::DeleteSnapshotsOnly
        );
        assert!(FileExistsAction::from_str("append").is_err());
    }

    #[test]
    fn defaults() {
        assert_eq!(FileExistsAction::default(), FileExistsAction::Error);
        assert_eq!(SnapshotDeleteOption::default(), SnapshotDeleteOption::IncludeSnapshots);
    }
}
