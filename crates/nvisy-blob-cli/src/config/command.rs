//! Subcommands, one per blob task.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use nvisy_blob::store::{BlobStore, DEFAULT_PARALLEL_OPERATIONS};
use nvisy_blob::tasks::{
    self, DeleteBlobInput, DeleteContainerInput, DestinationFile, ListInput, SourceBlob,
    UploadInput,
};
use nvisy_blob::types::{BlobKind, FileExistsAction, SnapshotDeleteOption};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Blob task to run.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Upload a local file.
    Upload(UploadArgs),
    /// Download a blob into a directory.
    Download(DownloadArgs),
    /// Print the content of a blob as text.
    Read(ReadArgs),
    /// List the blobs of a container.
    List(ListArgs),
    /// Delete a blob.
    DeleteBlob(DeleteBlobArgs),
    /// Delete a container and all of its blobs.
    DeleteContainer(DeleteContainerArgs),
}

#[derive(Debug, Clone, Args)]
pub struct UploadArgs {
    /// Local file to upload.
    pub source_file: PathBuf,
    /// Destination container.
    pub container: String,
    /// Blob name; defaults to the file name.
    #[arg(long)]
    pub blob_name: Option<String>,
    /// Blob kind: Block, Append or Page.
    #[arg(long, default_value = "Block")]
    pub blob_kind: BlobKind,
    /// Fail when the blob already exists.
    #[arg(long)]
    pub no_overwrite: bool,
    /// Fail when the container does not exist.
    #[arg(long)]
    pub no_create_container: bool,
    /// Gzip the content.
    #[arg(long)]
    pub compress: bool,
    /// Re-encode the file as text.
    #[arg(long)]
    pub text: bool,
    /// Target text encoding.
    #[arg(long, default_value = "utf-8")]
    pub encoding: String,
    /// Content type; guessed from the extension when absent.
    #[arg(long)]
    pub content_type: Option<String>,
    /// Index tag as `key=value`; repeatable.
    #[arg(long = "tag", value_parser = parse_tag)]
    pub tags: Vec<(String, String)>,
    /// Upper bound of concurrent chunk uploads.
    #[arg(long, default_value_t = DEFAULT_PARALLEL_OPERATIONS)]
    pub parallel_operations: usize,
}

impl UploadArgs {
    fn to_input(&self) -> UploadInput {
        UploadInput {
            blob_name: self.blob_name.clone(),
            blob_kind: self.blob_kind,
            overwrite: !self.no_overwrite,
            create_container: !self.no_create_container,
            compress: self.compress,
            treat_as_text: self.text,
            encoding: self.encoding.clone(),
            content_type: self.content_type.clone(),
            tags: self.tags.iter().cloned().collect::<HashMap<_, _>>(),
            parallel_operations: self.parallel_operations,
            ..UploadInput::new(&self.source_file, &self.container)
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    /// Container holding the blob.
    pub container: String,
    /// Name of the blob.
    pub blob_name: String,
    /// Existing destination directory.
    #[arg(long, default_value = ".")]
    pub directory: PathBuf,
    /// What to do when the file exists: Error, Rename or Overwrite.
    #[arg(long, default_value = "Error")]
    pub if_exists: FileExistsAction,
    /// Remove characters that are invalid in file names.
    #[arg(long)]
    pub parse_illegal_characters: bool,
    /// Encoding of the written file; empty keeps the stored encoding.
    #[arg(long, default_value = "utf-8")]
    pub encoding: String,
}

#[derive(Debug, Clone, Args)]
pub struct ReadArgs {
    /// Container holding the blob.
    pub container: String,
    /// Name of the blob.
    pub blob_name: String,
    /// Encoding used to decode the content; empty uses the stored encoding.
    #[arg(long, default_value = "utf-8")]
    pub encoding: String,
}

#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Container to list.
    pub container: String,
    /// Only list names starting with this prefix.
    #[arg(long)]
    pub prefix: Option<String>,
    /// Group names at `/` into virtual directories.
    #[arg(long)]
    pub hierarchical: bool,
}

#[derive(Debug, Clone, Args)]
pub struct DeleteBlobArgs {
    /// Container holding the blob.
    pub container: String,
    /// Name of the blob.
    pub blob_name: String,
    /// Only delete if the blob still has this etag.
    #[arg(long)]
    pub if_match: Option<String>,
    /// Snapshot handling: None, IncludeSnapshots or DeleteSnapshotsOnly.
    #[arg(long, default_value = "IncludeSnapshots")]
    pub snapshots: SnapshotDeleteOption,
}

#[derive(Debug, Clone, Args)]
pub struct DeleteContainerArgs {
    /// Container to delete.
    pub container: String,
}

impl Command {
    /// Subcommand name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Upload(_) => "upload",
            Self::Download(_) => "download",
            Self::Read(_) => "read",
            Self::List(_) => "list",
            Self::DeleteBlob(_) => "delete-blob",
            Self::DeleteContainer(_) => "delete-container",
        }
    }

    /// Runs the task and returns its output as JSON.
    pub async fn execute(
        &self,
        store: &dyn BlobStore,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Value> {
        let output = match self {
            Self::Upload(args) => {
                let output = tasks::upload_file(store, &args.to_input(), cancel)
                    .await
                    .context("upload failed")?;
                serde_json::to_value(output)?
            }
            Self::Download(args) => {
                let source = SourceBlob {
                    encoding: args.encoding.clone(),
                    ..SourceBlob::new(&args.container, &args.blob_name)
                };
                let destination = DestinationFile {
                    file_exists_action: args.if_exists,
                    parse_illegal_characters: args.parse_illegal_characters,
                    ..DestinationFile::new(&args.directory)
                };
                let output = tasks::download_blob(store, &source, &destination, cancel)
                    .await
                    .context("download failed")?;
                serde_json::to_value(output)?
            }
            Self::Read(args) => {
                let source = SourceBlob {
                    encoding: args.encoding.clone(),
                    ..SourceBlob::new(&args.container, &args.blob_name)
                };
                let output = tasks::read_blob_content(store, &source, cancel)
                    .await
                    .context("read failed")?;
                serde_json::to_value(output)?
            }
            Self::List(args) => {
                let input = ListInput {
                    flat_blob_listing: !args.hierarchical,
                    prefix: args.prefix.clone(),
                    ..ListInput::new(&args.container)
                };
                let output = tasks::list_blobs(store, &input, cancel)
                    .await
                    .context("listing failed")?;
                serde_json::to_value(output)?
            }
            Self::DeleteBlob(args) => {
                let input = DeleteBlobInput {
                    verify_etag_when_deleting: args.if_match.clone(),
                    snapshot_delete_option: args.snapshots,
                    ..DeleteBlobInput::new(&args.container, &args.blob_name)
                };
                let output = tasks::delete_blob(store, &input, cancel)
                    .await
                    .context("blob deletion failed")?;
                serde_json::to_value(output)?
            }
            Self::DeleteContainer(args) => {
                let input = DeleteContainerInput {
                    container: args.container.clone(),
                };
                let output = tasks::delete_container(store, &input, cancel)
                    .await
                    .context("container deletion failed")?;
                serde_json::to_value(output)?
            }
        };

        Ok(output)
    }
}

/// Parses a `key=value` tag.
fn parse_tag(value: &str) -> Result<(String, String), String> {
    let (key, tag) = value
        .split_once('=')
        .ok_or_else(|| format!("invalid tag '{value}', expected key=value"))?;
    if key.trim().is_empty() {
        return Err(format!("invalid tag '{value}', key is empty"));
    }
    Ok((key.trim().to_owned(), tag.to_owned()))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use nvisy_blob::providers::MemoryProvider;

    use super::*;
    use crate::config::Cli;

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["nvisy-blob"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn parses_tags() {
        assert_eq!(parse_tag("team=data").unwrap(), ("team".into(), "data".into()));
        assert_eq!(parse_tag("a=b=c").unwrap(), ("a".into(), "b=c".into()));
        assert!(parse_tag("novalue").is_err());
        assert!(parse_tag("=x").is_err());
    }

    #[test]
    fn upload_flags_map_onto_input() {
        let Command::Upload(args) = parse(&[
            "upload",
            "./report.csv",
            "reports",
            "--no-overwrite",
            "--compress",
            "--text",
            "--encoding",
            "unicode",
            "--tag",
            "team=data",
        ]) else {
            panic!("expected upload");
        };

        let input = args.to_input();
        assert!(!input.overwrite);
        assert!(input.create_container);
        assert!(input.compress && input.treat_as_text);
        assert_eq!(input.encoding, "unicode");
        assert_eq!(input.tags.get("team").map(String::as_str), Some("data"));
    }

    #[test]
    fn parses_policies_case_insensitively() {
        let Command::Download(args) = parse(&["download", "box", "a.txt", "--if-exists", "rename"])
        else {
            panic!("expected download");
        };
        assert_eq!(args.if_exists, FileExistsAction::Rename);

        let Command::DeleteBlob(args) =
            parse(&["delete-blob", "box", "a.txt", "--snapshots", "deletesnapshotsonly"])
        else {
            panic!("expected delete-blob");
        };
        assert_eq!(args.snapshots, SnapshotDeleteOption::DeleteSnapshotsOnly);
    }

    #[tokio::test]
    async fn delete_container_reports_success() {
        let store = MemoryProvider::new();
        let output = parse(&["delete-container", "missing"])
            .execute(&store, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output, serde_json::json!({ "success": true }));
    }
}
