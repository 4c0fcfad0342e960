use crate::errors::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Document type produced by the authoring pipeline and routed on
/// completion. Routed filenames carry the drawing number as the leading
/// `_`-separated token.
pub const ROUTED_DOC_EXT: &str = "pdf";

/// Resolves the folder that receives a job's finished documents. Failure
/// aborts a completion before any status mutates.
pub trait DestinationResolver {
    fn finished_documents_dir(&self, job_id: &str) -> AppResult<PathBuf>;
}

/// Channel for confirmation messages after a job is closed.
pub trait CompletionNotifier {
    fn job_closed(&self, job_id: &str, summary: &[String]) -> AppResult<()>;
}

/// Consulted only when a job record's workspace is missing or inaccessible
/// on the current machine.
pub trait WorkspaceValidator {
    fn resolve(&self, job_id: &str, recorded: Option<&Path>) -> AppResult<PathBuf>;
}

pub fn leading_token(filename: &str) -> &str {
    filename.split('_').next().unwrap_or(filename)
}

/// Every routable document under a workspace tree.
pub fn workspace_documents(workspace: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(workspace) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(%error, "skipping unreadable workspace entry");
                continue;
            }
        };
        let path = entry.path();
        let is_doc = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ROUTED_DOC_EXT));
        if entry.file_type().is_file() && is_doc {
            paths.push(path.to_path_buf());
        }
    }
    paths
}

/// Move a file into a destination directory, keeping its name. Falls back
/// to copy-and-delete when the destination is on a different filesystem.
pub fn move_to(src: &Path, dst_dir: &Path) -> AppResult<PathBuf> {
    let Some(name) = src.file_name() else {
        return Err(AppError::Io(format!("{} has no filename", src.display())));
    };
    let dst = dst_dir.join(name);
    match fs::rename(src, &dst) {
        Ok(()) => Ok(dst),
        Err(_) => {
            fs::copy(src, &dst).map_err(|error| AppError::Io(error.to_string()))?;
            fs::remove_file(src).map_err(|error| AppError::Io(error.to_string()))?;
            Ok(dst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_token_splits_on_first_underscore() {
        assert_eq!(leading_token("105000-01-02-03_revA.pdf"), "105000-01-02-03");
        assert_eq!(leading_token("105000-01-02-03.pdf"), "105000-01-02-03.pdf");
        assert_eq!(leading_token(""), "");
    }

    #[test]
    fn workspace_walk_finds_nested_documents_only() {
        let root = tempfile::tempdir().expect("temp workspace");
        let nested = root.path().join("drawings/revisions");
        fs::create_dir_all(&nested).expect("nested dirs");
        fs::write(root.path().join("105000-01-02-03_revA.pdf"), b"doc").expect("top doc");
        fs::write(nested.join("105000-01-02-04_revB.PDF"), b"doc").expect("nested doc");
        fs::write(nested.join("notes.txt"), b"text").expect("stray file");

        let mut found = workspace_documents(root.path());
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("105000-01-02-03_revA.pdf"));
        assert!(found[1].ends_with("105000-01-02-04_revB.PDF"));
    }

    #[test]
    fn move_to_relocates_and_keeps_the_filename() {
        let root = tempfile::tempdir().expect("temp root");
        let src_dir = root.path().join("src");
        let dst_dir = root.path().join("dst");
        fs::create_dir_all(&src_dir).expect("src dir");
        fs::create_dir_all(&dst_dir).expect("dst dir");

        let src = src_dir.join("105000-01-02-03_revA.pdf");
        fs::write(&src, b"doc").expect("write doc");

        let moved = move_to(&src, &dst_dir).expect("move");
        assert!(!src.exists());
        assert_eq!(moved, dst_dir.join("105000-01-02-03_revA.pdf"));
        assert_eq!(fs::read(moved).expect("read moved"), b"doc");
    }
}
