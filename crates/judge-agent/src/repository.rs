//! Read-only queries against a git working tree.
//!
//! Every query is scoped to a canonical repository root fixed at
//! construction. File reads are rejected when the resolved path leaves that
//! root (through `..` or a symlink) or exceeds the configured size ceiling.

use crate::{RepositoryConfig, RepositoryError};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::process::Command;
use walkdir::WalkDir;

pub const NO_DIFF_MESSAGE: &str = "No differences found between branches.";
pub const NO_CHANGED_FILES_MESSAGE: &str = "No files changed.";

#[async_trait]
pub trait RepositoryAccessor: Send + Sync {
    fn root(&self) -> &Path;

    /// Unified diff of `target...source`.
    async fn diff(&self, source_branch: &str, target_branch: &str)
    -> Result<String, RepositoryError>;

    /// Newline-separated paths changed in `target...source`.
    async fn changed_files(
        &self,
        source_branch: &str,
        target_branch: &str,
    ) -> Result<String, RepositoryError>;

    async fn list_branches(&self) -> Result<String, RepositoryError>;

    async fn read_file(&self, relative_path: &str) -> Result<String, RepositoryError>;

    /// Newline-separated relative paths of files named exactly `filename`.
    async fn find_file(&self, filename: &str) -> Result<String, RepositoryError>;
}

#[derive(Clone, Debug)]
pub struct GitRepository {
    root: PathBuf,
    config: RepositoryConfig,
}

impl GitRepository {
    pub fn open(config: RepositoryConfig) -> Result<Self, RepositoryError> {
        let root = std::fs::canonicalize(&config.root).map_err(|error| {
            RepositoryError::io(
                format!("cannot open repository '{}'", config.root.display()),
                error,
            )
        })?;
        if !root.is_dir() {
            return Err(RepositoryError::NotFound {
                path: config.root.display().to_string(),
            });
        }
        Ok(Self { root, config })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    async fn git(&self, operation: &str, args: &[&str]) -> Result<String, RepositoryError> {
        tracing::debug!(root = %self.root.display(), ?args, "running git");
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| RepositoryError::io(format!("failed to spawn git while {operation}"), error))?;

        if !output.status.success() {
            return Err(RepositoryError::Git {
                operation: operation.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Resolves a caller-supplied path to a canonical path inside the root.
    fn resolve_inside_root(&self, relative_path: &str) -> Result<PathBuf, RepositoryError> {
        let outside = || RepositoryError::OutsideRepository {
            path: relative_path.to_string(),
        };
        let requested = Path::new(relative_path);
        if requested.is_absolute() && !requested.starts_with(&self.root) {
            return Err(outside());
        }

        let joined = self.root.join(requested);
        let resolved = match std::fs::canonicalize(&joined) {
            Ok(resolved) => resolved,
            // A missing file is only "not found" if its lexical location is inside the root.
            Err(_) if lexically_inside(&self.root, &joined) => {
                return Err(RepositoryError::NotFound {
                    path: relative_path.to_string(),
                });
            }
            Err(_) => return Err(outside()),
        };
        if !resolved.starts_with(&self.root) {
            return Err(outside());
        }
        Ok(resolved)
    }
}

fn lexically_inside(root: &Path, path: &Path) -> bool {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return false;
                }
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized.starts_with(root)
}

/// Builds `target...source`. Names that git could parse as an option are
/// rejected.
fn three_dot_range(source_branch: &str, target_branch: &str) -> Result<String, RepositoryError> {
    for name in [source_branch, target_branch] {
        if name.trim().is_empty() || name.starts_with('-') {
            return Err(RepositoryError::InvalidBranch {
                name: name.to_string(),
            });
        }
    }
    Ok(format!("{target_branch}...{source_branch}"))
}

#[async_trait]
impl RepositoryAccessor for GitRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn diff(
        &self,
        source_branch: &str,
        target_branch: &str,
    ) -> Result<String, RepositoryError> {
        let range = three_dot_range(source_branch, target_branch)?;
        let diff = self
            .git("getting diff", &["diff", "--end-of-options", &range])
            .await?;
        if diff.trim().is_empty() {
            return Ok(NO_DIFF_MESSAGE.to_string());
        }
        Ok(diff)
    }

    async fn changed_files(
        &self,
        source_branch: &str,
        target_branch: &str,
    ) -> Result<String, RepositoryError> {
        let range = three_dot_range(source_branch, target_branch)?;
        let files = self
            .git(
                "getting changed files",
                &["diff", "--name-only", "--end-of-options", &range],
            )
            .await?;
        if files.is_empty() {
            return Ok(NO_CHANGED_FILES_MESSAGE.to_string());
        }
        Ok(files)
    }

    async fn list_branches(&self) -> Result<String, RepositoryError> {
        self.git(
            "listing branches",
            &["branch", "-a", "--format=%(refname:short)"],
        )
        .await
    }

    async fn read_file(&self, relative_path: &str) -> Result<String, RepositoryError> {
        let resolved = self.resolve_inside_root(relative_path)?;
        let not_found = || RepositoryError::NotFound {
            path: relative_path.to_string(),
        };

        let metadata = tokio::fs::metadata(&resolved)
            .await
            .map_err(|_| not_found())?;
        if !metadata.is_file() {
            return Err(not_found());
        }
        let max = self.config.max_file_bytes;
        if metadata.len() > max {
            return Err(RepositoryError::TooLarge {
                path: relative_path.to_string(),
                size: metadata.len(),
                max,
            });
        }

        let bytes = tokio::fs::read(&resolved).await.map_err(|error| {
            RepositoryError::io(format!("failed to read '{relative_path}'"), error)
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn find_file(&self, filename: &str) -> Result<String, RepositoryError> {
        let root = self.root.clone();
        let config = self.config.clone();
        let filename = filename.to_string();
        let matches = tokio::task::spawn_blocking(move || find_matches(&root, &config, &filename))
            .await
            .map_err(|error| {
                RepositoryError::io(
                    "file search task failed",
                    std::io::Error::other(error.to_string()),
                )
            })?;
        Ok(matches)
    }
}

fn find_matches(root: &Path, config: &RepositoryConfig, filename: &str) -> String {
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !config.is_skipped_dir(&entry.file_name().to_string_lossy())
        });

    let mut matches = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::debug!(%error, "skipping unreadable entry during file search");
                continue;
            }
        };
        if !entry.file_type().is_file() || entry.file_name() != filename {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            matches.push(relative.to_string_lossy().into_owned());
        }
    }

    if matches.is_empty() {
        return format!("No files named '{filename}' found in the repository.");
    }
    matches.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn repository(root: &Path) -> GitRepository {
        GitRepository::open(RepositoryConfig::new(root)).expect("open repository")
    }

    #[tokio::test(flavor = "current_thread")]
    async fn read_file_returns_lossy_utf8_contents() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("notes.txt"), b"caf\xffe\n").expect("write");
        let repo = repository(dir.path());

        let text = repo.read_file("notes.txt").await.expect("read");
        assert_eq!(text, "caf\u{fffd}e\n");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn read_file_rejects_parent_traversal() {
        let outer = tempdir().expect("tempdir");
        let root = outer.path().join("repo");
        std::fs::create_dir(&root).expect("mkdir");
        std::fs::write(outer.path().join("secret.txt"), "s3cret").expect("write");
        let repo = repository(&root);

        let error = repo.read_file("../secret.txt").await.expect_err("escape");
        assert!(matches!(error, RepositoryError::OutsideRepository { .. }));
        assert_eq!(
            error.to_string(),
            "path '../secret.txt' is outside the repository"
        );

        let error = repo.read_file("../missing.txt").await.expect_err("escape");
        assert!(matches!(error, RepositoryError::OutsideRepository { .. }));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "current_thread")]
    async fn read_file_rejects_symlink_escape() {
        let outer = tempdir().expect("tempdir");
        let root = outer.path().join("repo");
        std::fs::create_dir(&root).expect("mkdir");
        std::fs::write(outer.path().join("secret.txt"), "s3cret").expect("write");
        std::os::unix::fs::symlink(outer.path().join("secret.txt"), root.join("link.txt"))
            .expect("symlink");
        let repo = repository(&root);

        let error = repo.read_file("link.txt").await.expect_err("escape");
        assert!(matches!(error, RepositoryError::OutsideRepository { .. }));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn read_file_reports_missing_and_directories_as_not_found() {
        let dir = tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("src")).expect("mkdir");
        let repo = repository(dir.path());

        let error = repo.read_file("nope.rs").await.expect_err("missing");
        assert_eq!(error.to_string(), "file 'nope.rs' not found");
        let error = repo.read_file("src").await.expect_err("directory");
        assert!(matches!(error, RepositoryError::NotFound { .. }));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn read_file_rejects_oversized_files() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("big.txt"), vec![b'a'; 51_201]).expect("write");
        std::fs::write(dir.path().join("edge.txt"), vec![b'a'; 51_200]).expect("write");
        let repo = repository(dir.path());

        let error = repo.read_file("big.txt").await.expect_err("too large");
        assert_eq!(
            error.to_string(),
            "file 'big.txt' is too large (51201 bytes, max 51200)"
        );
        assert_eq!(repo.read_file("edge.txt").await.expect("at limit").len(), 51_200);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn find_file_skips_noise_and_hidden_directories() {
        let dir = tempdir().expect("tempdir");
        for sub in ["docs", "node_modules/pkg", ".hidden", "Pods/Lib", "a/b"] {
            std::fs::create_dir_all(dir.path().join(sub)).expect("mkdir");
        }
        for file in [
            "AGENTS.md",
            "docs/AGENTS.md",
            "node_modules/pkg/AGENTS.md",
            ".hidden/AGENTS.md",
            "Pods/Lib/AGENTS.md",
            "a/b/AGENTS.md",
            "a/b/AGENTS.md.bak",
        ] {
            std::fs::write(dir.path().join(file), "x").expect("write");
        }
        let repo = repository(dir.path());

        let found = repo.find_file("AGENTS.md").await.expect("search");
        let mut lines: Vec<&str> = found.lines().collect();
        lines.sort_unstable();
        let expected_nested = Path::new("a").join("b").join("AGENTS.md");
        let expected_docs = Path::new("docs").join("AGENTS.md");
        assert_eq!(
            lines,
            vec![
                "AGENTS.md",
                expected_nested.to_str().expect("utf8"),
                expected_docs.to_str().expect("utf8"),
            ]
        );

        assert_eq!(
            repo.find_file("CLAUDE.md").await.expect("search"),
            "No files named 'CLAUDE.md' found in the repository."
        );
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "current_thread")]
    async fn find_file_keeps_matches_past_unreadable_directories() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().expect("tempdir");
        let locked = dir.path().join("locked");
        std::fs::create_dir_all(locked.join("inner")).expect("mkdir");
        std::fs::write(locked.join("inner").join("AGENTS.md"), "x").expect("write");
        std::fs::write(dir.path().join("AGENTS.md"), "x").expect("write");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000))
            .expect("chmod");
        let repo = repository(dir.path());

        let found = repo.find_file("AGENTS.md").await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))
            .expect("restore permissions");

        let found = found.expect("search should tolerate unreadable directories");
        assert!(found.lines().any(|line| line == "AGENTS.md"));
    }

    #[test]
    fn branch_names_that_look_like_options_are_rejected() {
        assert_eq!(
            three_dot_range("feature/x", "main").expect("range"),
            "main...feature/x"
        );
        for (source, target) in [("main", "--output=x"), ("-p", "main"), ("", "main")] {
            let error = three_dot_range(source, target).expect_err("rejected");
            assert!(matches!(error, RepositoryError::InvalidBranch { .. }));
        }
    }

    #[test]
    fn lexical_containment_handles_parent_components() {
        let root = Path::new("/repo");
        assert!(lexically_inside(root, Path::new("/repo/a/../b.txt")));
        assert!(!lexically_inside(root, Path::new("/repo/../etc/passwd")));
    }
}
