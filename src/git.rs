//! Version-control primitives used by the indexing pipeline
//!
//! The pipeline only needs three things from version control: the list of
//! tracked and untracked-but-not-ignored files (fast discovery), the content
//! hash of every tracked file (cache validation without reading files), and the
//! paths changed between two refs (delta sync after a branch switch). Every call
//! is optional for the pipeline: failures fall back to slower strategies.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Version-control capabilities consumed by the indexer
pub trait VersionControl: Send + Sync {
    /// Tracked plus untracked-but-not-ignored files, as absolute paths
    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// `(absolute path, content hash)` for every file in the index
    fn list_staged_hashes(&self, root: &Path) -> Result<Vec<(PathBuf, String)>>;

    /// Paths (relative to `root`) that differ between two refs
    fn diff_name_only(&self, root: &Path, ref_a: &str, ref_b: &str) -> Result<Vec<String>>;
}

/// Check if the directory is the root of a git repository
pub fn is_git_repo(root: impl AsRef<Path>) -> bool {
    root.as_ref().join(".git").exists()
}

/// [`VersionControl`] backed by the `git` command line
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    /// Run `git -C <root> <args>` and return stdout
    fn run(&self, root: &Path, args: &[&str]) -> Result<Vec<u8>> {
        let output = Command::new("git")
            .arg("-C")
            .arg(root)
            .args(args)
            .output()
            .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;

        if !output.status.success() {
            anyhow::bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(output.stdout)
    }
}

impl VersionControl for GitCli {
    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !is_git_repo(root) {
            anyhow::bail!("Not a git repository: {}", root.display());
        }

        let stdout = self.run(
            root,
            &["ls-files", "--cached", "--others", "--exclude-standard", "-z"],
        )?;

        let mut files: Vec<PathBuf> = split_nul(&stdout).map(|rel| root.join(rel)).collect();
        // Deleted-but-tracked files still appear in --cached
        files.retain(|p| p.is_file());
        files.sort();
        files.dedup();

        Ok(files)
    }

    fn list_staged_hashes(&self, root: &Path) -> Result<Vec<(PathBuf, String)>> {
        if !is_git_repo(root) {
            anyhow::bail!("Not a git repository: {}", root.display());
        }

        let stdout = self.run(root, &["ls-files", "--stage", "-z"])?;
        Ok(split_nul(&stdout)
            .filter_map(parse_stage_entry)
            .map(|(hash, rel)| (root.join(rel), hash))
            .collect())
    }

    fn diff_name_only(&self, root: &Path, ref_a: &str, ref_b: &str) -> Result<Vec<String>> {
        let stdout = self.run(root, &["diff", "--name-only", "-z", ref_a, ref_b])?;
        Ok(split_nul(&stdout).collect())
    }
}

fn split_nul(stdout: &[u8]) -> impl Iterator<Item = String> + '_ {
    stdout
        .split(|b| *b == 0)
        .filter(|entry| !entry.is_empty())
        .map(|entry| String::from_utf8_lossy(entry).to_string())
}

/// Parse one `ls-files --stage` entry: `<mode> <hash> <stage>\t<path>`
fn parse_stage_entry(entry: String) -> Option<(String, String)> {
    let (meta, path) = entry.split_once('\t')?;
    let hash = meta.split_whitespace().nth(1)?;
    Some((hash.to_string(), path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn git(root: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(root)
            .args(["-c", "user.email=test@example.com", "-c", "user.name=test"])
            .args(args)
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    fn init_repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        git(temp.path(), &["init", "-q"]);
        fs::write(temp.path().join(".gitignore"), "ignored.rs\n").unwrap();
        fs::write(temp.path().join("tracked.rs"), "fn a() {}").unwrap();
        git(temp.path(), &["add", "tracked.rs", ".gitignore"]);
        git(temp.path(), &["commit", "-q", "-m", "init"]);
        fs::write(temp.path().join("untracked.rs"), "fn b() {}").unwrap();
        fs::write(temp.path().join("ignored.rs"), "fn c() {}").unwrap();
        temp
    }

    #[test]
    fn test_parse_stage_entry() {
        let entry = "100644 e69de29bb2d1d6434b8b29ae775ad8c2e48c5391 0\tsrc/my file.rs".to_string();
        let (hash, path) = parse_stage_entry(entry).unwrap();
        assert_eq!(hash, "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
        assert_eq!(path, "src/my file.rs");

        assert!(parse_stage_entry("garbage".to_string()).is_none());
    }

    #[test]
    fn test_not_a_repo() {
        let temp = TempDir::new().unwrap();
        assert!(!is_git_repo(temp.path()));
        assert!(GitCli::new().list_files(temp.path()).is_err());
        assert!(GitCli::new().list_staged_hashes(temp.path()).is_err());
    }

    #[test]
    fn test_list_files_respects_gitignore() {
        if !git_available() {
            return;
        }
        let repo = init_repo();
        let files = GitCli::new().list_files(repo.path()).unwrap();

        assert!(files.contains(&repo.path().join("tracked.rs")));
        assert!(files.contains(&repo.path().join("untracked.rs")));
        assert!(!files.contains(&repo.path().join("ignored.rs")));
    }

    #[test]
    fn test_list_staged_hashes() {
        if !git_available() {
            return;
        }
        let repo = init_repo();
        let hashes = GitCli::new().list_staged_hashes(repo.path()).unwrap();

        let tracked = hashes
            .iter()
            .find(|(p, _)| p == &repo.path().join("tracked.rs"))
            .unwrap();
        assert_eq!(tracked.1.len(), 40);
        assert!(!hashes.iter().any(|(p, _)| p.ends_with("untracked.rs")));
    }

    #[test]
    fn test_diff_name_only() {
        if !git_available() {
            return;
        }
        let repo = init_repo();
        fs::write(repo.path().join("tracked.rs"), "fn a2() {}").unwrap();
        git(repo.path(), &["commit", "-q", "-am", "change"]);

        let changed = GitCli::new()
            .diff_name_only(repo.path(), "HEAD~1", "HEAD")
            .unwrap();
        assert_eq!(changed, vec!["tracked.rs".to_string()]);
    }
}
