//! git::repo
//!
//! Read-only inspection of local clones through git2.
//!
//! The pool uses this to decide whether a destination already holds a
//! repository (refresh instead of clone) and to record the commit a
//! finished clone points at. Opening never searches parent
//! directories: a project nested under another clone's directory must not
//! be mistaken for it.

use std::path::Path;

use super::GitError;

/// A local repository opened for inspection.
pub struct LocalRepo {
    repo: git2::Repository,
}

impl std::fmt::Debug for LocalRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRepo")
            .field("path", &self.repo.path())
            .field("bare", &self.repo.is_bare())
            .finish()
    }
}

impl LocalRepo {
    /// Open the repository rooted exactly at `path`.
    ///
    /// # Errors
    ///
    /// [`GitError::NotARepo`] if `path` is not a repository root.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let flags = git2::RepositoryOpenFlags::NO_SEARCH;
        let repo = git2::Repository::open_ext(path, flags, std::iter::empty::<&std::ffi::OsStr>())
            .map_err(|_| GitError::NotARepo {
                path: path.to_path_buf(),
            })?;
        Ok(Self { repo })
    }

    pub fn is_bare(&self) -> bool {
        self.repo.is_bare()
    }

    /// Commit id HEAD points at, or `None` for an empty repository.
    pub fn head_oid(&self) -> Option<String> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .map(|oid| oid.to_string())
    }
}
