//! Sandbox - path containment for every filesystem access

use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::ToolError;

/// The canonical sandbox root and the containment check built on it
///
/// The root is canonicalized once at construction and never changes.
/// Every caller-supplied path goes through [`Sandbox::resolve`] before it
/// reaches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create a sandbox rooted at an existing directory
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ToolError> {
        let root = root.as_ref();
        debug!(?root, "Sandbox::new: called");
        let canonical = root.canonicalize()?;

        if !canonical.is_dir() {
            debug!(?canonical, "Sandbox::new: root is not a directory");
            return Err(ToolError::NotADirectory {
                path: root.display().to_string(),
            });
        }

        Ok(Self { root: canonical })
    }

    /// Canonical absolute sandbox root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an untrusted relative path to an absolute path inside the root
    ///
    /// The path is joined to the root and walked one component at a time.
    /// Each component that exists on disk is canonicalized before the next
    /// one is applied, so `..` after a symlink climbs from the link target
    /// as the OS would. Containment is decided per path component, so a
    /// sibling such as `/work-other` never matches `/work`.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        debug!(%relative, "Sandbox::resolve: called");

        let resolved = match resolve_physically(&self.root.join(relative)) {
            Ok(p) => p,
            Err(e) => {
                debug!(%e, "Sandbox::resolve: could not canonicalize, rejecting");
                return Err(self.violation(relative));
            }
        };

        if resolved.starts_with(&self.root) {
            debug!(?resolved, "Sandbox::resolve: path is within sandbox");
            Ok(resolved)
        } else {
            debug!(?resolved, "Sandbox::resolve: sandbox violation detected");
            Err(self.violation(relative))
        }
    }

    fn violation(&self, relative: &str) -> ToolError {
        ToolError::OutsideSandbox {
            path: relative.to_string(),
        }
    }
}

/// Walk `path` the way the kernel would, without requiring it to exist
///
/// Existing entries are canonicalized as they are reached, so symlinks are
/// followed before any later `..`. Entries that do not exist yet are kept
/// as written. Fails on an entry that exists but cannot be canonicalized,
/// which is the case for a dangling symlink.
fn resolve_physically(path: &Path) -> io::Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => {
                out.push(part);
                if out.symlink_metadata().is_ok() {
                    out = out.canonicalize()?;
                }
            }
        }
    }
    Ok(out)
}
