//! Directory-symlink emulation for Windows, backed by NTFS junctions.
//!
//! Windows has no unprivileged primitive for symlinking a directory: real
//! symbolic links require either elevation or developer mode. Junctions
//! (mount-point reparse points) do not, which makes them the usual stand-in
//! when build tooling wants `symlink`-like behavior for folders. They come
//! with sharp edges, though: naive recursive deletes follow a junction and
//! destroy the *target's* contents, and removing one can leave a hollow
//! directory shell behind.
//!
//! This crate wraps junction management in symlink-shaped operations that
//! absorb those edges:
//!
//! * [`create`] replaces an existing link in place but refuses to clobber a
//!   non-empty plain directory.
//! * [`read`] reports the link target, or `None` for anything that is not a
//!   junction.
//! * [`unlink`] is idempotent and cleans up the directory shell the OS can
//!   leave behind, verifying the link is actually gone.
//! * [`rmtree_shallow`] deletes a tree while treating every reparse point in
//!   it as an opaque leaf.
//!
//! All operations talk to the filesystem directly through
//! `DeviceIoControl`; nothing shells out. Only NTFS supports junctions.
#![cfg(windows)]
#![deny(rust_2018_idioms)]

mod error;
mod internals;

pub use crate::error::{Error, Result};

use std::path::{Path, PathBuf};

/// Creates a junction at `link` pointing to `target`.
///
/// Any junction already present at `link` is replaced. An *empty* plain
/// directory at `link` is removed first; a non-empty one is a hard error, so
/// real data is never silently swapped out for a link. Missing parent
/// directories of `link` are created.
///
/// `target` should normally exist. Creating a junction to a missing target
/// succeeds at the OS level and yields a dangling link.
///
/// Not safe for concurrent use against the same `link` path; callers must
/// serialize per path.
///
/// # Example
///
/// ```rust
/// # use std::fs;
/// fn main() -> win_symlink::Result<()> {
///     let tmp = tempfile::tempdir()?;
///     let target = tmp.path().join("target");
///     let link = tmp.path().join("link");
///     fs::create_dir_all(&target)?;
///     win_symlink::create(&target, &link)?;
///     assert!(win_symlink::is_link(&link));
///     Ok(())
/// }
/// ```
pub fn create<P, Q>(target: P, link: Q) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    internals::create(target.as_ref(), link.as_ref())
}

/// Returns the target of the junction at `link`, or `None` if `link` is not
/// a junction.
///
/// A missing path, a plain file, a plain directory, and a reparse point of
/// some other kind all report `None`; querying a non-link is an expected
/// outcome, not an error. Unexpected query failures are logged and also
/// mapped to `None`.
pub fn read<P: AsRef<Path>>(link: P) -> Option<PathBuf> {
    internals::read(link.as_ref())
}

/// Determines whether `link` currently exists and is a junction.
pub fn is_link<P: AsRef<Path>>(link: P) -> bool {
    internals::read(link.as_ref()).is_some()
}

/// Removes the junction at `link`, if there is one.
///
/// A no-op when `link` is not a junction, so callers can unlink
/// unconditionally. Deleting the reparse data can leave an empty directory
/// shell behind; that shell is removed best-effort and only logged on
/// failure. If the junction itself still resolves afterwards the call fails
/// with [`Error::LinkStillExists`].
///
/// # Example
///
/// ```rust
/// # use std::fs;
/// fn main() -> win_symlink::Result<()> {
///     let tmp = tempfile::tempdir()?;
///     let target = tmp.path().join("target");
///     let link = tmp.path().join("link");
///     fs::create_dir_all(&target)?;
///     win_symlink::create(&target, &link)?;
///     win_symlink::unlink(&link)?;
///     assert!(!win_symlink::is_link(&link));
///     win_symlink::unlink(&link)?; // idempotent
///     Ok(())
/// }
/// ```
pub fn unlink<P: AsRef<Path>>(link: P) -> Result<()> {
    internals::unlink(link.as_ref())
}

/// Deletes `path` and everything under it without following reparse points.
///
/// Junctions and symlinks encountered anywhere in the tree, including `path`
/// itself, are removed as single entries; their targets are untouched. This
/// is the behavior `rmtree` has on Unix and is the safe way to tear down
/// build output that may contain junctions. Read-only attributes on files
/// are cleared along the way.
///
/// `path` must exist. Deletion is irreversible.
pub fn rmtree_shallow<P: AsRef<Path>>(path: P) -> Result<()> {
    internals::rmtree_shallow(path.as_ref())
}

/// Reports whether `a` and `b` denote the same filesystem path.
///
/// Two empty paths are equivalent. Otherwise paths compare equal as strings,
/// after canonicalization, or as a last resort by the underlying volume
/// serial and file index, the Windows equivalent of device+inode. Any error
/// along the way means "not equivalent"; this never fails.
pub fn paths_equivalent<P, Q>(a: P, b: Q) -> bool
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    internals::paths_equivalent(a.as_ref(), b.as_ref())
}

#[cfg(test)]
mod tests;
