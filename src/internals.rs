mod helpers;
mod reparse;
mod types;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};
use windows_sys::Win32::Foundation::{
    ERROR_FILE_NOT_FOUND, ERROR_NOT_A_REPARSE_POINT, ERROR_PATH_NOT_FOUND,
};

use crate::error::{Error, Result};

/// Retry budget for directory removal. Antivirus and indexing services hold
/// transient handles on freshly created or freshly unlinked directories, and
/// the OS itself can lag releasing them.
const REMOVE_DIR_RETRIES: u32 = 10;
const REMOVE_DIR_RETRY_DELAY: Duration = Duration::from_millis(100);

pub fn create(target: &Path, link: &Path) -> Result<()> {
    let target = std::path::absolute(target)?;
    let link = std::path::absolute(link)?;

    // `is_dir` follows links, so the link check has to come first. An empty
    // plain directory in the way is removed; a non-empty one makes
    // `remove_empty_dir` fail, which is the guard against replacing real
    // data with a link.
    if link.is_dir() && !is_link(&link) {
        remove_empty_dir(&link)?;
    } else {
        unlink(&link)?;
    }

    if let Some(parent) = link.parent() {
        if !parent.is_dir() {
            fs::create_dir_all(parent)?;
        }
    }
    reparse::set(&target, &link)?;
    Ok(())
}

pub fn read(link: &Path) -> Option<PathBuf> {
    match reparse::read(link) {
        Ok(target) => target,
        Err(e) if is_not_a_link(&e) => None,
        Err(e) => {
            warn!(
                path = %link.display(),
                error = %e,
                "reparse point query failed, treating path as not a link"
            );
            None
        }
    }
}

pub fn is_link(link: &Path) -> bool {
    read(link).is_some()
}

pub fn unlink(link: &Path) -> Result<()> {
    if !is_link(link) {
        return Ok(());
    }
    reparse::delete(link).map_err(Error::Io)?;

    // Stripping the reparse data detaches the link but can leave a hollow
    // directory shell behind. Removing it is best-effort.
    if link.is_dir() {
        if let Err(e) = remove_empty_dir(link) {
            warn!(
                path = %link.display(),
                error = %e,
                "could not remove directory shell left behind by unlink"
            );
        }
    }

    if let Some(target) = read(link) {
        return Err(Error::LinkStillExists {
            link: link.to_path_buf(),
            target,
        });
    }
    if link.is_dir() {
        warn!(path = %link.display(), "unlinked junction still exists as a plain directory");
    }
    Ok(())
}

pub fn rmtree_shallow(path: &Path) -> Result<()> {
    let path = std::path::absolute(path)?;
    let meta = fs::symlink_metadata(&path)?;
    let file_type = meta.file_type();
    if file_type.is_symlink() {
        // The whole tree is a single link entry. Junctions and directory
        // symlinks are removed like directories, file symlinks like files.
        return remove_link_entry(&path).map_err(Error::Io);
    }
    if file_type.is_dir() {
        remove_tree(&path)
    } else {
        clear_readonly(&path)?;
        fs::remove_file(&path)?;
        Ok(())
    }
}

fn remove_tree(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let child = entry.path();
        if file_type.is_symlink() {
            // Reparse points are opaque leaves: drop the link, never the
            // contents of its target.
            remove_link_entry(&child)?;
        } else if file_type.is_dir() {
            remove_tree(&child)?;
        } else {
            clear_readonly(&child)?;
            fs::remove_file(&child)?;
        }
    }
    remove_empty_dir(dir)
}

fn remove_link_entry(link: &Path) -> io::Result<()> {
    use std::os::windows::fs::MetadataExt;
    use windows_sys::Win32::Storage::FileSystem::FILE_ATTRIBUTE_DIRECTORY;

    let attrs = fs::symlink_metadata(link)?.file_attributes();
    if attrs & FILE_ATTRIBUTE_DIRECTORY != 0 {
        fs::remove_dir(link)
    } else {
        fs::remove_file(link)
    }
}

/// Removes an empty directory, retrying on failure.
///
/// Each attempt clears the read-only attribute first. After the final
/// attempt the error escalates; for a non-empty directory that is an
/// `ERROR_DIR_NOT_EMPTY` wrapped in [`Error::RemoveDir`].
fn remove_empty_dir(path: &Path) -> Result<()> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match clear_readonly(path).and_then(|()| fs::remove_dir(path)) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if attempt >= REMOVE_DIR_RETRIES {
            return Err(Error::RemoveDir {
                path: path.to_path_buf(),
                source: err,
            });
        }
        debug!(
            path = %path.display(),
            attempt,
            error = %err,
            "directory removal failed, retrying"
        );
        thread::sleep(REMOVE_DIR_RETRY_DELAY);
    }
}

fn clear_readonly(path: &Path) -> io::Result<()> {
    let mut perms = fs::symlink_metadata(path)?.permissions();
    if perms.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

pub fn paths_equivalent(a: &Path, b: &Path) -> bool {
    let (a_empty, b_empty) = (a.as_os_str().is_empty(), b.as_os_str().is_empty());
    if a_empty || b_empty {
        return a_empty && b_empty;
    }
    if a == b {
        return true;
    }
    if let (Ok(ca), Ok(cb)) = (dunce::canonicalize(a), dunce::canonicalize(b)) {
        if ca == cb {
            return true;
        }
    }
    // Same underlying record even when the spellings differ, e.g. one side
    // reached through another junction or an 8.3 short name.
    match (helpers::file_ids(a), helpers::file_ids(b)) {
        (Ok(ia), Ok(ib)) => ia == ib,
        _ => false,
    }
}

fn is_not_a_link(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::NotFound {
        return true;
    }
    matches!(
        e.raw_os_error(),
        Some(code)
            if code == ERROR_FILE_NOT_FOUND as i32
                || code == ERROR_PATH_NOT_FOUND as i32
                || code == ERROR_NOT_A_REPARSE_POINT as i32
    )
}
