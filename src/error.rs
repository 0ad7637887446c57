//! Typed error definitions for win-symlink.
//!
//! Most failures are plain I/O errors from the underlying filesystem calls
//! and travel through [`Error::Io`]. The named variants cover the two
//! conditions callers are expected to branch on: a directory that could not
//! be removed (which is also how an attempt to overwrite a non-empty
//! directory with a link surfaces), and a junction that survived its own
//! deletion.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Post-deletion verification found the junction still resolving.
    #[error("junction {link} still resolves to {target} after deletion")]
    LinkStillExists { link: PathBuf, target: PathBuf },

    /// A directory could not be removed after the retry budget was spent.
    /// Non-empty directories land here immediately as well, since every
    /// attempt fails the same way.
    #[error("could not remove directory {path}")]
    RemoveDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
