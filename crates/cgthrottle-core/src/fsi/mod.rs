//! Filesystem seam for kernel pseudo-file access.
//!
//! Every cgroup read and write goes through the [`Fsi`] trait so the engine
//! can run against the real `/sys/fs/cgroup` tree ([`os::OsFs`]) or an
//! in-memory double ([`mock::MockFs`]) that makes missing files, permission
//! denials, I/O errors, and truncated reads reproducible in unit tests.

pub mod mock;
pub mod os;

use std::io;
use std::io::Read as _;
use std::io::Write as _;
use std::path::Path;

use cgthrottle_common::error::{CgroupError, Result};

/// Open file handle returned by an [`Fsi`] implementation.
///
/// Dropping the handle closes it; pseudo-files need no explicit flush.
pub trait FsiFile: io::Read + io::Write + std::fmt::Debug {}

/// Metadata snapshot for a path at the time of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// Whether the path is a directory.
    pub is_dir: bool,
    /// Size in bytes.
    pub size: u64,
}

/// Directive returned by a [`Fsi::walk`] callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// Keep walking.
    Continue,
    /// Do not descend into the subtree rooted at the visited directory.
    SkipSubtree,
}

/// Callback invoked by [`Fsi::walk`] for every visited path.
///
/// When traversal of a path fails, the callback receives the error instead
/// of the metadata and the walk continues with the remaining entries.
pub type WalkVisit<'a> =
    dyn FnMut(&Path, Option<&FileInfo>, Option<&io::Error>) -> WalkState + 'a;

/// Narrow filesystem interface covering exactly the operations the engine
/// needs.
///
/// Implementations surface raw [`io::Error`]s unmodified; classification
/// into [`CgroupError`] kinds happens at the call sites.
pub trait Fsi {
    /// Opens a file for reading.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports for the open.
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn FsiFile>>;

    /// Opens an existing file for writing.
    ///
    /// Pseudo-files always exist while their cgroup does, so there is no
    /// create or truncate behavior here.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports for the open.
    fn open_write(&self, path: &Path) -> io::Result<Box<dyn FsiFile>>;

    /// Stats a path without following symlinks.
    ///
    /// # Errors
    ///
    /// Whatever the backend reports for the stat.
    fn lstat(&self, path: &Path) -> io::Result<FileInfo>;

    /// Visits `root` and everything beneath it in a stable order, root
    /// first.
    ///
    /// A [`WalkState::SkipSubtree`] answer on a directory prevents descent
    /// into it.
    ///
    /// # Errors
    ///
    /// Traversal failures on individual entries are reported through the
    /// callback, not the return value.
    fn walk(&self, root: &Path, visit: &mut WalkVisit<'_>) -> io::Result<()>;
}

/// Reads the whole content of `path` as UTF-8 text.
///
/// # Errors
///
/// Open and read failures are classified per [`CgroupError::from_io`].
pub fn read_string(fs: &dyn Fsi, path: &Path) -> Result<String> {
    let mut file = fs
        .open_read(path)
        .map_err(|e| CgroupError::from_io(path, e))?;
    let mut content = String::new();
    let _ = file
        .read_to_string(&mut content)
        .map_err(|e| CgroupError::from_io(path, e))?;
    Ok(content)
}

/// Writes `chunks` to `path`, one write call per chunk, over a single open
/// handle.
///
/// The kernel treats each write to a cgroup pseudo-file as one record, so
/// chunks must not be coalesced. An empty chunk list performs no I/O.
///
/// # Errors
///
/// Open and write failures are classified per [`CgroupError::from_io`]; the
/// first failure aborts the remaining chunks.
pub fn write_chunks(fs: &dyn Fsi, path: &Path, chunks: &[String]) -> Result<()> {
    if chunks.is_empty() {
        return Ok(());
    }
    let mut file = fs
        .open_write(path)
        .map_err(|e| CgroupError::from_io(path, e))?;
    for chunk in chunks {
        file.write_all(chunk.as_bytes())
            .map_err(|e| CgroupError::from_io(path, e))?;
    }
    Ok(())
}
