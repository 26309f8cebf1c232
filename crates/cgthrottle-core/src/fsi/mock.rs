//! In-memory test double for the filesystem seam.
//!
//! [`MockFs`] maps paths to [`MockFile`] records holding static content,
//! optional per-operation override hooks, and a log of every successful
//! write. Reads follow pseudo-file semantics: one call returns the whole
//! remaining content, then EOF. Writes overwrite at the handle's offset and
//! extend the file as needed, like a real file opened without truncation.
//!
//! Instances are not synchronized for concurrent use; each test case should
//! own its own.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{FileInfo, Fsi, FsiFile, WalkState, WalkVisit};

/// Hook consulted on every open; return an error to make the open fail.
pub type OpenHook = Box<dyn Fn() -> io::Result<()> + Send>;
/// Hook replacing the default read behavior of a file.
pub type ReadHook = Box<dyn FnMut(&mut [u8]) -> io::Result<usize> + Send>;
/// Hook replacing the default write behavior of a file.
pub type WriteHook = Box<dyn FnMut(&[u8]) -> io::Result<usize> + Send>;

/// One simulated file: content, behavior overrides, and captured writes.
#[derive(Default)]
pub struct MockFile {
    data: Vec<u8>,
    is_dir: bool,
    on_open: Option<OpenHook>,
    on_read: Option<ReadHook>,
    on_write: Option<WriteHook>,
    write_history: Vec<Vec<u8>>,
}

impl MockFile {
    /// Empty regular file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Regular file with initial content.
    #[must_use]
    pub fn with_data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Directory entry.
    #[must_use]
    pub fn dir() -> Self {
        Self {
            is_dir: true,
            ..Self::default()
        }
    }

    /// Installs an open hook, e.g. to simulate a permission denial.
    #[must_use]
    pub fn on_open(mut self, hook: impl Fn() -> io::Result<()> + Send + 'static) -> Self {
        self.on_open = Some(Box::new(hook));
        self
    }

    /// Installs a read hook, e.g. to simulate partial reads or I/O errors.
    #[must_use]
    pub fn on_read(mut self, hook: impl FnMut(&mut [u8]) -> io::Result<usize> + Send + 'static) -> Self {
        self.on_read = Some(Box::new(hook));
        self
    }

    /// Installs a write hook, e.g. to simulate forced write failures.
    #[must_use]
    pub fn on_write(mut self, hook: impl FnMut(&[u8]) -> io::Result<usize> + Send + 'static) -> Self {
        self.on_write = Some(Box::new(hook));
        self
    }
}

/// In-memory [`Fsi`] implementation keyed by absolute path.
#[derive(Default)]
pub struct MockFs {
    files: BTreeMap<PathBuf, Arc<Mutex<MockFile>>>,
}

impl MockFs {
    /// Builds a mock filesystem from `(path, file)` pairs.
    #[must_use]
    pub fn new<P, I>(files: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = (P, MockFile)>,
    {
        Self {
            files: files
                .into_iter()
                .map(|(path, file)| (path.into(), Arc::new(Mutex::new(file))))
                .collect(),
        }
    }

    /// Replaces or inserts the record for `path`.
    pub fn insert(&mut self, path: impl Into<PathBuf>, file: MockFile) {
        let _ = self.files.insert(path.into(), Arc::new(Mutex::new(file)));
    }

    /// Every successful write issued to `path`, in order. Empty when the
    /// path is unknown or never written.
    #[must_use]
    pub fn write_history(&self, path: impl AsRef<Path>) -> Vec<Vec<u8>> {
        self.files
            .get(path.as_ref())
            .map(|file| lock(file).write_history.clone())
            .unwrap_or_default()
    }

    /// Current content of `path`, if the path exists.
    #[must_use]
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.get(path.as_ref()).map(|file| lock(file).data.clone())
    }

    fn open_handle(&self, path: &Path) -> io::Result<Box<dyn FsiFile>> {
        let file = self.files.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no mock file at {}", path.display()),
            )
        })?;
        if let Some(hook) = lock(file).on_open.as_ref() {
            hook()?;
        }
        Ok(Box::new(MockHandle {
            file: Arc::clone(file),
            pos: 0,
        }))
    }

    /// Whether `path` is an implied ancestor directory of some known file.
    fn is_synthetic_dir(&self, path: &Path) -> bool {
        self.files
            .keys()
            .any(|key| key.as_path() != path && key.starts_with(path))
    }

    fn info_for(&self, path: &Path) -> FileInfo {
        self.files.get(path).map_or(
            FileInfo {
                is_dir: true,
                size: 0,
            },
            |file| {
                let file = lock(file);
                FileInfo {
                    is_dir: file.is_dir,
                    size: file.data.len() as u64,
                }
            },
        )
    }
}

fn lock<'a>(file: &'a Arc<Mutex<MockFile>>) -> MutexGuard<'a, MockFile> {
    file.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Fsi for MockFs {
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn FsiFile>> {
        self.open_handle(path)
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn FsiFile>> {
        self.open_handle(path)
    }

    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        if self.files.contains_key(path) || self.is_synthetic_dir(path) {
            Ok(self.info_for(path))
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no mock file at {}", path.display()),
            ))
        }
    }

    fn walk(&self, root: &Path, visit: &mut WalkVisit<'_>) -> io::Result<()> {
        let mut paths = BTreeSet::new();
        for key in self.files.keys() {
            if !key.starts_with(root) {
                continue;
            }
            let mut current = key.clone();
            loop {
                let _ = paths.insert(current.clone());
                if current == root {
                    break;
                }
                match current.parent() {
                    Some(parent) if parent.starts_with(root) => current = parent.to_path_buf(),
                    _ => break,
                }
            }
        }
        if paths.is_empty() {
            let err = io::Error::new(
                io::ErrorKind::NotFound,
                format!("no mock files under {}", root.display()),
            );
            let _ = visit(root, None, Some(&err));
            return Ok(());
        }
        let mut skipped: Option<PathBuf> = None;
        for path in &paths {
            if let Some(prefix) = &skipped {
                if path.starts_with(prefix) && path != prefix {
                    continue;
                }
            }
            let info = self.info_for(path);
            let state = visit(path, Some(&info), None);
            if state == WalkState::SkipSubtree && info.is_dir {
                skipped = Some(path.clone());
            }
        }
        Ok(())
    }
}

/// Open handle over one mock file; each open starts at offset zero.
struct MockHandle {
    file: Arc<Mutex<MockFile>>,
    pos: usize,
}

impl fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHandle").field("pos", &self.pos).finish()
    }
}

impl FsiFile for MockHandle {}

impl io::Read for MockHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut guard = lock(&self.file);
        let file = &mut *guard;
        if let Some(hook) = file.on_read.as_mut() {
            return hook(buf);
        }
        if self.pos >= file.data.len() {
            return Ok(0);
        }
        let n = (file.data.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&file.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl io::Write for MockHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = lock(&self.file);
        let file = &mut *guard;
        let n = if let Some(hook) = file.on_write.as_mut() {
            hook(buf)?
        } else {
            let end = self.pos + buf.len();
            if file.data.len() < end {
                file.data.resize(end, 0);
            }
            file.data[self.pos..end].copy_from_slice(buf);
            self.pos = end;
            buf.len()
        };
        file.write_history.push(buf[..n].to_vec());
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;
    use std::io::{Read as _, Write as _};

    use super::*;

    fn sample_files() -> MockFs {
        MockFs::new([
            ("/my/emptyfile", MockFile::new()),
            ("/my/emptydir", MockFile::dir()),
            ("/my/dir/data0", MockFile::with_data("abc")),
            ("/my/dir/data1", MockFile::with_data("xyz")),
        ])
    }

    #[test]
    fn walk_skips_requested_subtrees() {
        let fs = sample_files();
        let mut visited = Vec::new();
        fs.walk(Path::new("/"), &mut |path, _info, _err| {
            if path.file_name() == Some(OsStr::new("dir")) {
                return WalkState::SkipSubtree;
            }
            visited.push(path.to_path_buf());
            WalkState::Continue
        })
        .expect("walk");
        let expected: Vec<PathBuf> = ["/", "/my", "/my/emptydir", "/my/emptyfile"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(visited, expected);
    }

    #[test]
    fn walk_reports_missing_root_through_callback() {
        let fs = sample_files();
        let mut errors = 0;
        fs.walk(Path::new("/nothing/here"), &mut |_path, info, err| {
            assert!(info.is_none());
            assert!(err.is_some());
            errors += 1;
            WalkState::Continue
        })
        .expect("walk");
        assert_eq!(errors, 1);
    }

    #[test]
    fn writes_land_at_the_handle_offset() {
        let fs = sample_files();
        let path = Path::new("/my/dir/data0");
        let mut handle = fs.open_write(path).expect("open for write");
        handle.write_all(b"").expect("empty write");
        handle.write_all(b"01").expect("write");
        assert_eq!(fs.lstat(path).expect("lstat").size, 3);
        handle.write_all(b"23").expect("write");
        assert_eq!(fs.lstat(path).expect("lstat").size, 4);
        drop(handle);

        let mut handle = fs.open_read(path).expect("open for read");
        let mut content = String::new();
        let _ = handle.read_to_string(&mut content).expect("read");
        assert_eq!(content, "0123");
    }

    #[test]
    fn write_history_captures_each_call() {
        let fs = sample_files();
        let path = Path::new("/my/emptyfile");
        let mut handle = fs.open_write(path).expect("open");
        handle.write_all(b"1:2 3").expect("write");
        handle.write_all(b"4:5 6").expect("write");
        drop(handle);
        assert_eq!(
            fs.write_history(path),
            vec![b"1:2 3".to_vec(), b"4:5 6".to_vec()]
        );
        // The handle keeps its offset across writes.
        assert_eq!(fs.contents(path), Some(b"1:2 34:5 6".to_vec()));
    }

    #[test]
    fn read_returns_whole_content_then_eof() {
        let fs = sample_files();
        let mut handle = fs.open_read(Path::new("/my/dir/data1")).expect("open");
        let mut buf = [0_u8; 16];
        assert_eq!(handle.read(&mut buf).expect("read"), 3);
        assert_eq!(&buf[..3], b"xyz");
        assert_eq!(handle.read(&mut buf).expect("read"), 0);
    }

    #[test]
    fn open_fails_for_unknown_paths() {
        let fs = sample_files();
        let err = fs.open_read(Path::new("/absent")).expect_err("no file");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn hooks_override_default_behavior() {
        let fs = MockFs::new([(
            "/locked",
            MockFile::new().on_open(|| Err(io::ErrorKind::PermissionDenied.into())),
        )]);
        let err = fs.open_read(Path::new("/locked")).expect_err("denied");
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
