//! Operating-system backed implementation of the filesystem seam.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use super::{FileInfo, Fsi, FsiFile, WalkState, WalkVisit};

/// Production [`Fsi`] delegating directly to the OS.
///
/// No buffering, truncation, or retry logic: whatever the underlying call
/// returns is surfaced verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl FsiFile for File {}

impl Fsi for OsFs {
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn FsiFile>> {
        Ok(Box::new(File::open(path)?))
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn FsiFile>> {
        Ok(Box::new(OpenOptions::new().write(true).open(path)?))
    }

    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        let meta = std::fs::symlink_metadata(path)?;
        Ok(FileInfo {
            is_dir: meta.is_dir(),
            size: meta.len(),
        })
    }

    fn walk(&self, root: &Path, visit: &mut WalkVisit<'_>) -> io::Result<()> {
        visit_tree(root, visit);
        Ok(())
    }
}

/// Visits `path`, then recurses into directory entries in lexical order.
fn visit_tree(path: &Path, visit: &mut WalkVisit<'_>) {
    let info = match std::fs::symlink_metadata(path) {
        Ok(meta) => FileInfo {
            is_dir: meta.is_dir(),
            size: meta.len(),
        },
        Err(err) => {
            let _ = visit(path, None, Some(&err));
            return;
        }
    };
    let state = visit(path, Some(&info), None);
    if !info.is_dir || state == WalkState::SkipSubtree {
        return;
    }
    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) => {
            let _ = visit(path, None, Some(&err));
            return;
        }
    };
    let mut children: Vec<_> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    children.sort();
    for child in children {
        visit_tree(&child, visit);
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read as _, Write as _};
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn reads_and_writes_real_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blkio.bfq.weight");
        std::fs::write(&path, "100\n").expect("seed file");

        let fs = OsFs;
        let mut handle = fs.open_write(&path).expect("open for write");
        handle.write_all(b"200\n").expect("write");
        drop(handle);

        let mut handle = fs.open_read(&path).expect("open for read");
        let mut content = String::new();
        let _ = handle.read_to_string(&mut content).expect("read");
        assert_eq!(content, "200\n");

        let info = fs.lstat(&path).expect("lstat");
        assert!(!info.is_dir);
        assert_eq!(info.size, 4);
    }

    #[test]
    fn open_surfaces_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = OsFs
            .open_read(&dir.path().join("gone"))
            .expect_err("should not open");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        let err = OsFs
            .open_write(&dir.path().join("gone"))
            .expect_err("should not open");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn walk_visits_lexically_and_honors_skip() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("a")).expect("mkdir a");
        std::fs::create_dir(dir.path().join("b")).expect("mkdir b");
        std::fs::write(dir.path().join("a/x"), "1").expect("write a/x");
        std::fs::write(dir.path().join("b/y"), "2").expect("write b/y");

        let mut visited = Vec::new();
        OsFs.walk(dir.path(), &mut |path, info, err| {
            assert!(err.is_none(), "unexpected walk error");
            if info.is_some_and(|i| i.is_dir) && path.ends_with("a") {
                return WalkState::SkipSubtree;
            }
            visited.push(path.to_path_buf());
            WalkState::Continue
        })
        .expect("walk");

        let expected: Vec<PathBuf> = vec![
            dir.path().to_path_buf(),
            dir.path().join("b"),
            dir.path().join("b/y"),
        ];
        assert_eq!(visited, expected);
    }
}
