//! Controller and group addressing for the cgroup v1 hierarchy.
//!
//! Maps logical controller names to their subsystem directories under the
//! cgroup mount point and exposes task/process membership operations on a
//! [`Group`].

use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use cgthrottle_common::constants::{CGROUP_MOUNT_POINT, PROCS_FILE, TASKS_FILE};
use cgthrottle_common::error::{CgroupError, Result};

use crate::fsi::{self, Fsi};

/// Known cgroup v1 controllers.
///
/// The set is closed: an unknown controller cannot be constructed, so path
/// resolution never falls back to runtime string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Controller {
    /// Block I/O weighting and throttling.
    Blkio,
    /// CPU time shares.
    Cpu,
    /// CPU usage accounting.
    Cpuacct,
    /// CPU and memory node placement.
    Cpuset,
    /// Device access control.
    Devices,
    /// Task freezing.
    Freezer,
    /// Huge page usage limits.
    Hugetlb,
    /// Memory usage accounting and limits.
    Memory,
    /// Network class tagging.
    NetCls,
    /// Network priority assignment.
    NetPrio,
    /// Performance event monitoring.
    PerfEvent,
    /// Process count limits.
    Pids,
}

/// Every known controller, in a stable order.
pub const CONTROLLERS: [Controller; 12] = [
    Controller::Blkio,
    Controller::Cpu,
    Controller::Cpuacct,
    Controller::Cpuset,
    Controller::Devices,
    Controller::Freezer,
    Controller::Hugetlb,
    Controller::Memory,
    Controller::NetCls,
    Controller::NetPrio,
    Controller::PerfEvent,
    Controller::Pids,
];

impl Controller {
    /// Canonical subsystem directory name under the cgroup mount point.
    #[must_use]
    pub const fn subsystem_dir(self) -> &'static str {
        match self {
            Self::Blkio => "blkio",
            Self::Cpu => "cpu",
            Self::Cpuacct => "cpuacct",
            Self::Cpuset => "cpuset",
            Self::Devices => "devices",
            Self::Freezer => "freezer",
            Self::Hugetlb => "hugetlb",
            Self::Memory => "memory",
            Self::NetCls => "net_cls",
            Self::NetPrio => "net_prio",
            Self::PerfEvent => "perf_event",
            Self::Pids => "pids",
        }
    }

    /// Looks up a controller by its subsystem directory name.
    #[must_use]
    pub fn from_subsystem_dir(name: &str) -> Option<Self> {
        CONTROLLERS
            .iter()
            .copied()
            .find(|controller| controller.subsystem_dir() == name)
    }

    /// Addresses a group of this controller at `relative_path`.
    #[must_use]
    pub fn group(self, relative_path: impl Into<PathBuf>) -> Group {
        Group {
            controller: self,
            path: relative_path.into(),
        }
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subsystem_dir())
    }
}

/// Address of one cgroup: a controller plus a path relative to the
/// controller's subsystem root.
///
/// A group is a pure value used to resolve pseudo-file locations; it holds
/// no file handles and owns no storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Group {
    controller: Controller,
    path: PathBuf,
}

impl Group {
    /// Interprets an absolute pseudo-file directory as a group address.
    ///
    /// Inverse of [`Group::dir`].
    ///
    /// # Errors
    ///
    /// Returns [`CgroupError::InvalidGroupPath`] when the path is not of the
    /// form `<mount point>/<known controller>/<relative path>`.
    pub fn from_dir(raw: impl AsRef<Path>) -> Result<Self> {
        let raw = raw.as_ref();
        let invalid = || CgroupError::InvalidGroupPath {
            path: raw.to_path_buf(),
        };
        let rel = raw.strip_prefix(CGROUP_MOUNT_POINT).map_err(|_| invalid())?;
        let mut components = rel.components();
        let subsystem = components
            .next()
            .and_then(|c| c.as_os_str().to_str())
            .ok_or_else(invalid)?;
        let controller = Controller::from_subsystem_dir(subsystem).ok_or_else(invalid)?;
        Ok(controller.group(components.as_path()))
    }

    /// Controller this group belongs to.
    #[must_use]
    pub const fn controller(&self) -> Controller {
        self.controller
    }

    /// The caller-supplied path relative to the controller root.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.path
    }

    /// Absolute directory holding this group's pseudo-files.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        let rel = self.path.strip_prefix("/").unwrap_or(&self.path);
        Path::new(CGROUP_MOUNT_POINT)
            .join(self.controller.subsystem_dir())
            .join(rel)
    }

    /// Task (thread) IDs currently in this group, in file order.
    ///
    /// # Errors
    ///
    /// Fails fast on the first open or read failure, classified per
    /// [`CgroupError::from_io`].
    pub fn tasks(&self, fs: &dyn Fsi) -> Result<Vec<String>> {
        self.read_ids(fs, TASKS_FILE)
    }

    /// Process IDs currently in this group, in file order.
    ///
    /// # Errors
    ///
    /// Fails fast on the first open or read failure.
    pub fn processes(&self, fs: &dyn Fsi) -> Result<Vec<String>> {
        self.read_ids(fs, PROCS_FILE)
    }

    /// Moves tasks into this group.
    ///
    /// The kernel accepts only one ID per write, so each ID is issued as its
    /// own write, in caller order. Calling with no IDs performs no I/O.
    ///
    /// # Errors
    ///
    /// The first failure aborts the remaining writes; writes already issued
    /// are not rolled back.
    pub fn add_tasks<S: AsRef<str>>(&self, fs: &dyn Fsi, ids: &[S]) -> Result<()> {
        self.write_ids(fs, TASKS_FILE, ids)
    }

    /// Moves whole processes into this group. Same contract as
    /// [`Group::add_tasks`].
    ///
    /// # Errors
    ///
    /// The first failure aborts the remaining writes.
    pub fn add_processes<S: AsRef<str>>(&self, fs: &dyn Fsi, ids: &[S]) -> Result<()> {
        self.write_ids(fs, PROCS_FILE, ids)
    }

    fn read_ids(&self, fs: &dyn Fsi, file: &str) -> Result<Vec<String>> {
        let path = self.dir().join(file);
        let content = fsi::read_string(fs, &path)?;
        // A final line terminator would otherwise yield a trailing empty id.
        let content = content.strip_suffix('\n').unwrap_or(&content);
        if content.is_empty() {
            return Ok(Vec::new());
        }
        Ok(content.split('\n').map(str::to_owned).collect())
    }

    fn write_ids<S: AsRef<str>>(&self, fs: &dyn Fsi, file: &str, ids: &[S]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let path = self.dir().join(file);
        tracing::debug!(path = %path.display(), count = ids.len(), "adding ids to cgroup");
        let mut handle = fs
            .open_write(&path)
            .map_err(|e| CgroupError::from_io(&path, e))?;
        for id in ids {
            handle
                .write_all(id.as_ref().as_bytes())
                .map_err(|e| CgroupError::from_io(&path, e))?;
        }
        Ok(())
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir().display())
    }
}
