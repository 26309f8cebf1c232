//! Blkio parameter engine: reads, merges, and writes the blkio controller's
//! weight and throttle pseudo-files.
//!
//! Each operation is a self-contained read-merge-write cycle against the
//! [`Fsi`] handed in by the caller; nothing is cached between calls and
//! there is no transactional guarantee across the six files, mirroring the
//! kernel interface itself.

use std::path::{Path, PathBuf};

use cgthrottle_common::error::{AggregateError, CgroupError, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::Controller;
use crate::fsi::{self, Fsi};

/// Scalar BFQ weight file.
const WEIGHT_FILE: &str = "blkio.bfq.weight";
/// Per-device BFQ weight file.
const WEIGHT_DEVICE_FILE: &str = "blkio.bfq.weight_device";
/// Per-device read bandwidth limit file, bytes per second.
const THROTTLE_READ_BPS_FILE: &str = "blkio.throttle.read_bps_device";
/// Per-device write bandwidth limit file, bytes per second.
const THROTTLE_WRITE_BPS_FILE: &str = "blkio.throttle.write_bps_device";
/// Per-device read rate limit file, operations per second.
const THROTTLE_READ_IOPS_FILE: &str = "blkio.throttle.read_iops_device";
/// Per-device write rate limit file, operations per second.
const THROTTLE_WRITE_IOPS_FILE: &str = "blkio.throttle.write_iops_device";

/// Resource value for one block device, keyed by `major:minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Device major number.
    pub major: u64,
    /// Device minor number.
    pub minor: u64,
    /// Weight or rate value.
    pub value: u64,
}

impl DeviceEntry {
    /// Kernel line form, `"<major>:<minor> <value>"`.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{}:{} {}", self.major, self.minor, self.value)
    }
}

/// Ordered list of per-device values.
///
/// Raw construction and [`DeviceList::append`] do not deduplicate;
/// [`DeviceList::update`] is the operation that keeps one live value per
/// device while preserving positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceList(Vec<DeviceEntry>);

impl DeviceList {
    /// Empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an entry regardless of whether the device is already listed.
    pub fn append(&mut self, major: u64, minor: u64, value: u64) {
        self.0.push(DeviceEntry {
            major,
            minor,
            value,
        });
    }

    /// Sets the value for a device: replaces the first entry matching
    /// `(major, minor)` in place, or appends when the device is absent.
    /// Later duplicates of the same device are left untouched.
    pub fn update(&mut self, major: u64, minor: u64, value: u64) {
        match self
            .0
            .iter_mut()
            .find(|entry| entry.major == major && entry.minor == minor)
        {
            Some(entry) => entry.value = value,
            None => self.append(major, minor, value),
        }
    }

    /// Entries in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, DeviceEntry> {
        self.0.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<DeviceEntry>> for DeviceList {
    fn from(entries: Vec<DeviceEntry>) -> Self {
        Self(entries)
    }
}

impl<'a> IntoIterator for &'a DeviceList {
    type Item = &'a DeviceEntry;
    type IntoIter = std::slice::Iter<'a, DeviceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Blkio limits for one container cgroup.
///
/// `weight: None` means the scalar weight is unset and will not be written.
/// A fresh value (all fields default) carries no limits at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlkioParameters {
    /// Scalar BFQ weight.
    pub weight: Option<u64>,
    /// Per-device BFQ weights.
    pub weight_device: DeviceList,
    /// Per-device read bandwidth limits, bytes per second.
    pub throttle_read_bps_device: DeviceList,
    /// Per-device write bandwidth limits, bytes per second.
    pub throttle_write_bps_device: DeviceList,
    /// Per-device read rate limits, operations per second.
    pub throttle_read_iops_device: DeviceList,
    /// Per-device write rate limits, operations per second.
    pub throttle_write_iops_device: DeviceList,
}

/// Failure report from [`get_parameters`].
///
/// Reading is best-effort across all six pseudo-files, so the error carries
/// both every failure encountered and the parameters assembled from the
/// files that did parse.
#[derive(Debug, Error)]
#[error("{errors}")]
pub struct ReadError {
    /// Parameters populated from the files that succeeded.
    pub parameters: BlkioParameters,
    /// One entry per failed file or malformed line.
    pub errors: AggregateError,
}

/// The five device-list files paired with their lists in `params`.
fn device_lists(params: &BlkioParameters) -> [(&'static str, &DeviceList); 5] {
    [
        (WEIGHT_DEVICE_FILE, &params.weight_device),
        (THROTTLE_READ_BPS_FILE, &params.throttle_read_bps_device),
        (THROTTLE_WRITE_BPS_FILE, &params.throttle_write_bps_device),
        (THROTTLE_READ_IOPS_FILE, &params.throttle_read_iops_device),
        (THROTTLE_WRITE_IOPS_FILE, &params.throttle_write_iops_device),
    ]
}

fn device_lists_mut(params: &mut BlkioParameters) -> [(&'static str, &mut DeviceList); 5] {
    [
        (WEIGHT_DEVICE_FILE, &mut params.weight_device),
        (THROTTLE_READ_BPS_FILE, &mut params.throttle_read_bps_device),
        (THROTTLE_WRITE_BPS_FILE, &mut params.throttle_write_bps_device),
        (THROTTLE_READ_IOPS_FILE, &mut params.throttle_read_iops_device),
        (THROTTLE_WRITE_IOPS_FILE, &mut params.throttle_write_iops_device),
    ]
}

/// Directory of a container's blkio pseudo-files.
fn container_dir_path(container_dir: &str) -> PathBuf {
    Controller::Blkio.group(container_dir).dir()
}

/// Reads the current blkio parameters of a container's cgroup.
///
/// All six pseudo-files are attempted unconditionally; every distinct
/// failure (missing file, I/O error, malformed line) is accumulated, and
/// fields whose files failed keep their defaults.
///
/// # Errors
///
/// Returns a [`ReadError`] carrying both the failure list and the
/// best-effort parameters when any file was missing, unreadable, or
/// malformed.
pub fn get_parameters(
    fs: &dyn Fsi,
    container_dir: &str,
) -> std::result::Result<BlkioParameters, ReadError> {
    let dir = container_dir_path(container_dir);
    tracing::debug!(dir = %dir.display(), "reading blkio parameters");
    let mut params = BlkioParameters::default();
    let mut errors = AggregateError::new();

    let weight_path = dir.join(WEIGHT_FILE);
    match fsi::read_string(fs, &weight_path) {
        Ok(content) => match parse_weight(&weight_path, &content) {
            Ok(weight) => params.weight = Some(weight),
            Err(err) => errors.push(err),
        },
        Err(err) => errors.push(err),
    }

    for (file, list) in device_lists_mut(&mut params) {
        let path = dir.join(file);
        match fsi::read_string(fs, &path) {
            Ok(content) => *list = parse_device_list(&path, &content, &mut errors),
            Err(err) => errors.push(err),
        }
    }

    if errors.is_empty() {
        Ok(params)
    } else {
        Err(ReadError {
            parameters: params,
            errors,
        })
    }
}

/// Writes desired blkio parameters, merging per-device values into whatever
/// the kernel already holds.
///
/// The scalar weight is written only when set. For each device-list file the
/// current on-disk list is read first (unreadable or malformed state merges
/// as empty), every desired entry updates its first match in place or is
/// appended, and the entire merged list is written back, one write per
/// entry. Devices on disk that `desired` does not name keep their values.
///
/// # Errors
///
/// Per-file failures are collected and returned as one aggregate; all six
/// files are attempted regardless.
pub fn set_parameters(fs: &dyn Fsi, container_dir: &str, desired: &BlkioParameters) -> Result<()> {
    let dir = container_dir_path(container_dir);
    tracing::debug!(dir = %dir.display(), "setting blkio parameters");
    let mut errors = AggregateError::new();

    if let Some(weight) = desired.weight {
        let path = dir.join(WEIGHT_FILE);
        if let Err(err) = fsi::write_chunks(fs, &path, &[weight.to_string()]) {
            errors.push(err);
        }
    }

    for (file, desired_list) in device_lists(desired) {
        let path = dir.join(file);
        let mut merged = match fsi::read_string(fs, &path) {
            Ok(content) => parse_device_list(&path, &content, &mut AggregateError::new()),
            Err(_) => DeviceList::new(),
        };
        for entry in desired_list {
            merged.update(entry.major, entry.minor, entry.value);
        }
        let lines: Vec<String> = merged.iter().map(DeviceEntry::to_line).collect();
        if let Err(err) = fsi::write_chunks(fs, &path, &lines) {
            errors.push(err);
        }
    }

    errors.into_result()
}

/// Zeroes out previously configured per-device limits.
///
/// For every device in the caller-supplied `previous` lists a
/// `"<major>:<minor> 0"` entry is written, preserving device identity and
/// list order; current kernel-side values are not consulted. The scalar
/// weight file is never written — zero is not a meaningful kernel weight.
///
/// # Errors
///
/// Same per-file aggregation as [`set_parameters`].
pub fn reset_parameters(
    fs: &dyn Fsi,
    container_dir: &str,
    previous: &BlkioParameters,
) -> Result<()> {
    let dir = container_dir_path(container_dir);
    tracing::debug!(dir = %dir.display(), "resetting blkio parameters");
    let mut errors = AggregateError::new();

    for (file, previous_list) in device_lists(previous) {
        let path = dir.join(file);
        let lines: Vec<String> = previous_list
            .iter()
            .map(|entry| format!("{}:{} 0", entry.major, entry.minor))
            .collect();
        if let Err(err) = fsi::write_chunks(fs, &path, &lines) {
            errors.push(err);
        }
    }

    errors.into_result()
}

/// Parses the scalar weight file: the whole content, trailing newline
/// stripped, as one non-negative integer.
fn parse_weight(path: &Path, content: &str) -> Result<u64> {
    let trimmed = content.strip_suffix('\n').unwrap_or(content);
    trimmed.parse().map_err(|_| CgroupError::Parse {
        path: path.to_path_buf(),
        message: format!("parsing weight: invalid integer {trimmed:?}"),
    })
}

/// Parses a device-list file, accumulating malformed lines into `errors`
/// and keeping every line that does parse.
///
/// Blank lines are skipped, as is a BFQ `default <n>` record on the first
/// line; that record is never re-emitted on writes.
fn parse_device_list(path: &Path, content: &str, errors: &mut AggregateError) -> DeviceList {
    let mut list = DeviceList::new();
    for (index, line) in content.split('\n').enumerate() {
        if line.is_empty() {
            continue;
        }
        if index == 0 && line.starts_with("default ") {
            continue;
        }
        match parse_device_line(line) {
            Some(entry) => list.append(entry.major, entry.minor, entry.value),
            None => errors.push(CgroupError::Parse {
                path: path.to_path_buf(),
                message: format!("invalid device line {line:?}"),
            }),
        }
    }
    list
}

/// Parses one `"<major>:<minor> <value>"` line: a single colon, a single
/// space, and nothing else.
fn parse_device_line(line: &str) -> Option<DeviceEntry> {
    let (device, value) = line.split_once(' ')?;
    let (major, minor) = device.split_once(':')?;
    if value.contains(' ') || minor.contains(':') {
        return None;
    }
    Some(DeviceEntry {
        major: major.parse().ok()?,
        minor: minor.parse().ok()?,
        value: value.parse().ok()?,
    })
}
