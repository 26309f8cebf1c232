//! System-wide constants and well-known kernel paths.

/// Mount point of the cgroup v1 hierarchy, one subdirectory per controller.
pub const CGROUP_MOUNT_POINT: &str = "/sys/fs/cgroup";

/// Membership pseudo-file listing task (thread) IDs, one per line.
pub const TASKS_FILE: &str = "tasks";

/// Membership pseudo-file listing process IDs, one per line.
pub const PROCS_FILE: &str = "cgroup.procs";
