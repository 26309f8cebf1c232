//! # cgthrottle-core
//!
//! Cgroup v1 block-I/O resource control for container runtimes.
//!
//! This crate provides:
//! - **Filesystem seam**: the narrow [`fsi::Fsi`] interface all kernel
//!   pseudo-file access goes through, with a production backend and an
//!   in-memory double for deterministic tests.
//! - **Controller addressing**: mapping logical controller names plus a
//!   relative container path to pseudo-file directories, and task/process
//!   membership edits.
//! - **Blkio engine**: reading, merging, and writing the blkio weight and
//!   throttle pseudo-files as structured, device-keyed values.
//!
//! The engine holds no state between calls; every operation is a
//! self-contained read-merge-write cycle against the filesystem handed in by
//! the caller.

pub mod blkio;
pub mod controller;
pub mod fsi;
