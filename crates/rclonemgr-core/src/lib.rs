//! rclone-mgr Core - Domain logic for rclone-backed drive mounts
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `LogEntry`, `IgnoreRuleSet`, `TransferJob`, `RemotePath`, `Drive`
//! - **Path translation** - mapping local paths under the mount root to `remote:subpath`
//! - **Use cases** - `TransferOrchestrator` (bulk copy/move), `ErrorHandler`
//!   (journal error classification and file relocation) and `DriveManager`
//!   (mount, unmount, list and set up drives)
//! - **Port definitions** - Traits for adapters: `IProcessRunner`, `IDesktop`,
//!   `IUnitManager`, `IRemoteConfig`
//!
//! # Architecture
//!
//! The domain module contains pure logic with no I/O beyond path resolution.
//! Ports define trait interfaces that the `rclonemgr-process` crate implements
//! on top of real subprocesses; tests substitute fakes that replay canned output.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
