//! redis-init: container PID-1 bootstrap for redis-server
//!
//! Runs once as root, then gets out of the way:
//!
//! 1. best-effort `vm.overcommit_memory = 1`
//! 2. drop to the redis account (groups, gid, then uid; all fatal)
//! 3. exec the server in place, directly or through a dynamic loader
//!
//! The launcher never forks; signal handling and reaping belong to the
//! exec'd server.
//!
//! # Architecture
//!
//! ## Kernel Primitives ([`kernel`])
//! - [`kernel::host`]: every host side effect, behind the [`kernel::host::Host`] trait
//! - [`kernel::sysctl`]: best-effort tunable write
//! - [`kernel::credentials`]: ordered, verified privilege drop
//!
//! ## Execution Control ([`exec`])
//! - [`exec::argv`]: exec path and argument vector
//! - [`exec::launcher`]: type-state enforced launch order
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: launch config and error types
//! - [`config::presets`]: one preset per image flavour
//! - [`config::options`]: `REDIS_INIT_*` environment overlay
//! - [`config::validator`]: startup validation
//!
//! ## Testing Infrastructure ([`testing`])
//! - [`testing::recording_host`]: in-memory host for ordering tests

// Kernel Primitives
pub mod kernel;

// Execution Control
pub mod exec;

// Configuration
pub mod config;

// Testing Infrastructure
pub mod testing;

// Binary entrypoint wiring
pub mod cli;

pub use config::types::*;
pub use exec::launcher::launch;
