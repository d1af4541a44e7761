//! Deployment presets.
//!
//! Each image flavour used to ship its own copy of the init program with a
//! different exec target. They differ only in the values below.

use crate::config::types::{
    ArgvZero, LaunchConfig, TargetIdentity, TunableSetting, REDIS_SERVER_NAME, REDIS_SERVER_PATH,
    X86_64_LOADER_PATH,
};
use clap::ValueEnum;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Stock image: exec redis-server directly, argv[0] renamed.
    #[default]
    Redis,
    /// Module-bundling image, same launch shape as `redis`.
    SuperRedis,
    /// Scratch image: start redis-server through the x86-64 dynamic loader.
    RedisStatic,
}

impl Preset {
    pub fn name(self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::SuperRedis => "super-redis",
            Self::RedisStatic => "redis-static",
        }
    }

    pub fn config(self) -> LaunchConfig {
        let base = LaunchConfig {
            tunable: Some(TunableSetting::overcommit_always()),
            identity: TargetIdentity::default(),
            server: PathBuf::from(REDIS_SERVER_PATH),
            loader: None,
            argv0: ArgvZero::Rename(REDIS_SERVER_NAME.to_string()),
            require_account: false,
            clear_groups: true,
        };

        match self {
            Self::Redis | Self::SuperRedis => base,
            // The loader receives the caller's arguments untouched, argv[0]
            // included as the loader path.
            Self::RedisStatic => LaunchConfig {
                loader: Some(PathBuf::from(X86_64_LOADER_PATH)),
                argv0: ArgvZero::ExecPath,
                ..base
            },
        }
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Preset::default().config()
    }
}
