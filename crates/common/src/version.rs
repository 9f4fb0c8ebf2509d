use std::fmt;

use serde::{Deserialize, Serialize};

/// Compile-time build metadata, populated by `build.rs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    pub package_version: String,
    pub build_profile: String,
    pub build_features: String,
    pub build_timestamp: String,
    pub rust_version: String,
    pub build_target: String,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("REPO_VERSION").to_string(),
        package_version: env!("CARGO_PKG_VERSION").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        build_features: env!("BUILD_FEATURES").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        rust_version: env!("RUST_VERSION").to_string(),
        build_target: env!("BUILD_TARGET").to_string(),
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pinsvc {} ({})", self.package_version, self.version)?;
        writeln!(f, "  profile:   {}", self.build_profile)?;
        writeln!(f, "  features:  {}", self.build_features)?;
        writeln!(f, "  built at:  {}", self.build_timestamp)?;
        writeln!(f, "  target:    {}", self.build_target)?;
        write!(f, "  toolchain: {}", self.rust_version)
    }
}
