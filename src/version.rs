//! Version and build information
//!
//! Values are embedded at compile time by `build.rs`.

use std::fmt;

/// Build information embedded at compile time
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Package version from Cargo.toml
    pub version: &'static str,
    /// Package name
    pub name: &'static str,
    /// Git commit hash (short)
    pub git_hash: &'static str,
    /// Git branch name
    pub git_branch: &'static str,
    git_dirty_str: &'static str,
    /// Build timestamp
    pub build_timestamp: &'static str,
    /// Target triple
    pub target: &'static str,
    /// Build profile (debug/release)
    pub profile: &'static str,
    /// Rustc version used to build
    pub rustc_version: &'static str,
}

impl BuildInfo {
    /// Get the current build information
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            name: env!("CARGO_PKG_NAME"),
            git_hash: env!("SAFE_ACTION_GIT_HASH"),
            git_branch: env!("SAFE_ACTION_GIT_BRANCH"),
            git_dirty_str: env!("SAFE_ACTION_GIT_DIRTY"),
            build_timestamp: env!("SAFE_ACTION_BUILD_TIMESTAMP"),
            target: env!("SAFE_ACTION_TARGET"),
            profile: env!("SAFE_ACTION_PROFILE"),
            rustc_version: env!("SAFE_ACTION_RUSTC_VERSION"),
        }
    }

    /// Whether the working directory was dirty at build time
    pub fn git_dirty(&self) -> bool {
        self.git_dirty_str == "true"
    }

    /// Full version string, e.g. "0.1.0-abc1234"
    pub fn full_version(&self) -> String {
        if self.git_dirty() {
            format!("{}-{}-dirty", self.version, self.git_hash)
        } else {
            format!("{}-{}", self.version, self.git_hash)
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        writeln!(f)?;
        writeln!(f, "Build Information:")?;
        writeln!(f, "  Version:    {}", self.version)?;
        writeln!(f, "  Git Hash:   {}{}", self.git_hash, if self.git_dirty() { " (dirty)" } else { "" })?;
        writeln!(f, "  Git Branch: {}", self.git_branch)?;
        writeln!(f, "  Built:      {}", self.build_timestamp)?;
        writeln!(f, "  Profile:    {}", self.profile)?;
        writeln!(f, "  Target:     {}", self.target)?;
        writeln!(f, "  Compiler:   {}", self.rustc_version)?;
        Ok(())
    }
}

/// Get the current build info
pub fn build_info() -> BuildInfo {
    BuildInfo::current()
}

/// Print version information to stdout
pub fn print_version() {
    print!("{}", build_info());
}
