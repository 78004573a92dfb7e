/// Build information captured at compile time
pub struct BuildInfo;

/// `--version` output: version, build timestamp, commit, platform and profile
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_TIMESTAMP"),
    ")\nCommit: ",
    env!("GIT_HASH_SHORT"),
    "\nPlatform: ",
    env!("TARGET_PLATFORM"),
    "\nProfile: ",
    env!("BUILD_PROFILE"),
);

impl BuildInfo {
    /// Get the package version from Cargo.toml
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Get the build timestamp in YYYYMMDD.HHMMSS format
    pub fn build_timestamp() -> &'static str {
        env!("BUILD_TIMESTAMP")
    }

    /// Get the short git commit hash (first 7 characters)
    pub fn git_hash_short() -> &'static str {
        env!("GIT_HASH_SHORT")
    }

    /// Get a formatted version string for display
    pub fn display_version() -> String {
        format!("{} ({}, {})", Self::version(), Self::build_timestamp(), Self::git_hash_short())
    }
}
