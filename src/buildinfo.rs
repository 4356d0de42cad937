//! Build information
//!
//! The commit hash and build date are stamped at compile time through the
//! `SEIZMEIA_COMMIT_HASH` and `SEIZMEIA_BUILD_DATE` environment variables
//! and fall back to `unknown`. The build script sets
//! `SEIZMEIA_RUSTC_VERSION` from `rustc --version`.

use axum::Json;
use serde::{Deserialize, Serialize};

/// Human-friendly application name.
pub const FRIENDLY_NAME: &str = "Seizmeia: A credit management tool for a beer tap";

const UNKNOWN: &str = "unknown";

/// Compiler toolchain the binary was built with.
const COMPILER: &str = "rustc";

/// Startup banner; the placeholder is replaced with [`FRIENDLY_NAME`].
const BANNER: &str = ".~~~~.\ni====i_\n|cccc|_)\n|cccc|   {name}\n`-==-'\n";

/// Version and platform of the running binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    pub commit_hash: String,
    pub build_date: String,
    pub os: String,
    pub arch: String,
    pub compiler: String,
    pub rustc_version: String,
}

impl BuildInfo {
    /// Build information of this binary.
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit_hash: option_env!("SEIZMEIA_COMMIT_HASH")
                .unwrap_or(UNKNOWN)
                .to_string(),
            build_date: option_env!("SEIZMEIA_BUILD_DATE")
                .unwrap_or(UNKNOWN)
                .to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            compiler: COMPILER.to_string(),
            rustc_version: option_env!("SEIZMEIA_RUSTC_VERSION")
                .unwrap_or(UNKNOWN)
                .to_string(),
        }
    }
}

/// The beer tap banner printed at startup.
pub fn banner() -> String {
    BANNER.replace("{name}", FRIENDLY_NAME)
}

/// `GET /api/buildinfo`
pub async fn handle_buildinfo() -> Json<BuildInfo> {
    Json(BuildInfo::current())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_uses_package_version() {
        let info = BuildInfo::current();
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(info.os, std::env::consts::OS);
        assert!(!info.commit_hash.is_empty());
    }

    #[test]
    fn test_banner_contains_name() {
        let banner = banner();
        assert!(banner.starts_with(".~~~~."));
        assert!(banner.contains(FRIENDLY_NAME));
    }

    #[test]
    fn test_serializes_snake_case_fields() {
        let json = serde_json::to_value(BuildInfo::current()).unwrap();
        assert!(json.get("commit_hash").is_some());
        assert!(json.get("build_date").is_some());
        assert_eq!(json["compiler"], "rustc");
    }

    #[test]
    fn test_reports_toolchain() {
        let info = BuildInfo::current();
        assert_eq!(info.compiler, "rustc");
        assert!(
            info.rustc_version == UNKNOWN || info.rustc_version.starts_with("rustc "),
            "rustc_version: {}",
            info.rustc_version
        );
    }
}
