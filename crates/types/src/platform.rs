//! Target platform identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platform an artifact was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "noarch")]
    NoArch,
    #[serde(rename = "linux-64")]
    Linux64,
    #[serde(rename = "linux-aarch64")]
    LinuxAarch64,
    #[serde(rename = "osx-64")]
    Osx64,
    #[serde(rename = "osx-arm64")]
    OsxArm64,
    #[serde(rename = "win-64")]
    Win64,
}

impl Platform {
    /// Platform of the running host, `NoArch` when it has no known subdir
    #[must_use]
    pub fn current() -> Self {
        match (std::env::consts::OS, std::env::consts::ARCH) {
            ("linux", "x86_64") => Self::Linux64,
            ("linux", "aarch64") => Self::LinuxAarch64,
            ("macos", "x86_64") => Self::Osx64,
            ("macos", "aarch64") => Self::OsxArm64,
            ("windows", "x86_64") => Self::Win64,
            _ => Self::NoArch,
        }
    }

    /// Subdirectory name used in channels
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoArch => "noarch",
            Self::Linux64 => "linux-64",
            Self::LinuxAarch64 => "linux-aarch64",
            Self::Osx64 => "osx-64",
            Self::OsxArm64 => "osx-arm64",
            Self::Win64 => "win-64",
        }
    }

    /// Whether an artifact built for `self` can be installed on `host`
    #[must_use]
    pub fn installable_on(self, host: Self) -> bool {
        self == Self::NoArch || self == host
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "noarch" => Ok(Self::NoArch),
            "linux-64" => Ok(Self::Linux64),
            "linux-aarch64" => Ok(Self::LinuxAarch64),
            "osx-64" => Ok(Self::Osx64),
            "osx-arm64" => Ok(Self::OsxArm64),
            "win-64" => Ok(Self::Win64),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noarch_installs_anywhere() {
        assert!(Platform::NoArch.installable_on(Platform::Linux64));
        assert!(Platform::NoArch.installable_on(Platform::OsxArm64));
        assert!(!Platform::Linux64.installable_on(Platform::OsxArm64));
    }

    #[test]
    fn test_display_round_trips() {
        for platform in [Platform::NoArch, Platform::Linux64, Platform::OsxArm64] {
            assert_eq!(platform.to_string().parse::<Platform>().unwrap(), platform);
        }
    }
}
