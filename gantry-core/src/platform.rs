// OS family classification
// Guards are written per-family, not per-exact platform identifier: a matrix
// may carry several Linux identifiers (ubuntu-22.04, ubuntu-latest, debian-12)
// that all satisfy `os == 'linux'`.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Closed enumeration of operating system families a job can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    #[serde(rename = "macos")]
    MacOs,
    Windows,
}

impl OsFamily {
    /// Classify a platform identifier (e.g. `ubuntu-latest`, `windows-2022`)
    /// into its OS family. Returns `None` for unrecognized identifiers.
    pub fn classify(platform: &str) -> Option<OsFamily> {
        let p = platform.to_ascii_lowercase();

        const LINUX_MARKERS: &[&str] = &[
            "linux", "ubuntu", "debian", "fedora", "alpine", "centos", "rhel", "arch",
        ];
        const MACOS_MARKERS: &[&str] = &["macos", "osx", "darwin"];
        const WINDOWS_MARKERS: &[&str] = &["windows", "win32", "win64"];

        if WINDOWS_MARKERS.iter().any(|m| p.contains(m)) {
            Some(OsFamily::Windows)
        } else if MACOS_MARKERS.iter().any(|m| p.contains(m)) {
            Some(OsFamily::MacOs)
        } else if LINUX_MARKERS.iter().any(|m| p.contains(m)) {
            Some(OsFamily::Linux)
        } else {
            None
        }
    }

    /// Parse a family name as written in guard expressions:
    /// `linux`, `macos`, `windows` (case-insensitive).
    pub fn parse_name(name: &str) -> Option<OsFamily> {
        match name.to_ascii_lowercase().as_str() {
            "linux" => Some(OsFamily::Linux),
            "macos" => Some(OsFamily::MacOs),
            "windows" => Some(OsFamily::Windows),
            _ => None,
        }
    }

    /// The family of the machine this process runs on.
    pub fn host() -> OsFamily {
        if cfg!(target_os = "windows") {
            OsFamily::Windows
        } else if cfg!(target_os = "macos") {
            OsFamily::MacOs
        } else {
            OsFamily::Linux
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Linux => write!(f, "linux"),
            OsFamily::MacOs => write!(f, "macos"),
            OsFamily::Windows => write!(f, "windows"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_linux_variants() {
        for platform in ["ubuntu-latest", "ubuntu-22.04", "debian-12", "x86_64-linux"] {
            assert_eq!(OsFamily::classify(platform), Some(OsFamily::Linux), "{platform}");
        }
    }

    #[test]
    fn test_classify_macos_and_windows() {
        assert_eq!(OsFamily::classify("macos-14"), Some(OsFamily::MacOs));
        assert_eq!(OsFamily::classify("osx-13"), Some(OsFamily::MacOs));
        assert_eq!(OsFamily::classify("windows-latest"), Some(OsFamily::Windows));
        assert_eq!(OsFamily::classify("windows-2022"), Some(OsFamily::Windows));
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(OsFamily::classify("solaris-11"), None);
    }

    #[test]
    fn test_parse_name_case_insensitive() {
        assert_eq!(OsFamily::parse_name("Linux"), Some(OsFamily::Linux));
        assert_eq!(OsFamily::parse_name("MACOS"), Some(OsFamily::MacOs));
        assert_eq!(OsFamily::parse_name("windows"), Some(OsFamily::Windows));
        assert_eq!(OsFamily::parse_name("beos"), None);
    }

    #[test]
    fn test_display_round_trips_parse() {
        for family in [OsFamily::Linux, OsFamily::MacOs, OsFamily::Windows] {
            assert_eq!(OsFamily::parse_name(&family.to_string()), Some(family));
        }
    }
}
