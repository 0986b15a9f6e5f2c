use std::fmt;

use crate::error::{Result, TransportError};

/// The negotiated instrument software version.
///
/// Ordering is lexicographic over `(major, minor, patch)`, which is what
/// capability gates compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    /// Construct a version triple.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the instrument's software-version reply.
    ///
    /// The reply has the shape `"<product>-<major.minor.patch>-<build>"`,
    /// optionally quote-wrapped; the product prefix may itself contain
    /// dashes. Returns the version triple and the numeric build, with any
    /// non-digit decoration in the build field stripped.
    pub fn parse_diag(text: &str) -> Result<(FirmwareVersion, u32)> {
        let malformed = || TransportError::MalformedVersion(text.to_string());

        let mut trimmed = text.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            trimmed = &trimmed[1..trimmed.len() - 1];
        }

        let parts: Vec<&str> = trimmed.split('-').collect();
        if parts.len() < 2 {
            return Err(malformed());
        }
        let version = parts[parts.len() - 2];
        let build: String = parts[parts.len() - 1]
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        let build: u32 = build.parse().map_err(|_| malformed())?;

        let mut fields = version.split('.');
        let mut next = || -> Result<u32> {
            fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(malformed)
        };
        let (major, minor, patch) = (next()?, next()?, next()?);

        Ok((FirmwareVersion::new(major, minor, patch), build))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
