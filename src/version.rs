//! Packed instance versions.
//!
//! The setup service orders installations by a 64-bit packing of their
//! dotted version: four 16-bit fields, major in the high word. Missing
//! trailing fields count as zero, so `16.2` packs the same as `16.2.0.0`.

use std::fmt;

use crate::error::SetupError;

const FIELD_BITS: u32 = 16;
const MAX_FIELDS: usize = 4;

/// A monotonically comparable encoding of a dotted version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PackedVersion(u64);

impl PackedVersion {
    /// Wrap a raw packed value as returned by the native version parser.
    pub const fn from_raw(raw: u64) -> Self {
        PackedVersion(raw)
    }

    /// Pack individual fields.
    pub const fn from_parts(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        PackedVersion(
            (major as u64) << (FIELD_BITS * 3)
                | (minor as u64) << (FIELD_BITS * 2)
                | (build as u64) << FIELD_BITS
                | revision as u64,
        )
    }

    /// Parse a dotted version of one to four numeric fields.
    pub fn parse(version: &str) -> Result<Self, SetupError> {
        let invalid = || SetupError::InvalidVersion(version.to_string());

        let trimmed = version.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let mut fields = [0u16; MAX_FIELDS];
        let mut count = 0;
        for part in trimmed.split('.') {
            if count == MAX_FIELDS || part.is_empty() {
                return Err(invalid());
            }
            fields[count] = part.parse::<u16>().map_err(|_| invalid())?;
            count += 1;
        }

        Ok(Self::from_parts(fields[0], fields[1], fields[2], fields[3]))
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The leading (major) field.
    pub const fn major(self) -> u16 {
        (self.0 >> (FIELD_BITS * 3)) as u16
    }

    pub const fn minor(self) -> u16 {
        (self.0 >> (FIELD_BITS * 2)) as u16
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PackedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major(),
            self.minor(),
            (self.0 >> FIELD_BITS) as u16,
            self.0 as u16
        )
    }
}
