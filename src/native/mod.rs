//! Seam between the query engine and the Visual Studio Setup Configuration
//! service.
//!
//! The engine only sees these traits. On Windows they are backed by the COM
//! binding in [`com`]; elsewhere the default connector reports the service as
//! unavailable. Tests plug in stubs.

#[cfg(windows)]
pub mod com;

use std::path::PathBuf;

use crate::error::SetupError;
use crate::version::PackedVersion;

/// Installation state bits reported for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstanceState(u32);

impl InstanceState {
    pub const NONE: InstanceState = InstanceState(0);
    /// Installation path exists on disk.
    pub const LOCAL: InstanceState = InstanceState(1);
    /// Product and packages are registered.
    pub const REGISTERED: InstanceState = InstanceState(2);
    pub const NO_REBOOT_REQUIRED: InstanceState = InstanceState(4);
    pub const COMPLETE: InstanceState = InstanceState(u32::MAX);

    pub const fn from_bits(bits: u32) -> Self {
        InstanceState(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: InstanceState) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_local(self) -> bool {
        self.contains(Self::LOCAL)
    }

    pub const fn is_registered(self) -> bool {
        self.contains(Self::REGISTERED)
    }
}

/// A package installed as part of an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    pub id: String,
}

impl PackageReference {
    pub fn new(id: impl Into<String>) -> Self {
        PackageReference { id: id.into() }
    }
}

/// A registered instance handle, already widened to the rich interface.
pub trait SetupInstance {
    fn instance_id(&self) -> Result<String, SetupError>;

    fn state(&self) -> Result<InstanceState, SetupError>;

    fn installation_path(&self) -> Result<PathBuf, SetupError>;

    fn installation_version(&self) -> Result<String, SetupError>;

    fn packages(&self) -> Result<Vec<PackageReference>, SetupError>;

    /// Default compiler toolset version, if the instance has one.
    fn toolset_version(&self) -> Option<String>;
}

/// Items yielded while enumerating instances. An `Err` item is a handle that
/// could not be widened; enumeration carries on past it.
pub type InstanceIter<'a> =
    Box<dyn Iterator<Item = Result<Box<dyn SetupInstance>, SetupError>> + 'a>;

/// A live connection to the registration service.
pub trait SetupService {
    /// Enumerate every registered instance.
    fn instances(&self) -> Result<InstanceIter<'_>, SetupError>;

    /// Convert a dotted version string into its packed form.
    fn parse_version(&self, version: &str) -> Result<PackedVersion, SetupError>;
}

/// Opens connections to the registration service.
pub trait SetupConnector {
    fn connect(&self) -> Result<Box<dyn SetupService>, SetupError>;
}

/// Connector for the host platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformConnector;

impl SetupConnector for PlatformConnector {
    #[cfg(windows)]
    fn connect(&self) -> Result<Box<dyn SetupService>, SetupError> {
        Ok(Box::new(com::ComSetupService::connect()?))
    }

    #[cfg(not(windows))]
    fn connect(&self) -> Result<Box<dyn SetupService>, SetupError> {
        Err(SetupError::ServiceUnavailable(
            "the Setup Configuration service only exists on Windows".to_string(),
        ))
    }
}
