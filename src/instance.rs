//! Validated description of one Visual Studio installation.

use std::path::{Path, PathBuf};

use crate::version::PackedVersion;

/// Package id of the Windows 10 SDK component.
pub const WIN10_SDK_COMPONENT: &str = "Microsoft.VisualStudio.Component.Windows10SDK";

/// Package id of the Windows 8.1 SDK component.
pub const WIN81_SDK_COMPONENT: &str = "Microsoft.VisualStudio.Component.Windows81SDK";

/// Which platform SDKs an instance ships.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SdkPresence {
    pub win10: bool,
    pub win81: bool,
}

impl SdkPresence {
    /// Scan package ids for the known SDK components.
    ///
    /// Ids must match exactly; anything else is ignored.
    pub fn from_package_ids<'a, I>(ids: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter().fold(SdkPresence::default(), |mut sdks, id| {
            if id == WIN10_SDK_COMPONENT {
                sdks.win10 = true;
            } else if id == WIN81_SDK_COMPONENT {
                sdks.win81 = true;
            }
            sdks
        })
    }
}

/// An installation that passed validation.
///
/// Records are only built through [`InstanceRecord::new`], which refuses an
/// empty location, an empty version string or a zero packed version, so
/// every record that reaches selection is fully populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    instance_id: String,
    install_location: PathBuf,
    version: String,
    numeric_version: PackedVersion,
    toolset_version: String,
    sdks: SdkPresence,
}

impl InstanceRecord {
    /// Create a record, or `None` if a required field is empty.
    pub fn new(
        instance_id: impl Into<String>,
        install_location: impl Into<PathBuf>,
        version: impl Into<String>,
        numeric_version: PackedVersion,
    ) -> Option<Self> {
        let install_location = install_location.into();
        let version = version.into();
        if install_location.as_os_str().is_empty()
            || version.is_empty()
            || numeric_version.is_zero()
        {
            return None;
        }

        Some(InstanceRecord {
            instance_id: instance_id.into(),
            install_location,
            version,
            numeric_version,
            toolset_version: String::new(),
            sdks: SdkPresence::default(),
        })
    }

    /// Attach the compiler toolset version.
    pub fn with_toolset_version(mut self, toolset_version: impl Into<String>) -> Self {
        self.toolset_version = toolset_version.into();
        self
    }

    /// Attach SDK presence flags.
    pub fn with_sdks(mut self, sdks: SdkPresence) -> Self {
        self.sdks = sdks;
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn install_location(&self) -> &Path {
        &self.install_location
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn numeric_version(&self) -> PackedVersion {
        self.numeric_version
    }

    /// Compiler toolset version, empty when it could not be determined.
    pub fn toolset_version(&self) -> &str {
        &self.toolset_version
    }

    pub fn has_platform_sdk10(&self) -> bool {
        self.sdks.win10
    }

    pub fn has_platform_sdk81(&self) -> bool {
        self.sdks.win81
    }

    /// Whether this record lives at `location`, ignoring case and separator style.
    pub fn is_located_at(&self, location: &Path) -> bool {
        same_location(&self.install_location, location)
    }
}

/// Forward slashes and no trailing separator, as build scripts expect.
pub fn forward_slashes(path: &Path) -> String {
    let mut s = path.to_string_lossy().replace('\\', "/");
    while s.len() > 1 && s.ends_with('/') && !s.ends_with(":/") {
        s.pop();
    }
    s
}

/// Normalize a location for comparison: forward slashes, no trailing
/// separator, lowercase.
pub fn normalize_location(path: &Path) -> String {
    forward_slashes(path).to_lowercase()
}

/// Case- and separator-insensitive path equality.
pub fn same_location(a: &Path, b: &Path) -> bool {
    normalize_location(a) == normalize_location(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(v: &str) -> PackedVersion {
        PackedVersion::parse(v).unwrap()
    }

    #[test]
    fn test_record_requires_populated_fields() {
        assert!(InstanceRecord::new("a", "", "16.2", packed("16.2")).is_none());
        assert!(InstanceRecord::new("a", "C:/VS", "", packed("16.2")).is_none());
        assert!(InstanceRecord::new("a", "C:/VS", "0.0", PackedVersion::default()).is_none());

        let record = InstanceRecord::new("a", "C:/VS", "16.2", packed("16.2")).unwrap();
        assert_eq!(record.instance_id(), "a");
        assert_eq!(record.numeric_version().major(), 16);
        assert_eq!(record.toolset_version(), "");
        assert!(!record.has_platform_sdk10());
        assert!(!record.has_platform_sdk81());
    }

    #[test]
    fn test_sdk_presence_matches_exact_ids_only() {
        let sdks = SdkPresence::from_package_ids([
            "Microsoft.VisualStudio.Component.VC.Tools.x86.x64",
            WIN10_SDK_COMPONENT,
        ]);
        assert_eq!(
            sdks,
            SdkPresence {
                win10: true,
                win81: false
            }
        );

        let sdks = SdkPresence::from_package_ids([
            "Microsoft.VisualStudio.Component.Windows10SDK.19041",
            "microsoft.visualstudio.component.windows81sdk",
        ]);
        assert_eq!(sdks, SdkPresence::default());

        assert_eq!(SdkPresence::from_package_ids([]), SdkPresence::default());
    }

    #[test]
    fn test_forward_slashes_keeps_case_and_drive_root() {
        assert_eq!(
            forward_slashes(Path::new(r"C:\Program Files\Microsoft Visual Studio\2022\")),
            "C:/Program Files/Microsoft Visual Studio/2022"
        );
        assert_eq!(forward_slashes(Path::new(r"E:\")), "E:/");
        assert_eq!(forward_slashes(Path::new("/opt/vs")), "/opt/vs");
    }

    #[test]
    fn test_same_location_ignores_case_and_separators() {
        assert!(same_location(
            Path::new(r"C:\Program Files\Microsoft Visual Studio\2022\Community\"),
            Path::new("c:/program files/microsoft visual studio/2022/community"),
        ));
        assert!(!same_location(
            Path::new("C:/VS/2019"),
            Path::new("C:/VS/2022"),
        ));
    }
}
