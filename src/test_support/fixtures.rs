//! Canned instances and records shared by unit tests.

use crate::instance::{InstanceRecord, WIN10_SDK_COMPONENT, WIN81_SDK_COMPONENT};
use crate::version::PackedVersion;

use super::StubInstance;

pub const VS14_PATH: &str = r"C:\Program Files (x86)\Microsoft Visual Studio 14.0";
pub const VS15_PATH: &str = r"C:\Program Files (x86)\Microsoft Visual Studio\2017\Community";
pub const VS16_PATH: &str = r"C:\Program Files (x86)\Microsoft Visual Studio\2019\Community";
pub const VS17_PATH: &str = r"C:\Program Files\Microsoft Visual Studio\2022\Community";

/// Build a validated record, panicking on bad input.
pub fn record(id: &str, location: &str, version: &str) -> InstanceRecord {
    let packed = PackedVersion::parse(version).expect("fixture version must parse");
    InstanceRecord::new(id, location, version, packed).expect("fixture record must be complete")
}

/// Three instances of majors 14, 15 and 16. Only the 2017 and 2019 ones
/// carry SDK packages, and they differ.
pub fn three_majors() -> Vec<StubInstance> {
    vec![
        StubInstance::new("vs14", VS14_PATH, "14.0"),
        StubInstance::new("vs15", VS15_PATH, "15.9")
            .with_packages(&[WIN81_SDK_COMPONENT, WIN10_SDK_COMPONENT])
            .with_toolset("14.16.27023"),
        StubInstance::new("vs16", VS16_PATH, "16.2")
            .with_packages(&[
                "Microsoft.VisualStudio.Component.VC.Tools.x86.x64",
                WIN10_SDK_COMPONENT,
            ])
            .with_toolset("14.22.27905"),
    ]
}

/// A typical 2022 Community install with both SDKs.
pub fn vs2022() -> StubInstance {
    StubInstance::new("vs17", VS17_PATH, "17.8.34330.188")
        .with_packages(&[WIN10_SDK_COMPONENT, WIN81_SDK_COMPONENT])
        .with_toolset("14.38.33130")
}
