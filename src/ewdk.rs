//! Enterprise WDK support.
//!
//! An EWDK build environment ships its own compiler and SDK and announces
//! itself through environment variables. Inside one, the setup service is not
//! consulted; the environment itself describes the instance.

use crate::error::SetupError;
use crate::instance::{InstanceRecord, SdkPresence};
use crate::util::env::Environment;
use crate::version::PackedVersion;

pub const ENTERPRISE_WDK_VAR: &str = "EnterpriseWDK";
pub const DISABLE_REGISTRY_USE_VAR: &str = "DisableRegistryUse";
pub const VS_INSTALL_DIR_VAR: &str = "VSINSTALLDIR";
pub const VS_VERSION_VAR: &str = "VisualStudioVersion";
pub const WINDOWS_SDK_DIR_81_VAR: &str = "WindowsSdkDir_81";

/// Instance id given to the synthesized record.
pub const EWDK_INSTANCE_ID: &str = "ewdk";

fn is_true(env: &dyn Environment, key: &str) -> bool {
    env.var(key)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

/// Whether both EWDK markers are set to `True`.
pub fn is_ewdk_enabled(env: &dyn Environment) -> bool {
    is_true(env, ENTERPRISE_WDK_VAR) && is_true(env, DISABLE_REGISTRY_USE_VAR)
}

/// Build the instance record described by an EWDK environment.
///
/// The EWDK always carries a Windows 10 SDK; the 8.1 SDK is present only
/// when its directory variable is set.
pub fn synthesize_record(env: &dyn Environment) -> Result<InstanceRecord, SetupError> {
    let location = env.non_empty_var(VS_INSTALL_DIR_VAR).ok_or_else(|| {
        SetupError::MalformedInstance(format!("EWDK environment has no {}", VS_INSTALL_DIR_VAR))
    })?;
    let version = env.non_empty_var(VS_VERSION_VAR).ok_or_else(|| {
        SetupError::MalformedInstance(format!("EWDK environment has no {}", VS_VERSION_VAR))
    })?;
    let numeric_version = PackedVersion::parse(&version)?;

    let sdks = SdkPresence {
        win10: true,
        win81: env.non_empty_var(WINDOWS_SDK_DIR_81_VAR).is_some(),
    };

    let record = InstanceRecord::new(EWDK_INSTANCE_ID, location, version.clone(), numeric_version)
        .ok_or_else(|| SetupError::MalformedInstance("EWDK environment is incomplete".to_string()))?
        .with_toolset_version(version)
        .with_sdks(sdks);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::env::MapEnvironment;

    fn ewdk_env() -> MapEnvironment {
        MapEnvironment::new()
            .with(ENTERPRISE_WDK_VAR, "True")
            .with(DISABLE_REGISTRY_USE_VAR, "true")
            .with(VS_INSTALL_DIR_VAR, r"D:\Program Files\Microsoft Visual Studio\2022\BuildTools\")
            .with(VS_VERSION_VAR, "17.0")
    }

    #[test]
    fn test_detection_requires_both_markers() {
        assert!(is_ewdk_enabled(&ewdk_env()));

        let env = MapEnvironment::new().with(ENTERPRISE_WDK_VAR, "True");
        assert!(!is_ewdk_enabled(&env));

        let env = MapEnvironment::new()
            .with(ENTERPRISE_WDK_VAR, "True")
            .with(DISABLE_REGISTRY_USE_VAR, "False");
        assert!(!is_ewdk_enabled(&env));

        assert!(!is_ewdk_enabled(&MapEnvironment::new()));
    }

    #[test]
    fn test_synthesized_record() {
        let record = synthesize_record(&ewdk_env()).unwrap();
        assert_eq!(record.instance_id(), EWDK_INSTANCE_ID);
        assert_eq!(record.version(), "17.0");
        assert_eq!(record.toolset_version(), "17.0");
        assert_eq!(record.numeric_version().major(), 17);
        assert!(record.has_platform_sdk10());
        assert!(!record.has_platform_sdk81());

        let env = ewdk_env().with(WINDOWS_SDK_DIR_81_VAR, r"D:\Windows Kits\8.1\");
        assert!(synthesize_record(&env).unwrap().has_platform_sdk81());
    }

    #[test]
    fn test_missing_install_dir_is_an_error() {
        let env = MapEnvironment::new()
            .with(ENTERPRISE_WDK_VAR, "True")
            .with(DISABLE_REGISTRY_USE_VAR, "True")
            .with(VS_VERSION_VAR, "17.0");
        assert!(matches!(
            synthesize_record(&env),
            Err(SetupError::MalformedInstance(_))
        ));
    }
}
