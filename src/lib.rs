//! vssetup - Visual Studio instance discovery for build configuration
//!
//! This crate asks the Visual Studio Setup Configuration service which
//! instances are installed, validates each one, and picks the instance a
//! build should use: the newest of the required major version, a pinned
//! installation, or the environment itself inside an Enterprise WDK.
//!
//! ```rust,no_run
//! use vssetup::SetupQuery;
//!
//! let mut query = SetupQuery::new(17);
//! if let Some(root) = query.install_location() {
//!     println!("Visual Studio 2022 at {}", root.display());
//!     println!("toolset: {:?}", query.toolset_version());
//!     println!("Windows 10 SDK: {}", query.has_platform_sdk10());
//! }
//! ```
//!
//! On hosts without the service the query simply reports nothing available.

pub mod error;
pub mod ewdk;
pub mod instance;
pub mod native;
pub mod query;
pub mod selection;
pub mod toolset;
pub mod util;
pub mod version;

/// Stubs for unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a stub setup service that counts calls made into it.
#[cfg(test)]
pub mod test_support;

pub use error::SetupError;
pub use instance::{InstanceRecord, SdkPresence, WIN10_SDK_COMPONENT, WIN81_SDK_COMPONENT};
pub use native::{
    InstanceIter, InstanceState, PackageReference, PlatformConnector, SetupConnector,
    SetupInstance, SetupService,
};
pub use query::SetupQuery;
pub use util::config::SetupConfig;
pub use util::env::{Environment, MapEnvironment, ProcessEnvironment};
pub use version::PackedVersion;
