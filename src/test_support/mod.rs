//! Test utilities and stubs for unit tests.
//!
//! Provides a stub setup service that hands out canned instances and counts
//! how often the engine reaches into it.
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::test_support::{StubConnector, StubInstance};
//!
//! let connector = StubConnector::new(vec![
//!     StubInstance::new("a", "C:/VS/2022", "17.8.34330.188"),
//! ]);
//! let counters = connector.counters();
//! let mut query = SetupQuery::with_connector(17, connector, MapEnvironment::new());
//! assert!(query.is_available());
//! assert_eq!(counters.enumerations(), 1);
//! ```

pub mod fixtures;

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use crate::error::SetupError;
use crate::native::{
    InstanceIter, InstanceState, PackageReference, SetupConnector, SetupInstance, SetupService,
};
use crate::version::PackedVersion;

pub use fixtures::*;

/// Shared call counters for a stub service.
#[derive(Debug, Default)]
pub struct StubCounters {
    connects: Cell<usize>,
    enumerations: Cell<usize>,
    version_parses: Cell<usize>,
}

impl StubCounters {
    pub fn connects(&self) -> usize {
        self.connects.get()
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.get()
    }

    pub fn version_parses(&self) -> usize {
        self.version_parses.get()
    }

    fn bump(cell: &Cell<usize>) {
        cell.set(cell.get() + 1);
    }
}

/// A canned instance. `None` fields fail when read.
#[derive(Debug, Clone)]
pub struct StubInstance {
    pub id: Option<String>,
    pub state: Option<InstanceState>,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    pub packages: Option<Vec<String>>,
    pub toolset: Option<String>,
    pub widenable: bool,
}

impl StubInstance {
    /// A complete, registered instance with no packages.
    pub fn new(id: &str, path: &str, version: &str) -> Self {
        StubInstance {
            id: Some(id.to_string()),
            state: Some(InstanceState::COMPLETE),
            path: Some(PathBuf::from(path)),
            version: Some(version.to_string()),
            packages: Some(Vec::new()),
            toolset: None,
            widenable: true,
        }
    }

    pub fn with_packages(mut self, ids: &[&str]) -> Self {
        self.packages = Some(ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_toolset(mut self, toolset: &str) -> Self {
        self.toolset = Some(toolset.to_string());
        self
    }

    pub fn with_state(mut self, state: InstanceState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn without_version(mut self) -> Self {
        self.version = None;
        self
    }

    pub fn without_packages(mut self) -> Self {
        self.packages = None;
        self
    }

    pub fn not_widenable(mut self) -> Self {
        self.widenable = false;
        self
    }
}

fn read<T: Clone>(value: &Option<T>, call: &'static str) -> Result<T, SetupError> {
    value.clone().ok_or(SetupError::native(call, -1))
}

impl SetupInstance for StubInstance {
    fn instance_id(&self) -> Result<String, SetupError> {
        read(&self.id, "GetInstanceId")
    }

    fn state(&self) -> Result<InstanceState, SetupError> {
        read(&self.state, "GetState")
    }

    fn installation_path(&self) -> Result<PathBuf, SetupError> {
        read(&self.path, "GetInstallationPath")
    }

    fn installation_version(&self) -> Result<String, SetupError> {
        read(&self.version, "GetInstallationVersion")
    }

    fn packages(&self) -> Result<Vec<PackageReference>, SetupError> {
        self.packages
            .as_ref()
            .map(|ids| ids.iter().map(PackageReference::new).collect())
            .ok_or_else(|| SetupError::PackageEnumeration("GetPackages failed".to_string()))
    }

    fn toolset_version(&self) -> Option<String> {
        self.toolset.clone()
    }
}

/// Stub service handing out clones of its instances.
#[derive(Debug)]
pub struct StubSetupService {
    instances: Vec<StubInstance>,
    counters: Rc<StubCounters>,
}

impl SetupService for StubSetupService {
    fn instances(&self) -> Result<InstanceIter<'_>, SetupError> {
        StubCounters::bump(&self.counters.enumerations);
        Ok(Box::new(self.instances.iter().map(|instance| {
            if instance.widenable {
                Ok(Box::new(instance.clone()) as Box<dyn SetupInstance>)
            } else {
                Err(SetupError::native("QueryInterface", -2))
            }
        })))
    }

    fn parse_version(&self, version: &str) -> Result<PackedVersion, SetupError> {
        StubCounters::bump(&self.counters.version_parses);
        PackedVersion::parse(version)
    }
}

/// Connector producing [`StubSetupService`]s, or failing like a host without
/// the service.
#[derive(Debug, Default)]
pub struct StubConnector {
    instances: Vec<StubInstance>,
    counters: Rc<StubCounters>,
    unavailable: bool,
}

impl StubConnector {
    pub fn new(instances: Vec<StubInstance>) -> Self {
        StubConnector {
            instances,
            counters: Rc::default(),
            unavailable: false,
        }
    }

    /// A connector whose service can never be reached.
    pub fn unavailable() -> Self {
        StubConnector {
            unavailable: true,
            ..StubConnector::default()
        }
    }

    pub fn counters(&self) -> Rc<StubCounters> {
        Rc::clone(&self.counters)
    }
}

impl SetupConnector for StubConnector {
    fn connect(&self) -> Result<Box<dyn SetupService>, SetupError> {
        StubCounters::bump(&self.counters.connects);
        if self.unavailable {
            return Err(SetupError::ServiceUnavailable(
                "class not registered".to_string(),
            ));
        }
        Ok(Box::new(StubSetupService {
            instances: self.instances.clone(),
            counters: Rc::clone(&self.counters),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_connector_counts_calls() {
        let connector = StubConnector::new(vec![StubInstance::new("a", "C:/VS", "17.0")]);
        let counters = connector.counters();

        let service = connector.connect().unwrap();
        let instances: Vec<_> = service.instances().unwrap().collect();
        assert_eq!(instances.len(), 1);
        service.parse_version("17.0").unwrap();

        assert_eq!(counters.connects(), 1);
        assert_eq!(counters.enumerations(), 1);
        assert_eq!(counters.version_parses(), 1);
    }

    #[test]
    fn test_stub_instance_read_failures() {
        let instance = StubInstance::new("a", "C:/VS", "17.0")
            .without_version()
            .without_packages();
        assert!(instance.installation_version().is_err());
        assert!(matches!(
            instance.packages(),
            Err(SetupError::PackageEnumeration(_))
        ));
    }

    #[test]
    fn test_unavailable_connector() {
        let connector = StubConnector::unavailable();
        assert!(connector.connect().is_err());
        assert_eq!(connector.counters().connects(), 1);
    }
}
