//! The setup query engine.
//!
//! A [`SetupQuery`] is built cheaply with a required major version. The first
//! accessor call connects to the setup service, enumerates every registered
//! instance, validates each one and chooses a single instance. That outcome
//! is memoized for the life of the query; later calls never go back to the
//! service, and a failed resolution is never retried.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::SetupError;
use crate::ewdk;
use crate::instance::{forward_slashes, InstanceRecord, SdkPresence};
use crate::native::{PlatformConnector, SetupConnector, SetupInstance, SetupService};
use crate::selection::{self, SelectionCriteria};
use crate::util::config::SetupConfig;
use crate::util::env::{common_tools_var, Environment, ProcessEnvironment};

/// Resolution state. Leaves `Uninitialized` exactly once.
#[derive(Debug)]
enum Resolution {
    Uninitialized,
    Resolved(InstanceRecord),
    Failed(SetupError),
}

/// Finds the Visual Studio instance a build should use.
pub struct SetupQuery {
    required_major: u16,
    install_location: Option<PathBuf>,
    honor_ewdk: bool,
    honor_common_tools_hint: bool,
    connector: Box<dyn SetupConnector>,
    env: Box<dyn Environment>,
    // Kept open until the query is dropped.
    service: Option<Box<dyn SetupService>>,
    resolution: Resolution,
}

impl SetupQuery {
    /// Query the host's setup service for an instance of `required_major`.
    ///
    /// Nothing is contacted until the first accessor call.
    pub fn new(required_major: u16) -> Self {
        Self::with_connector(required_major, PlatformConnector, ProcessEnvironment)
    }

    /// Query through a specific connector and environment.
    pub fn with_connector(
        required_major: u16,
        connector: impl SetupConnector + 'static,
        env: impl Environment + 'static,
    ) -> Self {
        SetupQuery {
            required_major,
            install_location: None,
            honor_ewdk: true,
            honor_common_tools_hint: true,
            connector: Box::new(connector),
            env: Box::new(env),
            service: None,
            resolution: Resolution::Uninitialized,
        }
    }

    /// Build a query for the host from configuration, using `default_major`
    /// when the configuration doesn't name one.
    pub fn from_config(config: &SetupConfig, default_major: u16) -> Self {
        Self::new(config.required_major(default_major)).configured(config)
    }

    /// Apply the location pin and feature switches from `config`.
    ///
    /// The required major version is fixed at construction and is not
    /// touched.
    pub fn configured(mut self, config: &SetupConfig) -> Self {
        self.install_location = config
            .install_location()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);
        self.honor_ewdk = config.honor_ewdk();
        self.honor_common_tools_hint = config.honor_common_tools_hint();
        self
    }

    /// Enable or disable Enterprise WDK detection.
    pub fn ewdk(mut self, enabled: bool) -> Self {
        self.honor_ewdk = enabled;
        self
    }

    /// Enable or disable the `VS<major>0COMNTOOLS` hint.
    pub fn common_tools_hint(mut self, enabled: bool) -> Self {
        self.honor_common_tools_hint = enabled;
        self
    }

    pub fn required_major(&self) -> u16 {
        self.required_major
    }

    /// Pin selection to the instance installed at `location` and resolve.
    ///
    /// Only allowed before anything has been resolved; afterwards the pin is
    /// refused and `false` is returned. Otherwise returns whether an instance
    /// at that location was found. An empty location clears the pin.
    pub fn set_install_location(&mut self, location: impl Into<PathBuf>) -> bool {
        let location = location.into();
        if !matches!(self.resolution, Resolution::Uninitialized) {
            tracing::warn!(
                "Ignoring install location {}: an instance was already resolved",
                location.display()
            );
            return false;
        }

        self.install_location = Some(location).filter(|p| !p.as_os_str().is_empty());
        self.is_available()
    }

    /// Whether an instance was chosen.
    pub fn is_available(&mut self) -> bool {
        self.chosen_instance().is_some()
    }

    /// The chosen instance, resolving it on first use.
    pub fn chosen_instance(&mut self) -> Option<&InstanceRecord> {
        if matches!(self.resolution, Resolution::Uninitialized) {
            self.resolution = match self.resolve() {
                Ok(record) => {
                    tracing::debug!(
                        "Chose instance {} ({}) at {}",
                        record.instance_id(),
                        record.version(),
                        record.install_location().display()
                    );
                    Resolution::Resolved(record)
                }
                Err(e) => {
                    tracing::debug!("No usable Visual Studio instance: {}", e);
                    Resolution::Failed(e)
                }
            };
        }

        match &self.resolution {
            Resolution::Resolved(record) => Some(record),
            Resolution::Uninitialized | Resolution::Failed(_) => None,
        }
    }

    /// Installation root of the chosen instance, with forward slashes.
    pub fn install_location(&mut self) -> Option<PathBuf> {
        self.chosen_instance()
            .map(|record| PathBuf::from(forward_slashes(record.install_location())))
    }

    /// Why no instance was chosen, once resolution has failed.
    pub fn failure(&mut self) -> Option<&SetupError> {
        self.chosen_instance();
        match &self.resolution {
            Resolution::Failed(e) => Some(e),
            Resolution::Uninitialized | Resolution::Resolved(_) => None,
        }
    }

    /// Default toolset version of the chosen instance, if it has one.
    pub fn toolset_version(&mut self) -> Option<String> {
        self.chosen_instance()
            .map(InstanceRecord::toolset_version)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn has_platform_sdk10(&mut self) -> bool {
        self.chosen_instance()
            .is_some_and(InstanceRecord::has_platform_sdk10)
    }

    pub fn has_platform_sdk81(&mut self) -> bool {
        self.chosen_instance()
            .is_some_and(InstanceRecord::has_platform_sdk81)
    }

    fn resolve(&mut self) -> Result<InstanceRecord, SetupError> {
        if self.honor_ewdk && ewdk::is_ewdk_enabled(&*self.env) {
            tracing::debug!("Enterprise WDK environment detected, skipping instance enumeration");
            return ewdk::synthesize_record(&*self.env);
        }

        let service = self.service.insert(self.connector.connect()?);
        let pinned = self.install_location.as_deref();
        let candidates = collect_candidates(&**service, pinned)?;
        tracing::debug!("Found {} candidate instance(s)", candidates.len());

        let hint = if self.honor_common_tools_hint {
            self.env
                .non_empty_var(&common_tools_var(self.required_major))
                .map(PathBuf::from)
        } else {
            None
        };

        let criteria = SelectionCriteria {
            required_major: self.required_major,
            install_location: pinned,
            common_tools_hint: hint.as_deref(),
        };

        selection::choose(&candidates, &criteria)
            .cloned()
            .ok_or_else(|| SetupError::NoMatchingInstance {
                major: self.required_major,
                location: pinned.map(|p| p.display().to_string()),
            })
    }
}

impl fmt::Debug for SetupQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupQuery")
            .field("required_major", &self.required_major)
            .field("install_location", &self.install_location)
            .field("honor_ewdk", &self.honor_ewdk)
            .field("honor_common_tools_hint", &self.honor_common_tools_hint)
            .field("connected", &self.service.is_some())
            .field("resolution", &self.resolution)
            .finish()
    }
}

/// Enumerate the service and keep every instance that validates and, when a
/// location is pinned, lives there.
fn collect_candidates(
    service: &dyn SetupService,
    pinned: Option<&Path>,
) -> Result<Vec<InstanceRecord>, SetupError> {
    let candidates = service
        .instances()?
        .map(|handle| handle.and_then(|instance| read_instance(service, &*instance)))
        .filter_map(|result| match result {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!("Skipping instance: {}", e);
                None
            }
        })
        .filter(|record| pinned.map_or(true, |location| record.is_located_at(location)))
        .collect();
    Ok(candidates)
}

/// Read and validate one instance.
fn read_instance(
    service: &dyn SetupService,
    instance: &dyn SetupInstance,
) -> Result<InstanceRecord, SetupError> {
    let instance_id = instance.instance_id()?;
    tracing::trace!("Reading instance {}", instance_id);

    let state = instance.state()?;
    if !state.is_local() {
        return Err(SetupError::InstanceState {
            instance: instance_id,
        });
    }

    let location = instance.installation_path()?;
    let version = instance.installation_version()?;
    let numeric_version = service.parse_version(&version)?;

    let sdks = if state.is_registered() {
        match instance.packages() {
            Ok(packages) => SdkPresence::from_package_ids(packages.iter().map(|p| p.id.as_str())),
            Err(e) => {
                tracing::debug!("No package list for instance {}: {}", instance_id, e);
                SdkPresence::default()
            }
        }
    } else {
        SdkPresence::default()
    };

    let toolset_version = instance.toolset_version().unwrap_or_default();

    let record = InstanceRecord::new(instance_id.clone(), location, version, numeric_version)
        .ok_or_else(|| {
            SetupError::MalformedInstance(format!(
                "instance `{}` has an empty location or version",
                instance_id
            ))
        })?
        .with_toolset_version(toolset_version)
        .with_sdks(sdks);
    Ok(record)
}
