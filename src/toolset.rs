//! Default MSVC toolset lookup inside an installation.

use std::fs;
use std::path::{Path, PathBuf};

/// File naming the default toolset, relative to the installation root.
pub const DEFAULT_TOOLSET_FILE: &str = "VC/Auxiliary/Build/Microsoft.VCToolsVersion.default.txt";

/// Path of the default-toolset file for an installation root.
pub fn default_toolset_file(install_root: &Path) -> PathBuf {
    DEFAULT_TOOLSET_FILE
        .split('/')
        .fold(install_root.to_path_buf(), |path, part| path.join(part))
}

/// Read the default toolset version of an installation.
///
/// Returns `None` if the file is missing or empty, or if the toolset it
/// names has no `VC/Tools/MSVC/<version>` directory.
pub fn default_toolset_version(install_root: &Path) -> Option<String> {
    let file = default_toolset_file(install_root);
    let contents = match fs::read_to_string(&file) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::trace!("No default toolset file at {}: {}", file.display(), e);
            return None;
        }
    };

    let version = contents.lines().next()?.trim();
    if version.is_empty() {
        return None;
    }

    let tools_dir = install_root
        .join("VC")
        .join("Tools")
        .join("MSVC")
        .join(version);
    if !tools_dir.is_dir() {
        tracing::debug!(
            "Default toolset {} has no tools directory at {}",
            version,
            tools_dir.display()
        );
        return None;
    }

    Some(version.to_string())
}
