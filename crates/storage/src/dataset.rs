//! First-run installation of the bundled airport database.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::info;

/// Failures here are fatal: the application has no airports without the
/// dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("bundled dataset not found at '{}'", path.display())]
    BundledMissing { path: PathBuf },
    #[error("failed to create data directory '{}'", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to copy bundled dataset '{}' to '{}'", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetInstall {
    AlreadyPresent,
    Copied { bytes: u64 },
}

/// Copies `bundled` to `target` unless `target` already exists. The copy goes
/// through a sibling `.partial` file so an interrupted copy never leaves a
/// truncated database at `target`.
pub fn install_bundled_dataset(bundled: &Path, target: &Path) -> Result<DatasetInstall, DatasetError> {
    if target.exists() {
        info!(path = %target.display(), "airport dataset already installed");
        return Ok(DatasetInstall::AlreadyPresent);
    }
    if !bundled.is_file() {
        return Err(DatasetError::BundledMissing {
            path: bundled.to_path_buf(),
        });
    }

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| DatasetError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let partial = partial_path(target);
    let copy_error = |source| DatasetError::Copy {
        from: bundled.to_path_buf(),
        to: target.to_path_buf(),
        source,
    };
    let bytes = match fs::copy(bundled, &partial).and_then(|bytes| {
        fs::rename(&partial, target)?;
        Ok(bytes)
    }) {
        Ok(bytes) => bytes,
        Err(source) => {
            let _ = fs::remove_file(&partial);
            return Err(copy_error(source));
        }
    };

    info!(
        from = %bundled.display(),
        to = %target.display(),
        bytes,
        "installed bundled airport dataset"
    );
    Ok(DatasetInstall::Copied { bytes })
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    target.with_file_name(name)
}
