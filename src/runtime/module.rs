//! Worker module preparation and its cache location
//!
//! Before a context starts, its source is handed to a [`ModulePreparer`]
//! that materialises an executable module at a deterministic path under
//! `.sync-action-workers/`. The path is derived from a blake3 hash of the
//! source path so repeated launches reuse one file and different sources
//! never collide.
//!
//! On storage that refuses writes (read-only or permission denied), launch
//! falls back to the original source and carries on. Any other failure is
//! fatal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::LaunchConfig;
use super::error::{LaunchError, LaunchResult};

/// Directory name holding prepared worker modules.
pub const CACHE_DIR_NAME: &str = ".sync-action-workers";

/// Produces an executable module from a source file.
pub trait ModulePreparer: Send + Sync {
    /// Materialise `source` at `output`, overwriting any previous file.
    fn prepare(&self, source: &Path, output: &Path) -> anyhow::Result<()>;
}

/// Preparer that materialises the source unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyPreparer;

impl ModulePreparer for CopyPreparer {
    fn prepare(&self, source: &Path, output: &Path) -> anyhow::Result<()> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        fs::copy(source, output)
            .with_context(|| format!("Failed to copy {:?} to {:?}", source, output))?;
        Ok(())
    }
}

/// The module an execution context was started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerModule {
    source: PathBuf,
    path: PathBuf,
}

impl WorkerModule {
    /// Path the context should load.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The original source the module was prepared from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Whether a prepared copy is used, as opposed to the fallback source.
    pub fn is_prepared(&self) -> bool {
        self.source != self.path
    }

    /// A module that runs straight from its source.
    pub fn unprepared(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        Self {
            path: source.clone(),
            source,
        }
    }
}

/// Directory that holds prepared modules for a given configuration.
pub fn cache_dir(config: &LaunchConfig) -> PathBuf {
    let base = match &config.temp_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("target"),
    };
    base.join(CACHE_DIR_NAME)
}

/// Deterministic location of the prepared module for `source`.
pub fn cache_path(source: &Path, config: &LaunchConfig) -> PathBuf {
    let hash = blake3::hash(source.as_os_str().as_encoded_bytes());
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "worker".to_string());
    cache_dir(config).join(format!("{}_{}", file_name, hash.to_hex()))
}

/// Prepare the module for `source`, falling back to the source itself when
/// the cache location cannot be written.
pub fn prepare_module(
    source: &Path,
    config: &LaunchConfig,
    preparer: &dyn ModulePreparer,
) -> LaunchResult<WorkerModule> {
    let output = cache_path(source, config);
    match preparer.prepare(source, &output) {
        Ok(()) => Ok(WorkerModule {
            source: source.to_path_buf(),
            path: output,
        }),
        Err(err) if is_storage_refusal(&err) => {
            tracing::warn!(
                source = %source.display(),
                error = %format!("{err:#}"),
                "Failed to write prepared worker module, falling back to original source"
            );
            Ok(WorkerModule::unprepared(source))
        }
        Err(err) => Err(LaunchError::Prepare {
            path: source.to_path_buf(),
            source: err.into(),
        }),
    }
}

/// Whether a preparation failure came from storage refusing the write.
pub fn is_storage_refusal(err: &anyhow::Error) -> bool {
    let io_refusal = err.chain().any(|cause| {
        cause.downcast_ref::<io::Error>().is_some_and(|io_err| {
            matches!(
                io_err.kind(),
                io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem
            )
        })
    });
    io_refusal || format!("{err:#}").contains("read-only file system")
}
