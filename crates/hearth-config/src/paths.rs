//! Resolves the filesystem layout of the service host.
//!
//! Resolution runs before logging exists, so every failure is returned as a
//! [`PathsError`] for the caller to print. Resolving never touches the
//! filesystem; [`ApplicationPaths::prepare`] creates the directories once the
//! caller has decided to launch.

use std::env;
use std::fs::DirBuilder;
use std::io;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::defaults::{
    CONFIG_DIRECTORY, CONFIG_FILE_NAME, DEFAULT_PROGRAM_DATA_DIRECTORY, LOG_DIRECTORY,
    RUN_DIRECTORY,
};
use crate::options::StartupOptions;

/// Errors raised while resolving or preparing the host's directories.
#[derive(Debug, Error)]
pub enum PathsError {
    /// The executable location could not be determined.
    #[error("failed to locate the running executable: {source}")]
    Executable {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The working directory could not be determined.
    #[error("failed to read the working directory: {source}")]
    WorkingDirectory {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A path was not valid UTF-8.
    #[error("path '{}' is not valid UTF-8", path.display())]
    NonUtf8 {
        /// Offending path.
        path: PathBuf,
    },
    /// The executable path has no parent directory.
    #[error("executable path '{path}' has no parent directory")]
    MissingApplicationDirectory {
        /// Executable path.
        path: Utf8PathBuf,
    },
    /// Creating one of the host directories failed.
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Derives [`ApplicationPaths`] from the executable location.
#[derive(Debug, Clone)]
pub struct PathResolver {
    application_path: Utf8PathBuf,
    working_dir: Utf8PathBuf,
    default_program_data: Utf8PathBuf,
}

impl PathResolver {
    /// Builds a resolver for the running executable and working directory.
    pub fn from_environment() -> Result<Self, PathsError> {
        let application_path =
            env::current_exe().map_err(|source| PathsError::Executable { source })?;
        let working_dir =
            env::current_dir().map_err(|source| PathsError::WorkingDirectory { source })?;
        Self::new(&application_path, &working_dir)
    }

    /// Builds a resolver from explicit locations.
    ///
    /// A relative `application_path` is anchored at `working_dir`.
    pub fn new(application_path: &Path, working_dir: &Path) -> Result<Self, PathsError> {
        let working_dir = utf8(working_dir)?;
        let application_path = working_dir.join(utf8(application_path)?);
        let application_dir = application_path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .ok_or_else(|| PathsError::MissingApplicationDirectory {
                path: application_path.clone(),
            })?;
        let default_program_data = application_dir.join(DEFAULT_PROGRAM_DATA_DIRECTORY);
        Ok(Self {
            application_path,
            working_dir,
            default_program_data,
        })
    }

    /// Program-data root used when no override is supplied.
    #[must_use]
    pub fn default_program_data(&self) -> &Utf8Path {
        self.default_program_data.as_path()
    }

    /// Resolves paths using the `-programdata` flag, if present.
    #[must_use]
    pub fn resolve(&self, options: &StartupOptions) -> ApplicationPaths {
        self.resolve_with(options.program_data())
    }

    /// Resolves paths using an optional program-data override.
    ///
    /// Blank overrides are treated as absent. Relative overrides are anchored
    /// at the working directory captured by the resolver.
    #[must_use]
    pub fn resolve_with(&self, program_data: Option<&str>) -> ApplicationPaths {
        let program_data = match program_data.map(str::trim) {
            Some(custom) if !custom.is_empty() => self.working_dir.join(custom),
            _ => self.default_program_data.clone(),
        };
        ApplicationPaths::new(
            self.application_path.clone(),
            self.default_program_data.clone(),
            program_data,
        )
    }
}

/// Resolved locations used by the service host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationPaths {
    application_path: Utf8PathBuf,
    default_program_data: Utf8PathBuf,
    program_data: Utf8PathBuf,
    log_dir: Utf8PathBuf,
    config_dir: Utf8PathBuf,
    run_dir: Utf8PathBuf,
}

impl ApplicationPaths {
    fn new(
        application_path: Utf8PathBuf,
        default_program_data: Utf8PathBuf,
        program_data: Utf8PathBuf,
    ) -> Self {
        Self {
            log_dir: program_data.join(LOG_DIRECTORY),
            config_dir: program_data.join(CONFIG_DIRECTORY),
            run_dir: program_data.join(RUN_DIRECTORY),
            application_path,
            default_program_data,
            program_data,
        }
    }

    /// Builds paths rooted at `program_data` for an executable at
    /// `application_path`, bypassing the resolver.
    #[must_use]
    pub fn rooted_at(
        application_path: impl Into<Utf8PathBuf>,
        program_data: impl Into<Utf8PathBuf>,
    ) -> Self {
        let program_data = program_data.into();
        Self::new(application_path.into(), program_data.clone(), program_data)
    }

    /// Creates the program-data, log, and run directories.
    ///
    /// Directories are created owner-only on Unix. Existing directories are
    /// left untouched.
    pub fn prepare(&self) -> Result<(), PathsError> {
        for dir in [&self.program_data, &self.log_dir, &self.run_dir] {
            create_private_dir(dir)?;
        }
        Ok(())
    }

    /// Location of the running executable.
    #[must_use]
    pub fn application_path(&self) -> &Utf8Path {
        self.application_path.as_path()
    }

    /// Program-data root derived from the executable location.
    #[must_use]
    pub fn default_program_data(&self) -> &Utf8Path {
        self.default_program_data.as_path()
    }

    /// Program-data root in effect.
    #[must_use]
    pub fn program_data(&self) -> &Utf8Path {
        self.program_data.as_path()
    }

    /// Returns `true` when the program-data root was overridden.
    #[must_use]
    pub fn is_custom_program_data(&self) -> bool {
        self.program_data != self.default_program_data
    }

    /// Directory holding log files and crash records.
    #[must_use]
    pub fn log_dir(&self) -> &Utf8Path {
        self.log_dir.as_path()
    }

    /// Directory searched for the configuration file.
    #[must_use]
    pub fn config_dir(&self) -> &Utf8Path {
        self.config_dir.as_path()
    }

    /// Expected configuration file location.
    #[must_use]
    pub fn config_file(&self) -> Utf8PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Directory holding runtime artefacts.
    #[must_use]
    pub fn run_dir(&self) -> &Utf8Path {
        self.run_dir.as_path()
    }

    /// Path to the lock file guarding singleton startup.
    #[must_use]
    pub fn lock_path(&self) -> Utf8PathBuf {
        self.run_dir.join("hearthd.lock")
    }

    /// Path to the PID file.
    #[must_use]
    pub fn pid_path(&self) -> Utf8PathBuf {
        self.run_dir.join("hearthd.pid")
    }

    /// Path to the health snapshot.
    #[must_use]
    pub fn health_path(&self) -> Utf8PathBuf {
        self.run_dir.join("hearthd.health")
    }
}

fn utf8(path: &Path) -> Result<Utf8PathBuf, PathsError> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|path| PathsError::NonUtf8 { path })
}

fn create_private_dir(path: &Utf8Path) -> Result<(), PathsError> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    match builder.create(path.as_std_path()) {
        Err(source) if source.kind() != io::ErrorKind::AlreadyExists => {
            Err(PathsError::CreateDirectory {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
