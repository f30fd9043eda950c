/*
 * Run-level error taxonomy. Module errors from the core are folded into the
 * categories an operator acts on; every variant is fatal to the run, steps that
 * are allowed to fail log and continue instead of returning one of these.
 */
use super::invocation::InvocationError;
use crate::core::archive_manager::ArchiveManagerError;
use crate::core::{ConfigError, DatabaseError, PackageError, ProvisionError, SiteError};
use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum BatchError {
    SiteNotFound(PathBuf),
    MalformedPackage(PackageError),
    MissingField(String),
    DatabaseProvisionFailed(DatabaseError),
    DatabaseMissing(String),
    Archive(ArchiveManagerError),
    ProvisionFailed(ProvisionError),
    Site(SiteError),
    /// A step that needs the site runtime ran before `connect`.
    NotConnected(&'static str),
    Invocation(InvocationError),
    Config(ConfigError),
    Io(io::Error),
}

impl From<PackageError> for BatchError {
    fn from(err: PackageError) -> Self {
        match err {
            PackageError::MissingField(field) => BatchError::MissingField(field.to_string()),
            other => BatchError::MalformedPackage(other),
        }
    }
}

impl From<SiteError> for BatchError {
    fn from(err: SiteError) -> Self {
        match err {
            SiteError::NotFound(path) => BatchError::SiteNotFound(path),
            other => BatchError::Site(other),
        }
    }
}

impl From<ArchiveManagerError> for BatchError {
    fn from(err: ArchiveManagerError) -> Self {
        match err {
            ArchiveManagerError::DatabaseMissing(name) => BatchError::DatabaseMissing(name),
            other => BatchError::Archive(other),
        }
    }
}

impl From<ProvisionError> for BatchError {
    fn from(err: ProvisionError) -> Self {
        BatchError::ProvisionFailed(err)
    }
}

impl From<InvocationError> for BatchError {
    fn from(err: InvocationError) -> Self {
        BatchError::Invocation(err)
    }
}

impl From<ConfigError> for BatchError {
    fn from(err: ConfigError) -> Self {
        BatchError::Config(err)
    }
}

impl From<io::Error> for BatchError {
    fn from(err: io::Error) -> Self {
        BatchError::Io(err)
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::SiteNotFound(path) => {
                write!(f, "Provided path {path:?} does not contain a site installation")
            }
            BatchError::MalformedPackage(e) => write!(f, "{e}"),
            BatchError::MissingField(field) => {
                write!(f, "Package is missing required field '{field}'")
            }
            BatchError::DatabaseProvisionFailed(e) => {
                write!(f, "Could not prepare the database: {e}")
            }
            BatchError::DatabaseMissing(name) => {
                write!(f, "Specified database '{name}' does not exist")
            }
            BatchError::Archive(e) => write!(f, "{e}"),
            BatchError::ProvisionFailed(e) => write!(f, "{e}"),
            BatchError::Site(e) => write!(f, "{e}"),
            BatchError::NotConnected(step) => {
                write!(f, "Site must be connected before '{step}'")
            }
            BatchError::Invocation(e) => write!(f, "{e}"),
            BatchError::Config(e) => write!(f, "{e}"),
            BatchError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchError::MalformedPackage(e) => Some(e),
            BatchError::DatabaseProvisionFailed(e) => Some(e),
            BatchError::Archive(e) => Some(e),
            BatchError::ProvisionFailed(e) => Some(e),
            BatchError::Site(e) => Some(e),
            BatchError::Invocation(e) => Some(e),
            BatchError::Config(e) => Some(e),
            BatchError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_errors_map_to_run_categories() {
        assert!(matches!(
            BatchError::from(PackageError::MissingField("domain")),
            BatchError::MissingField(field) if field == "domain"
        ));
        assert!(matches!(
            BatchError::from(SiteError::NotFound(PathBuf::from("/srv"))),
            BatchError::SiteNotFound(_)
        ));
        assert!(matches!(
            BatchError::from(ArchiveManagerError::DatabaseMissing("wp".to_string())),
            BatchError::DatabaseMissing(name) if name == "wp"
        ));
        assert!(matches!(
            BatchError::from(ProvisionError::NothingToInstall),
            BatchError::ProvisionFailed(_)
        ));
    }

    #[test]
    fn test_display_names_the_problem() {
        let err = BatchError::NotConnected("update_domain");
        assert_eq!(err.to_string(), "Site must be connected before 'update_domain'");
    }
}
