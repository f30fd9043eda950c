/*
 * Creates and extracts the side-car files that travel with a package: the
 * database dump, the media/themes/plugins bundles and per-item custom code
 * archives. Every path handed back is package-relative (`/`-separated) so it can
 * be written into the package document as-is; on restore the same references
 * are resolved against the package directory again.
 *
 * Bundle failures are reported to the caller, who decides whether the run goes
 * on. A missing bundle source is not an error at all: the step is skipped.
 */
use super::archiver::{ArchiveError, ArchiverOperations};
use super::checksum_utils;
use super::database::{DatabaseConnection, DatabaseEngineOperations, DatabaseError};
use super::package::{Package, Section};
use super::path_utils;
use super::site_runtime::{PLUGINS_DIR, THEMES_DIR, UPLOADS_DIR};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DATABASE_DIR: &str = "database";
pub const CUSTOM_PLUGINS_DIR: &str = "custom_plugins";
pub const CUSTOM_THEMES_DIR: &str = "custom_themes";

#[derive(Debug)]
pub enum ArchiveManagerError {
    Io(io::Error),
    Archive(ArchiveError),
    Database(DatabaseError),
    DatabaseMissing(String),
    SourceMissing(PathBuf),
}

impl From<io::Error> for ArchiveManagerError {
    fn from(err: io::Error) -> Self {
        ArchiveManagerError::Io(err)
    }
}

impl From<ArchiveError> for ArchiveManagerError {
    fn from(err: ArchiveError) -> Self {
        ArchiveManagerError::Archive(err)
    }
}

impl From<DatabaseError> for ArchiveManagerError {
    fn from(err: DatabaseError) -> Self {
        ArchiveManagerError::Database(err)
    }
}

impl fmt::Display for ArchiveManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveManagerError::Io(e) => write!(f, "I/O error while preparing archive: {e}"),
            ArchiveManagerError::Archive(e) => write!(f, "{e}"),
            ArchiveManagerError::Database(e) => write!(f, "{e}"),
            ArchiveManagerError::DatabaseMissing(name) => {
                write!(f, "Specified database '{name}' does not exist")
            }
            ArchiveManagerError::SourceMissing(path) => {
                write!(f, "Referenced file {path:?} does not exist")
            }
        }
    }
}

impl std::error::Error for ArchiveManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArchiveManagerError::Io(e) => Some(e),
            ArchiveManagerError::Archive(e) => Some(e),
            ArchiveManagerError::Database(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveManagerError>;

/// The package section a bundle archive replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleSection {
    Media,
    Themes,
    Plugins,
}

impl BundleSection {
    fn record(self, package: &mut Package, reference: String) {
        match self {
            BundleSection::Media => package.media.source = Some(reference),
            BundleSection::Themes => package.themes = Section::archived(reference),
            BundleSection::Plugins => package.plugins = Section::archived(reference),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveTarget {
    /// Directory inside the site, also used as the root of every archive entry.
    pub relative_source: &'static str,
    pub archive_dir: &'static str,
    pub archive_file: &'static str,
    pub section: BundleSection,
}

impl ArchiveTarget {
    pub fn package_reference(&self) -> String {
        format!("{}/{}", self.archive_dir, self.archive_file)
    }
}

pub const MEDIA_TARGET: ArchiveTarget = ArchiveTarget {
    relative_source: UPLOADS_DIR,
    archive_dir: "media",
    archive_file: "media.zip",
    section: BundleSection::Media,
};

pub const THEMES_TARGET: ArchiveTarget = ArchiveTarget {
    relative_source: THEMES_DIR,
    archive_dir: "themes",
    archive_file: "themes.zip",
    section: BundleSection::Themes,
};

pub const PLUGINS_TARGET: ArchiveTarget = ArchiveTarget {
    relative_source: PLUGINS_DIR,
    archive_dir: "plugins",
    archive_file: "plugins.zip",
    section: BundleSection::Plugins,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomKind {
    Plugin,
    Theme,
}

impl CustomKind {
    fn archive_dir(self) -> &'static str {
        match self {
            CustomKind::Plugin => CUSTOM_PLUGINS_DIR,
            CustomKind::Theme => CUSTOM_THEMES_DIR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleOutcome {
    /// Carries the package-relative reference now recorded in the package.
    Archived(String),
    SourceMissing,
}

pub struct ArchiveManager {
    archiver: Arc<dyn ArchiverOperations>,
    package_dir: PathBuf,
}

impl ArchiveManager {
    /// `package_dir` is the export output directory or the restore input directory.
    pub fn new(archiver: Arc<dyn ArchiverOperations>, package_dir: impl Into<PathBuf>) -> Self {
        ArchiveManager {
            archiver,
            package_dir: package_dir.into(),
        }
    }

    pub fn resolve(&self, reference: &str) -> PathBuf {
        path_utils::resolve_package_path(&self.package_dir, reference)
    }

    /// Resolves `reference` and requires it to name an existing file.
    pub fn locate(&self, reference: &str) -> Result<PathBuf> {
        let source = self.resolve(reference);
        if !source.is_file() {
            return Err(ArchiveManagerError::SourceMissing(source));
        }
        Ok(source)
    }

    fn prepare_destination(&self, dir: &str, file: &str) -> Result<(PathBuf, String)> {
        let dest_dir = self.package_dir.join(dir);
        fs::create_dir_all(&dest_dir)?;
        let reference = path_utils::to_package_reference(&Path::new(dir).join(file));
        Ok((dest_dir.join(file), reference))
    }

    /*
     * Archives one content category of the site and records the archive as the
     * corresponding package section's `source`. A site without that directory
     * leaves the package untouched.
     */
    pub fn archive_bundle(
        &self,
        site_root: &Path,
        target: &ArchiveTarget,
        package: &mut Package,
    ) -> Result<BundleOutcome> {
        let source = site_root.join(target.relative_source);
        if !source.is_dir() {
            log::warn!(
                "ArchiveManager: Directory {} not found in {site_root:?}, skipping",
                target.relative_source
            );
            return Ok(BundleOutcome::SourceMissing);
        }
        let (dest, reference) = self.prepare_destination(target.archive_dir, target.archive_file)?;
        self.archiver
            .archive(&source, &dest, target.relative_source)?;
        checksum_utils::log_digest("ArchiveManager", &dest);
        target.section.record(package, reference.clone());
        Ok(BundleOutcome::Archived(reference))
    }

    /*
     * Archives a single custom plugin or theme. `source` is the item's directory
     * (or, for a single-file plugin, the file itself); entries are rooted at its
     * name. Returns the reference to store as the entry's `src`.
     */
    pub fn archive_custom(&self, kind: CustomKind, source: &Path, slug: &str) -> Result<String> {
        let root_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| slug.to_string());
        let (dest, reference) =
            self.prepare_destination(kind.archive_dir(), &format!("{slug}.zip"))?;
        self.archiver.archive(source, &dest, &root_name)?;
        checksum_utils::log_digest("ArchiveManager", &dest);
        Ok(reference)
    }

    /// Dumps `schema` into `database/<schema>.sql` after checking it exists.
    pub fn dump_database(
        &self,
        engine: &dyn DatabaseEngineOperations,
        connection: &DatabaseConnection,
        schema: &str,
    ) -> Result<String> {
        if !engine.schema_exists(connection, schema)? {
            return Err(ArchiveManagerError::DatabaseMissing(schema.to_string()));
        }
        let (dest, reference) = self.prepare_destination(DATABASE_DIR, &format!("{schema}.sql"))?;
        engine.dump_schema(connection, schema, &dest)?;
        checksum_utils::log_digest("ArchiveManager", &dest);
        Ok(reference)
    }

    pub fn restore_database(
        &self,
        engine: &dyn DatabaseEngineOperations,
        connection: &DatabaseConnection,
        schema: &str,
        reference: &str,
    ) -> Result<()> {
        let source = self.locate(reference)?;
        log::info!("ArchiveManager: Restoring '{schema}' from {source:?}");
        engine.restore_schema(connection, schema, &source)?;
        Ok(())
    }

    /// Unpacks a package-relative archive into `dest_dir`.
    pub fn extract(&self, reference: &str, dest_dir: &Path) -> Result<u64> {
        let source = self.locate(reference)?;
        let entries = self.archiver.extract(&source, dest_dir)?;
        log::info!("ArchiveManager: Extracted {entries} entries from {reference} into {dest_dir:?}");
        Ok(entries)
    }
}
