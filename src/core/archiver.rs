/*
 * Zip archiving of site content. `ArchiverOperations` abstracts the two
 * primitives the archive manager needs (archive a file or directory tree into a
 * zip, extract a zip into a directory); `CoreArchiver` implements them natively
 * with the `zip` crate and `walkdir`.
 *
 * Entries are stored under `root_name/...`, so an archive of
 * `<site>/wp-content/uploads` with root name `wp-content/uploads` unpacks back
 * into place when extracted at the site root.
 */
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug)]
pub enum ArchiveError {
    Io(io::Error),
    Zip(ZipError),
    Walk(walkdir::Error),
    SourceMissing(PathBuf),
}

impl From<io::Error> for ArchiveError {
    fn from(err: io::Error) -> Self {
        ArchiveError::Io(err)
    }
}

impl From<ZipError> for ArchiveError {
    fn from(err: ZipError) -> Self {
        ArchiveError::Zip(err)
    }
}

impl From<walkdir::Error> for ArchiveError {
    fn from(err: walkdir::Error) -> Self {
        ArchiveError::Walk(err)
    }
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::Io(e) => write!(f, "Archive I/O error: {e}"),
            ArchiveError::Zip(e) => write!(f, "Zip error: {e}"),
            ArchiveError::Walk(e) => write!(f, "Directory traversal error: {e}"),
            ArchiveError::SourceMissing(p) => write!(f, "Archive source not found: {p:?}"),
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArchiveError::Io(e) => Some(e),
            ArchiveError::Zip(e) => Some(e),
            ArchiveError::Walk(e) => Some(e),
            ArchiveError::SourceMissing(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: u64,
    pub directories: u64,
}

pub trait ArchiverOperations: Send + Sync {
    /*
     * Writes `source` (a directory, archived recursively, or a single file) into
     * a new zip at `dest_zip`, storing every entry below `root_name`. The parent
     * directory of `dest_zip` must already exist.
     */
    fn archive(&self, source: &Path, dest_zip: &Path, root_name: &str) -> Result<ArchiveSummary>;

    /// Unpacks every entry of `zip_path` below `dest_dir`, creating it if needed.
    fn extract(&self, zip_path: &Path, dest_dir: &Path) -> Result<u64>;
}

pub struct CoreArchiver {}

impl CoreArchiver {
    pub fn new() -> Self {
        CoreArchiver {}
    }

    fn entry_name(root_name: &str, relative: &Path) -> String {
        let mut name = root_name.trim_matches('/').to_string();
        for component in relative.components() {
            let part = component.as_os_str().to_string_lossy();
            if !name.is_empty() {
                name.push('/');
            }
            name.push_str(&part);
        }
        name
    }

    fn file_options(len: u64) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(len >= u64::from(u32::MAX))
    }
}

impl Default for CoreArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiverOperations for CoreArchiver {
    fn archive(&self, source: &Path, dest_zip: &Path, root_name: &str) -> Result<ArchiveSummary> {
        if !source.exists() {
            return Err(ArchiveError::SourceMissing(source.to_path_buf()));
        }
        log::debug!("CoreArchiver: Archiving {source:?} into {dest_zip:?} as '{root_name}'");

        let mut writer = ZipWriter::new(BufWriter::new(File::create(dest_zip)?));
        let mut summary = ArchiveSummary {
            files: 0,
            directories: 0,
        };

        if source.is_file() {
            let len = source.metadata()?.len();
            writer.start_file(root_name.trim_matches('/'), Self::file_options(len))?;
            io::copy(&mut BufReader::new(File::open(source)?), &mut writer)?;
            summary.files = 1;
        } else {
            // Sorted traversal keeps archives reproducible between runs.
            for entry in WalkDir::new(source).sort_by_file_name() {
                let entry = entry?;
                let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
                let name = Self::entry_name(root_name, relative);
                if name.is_empty() {
                    continue;
                }
                if entry.file_type().is_dir() {
                    writer.add_directory(name, SimpleFileOptions::default())?;
                    summary.directories += 1;
                } else if entry.file_type().is_file() {
                    let len = entry.metadata()?.len();
                    writer.start_file(name, Self::file_options(len))?;
                    io::copy(&mut BufReader::new(File::open(entry.path())?), &mut writer)?;
                    summary.files += 1;
                } else {
                    log::trace!("CoreArchiver: Skipping non-regular entry {:?}", entry.path());
                }
            }
        }

        writer.finish()?;
        log::debug!(
            "CoreArchiver: Wrote {} files and {} directories to {dest_zip:?}",
            summary.files,
            summary.directories
        );
        Ok(summary)
    }

    fn extract(&self, zip_path: &Path, dest_dir: &Path) -> Result<u64> {
        if !zip_path.is_file() {
            return Err(ArchiveError::SourceMissing(zip_path.to_path_buf()));
        }
        log::debug!("CoreArchiver: Extracting {zip_path:?} into {dest_dir:?}");
        fs::create_dir_all(dest_dir)?;
        let mut archive = ZipArchive::new(BufReader::new(File::open(zip_path)?))?;
        let entries = archive.len() as u64;
        // `extract` refuses entries whose names escape `dest_dir`.
        archive.extract(dest_dir)?;
        Ok(entries)
    }
}
