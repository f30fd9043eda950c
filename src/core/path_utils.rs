/*
 * Path helpers shared by the core: locating the per-user configuration directory
 * and turning package-relative references into host paths.
 */
use directories::ProjectDirs;
use std::path::{Component, Path, PathBuf};

/*
 * Local (non-roaming) configuration directory for `app_name`, e.g.
 * `~/.config/<app_name>` on Linux. Unlike a save path it is not created here;
 * a missing directory simply means no user defaults exist yet.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    let dir = ProjectDirs::from("", "", app_name).map(|dirs| dirs.config_local_dir().to_path_buf());
    log::trace!("PathUtils: Config dir for '{app_name}' resolves to {dir:?}");
    dir
}

/*
 * Resolves a reference stored in a package (always `/`-separated and relative to
 * the package directory) against the directory the package was read from.
 * Absolute references are returned unchanged.
 */
pub fn resolve_package_path(package_dir: &Path, reference: &str) -> PathBuf {
    let candidate = Path::new(reference);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    let mut resolved = package_dir.to_path_buf();
    for part in reference.split('/').filter(|part| !part.is_empty() && *part != ".") {
        resolved.push(part);
    }
    resolved
}

/// Joins path components with `/`, the separator used inside packages.
pub fn to_package_reference(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
