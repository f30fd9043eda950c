/*
 * Reads the metadata headers that plugins and themes declare in their source
 * files, the same way the CMS builds its own inventory: every top-level `*.php`
 * file of the plugins directory and of each immediate sub-directory is checked
 * for a `Plugin Name:` header, and every theme directory's `style.css` for a
 * `Theme Name:` header. Only the first 8 KiB of each file are inspected.
 */
use super::site_runtime::{InstalledPlugin, InstalledTheme};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const HEADER_READ_LIMIT: u64 = 8 * 1024;

const PLUGIN_HEADERS: &[&str] = &[
    "Plugin Name",
    "Plugin URI",
    "Version",
    "Requires at least",
    "Requires PHP",
];
const THEME_HEADERS: &[&str] = &["Theme Name", "Theme URI", "Version"];

// `Key: value` at the start of a line, after any comment markers.
static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t/*#@]*([A-Za-z][A-Za-z ]*?):(.*)$").expect("static pattern")
});

/*
 * Extracts the requested header fields from the beginning of a file. Keys are
 * matched case-insensitively at the start of a line after any comment markers;
 * values are trimmed and a trailing comment terminator is removed. Missing
 * headers are simply absent from the returned map.
 */
pub fn read_file_headers(path: &Path, names: &[&str]) -> io::Result<HashMap<String, String>> {
    let mut buffer = Vec::new();
    File::open(path)?
        .take(HEADER_READ_LIMIT)
        .read_to_end(&mut buffer)?;
    let text = String::from_utf8_lossy(&buffer).replace('\r', "\n");

    let mut headers = HashMap::new();
    let mut seen = HashSet::new();
    for captures in HEADER_LINE.captures_iter(&text) {
        let key = &captures[1];
        // Only the first line carrying a given header counts.
        let Some(name) = names
            .iter()
            .find(|name| name.eq_ignore_ascii_case(key) && !seen.contains(*name))
        else {
            continue;
        };
        seen.insert(*name);
        let cleaned = cleanup_header_value(&captures[2]);
        if !cleaned.is_empty() {
            headers.insert((*name).to_string(), cleaned);
        }
    }
    Ok(headers)
}

fn cleanup_header_value(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_suffix("*/")
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

fn php_files_in(dir: &Path) -> Vec<PathBuf> {
    let pattern = format!("{}/*.php", glob::Pattern::escape(&dir.to_string_lossy()));
    match glob::glob(&pattern) {
        Ok(paths) => {
            let mut files: Vec<PathBuf> = paths.filter_map(|entry| entry.ok()).collect();
            files.sort();
            files
        }
        Err(e) => {
            log::warn!("HeaderScanner: Invalid glob pattern for {dir:?}: {e}");
            Vec::new()
        }
    }
}

fn header(headers: &mut HashMap<String, String>, name: &str) -> String {
    headers.remove(name).unwrap_or_default()
}

fn plugin_from_file(plugins_dir: &Path, file: &Path) -> Option<InstalledPlugin> {
    let mut headers = match read_file_headers(file, PLUGIN_HEADERS) {
        Ok(headers) => headers,
        Err(e) => {
            log::warn!("HeaderScanner: Could not read {file:?}: {e}");
            return None;
        }
    };
    let name = header(&mut headers, "Plugin Name");
    if name.is_empty() {
        return None;
    }
    let relative = file.strip_prefix(plugins_dir).ok()?;
    let key = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    Some(InstalledPlugin {
        key,
        name,
        homepage_uri: header(&mut headers, "Plugin URI"),
        version: header(&mut headers, "Version"),
        requires_wp: header(&mut headers, "Requires at least"),
        requires_php: header(&mut headers, "Requires PHP"),
        active: false,
    })
}

/// Plugins found below `plugins_dir`, keyed like `dir/main.php` or `single.php`.
pub fn scan_plugins(plugins_dir: &Path) -> io::Result<Vec<InstalledPlugin>> {
    if !plugins_dir.is_dir() {
        log::debug!("HeaderScanner: No plugins directory at {plugins_dir:?}");
        return Ok(Vec::new());
    }
    let mut plugins = Vec::new();
    for file in php_files_in(plugins_dir) {
        plugins.extend(plugin_from_file(plugins_dir, &file));
    }

    let mut sub_dirs: Vec<PathBuf> = fs::read_dir(plugins_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    sub_dirs.sort();
    for dir in sub_dirs {
        for file in php_files_in(&dir) {
            plugins.extend(plugin_from_file(plugins_dir, &file));
        }
    }
    log::debug!(
        "HeaderScanner: Found {} plugins in {plugins_dir:?}",
        plugins.len()
    );
    Ok(plugins)
}

/// Themes found below `themes_dir`; a theme is a directory with a named `style.css`.
pub fn scan_themes(themes_dir: &Path) -> io::Result<Vec<InstalledTheme>> {
    if !themes_dir.is_dir() {
        log::debug!("HeaderScanner: No themes directory at {themes_dir:?}");
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(themes_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut themes = Vec::new();
    for dir in dirs {
        let stylesheet = dir.join("style.css");
        if !stylesheet.is_file() {
            continue;
        }
        let mut headers = match read_file_headers(&stylesheet, THEME_HEADERS) {
            Ok(headers) => headers,
            Err(e) => {
                log::warn!("HeaderScanner: Could not read {stylesheet:?}: {e}");
                continue;
            }
        };
        let name = header(&mut headers, "Theme Name");
        let Some(slug) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if name.is_empty() {
            log::debug!("HeaderScanner: {stylesheet:?} has no Theme Name header, skipping");
            continue;
        }
        themes.push(InstalledTheme {
            slug,
            name,
            homepage_uri: header(&mut headers, "Theme URI"),
            version: header(&mut headers, "Version"),
            active: false,
        });
    }
    Ok(themes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_read_file_headers_from_docblock() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plugin.php");
        write(
            &file,
            "<?php\n/**\n * Plugin Name: My Plugin\n * Plugin URI: https://wordpress.org/plugins/my-plugin/\n * Version: 1.2.3\n * Requires PHP: 7.4 */\n",
        );
        let headers = read_file_headers(&file, PLUGIN_HEADERS).unwrap();
        assert_eq!(headers["Plugin Name"], "My Plugin");
        assert_eq!(
            headers["Plugin URI"],
            "https://wordpress.org/plugins/my-plugin/"
        );
        assert_eq!(headers["Version"], "1.2.3");
        assert_eq!(headers["Requires PHP"], "7.4");
        assert!(!headers.contains_key("Requires at least"));
    }

    #[test]
    fn test_first_header_occurrence_wins_case_insensitively() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("style.css");
        write(
            &file,
            "/*\nTHEME NAME: Studio\nDescription: Version: 9\nversion: 2.0\nVersion: 3.0\n*/",
        );
        let headers = read_file_headers(&file, THEME_HEADERS).unwrap();
        assert_eq!(headers["Theme Name"], "Studio");
        assert_eq!(headers["Version"], "2.0");
        assert!(!headers.contains_key("Theme URI"));
    }

    #[test]
    fn test_scan_plugins_top_level_and_sub_directories() {
        let dir = tempdir().unwrap();
        let plugins = dir.path().join("plugins");
        write(&plugins.join("hello.php"), "<?php\n/* Plugin Name: Hello Dolly */");
        write(
            &plugins.join("my-plugin/my-plugin.php"),
            "<?php\n/*\nPlugin Name: MyPlugin\nPlugin URI: https://wordpress.org/plugins/my-plugin/\n*/",
        );
        write(&plugins.join("my-plugin/includes.php"), "<?php // helpers");
        write(&plugins.join("index.php"), "<?php // Silence is golden.");

        let found = scan_plugins(&plugins).unwrap();
        let keys: Vec<&str> = found.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["hello.php", "my-plugin/my-plugin.php"]);
        assert_eq!(found[1].name, "MyPlugin");
        assert!(found.iter().all(|p| !p.active));
    }

    #[test]
    fn test_scan_themes_requires_named_stylesheet() {
        let dir = tempdir().unwrap();
        let themes = dir.path().join("themes");
        write(
            &themes.join("twentytwenty/style.css"),
            "/*\nTheme Name: Twenty Twenty\nTheme URI: https://wordpress.org/themes/twentytwenty/\nVersion: 2.4\n*/",
        );
        write(&themes.join("broken/style.css"), "body { color: red; }");
        write(&themes.join("no-style/index.php"), "<?php");

        let found = scan_themes(&themes).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slug, "twentytwenty");
        assert_eq!(found[0].name, "Twenty Twenty");
        assert_eq!(found[0].version, "2.4");
    }

    #[test]
    fn test_missing_directories_yield_empty_inventories() {
        let dir = tempdir().unwrap();
        assert!(scan_plugins(&dir.path().join("nope")).unwrap().is_empty());
        assert!(scan_themes(&dir.path().join("nope")).unwrap().is_empty());
    }
}
