/*
 * The site runtime collaborator: everything the orchestrators need to know
 * about (or change in) a live installation. `SiteConnectorOperations` binds to a
 * site directory and yields a `SiteRuntimeOperations` handle.
 *
 * `WpSiteRuntime` reads plugin/theme inventories from file headers, core version
 * and database constants from the installation's PHP files, and stored options
 * (active plugins, active theme, site name, URLs, language) through wp-cli.
 */
use super::header_scanner;
use super::package::DatabaseSection;
use super::process::{ProcessError, ProcessRunnerOperations};
use super::provisioning::WpCli;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

pub const INSTALLATION_MARKER: &str = "wp-config.php";
pub const PLUGINS_DIR: &str = "wp-content/plugins";
pub const THEMES_DIR: &str = "wp-content/themes";
pub const UPLOADS_DIR: &str = "wp-content/uploads";
const VERSION_FILE: &str = "wp-includes/version.php";
const DEFAULT_LOCALE: &str = "en_US";

#[derive(Debug)]
pub enum SiteError {
    NotFound(PathBuf),
    Io(io::Error),
    Process(ProcessError),
    MissingConstant(&'static str),
    UnexpectedOption { name: String, value: String },
}

impl From<io::Error> for SiteError {
    fn from(err: io::Error) -> Self {
        SiteError::Io(err)
    }
}

impl From<ProcessError> for SiteError {
    fn from(err: ProcessError) -> Self {
        SiteError::Process(err)
    }
}

impl fmt::Display for SiteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteError::NotFound(path) => {
                write!(f, "Provided path {path:?} does not contain a site installation")
            }
            SiteError::Io(e) => write!(f, "Site I/O error: {e}"),
            SiteError::Process(e) => write!(f, "Site query failed: {e}"),
            SiteError::MissingConstant(name) => {
                write!(f, "Configuration does not define {name}")
            }
            SiteError::UnexpectedOption { name, value } => {
                write!(f, "Option '{name}' has an unexpected value: {value}")
            }
        }
    }
}

impl std::error::Error for SiteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SiteError::Io(e) => Some(e),
            SiteError::Process(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SiteError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledPlugin {
    /// Path relative to the plugins directory, e.g. `akismet/akismet.php`.
    pub key: String,
    pub name: String,
    pub homepage_uri: String,
    pub version: String,
    pub requires_wp: String,
    pub requires_php: String,
    pub active: bool,
}

impl InstalledPlugin {
    /// Directory slug, or the file stem for single-file plugins.
    pub fn slug(&self) -> &str {
        match self.key.split_once('/') {
            Some((dir, _)) => dir,
            None => self.key.strip_suffix(".php").unwrap_or(&self.key),
        }
    }

    /// What has to be archived for this plugin, relative to the plugins directory.
    pub fn location(&self) -> &str {
        match self.key.split_once('/') {
            Some((dir, _)) => dir,
            None => &self.key,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledTheme {
    pub slug: String,
    pub name: String,
    pub homepage_uri: String,
    pub version: String,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteIdentity {
    pub version: String,
    pub name: String,
    pub home_url: String,
    pub locale: String,
}

pub trait SiteRuntimeOperations {
    fn identity(&self) -> Result<SiteIdentity>;
    /// Connection constants of the installation (host, user, password, name).
    fn database_constants(&self) -> Result<DatabaseSection>;
    fn installed_plugins(&self) -> Result<Vec<InstalledPlugin>>;
    fn installed_themes(&self) -> Result<Vec<InstalledTheme>>;
    /// Rewrites both the `siteurl` and `home` settings.
    fn update_site_urls(&self, url: &str) -> Result<()>;
}

pub trait SiteConnectorOperations: Send + Sync {
    fn connect(&self, site_root: &Path) -> Result<Box<dyn SiteRuntimeOperations>>;
}

pub struct WpSiteConnector {
    runner: Arc<dyn ProcessRunnerOperations>,
    wp_program: String,
    allow_root: bool,
}

impl WpSiteConnector {
    pub fn new(
        runner: Arc<dyn ProcessRunnerOperations>,
        wp_program: impl Into<String>,
        allow_root: bool,
    ) -> Self {
        WpSiteConnector {
            runner,
            wp_program: wp_program.into(),
            allow_root,
        }
    }
}

impl SiteConnectorOperations for WpSiteConnector {
    fn connect(&self, site_root: &Path) -> Result<Box<dyn SiteRuntimeOperations>> {
        if !site_root.join(INSTALLATION_MARKER).is_file() {
            return Err(SiteError::NotFound(site_root.to_path_buf()));
        }
        log::debug!("WpSiteConnector: Connected to installation at {site_root:?}");
        Ok(Box::new(WpSiteRuntime {
            root: site_root.to_path_buf(),
            cli: WpCli::new(&self.wp_program, site_root, self.allow_root),
            runner: Arc::clone(&self.runner),
        }))
    }
}

pub struct WpSiteRuntime {
    root: PathBuf,
    cli: WpCli,
    runner: Arc<dyn ProcessRunnerOperations>,
}

static PHP_DEFINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"define\(\s*['"]([A-Za-z0-9_]+)['"]\s*,\s*(?:'([^']*)'|"([^"]*)")\s*\)"#)
        .expect("static pattern")
});

static WP_VERSION_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$wp_version\s*=\s*['"]([^'"]+)['"]"#).expect("static pattern")
});

/*
 * Finds `define('NAME', 'value')` in PHP source, accepting either quote style.
 * Returns None if the constant is not defined with a literal string.
 */
pub fn php_define(source: &str, name: &str) -> Option<String> {
    let captures = PHP_DEFINE
        .captures_iter(source)
        .find(|captures| &captures[1] == name)?;
    captures
        .get(2)
        .or_else(|| captures.get(3))
        .map(|m| m.as_str().to_string())
}

fn php_version_assignment(source: &str) -> Option<String> {
    WP_VERSION_ASSIGNMENT
        .captures(source)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

impl WpSiteRuntime {
    fn option(&self, name: &str) -> Result<String> {
        let output = self.runner.run(&self.cli.command(&["option", "get", name]))?;
        Ok(output.stdout.trim().to_string())
    }

    // Options that may legitimately be absent read as empty.
    fn option_or_empty(&self, name: &str) -> String {
        match self.option(name) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("WpSiteRuntime: Option '{name}' unavailable: {e}");
                String::new()
            }
        }
    }

    fn active_plugin_keys(&self) -> Result<HashSet<String>> {
        let output = self.runner.run(
            &self
                .cli
                .command(&["option", "get", "active_plugins"])
                .option("format", "json"),
        )?;
        let raw = output.stdout.trim();
        if raw.is_empty() {
            return Ok(HashSet::new());
        }
        // Stored as a PHP array; wp-cli renders it as a JSON list or an index->value object.
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|_| SiteError::UnexpectedOption {
                name: "active_plugins".to_string(),
                value: raw.to_string(),
            })?;
        let keys = match value {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
            _ => Vec::new(),
        };
        Ok(keys
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }

    fn core_version(&self) -> Result<String> {
        let version_file = self.root.join(VERSION_FILE);
        if let Ok(source) = fs::read_to_string(&version_file) {
            if let Some(version) = php_version_assignment(&source) {
                return Ok(version);
            }
        }
        log::debug!("WpSiteRuntime: {version_file:?} unreadable, asking wp-cli for the version");
        let output = self.runner.run(&self.cli.command(&["core", "version"]))?;
        Ok(output.stdout.trim().to_string())
    }
}

impl SiteRuntimeOperations for WpSiteRuntime {
    fn identity(&self) -> Result<SiteIdentity> {
        let locale = self.option_or_empty("WPLANG");
        Ok(SiteIdentity {
            version: self.core_version()?,
            name: self.option("blogname")?,
            home_url: self.option("home")?,
            locale: if locale.is_empty() {
                DEFAULT_LOCALE.to_string()
            } else {
                locale
            },
        })
    }

    fn database_constants(&self) -> Result<DatabaseSection> {
        let source = fs::read_to_string(self.root.join(INSTALLATION_MARKER))?;
        let name = php_define(&source, "DB_NAME").ok_or(SiteError::MissingConstant("DB_NAME"))?;
        let user = php_define(&source, "DB_USER").ok_or(SiteError::MissingConstant("DB_USER"))?;
        Ok(DatabaseSection {
            host: php_define(&source, "DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            user,
            password: php_define(&source, "DB_PASSWORD").unwrap_or_default(),
            name,
            source: None,
        })
    }

    fn installed_plugins(&self) -> Result<Vec<InstalledPlugin>> {
        let mut plugins = header_scanner::scan_plugins(&self.root.join(PLUGINS_DIR))?;
        let active = self.active_plugin_keys()?;
        for plugin in &mut plugins {
            plugin.active = active.contains(&plugin.key);
        }
        Ok(plugins)
    }

    fn installed_themes(&self) -> Result<Vec<InstalledTheme>> {
        let mut themes = header_scanner::scan_themes(&self.root.join(THEMES_DIR))?;
        let stylesheet = self.option("stylesheet")?;
        for theme in &mut themes {
            theme.active = theme.slug == stylesheet;
        }
        Ok(themes)
    }

    fn update_site_urls(&self, url: &str) -> Result<()> {
        for option in ["siteurl", "home"] {
            log::info!("WpSiteRuntime: Setting '{option}' to {url}");
            self.runner
                .run(&self.cli.command(&["option", "update", option, url]))?;
        }
        Ok(())
    }
}
