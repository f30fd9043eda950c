/*
 * Defines the package document: the declarative snapshot of a site installation
 * (identity, database, admin seed credentials, plugin/theme inventories and the
 * side-car archive references). A package is built once by the export
 * orchestrator, serialized as pretty-printed JSON, and later parsed once by the
 * restore orchestrator and treated as read-only configuration.
 *
 * Required-field checks are contextual: parsing only enforces syntax and shape,
 * while `validate_for_restore` and `validate_for_database_restore` enforce the
 * fields a given operation needs.
 */
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const PACKAGE_FILE_NAME: &str = "wordpress.json";

/// Value written into `url` when a reference could not be resolved.
pub const UNRESOLVED_REFERENCE: &str = "null";

#[derive(Debug)]
pub enum PackageError {
    Io(io::Error),
    Malformed(serde_json::Error),
    MissingField(&'static str),
    Invalid(String),
}

impl From<io::Error> for PackageError {
    fn from(err: io::Error) -> Self {
        PackageError::Io(err)
    }
}

impl From<serde_json::Error> for PackageError {
    fn from(err: serde_json::Error) -> Self {
        PackageError::Malformed(err)
    }
}

impl std::fmt::Display for PackageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageError::Io(e) => write!(f, "Package I/O error: {e}"),
            PackageError::Malformed(e) => write!(f, "Malformed package document: {e}"),
            PackageError::MissingField(field) => {
                write!(f, "Package is missing required field '{field}'")
            }
            PackageError::Invalid(msg) => write!(f, "Invalid package: {msg}"),
        }
    }
}

impl std::error::Error for PackageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PackageError::Io(e) => Some(e),
            PackageError::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PackageError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<AdminSection>,
    #[serde(default)]
    pub plugins: Section<PluginEntry>,
    #[serde(default)]
    pub themes: Section<ThemeEntry>,
    #[serde(default, skip_serializing_if = "MediaSection::is_empty")]
    pub media: MediaSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    // Presence means "restore from this dump", absence means "provision an empty schema".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSection {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl MediaSection {
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
    }
}

/// A whole-section archive reference, e.g. `{"source": "plugins/plugins.zip"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveRef {
    pub source: String,
}

/*
 * A plugin or theme section is reconstructed either item by item from an
 * inventory keyed by display name, or wholesale from a single bundle archive.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Section<T> {
    Archived(ArchiveRef),
    Inventory(BTreeMap<String, T>),
}

impl<T> Default for Section<T> {
    fn default() -> Self {
        Section::Inventory(BTreeMap::new())
    }
}

impl<T> Section<T> {
    pub fn source(&self) -> Option<&str> {
        match self {
            Section::Archived(archive) => Some(archive.source.as_str()),
            Section::Inventory(_) => None,
        }
    }

    pub fn inventory(&self) -> Option<&BTreeMap<String, T>> {
        match self {
            Section::Archived(_) => None,
            Section::Inventory(items) => Some(items),
        }
    }

    pub fn archived(source: impl Into<String>) -> Self {
        Section::Archived(ArchiveRef {
            source: source.into(),
        })
    }
}

// Older packages carry an empty JSON array for an empty section.
#[derive(Deserialize)]
#[serde(untagged)]
enum SectionRepr<T> {
    Archived(ArchiveRef),
    Inventory(BTreeMap<String, T>),
    List(Vec<serde_json::Value>),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Section<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match SectionRepr::<T>::deserialize(deserializer)? {
            SectionRepr::Archived(archive) => Ok(Section::Archived(archive)),
            SectionRepr::Inventory(items) => Ok(Section::Inventory(items)),
            SectionRepr::List(items) if items.is_empty() => Ok(Section::Inventory(BTreeMap::new())),
            SectionRepr::List(_) => Err(de::Error::custom(
                "expected an inventory object or a {\"source\": ...} archive reference",
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginEntry {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub src: String,
    #[serde(default, with = "active_flag", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub wp_version: String,
    #[serde(default)]
    pub php_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeEntry {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, with = "active_flag", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default)]
    pub version: String,
}

/// How a single inventory entry is installed on restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemReference<'a> {
    Registry(&'a str),
    Bundled(&'a str),
}

fn item_reference<'a>(url: &'a str, src: &'a str) -> Option<ItemReference<'a>> {
    let has_url = !url.is_empty() && url != UNRESOLVED_REFERENCE;
    match (has_url, src.is_empty()) {
        (true, true) => Some(ItemReference::Registry(url)),
        (false, false) => Some(ItemReference::Bundled(src)),
        _ => None,
    }
}

impl PluginEntry {
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(false)
    }

    pub fn reference(&self) -> Option<ItemReference<'_>> {
        item_reference(&self.url, &self.src)
    }
}

impl ThemeEntry {
    pub fn is_active(&self) -> bool {
        self.active.unwrap_or(false)
    }

    pub fn reference(&self) -> Option<ItemReference<'_>> {
        item_reference(&self.url, &self.src)
    }
}

/*
 * Serializes the activation flag as the strings "true"/"false", the form used by
 * existing packages. Accepts either strings or JSON booleans when reading.
 */
mod active_flag {
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagRepr {
        Bool(bool),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(true) => serializer.serialize_str("true"),
            Some(false) => serializer.serialize_str("false"),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        match Option::<FlagRepr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(FlagRepr::Bool(flag)) => Ok(Some(flag)),
            Some(FlagRepr::Text(text)) => match text.trim() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" | "" => Ok(Some(false)),
                other => Err(de::Error::custom(format!("invalid active flag '{other}'"))),
            },
        }
    }
}

pub fn parse(bytes: &[u8]) -> Result<Package> {
    let package: Package = serde_json::from_slice(bytes)?;
    Ok(package)
}

/// Pretty-printed JSON followed by a newline.
pub fn serialize(package: &Package) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(package)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn package_file_path(dir: &Path) -> PathBuf {
    dir.join(PACKAGE_FILE_NAME)
}

pub fn load_from_dir(dir: &Path) -> Result<Package> {
    let path = package_file_path(dir);
    log::debug!("Package: Reading package document {path:?}");
    let bytes = fs::read(&path)?;
    parse(&bytes)
}

pub fn write_to_dir(package: &Package, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = package_file_path(dir);
    fs::write(&path, serialize(package)?)?;
    log::info!("Package: Wrote package document {path:?}");
    Ok(path)
}

impl Package {
    pub fn active_theme(&self) -> Option<(&str, &ThemeEntry)> {
        self.themes
            .inventory()?
            .iter()
            .find(|(_, theme)| theme.is_active())
            .map(|(name, theme)| (name.as_str(), theme))
    }

    /*
     * Checks the fields a full restore depends on. Database credentials and the
     * domain must already be resolved (overrides and defaults merged) before this
     * is called, so an empty value here really means "not supplied anywhere".
     */
    pub fn validate_for_restore(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(PackageError::MissingField("domain"));
        }
        self.validate_database_credentials()?;
        self.validate_inventories()
    }

    pub fn validate_for_database_restore(&self) -> Result<()> {
        self.validate_database_credentials()?;
        match self.database.source.as_deref() {
            Some(source) if !source.trim().is_empty() => Ok(()),
            _ => Err(PackageError::MissingField("database.source")),
        }
    }

    fn validate_database_credentials(&self) -> Result<()> {
        if self.database.name.trim().is_empty() {
            return Err(PackageError::MissingField("database.name"));
        }
        if self.database.user.trim().is_empty() {
            return Err(PackageError::MissingField("database.user"));
        }
        Ok(())
    }

    fn validate_inventories(&self) -> Result<()> {
        if let Some(plugins) = self.plugins.inventory() {
            for (name, plugin) in plugins {
                if plugin.reference().is_none() {
                    return Err(PackageError::Invalid(format!(
                        "plugin '{name}' must carry exactly one of 'url' or 'src'"
                    )));
                }
            }
        }
        if let Some(themes) = self.themes.inventory() {
            for (name, theme) in themes {
                if theme.reference().is_none() {
                    return Err(PackageError::Invalid(format!(
                        "theme '{name}' must carry exactly one of 'url' or 'src'"
                    )));
                }
            }
            let active = themes.values().filter(|theme| theme.is_active()).count();
            if active > 1 {
                return Err(PackageError::Invalid(format!(
                    "{active} themes are marked active, at most one is allowed"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_package() -> Package {
        let mut plugins = BTreeMap::new();
        plugins.insert(
            "MyPlugin".to_string(),
            PluginEntry {
                url: "my-plugin".to_string(),
                active: Some(true),
                version: "1.2.0".to_string(),
                wp_version: "6.0".to_string(),
                php_version: "7.4".to_string(),
                ..Default::default()
            },
        );
        plugins.insert(
            "In House".to_string(),
            PluginEntry {
                src: "custom_plugins/in-house.zip".to_string(),
                active: Some(false),
                ..Default::default()
            },
        );
        let mut themes = BTreeMap::new();
        themes.insert(
            "Twenty Twenty".to_string(),
            ThemeEntry {
                url: "twentytwenty".to_string(),
                slug: "twentytwenty".to_string(),
                active: Some(true),
                version: "2.4".to_string(),
                ..Default::default()
            },
        );
        Package {
            domain: "https://new.example.com".to_string(),
            name: "Example".to_string(),
            version: "6.4.2".to_string(),
            locale: "en_US".to_string(),
            origin: "https://old.example.com".to_string(),
            exported_at: None,
            database: DatabaseSection {
                host: "localhost".to_string(),
                user: "root".to_string(),
                password: "secret".to_string(),
                name: "wp".to_string(),
                source: Some("database/wp.sql".to_string()),
            },
            admin: None,
            plugins: Section::Inventory(plugins),
            themes: Section::Inventory(themes),
            media: MediaSection {
                source: Some("media/media.zip".to_string()),
            },
        }
    }

    #[test]
    fn test_parse_serialize_round_trip() {
        let package = sample_package();
        let bytes = serialize(&package).unwrap();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed, package);
    }

    #[test]
    fn test_serialize_is_pretty_and_uses_string_flags() {
        let text = String::from_utf8(serialize(&sample_package()).unwrap()).unwrap();
        assert!(text.contains("\n  \"domain\""), "expected indented output: {text}");
        assert!(text.contains("\"active\": \"true\""));
        assert!(text.ends_with('\n'));
        // Sections without an archive are not written at all.
        let mut package = sample_package();
        package.media.source = None;
        let text = String::from_utf8(serialize(&package).unwrap()).unwrap();
        assert!(!text.contains("\"media\""));
    }

    #[test]
    fn test_parse_archived_sections() {
        let json = br#"{
            "domain": "https://example.com",
            "database": {"host": "localhost", "user": "root", "password": "", "name": "wp"},
            "plugins": {"source": "plugins/plugins.zip"},
            "themes": {"source": "themes/themes.zip"}
        }"#;
        let package = parse(json).unwrap();
        assert_eq!(package.plugins.source(), Some("plugins/plugins.zip"));
        assert_eq!(package.themes.source(), Some("themes/themes.zip"));
        assert!(package.plugins.inventory().is_none());
    }

    #[test]
    fn test_plugin_named_source_is_an_inventory_entry() {
        let json = br#"{"plugins": {"source": {"url": "source", "src": ""}}}"#;
        let package = parse(json).unwrap();
        let plugins = package.plugins.inventory().unwrap();
        assert_eq!(plugins["source"].url, "source");
    }

    #[test]
    fn test_parse_accepts_empty_list_sections_and_boolean_flags() {
        let json = br#"{"plugins": [], "themes": {"T": {"url": "t", "slug": "t", "active": true}}}"#;
        let package = parse(json).unwrap();
        assert!(package.plugins.inventory().unwrap().is_empty());
        assert_eq!(package.active_theme().map(|(name, _)| name), Some("T"));
    }

    #[test]
    fn test_missing_active_defaults_to_inactive() {
        let json = br#"{"plugins": {"P": {"url": "p"}}}"#;
        let package = parse(json).unwrap();
        let plugin = &package.plugins.inventory().unwrap()["P"];
        assert_eq!(plugin.active, None);
        assert!(!plugin.is_active());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse(b"{not json"), Err(PackageError::Malformed(_))));
        assert!(matches!(
            parse(br#"{"plugins": ["x"]}"#),
            Err(PackageError::Malformed(_))
        ));
        assert!(matches!(
            parse(br#"{"plugins": {"P": {"url": "p", "active": "maybe"}}}"#),
            Err(PackageError::Malformed(_))
        ));
    }

    #[test]
    fn test_item_reference_exclusivity() {
        let registry = PluginEntry {
            url: "akismet".to_string(),
            ..Default::default()
        };
        assert_eq!(registry.reference(), Some(ItemReference::Registry("akismet")));

        let bundled = PluginEntry {
            src: "custom_plugins/x.zip".to_string(),
            ..Default::default()
        };
        assert_eq!(
            bundled.reference(),
            Some(ItemReference::Bundled("custom_plugins/x.zip"))
        );

        let both = PluginEntry {
            url: "x".to_string(),
            src: "custom_plugins/x.zip".to_string(),
            ..Default::default()
        };
        assert_eq!(both.reference(), None);

        let unresolved = PluginEntry {
            url: UNRESOLVED_REFERENCE.to_string(),
            ..Default::default()
        };
        assert_eq!(unresolved.reference(), None);
    }

    #[test]
    fn test_validate_for_restore_is_contextual() {
        let mut package = sample_package();
        assert!(package.validate_for_restore().is_ok());

        package.domain.clear();
        assert!(matches!(
            package.validate_for_restore(),
            Err(PackageError::MissingField("domain"))
        ));
        // A database-only restore does not need a domain.
        assert!(package.validate_for_database_restore().is_ok());

        package.database.source = None;
        assert!(matches!(
            package.validate_for_database_restore(),
            Err(PackageError::MissingField("database.source"))
        ));
    }

    #[test]
    fn test_validate_rejects_two_active_themes() {
        let mut package = sample_package();
        if let Section::Inventory(themes) = &mut package.themes {
            themes.insert(
                "Other".to_string(),
                ThemeEntry {
                    url: "other".to_string(),
                    slug: "other".to_string(),
                    active: Some(true),
                    ..Default::default()
                },
            );
        }
        assert!(matches!(
            package.validate_for_restore(),
            Err(PackageError::Invalid(_))
        ));
    }

    #[test]
    fn test_write_and_load_from_dir() {
        let dir = tempdir().unwrap();
        let package = sample_package();
        let path = write_to_dir(&package, &dir.path().join("out")).unwrap();
        assert_eq!(path, dir.path().join("out").join(PACKAGE_FILE_NAME));
        let loaded = load_from_dir(&dir.path().join("out")).unwrap();
        assert_eq!(loaded, package);
    }
}
