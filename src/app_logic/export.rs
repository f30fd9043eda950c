/*
 * Export: reads a live installation and writes a package describing it. The
 * orchestrator moves linearly through `ExportStage`; archiving steps are
 * optional and independent of each other, writing the document is always last.
 *
 * Database dump failures end the run. Bundle archiving failures only skip that
 * bundle. A plugin or theme that can be neither referenced nor archived is
 * dropped from the package.
 */
use super::error::{BatchError, Result};
use super::run_context::{Collaborators, RunContext};
use crate::core::archive_manager::{
    ArchiveManager, ArchiveTarget, BundleOutcome, CustomKind, MEDIA_TARGET, PLUGINS_TARGET,
    THEMES_TARGET,
};
use crate::core::package::{self, Package, PluginEntry, Section, ThemeEntry};
use crate::core::reference_classifier::{self, Classification};
use crate::core::site_runtime::{
    InstalledPlugin, InstalledTheme, PLUGINS_DIR, SiteRuntimeOperations, THEMES_DIR,
};
use crate::core::DatabaseConnection;
use std::collections::BTreeMap;
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Disconnected,
    Connected,
    Dumped,
    Written,
}

pub struct ExportOrchestrator<'a> {
    context: &'a RunContext,
    collaborators: &'a Collaborators,
    archives: ArchiveManager,
    runtime: Option<Box<dyn SiteRuntimeOperations>>,
    package: Package,
    stage: ExportStage,
}

impl<'a> ExportOrchestrator<'a> {
    pub fn new(context: &'a RunContext, collaborators: &'a Collaborators) -> Self {
        ExportOrchestrator {
            context,
            collaborators,
            archives: ArchiveManager::new(
                collaborators.archiver.clone(),
                context.output_dir.clone(),
            ),
            runtime: None,
            package: Package::default(),
            stage: ExportStage::Disconnected,
        }
    }

    pub fn stage(&self) -> ExportStage {
        self.stage
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    fn runtime(&self, step: &'static str) -> Result<&dyn SiteRuntimeOperations> {
        self.runtime
            .as_deref()
            .ok_or(BatchError::NotConnected(step))
    }

    pub fn connect(&mut self) -> Result<()> {
        let runtime = self.collaborators.site.connect(&self.context.site_root)?;
        log::info!(
            "ExportOrchestrator: Connected to {:?}",
            self.context.site_root
        );
        self.runtime = Some(runtime);
        self.stage = ExportStage::Connected;
        Ok(())
    }

    /// Site identity and database connection constants.
    pub fn dump_identity(&mut self) -> Result<()> {
        let runtime = self.runtime("dump")?;
        let identity = runtime.identity()?;
        let database = runtime.database_constants()?;

        self.package.domain = self.context.overrides.domain.clone().unwrap_or_default();
        self.package.version = identity.version;
        self.package.name = identity.name;
        self.package.origin = identity.home_url;
        self.package.locale = identity.locale;
        self.package.database = database;
        log::debug!(
            "ExportOrchestrator: Site '{}' version {} ({})",
            self.package.name,
            self.package.version,
            self.package.locale
        );
        Ok(())
    }

    /*
     * Identity plus the plugin and theme inventories. An inventory is skipped
     * when its section is going to be exported as a bundle instead.
     */
    pub fn dump(&mut self) -> Result<()> {
        self.dump_identity()?;
        let switches = self.context.switches;
        if !switches.plugins {
            self.dump_plugins()?;
        }
        if !switches.themes {
            self.dump_themes()?;
        }
        self.stage = ExportStage::Dumped;
        Ok(())
    }

    pub fn dump_plugins(&mut self) -> Result<()> {
        let installed = self.runtime("dump_plugins")?.installed_plugins()?;
        let plugins = self.plugin_inventory(&installed);
        self.package.plugins = Section::Inventory(plugins);
        Ok(())
    }

    pub fn dump_themes(&mut self) -> Result<()> {
        let installed = self.runtime("dump_themes")?.installed_themes()?;
        let themes = self.theme_inventory(&installed);
        self.package.themes = Section::Inventory(themes);
        Ok(())
    }

    // The database dump carries activation state, so the flags are left out then.
    fn active_flag(&self, active: bool) -> Option<bool> {
        if self.context.switches.database {
            None
        } else {
            Some(active)
        }
    }

    fn plugin_inventory(&self, installed: &[InstalledPlugin]) -> BTreeMap<String, PluginEntry> {
        let plugins_dir = self.context.site_root.join(PLUGINS_DIR);
        let mut inventory = BTreeMap::new();
        for plugin in installed {
            let mut entry = PluginEntry {
                active: self.active_flag(plugin.active),
                version: plugin.version.clone(),
                wp_version: plugin.requires_wp.clone(),
                php_version: plugin.requires_php.clone(),
                ..Default::default()
            };
            if plugin.homepage_uri.trim().is_empty() {
                let source = plugins_dir.join(plugin.location());
                match self
                    .archives
                    .archive_custom(CustomKind::Plugin, &source, plugin.slug())
                {
                    Ok(reference) => entry.src = reference,
                    Err(e) => {
                        log::error!(
                            "ExportOrchestrator: Dropping plugin '{}', archiving failed: {e}",
                            plugin.name
                        );
                        continue;
                    }
                }
            } else {
                match reference_classifier::classify(&plugin.homepage_uri, plugin.slug()) {
                    Classification::Unresolved => {
                        log::warn!(
                            "ExportOrchestrator: Dropping plugin '{}', no usable reference in '{}'",
                            plugin.name,
                            plugin.homepage_uri
                        );
                        continue;
                    }
                    resolved => entry.url = resolved.url().to_string(),
                }
            }
            insert_unique(&mut inventory, "plugin", &plugin.name, entry);
        }
        inventory
    }

    fn theme_inventory(&self, installed: &[InstalledTheme]) -> BTreeMap<String, ThemeEntry> {
        let themes_dir = self.context.site_root.join(THEMES_DIR);
        let mut inventory: BTreeMap<String, ThemeEntry> = BTreeMap::new();
        let mut active_seen = false;
        for theme in installed {
            let mut active = theme.active;
            if active && active_seen {
                log::warn!(
                    "ExportOrchestrator: Theme '{}' also reported active, keeping the first",
                    theme.name
                );
                active = false;
            }
            let mut entry = ThemeEntry {
                slug: theme.slug.clone(),
                active: self.active_flag(active),
                version: theme.version.clone(),
                ..Default::default()
            };
            if theme.homepage_uri.trim().is_empty() {
                let source = themes_dir.join(&theme.slug);
                match self
                    .archives
                    .archive_custom(CustomKind::Theme, &source, &theme.slug)
                {
                    Ok(reference) => entry.src = reference,
                    Err(e) => {
                        log::error!(
                            "ExportOrchestrator: Dropping theme '{}', archiving failed: {e}",
                            theme.name
                        );
                        continue;
                    }
                }
            } else {
                match reference_classifier::classify(&theme.homepage_uri, &theme.slug) {
                    Classification::Unresolved => {
                        log::warn!(
                            "ExportOrchestrator: Dropping theme '{}', no usable reference in '{}'",
                            theme.name,
                            theme.homepage_uri
                        );
                        continue;
                    }
                    resolved => entry.url = resolved.url().to_string(),
                }
            }
            if insert_unique(&mut inventory, "theme", &theme.name, entry) && active {
                active_seen = true;
            }
        }
        inventory
    }

    /// Dumps the site's schema and records it as `database.source`.
    pub fn dump_database(&mut self) -> Result<()> {
        self.runtime("dump_database")?;
        let database = &self.package.database;
        let connection = DatabaseConnection::from(database);
        let reference = self.archives.dump_database(
            self.collaborators.database.as_ref(),
            &connection,
            &database.name,
        )?;
        log::info!("ExportOrchestrator: Database dumped to {reference}");
        self.package.database.source = Some(reference);
        Ok(())
    }

    /// Archives one bundle; failures are logged and leave the package untouched.
    pub fn archive_bundle(&mut self, target: &ArchiveTarget) -> Option<String> {
        match self
            .archives
            .archive_bundle(&self.context.site_root, target, &mut self.package)
        {
            Ok(BundleOutcome::Archived(reference)) => Some(reference),
            Ok(BundleOutcome::SourceMissing) => None,
            Err(e) => {
                log::error!(
                    "ExportOrchestrator: Archiving {} failed, continuing: {e}",
                    target.relative_source
                );
                None
            }
        }
    }

    pub fn write(&mut self) -> Result<PathBuf> {
        self.package.exported_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        let path = package::write_to_dir(&self.package, &self.context.output_dir)?;
        self.stage = ExportStage::Written;
        Ok(path)
    }

    pub fn run(mut self) -> Result<PathBuf> {
        let switches = self.context.switches;
        if switches.any_bundle() && !switches.database {
            log::warn!(
                "ExportOrchestrator: Bundles requested without -b, the package will not capture activation state held in the database"
            );
        }
        self.connect()?;
        self.dump()?;
        if switches.database {
            self.dump_database()?;
        }
        if switches.media {
            self.archive_bundle(&MEDIA_TARGET);
        }
        // A bundle that could not be produced falls back to the inventory.
        if switches.themes && self.archive_bundle(&THEMES_TARGET).is_none() {
            log::warn!("ExportOrchestrator: No themes bundle, recording the theme inventory");
            self.dump_themes()?;
        }
        if switches.plugins && self.archive_bundle(&PLUGINS_TARGET).is_none() {
            log::warn!("ExportOrchestrator: No plugins bundle, recording the plugin inventory");
            self.dump_plugins()?;
        }
        self.write()
    }
}

// Display names key the inventory; a repeated name keeps the first entry.
fn insert_unique<T>(inventory: &mut BTreeMap<String, T>, kind: &str, name: &str, entry: T) -> bool {
    if inventory.contains_key(name) {
        log::warn!("ExportOrchestrator: Duplicate {kind} name '{name}', keeping the first");
        return false;
    }
    inventory.insert(name.to_string(), entry);
    true
}

pub fn run_export(context: &RunContext, collaborators: &Collaborators) -> Result<()> {
    log::info!("Export procedure launched");
    let path = ExportOrchestrator::new(context, collaborators).run()?;
    log::info!("Export finished, package written to {path:?}");
    Ok(())
}

/// Connects to the site and dumps its database into `<output>/database/`.
pub fn run_db_dump(context: &RunContext, collaborators: &Collaborators) -> Result<()> {
    log::info!("Export database dump");
    let mut export = ExportOrchestrator::new(context, collaborators);
    export.connect()?;
    export.dump_identity()?;
    export.dump_database()
}

fn run_single_bundle(
    context: &RunContext,
    collaborators: &Collaborators,
    target: &ArchiveTarget,
) -> Result<()> {
    let archives = ArchiveManager::new(collaborators.archiver.clone(), context.output_dir.clone());
    let mut scratch = Package::default();
    match archives.archive_bundle(&context.site_root, target, &mut scratch)? {
        BundleOutcome::Archived(reference) => log::info!("Archive written to {reference}"),
        BundleOutcome::SourceMissing => {
            log::warn!("Nothing to archive for {}", target.relative_source)
        }
    }
    Ok(())
}

pub fn run_media_dump(context: &RunContext, collaborators: &Collaborators) -> Result<()> {
    run_single_bundle(context, collaborators, &MEDIA_TARGET)
}

pub fn run_themes_dump(context: &RunContext, collaborators: &Collaborators) -> Result<()> {
    run_single_bundle(context, collaborators, &THEMES_TARGET)
}

pub fn run_plugins_dump(context: &RunContext, collaborators: &Collaborators) -> Result<()> {
    run_single_bundle(context, collaborators, &PLUGINS_TARGET)
}
