/*
 * Restore: builds a site from a package. The package document is read once and
 * only the resolved copy (overrides and defaults merged in) is used afterwards.
 *
 * Steps up to and including the database branch are fatal on failure. From
 * there on, individual theme/plugin installs, activations and bundle
 * extractions are logged and skipped so one broken item does not abort the
 * whole rebuild.
 */
use super::error::{BatchError, Result};
use super::run_context::{Collaborators, RunContext};
use crate::core::archive_manager::ArchiveManager;
use crate::core::package::{self, AdminSection, ItemReference, Package};
use crate::core::site_runtime::SiteRuntimeOperations;
use crate::core::{CoreInstall, DatabaseConnection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStage {
    Loaded,
    CredentialsResolved,
    DatabaseReady,
    CoreDownloaded,
    ConfigWritten,
    Installed,
    DatabaseRestored,
    RuntimeConnected,
    DomainUpdated,
    ThemesReady,
    PluginsReady,
    MediaRestored,
    Done,
}

/// Which way the database branch went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBranch {
    FreshInstall,
    FromDump,
}

pub struct RestoreOrchestrator<'a> {
    context: &'a RunContext,
    collaborators: &'a Collaborators,
    archives: ArchiveManager,
    package: Package,
    admin: AdminSection,
    runtime: Option<Box<dyn SiteRuntimeOperations>>,
    stage: RestoreStage,
}

impl<'a> RestoreOrchestrator<'a> {
    /// Reads `<input>/wordpress.json`.
    pub fn load(context: &'a RunContext, collaborators: &'a Collaborators) -> Result<Self> {
        let package = package::load_from_dir(&context.input_dir)?;
        log::info!(
            "RestoreOrchestrator: Loaded package for '{}' from {:?}",
            package.name,
            context.input_dir
        );
        Ok(RestoreOrchestrator {
            context,
            collaborators,
            archives: ArchiveManager::new(collaborators.archiver.clone(), context.input_dir.clone()),
            package,
            admin: AdminSection::default(),
            runtime: None,
            stage: RestoreStage::Loaded,
        })
    }

    pub fn stage(&self) -> RestoreStage {
        self.stage
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn admin(&self) -> &AdminSection {
        &self.admin
    }

    pub fn resolve_credentials(&mut self) {
        self.package.domain = self.context.resolve_domain(&self.package.domain);
        self.package.database = self.context.resolve_database(&self.package.database);
        self.admin = self.context.resolve_admin(self.package.admin.as_ref());
        self.stage = RestoreStage::CredentialsResolved;
    }

    /*
     * A referenced dump must be present before anything on the host is touched:
     * preparing the schema drops the existing one.
     */
    pub fn check_database_source(&self) -> Result<()> {
        if let Some(source) = self.package.database.source.as_deref() {
            self.archives.locate(source)?;
        }
        Ok(())
    }

    fn connection(&self) -> DatabaseConnection {
        DatabaseConnection::from(&self.package.database)
    }

    /*
     * Drops and recreates the target schema, or only creates it if missing when
     * the defaults disable recreation.
     */
    pub fn prepare_database(&mut self) -> Result<()> {
        let engine = self.collaborators.database.as_ref();
        let connection = self.connection();
        let schema = self.package.database.name.as_str();
        let recreate = self.context.defaults.recreate_database;

        if recreate
            && engine
                .schema_exists(&connection, schema)
                .map_err(BatchError::DatabaseProvisionFailed)?
        {
            log::info!("RestoreOrchestrator: Dropping existing database '{schema}'");
            engine
                .drop_schema(&connection, schema)
                .map_err(BatchError::DatabaseProvisionFailed)?;
        }
        engine
            .create_schema(&connection, schema, !recreate)
            .map_err(BatchError::DatabaseProvisionFailed)?;
        log::info!("RestoreOrchestrator: Database '{schema}' ready");
        self.stage = RestoreStage::DatabaseReady;
        Ok(())
    }

    pub fn provision_core(&mut self) -> Result<()> {
        let provisioner = self.collaborators.provisioner.as_ref();
        provisioner.core_download(
            non_empty(&self.package.version),
            non_empty(&self.package.locale),
        )?;
        self.stage = RestoreStage::CoreDownloaded;

        let database = &self.package.database;
        provisioner.config_create(
            &database.name,
            &database.user,
            Some(database.password.as_str()),
            non_empty(&database.host),
        )?;
        self.stage = RestoreStage::ConfigWritten;
        Ok(())
    }

    /// Exactly one of: run the installer, or load the dump.
    pub fn install_or_restore_database(&mut self) -> Result<DatabaseBranch> {
        match self.package.database.source.clone() {
            None => {
                log::info!("RestoreOrchestrator: No database dump, running a fresh install");
                self.collaborators.provisioner.core_install(&CoreInstall {
                    url: non_empty(&self.package.domain),
                    title: non_empty(&self.package.name),
                    admin_user: non_empty(&self.admin.login),
                    admin_password: non_empty(&self.admin.password),
                    admin_email: non_empty(&self.admin.email),
                })?;
                self.stage = RestoreStage::Installed;
                Ok(DatabaseBranch::FreshInstall)
            }
            Some(source) => {
                self.restore_dump(&source)?;
                Ok(DatabaseBranch::FromDump)
            }
        }
    }

    fn restore_dump(&mut self, source: &str) -> Result<()> {
        self.archives.restore_database(
            self.collaborators.database.as_ref(),
            &self.connection(),
            &self.package.database.name,
            source,
        )?;
        self.stage = RestoreStage::DatabaseRestored;
        Ok(())
    }

    pub fn connect_runtime(&mut self) -> Result<()> {
        let runtime = self.collaborators.site.connect(&self.context.site_root)?;
        self.runtime = Some(runtime);
        self.stage = RestoreStage::RuntimeConnected;
        Ok(())
    }

    pub fn update_domain(&mut self) -> Result<()> {
        let runtime = self
            .runtime
            .as_deref()
            .ok_or(BatchError::NotConnected("update_domain"))?;
        runtime.update_site_urls(&self.package.domain)?;
        self.stage = RestoreStage::DomainUpdated;
        Ok(())
    }

    // Registry slugs pass through; bundled archives are resolved against the package directory.
    fn install_reference(&self, reference: ItemReference<'_>) -> String {
        match reference {
            ItemReference::Registry(slug) => slug.to_string(),
            ItemReference::Bundled(src) => self.archives.resolve(src).to_string_lossy().into_owned(),
        }
    }

    fn extract_bundle(&self, label: &str, reference: &str) {
        if let Err(e) = self.archives.extract(reference, &self.context.site_root) {
            log::error!("RestoreOrchestrator: Skipping {label} archive: {e}");
        }
    }

    /*
     * A themes bundle is extracted as-is. Otherwise each theme is installed by
     * reference and the one marked active is activated.
     */
    pub fn reconcile_themes(&mut self) {
        if let Some(source) = self.package.themes.source() {
            self.extract_bundle("themes", source);
        } else if let Some(themes) = self.package.themes.inventory() {
            let references: Vec<String> = themes
                .values()
                .filter_map(|theme| theme.reference())
                .map(|reference| self.install_reference(reference))
                .collect();
            let provisioner = self.collaborators.provisioner.as_ref();
            if !references.is_empty() {
                if let Err(e) = provisioner.theme_install(&references) {
                    log::error!("RestoreOrchestrator: Theme installation failed: {e}");
                }
            }
            if let Some((name, theme)) = self.package.active_theme() {
                let slug = if theme.slug.is_empty() {
                    theme.url.as_str()
                } else {
                    theme.slug.as_str()
                };
                log::info!("RestoreOrchestrator: Activating theme '{name}'");
                if let Err(e) = provisioner.theme_activate(slug) {
                    log::error!("RestoreOrchestrator: Could not activate theme '{name}': {e}");
                }
            }
        }
        self.stage = RestoreStage::ThemesReady;
    }

    /*
     * A plugins bundle is extracted as-is. Otherwise active plugins are
     * installed with activation in one call and the rest without in another.
     */
    pub fn reconcile_plugins(&mut self) {
        if let Some(source) = self.package.plugins.source() {
            self.extract_bundle("plugins", source);
        } else if let Some(plugins) = self.package.plugins.inventory() {
            let (active, inactive): (Vec<_>, Vec<_>) =
                plugins.values().partition(|plugin| plugin.is_active());
            let provisioner = self.collaborators.provisioner.as_ref();
            for (entries, activate) in [(active, true), (inactive, false)] {
                let references: Vec<String> = entries
                    .into_iter()
                    .filter_map(|plugin| plugin.reference())
                    .map(|reference| self.install_reference(reference))
                    .collect();
                if references.is_empty() {
                    continue;
                }
                if let Err(e) = provisioner.plugin_install(&references, activate) {
                    log::error!("RestoreOrchestrator: Plugin installation failed: {e}");
                }
            }
        }
        self.stage = RestoreStage::PluginsReady;
    }

    pub fn restore_media(&mut self) {
        if let Some(source) = self.package.media.source.as_deref() {
            self.extract_bundle("media", source);
            self.stage = RestoreStage::MediaRestored;
        }
    }

    pub fn run(mut self) -> Result<()> {
        self.resolve_credentials();
        self.package.validate_for_restore()?;
        self.check_database_source()?;
        self.prepare_database()?;
        self.provision_core()?;
        self.install_or_restore_database()?;
        self.connect_runtime()?;
        self.update_domain()?;
        self.reconcile_themes();
        self.reconcile_plugins();
        self.restore_media();
        self.stage = RestoreStage::Done;
        Ok(())
    }

    /// Schema preparation and dump loading only.
    pub fn run_database_only(mut self) -> Result<()> {
        self.resolve_credentials();
        self.package.validate_for_database_restore()?;
        self.check_database_source()?;
        self.prepare_database()?;
        let source = self
            .package
            .database
            .source
            .clone()
            .ok_or(BatchError::MissingField("database.source".to_string()))?;
        self.restore_dump(&source)?;
        self.stage = RestoreStage::Done;
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

pub fn run_restore(context: &RunContext, collaborators: &Collaborators) -> Result<()> {
    log::info!("Restore procedure launched");
    RestoreOrchestrator::load(context, collaborators)?.run()?;
    log::info!("Restore finished for {:?}", context.site_root);
    Ok(())
}

pub fn run_db_restore(context: &RunContext, collaborators: &Collaborators) -> Result<()> {
    log::info!("Database restore launched");
    RestoreOrchestrator::load(context, collaborators)?.run_database_only()
}
