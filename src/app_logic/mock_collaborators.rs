/*
 * Hand-written collaborator doubles shared by the orchestrator test suites. Each
 * one records the calls it receives behind a `Mutex` and can be told to fail a
 * specific operation. Archiving is not mocked: the suites use `CoreArchiver`
 * against temporary directories.
 */
use super::run_context::Collaborators;
use crate::core::database::{self, DatabaseConnection, DatabaseEngineOperations, DatabaseError};
use crate::core::package::DatabaseSection;
use crate::core::process::ProcessError;
use crate::core::provisioning::{self, CoreInstall, ProvisionError, ProvisioningOperations};
use crate::core::site_runtime::{
    self, INSTALLATION_MARKER, InstalledPlugin, InstalledTheme, SiteConnectorOperations,
    SiteError, SiteIdentity, SiteRuntimeOperations,
};
use crate::core::CoreArchiver;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

fn failed(command: &str) -> ProcessError {
    ProcessError::Failed {
        command: command.to_string(),
        status: Some(1),
        stderr: "mocked failure".to_string(),
    }
}

// --- MockSiteConnector ---
#[derive(Debug, Clone, Default)]
pub struct SiteFixture {
    pub identity: SiteIdentity,
    pub database: DatabaseSection,
    pub plugins: Vec<InstalledPlugin>,
    pub themes: Vec<InstalledTheme>,
}

pub struct MockSiteConnector {
    fixture: SiteFixture,
    pub url_updates: Arc<Mutex<Vec<String>>>,
    pub connects: Mutex<u32>,
}

impl MockSiteConnector {
    pub fn new(fixture: SiteFixture) -> Self {
        MockSiteConnector {
            fixture,
            url_updates: Arc::new(Mutex::new(Vec::new())),
            connects: Mutex::new(0),
        }
    }

    pub fn get_url_updates(&self) -> Vec<String> {
        self.url_updates.lock().unwrap().clone()
    }
}

impl SiteConnectorOperations for MockSiteConnector {
    fn connect(&self, site_root: &Path) -> site_runtime::Result<Box<dyn SiteRuntimeOperations>> {
        *self.connects.lock().unwrap() += 1;
        if !site_root.join(INSTALLATION_MARKER).is_file() {
            return Err(SiteError::NotFound(site_root.to_path_buf()));
        }
        Ok(Box::new(MockSiteRuntime {
            fixture: self.fixture.clone(),
            url_updates: Arc::clone(&self.url_updates),
        }))
    }
}

struct MockSiteRuntime {
    fixture: SiteFixture,
    url_updates: Arc<Mutex<Vec<String>>>,
}

impl SiteRuntimeOperations for MockSiteRuntime {
    fn identity(&self) -> site_runtime::Result<SiteIdentity> {
        Ok(self.fixture.identity.clone())
    }
    fn database_constants(&self) -> site_runtime::Result<DatabaseSection> {
        Ok(self.fixture.database.clone())
    }
    fn installed_plugins(&self) -> site_runtime::Result<Vec<InstalledPlugin>> {
        Ok(self.fixture.plugins.clone())
    }
    fn installed_themes(&self) -> site_runtime::Result<Vec<InstalledTheme>> {
        Ok(self.fixture.themes.clone())
    }
    fn update_site_urls(&self, url: &str) -> site_runtime::Result<()> {
        self.url_updates.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
// --- End MockSiteConnector ---

// --- MockProvisioner ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionCall {
    CoreDownload {
        version: Option<String>,
        locale: Option<String>,
    },
    ConfigCreate {
        db_name: String,
        db_user: String,
        db_password: Option<String>,
        db_host: Option<String>,
    },
    CoreInstall {
        url: Option<String>,
        title: Option<String>,
        admin_user: Option<String>,
        admin_password: Option<String>,
        admin_email: Option<String>,
    },
    PluginInstall {
        references: Vec<String>,
        activate: bool,
    },
    ThemeInstall(Vec<String>),
    ThemeActivate(String),
}

/// Writes the installation marker on `config_create`, like the real tool.
pub struct MockProvisioner {
    site_root: PathBuf,
    calls: Mutex<Vec<ProvisionCall>>,
    pub fail_core_download: Mutex<bool>,
    pub fail_plugin_install: Mutex<bool>,
}

impl MockProvisioner {
    pub fn new(site_root: &Path) -> Self {
        MockProvisioner {
            site_root: site_root.to_path_buf(),
            calls: Mutex::new(Vec::new()),
            fail_core_download: Mutex::new(false),
            fail_plugin_install: Mutex::new(false),
        }
    }

    pub fn get_calls(&self) -> Vec<ProvisionCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ProvisionCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

impl ProvisioningOperations for MockProvisioner {
    fn core_download(&self, version: Option<&str>, locale: Option<&str>) -> provisioning::Result<()> {
        self.record(ProvisionCall::CoreDownload {
            version: owned(version),
            locale: owned(locale),
        });
        if *self.fail_core_download.lock().unwrap() {
            return Err(ProvisionError::Process(failed("wp core download")));
        }
        Ok(())
    }

    fn config_create(
        &self,
        db_name: &str,
        db_user: &str,
        db_password: Option<&str>,
        db_host: Option<&str>,
    ) -> provisioning::Result<()> {
        self.record(ProvisionCall::ConfigCreate {
            db_name: db_name.to_string(),
            db_user: db_user.to_string(),
            db_password: owned(db_password),
            db_host: owned(db_host),
        });
        fs::create_dir_all(&self.site_root).unwrap();
        fs::write(self.site_root.join(INSTALLATION_MARKER), "<?php\n").unwrap();
        Ok(())
    }

    fn core_install(&self, install: &CoreInstall<'_>) -> provisioning::Result<()> {
        self.record(ProvisionCall::CoreInstall {
            url: owned(install.url),
            title: owned(install.title),
            admin_user: owned(install.admin_user),
            admin_password: owned(install.admin_password),
            admin_email: owned(install.admin_email),
        });
        Ok(())
    }

    fn plugin_install(&self, references: &[String], activate: bool) -> provisioning::Result<()> {
        self.record(ProvisionCall::PluginInstall {
            references: references.to_vec(),
            activate,
        });
        if *self.fail_plugin_install.lock().unwrap() {
            return Err(ProvisionError::Process(failed("wp plugin install")));
        }
        Ok(())
    }

    fn theme_install(&self, references: &[String]) -> provisioning::Result<()> {
        self.record(ProvisionCall::ThemeInstall(references.to_vec()));
        Ok(())
    }

    fn theme_activate(&self, slug: &str) -> provisioning::Result<()> {
        self.record(ProvisionCall::ThemeActivate(slug.to_string()));
        Ok(())
    }
}
// --- End MockProvisioner ---

// --- MockDatabaseEngine ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseCall {
    Drop(String),
    Create { schema: String, if_not_exists: bool },
    Dump { schema: String, dest: PathBuf },
    Restore { schema: String, source: PathBuf },
}

pub struct MockDatabaseEngine {
    schemas: Mutex<HashSet<String>>,
    calls: Mutex<Vec<DatabaseCall>>,
    pub fail_create: Mutex<bool>,
}

impl MockDatabaseEngine {
    pub fn with_schemas(schemas: &[&str]) -> Self {
        MockDatabaseEngine {
            schemas: Mutex::new(schemas.iter().map(|s| s.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
            fail_create: Mutex::new(false),
        }
    }

    pub fn get_calls(&self) -> Vec<DatabaseCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.schemas.lock().unwrap().contains(schema)
    }
}

impl DatabaseEngineOperations for MockDatabaseEngine {
    fn schema_exists(&self, _: &DatabaseConnection, schema: &str) -> database::Result<bool> {
        Ok(self.has_schema(schema))
    }

    fn drop_schema(&self, _: &DatabaseConnection, schema: &str) -> database::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(DatabaseCall::Drop(schema.to_string()));
        self.schemas.lock().unwrap().remove(schema);
        Ok(())
    }

    fn create_schema(
        &self,
        _: &DatabaseConnection,
        schema: &str,
        if_not_exists: bool,
    ) -> database::Result<()> {
        self.calls.lock().unwrap().push(DatabaseCall::Create {
            schema: schema.to_string(),
            if_not_exists,
        });
        if *self.fail_create.lock().unwrap() {
            return Err(DatabaseError::Process(failed("mysql CREATE DATABASE")));
        }
        self.schemas.lock().unwrap().insert(schema.to_string());
        Ok(())
    }

    fn dump_schema(&self, _: &DatabaseConnection, schema: &str, dest: &Path) -> database::Result<()> {
        fs::write(dest, format!("CREATE TABLE wp_options (id int); -- {schema}\n"))?;
        self.calls.lock().unwrap().push(DatabaseCall::Dump {
            schema: schema.to_string(),
            dest: dest.to_path_buf(),
        });
        Ok(())
    }

    fn restore_schema(
        &self,
        _: &DatabaseConnection,
        schema: &str,
        source: &Path,
    ) -> database::Result<()> {
        self.calls.lock().unwrap().push(DatabaseCall::Restore {
            schema: schema.to_string(),
            source: source.to_path_buf(),
        });
        Ok(())
    }
}
// --- End MockDatabaseEngine ---

pub struct MockSet {
    pub site: Arc<MockSiteConnector>,
    pub provisioner: Arc<MockProvisioner>,
    pub database: Arc<MockDatabaseEngine>,
}

impl MockSet {
    pub fn new(site_root: &Path, fixture: SiteFixture, schemas: &[&str]) -> Self {
        MockSet {
            site: Arc::new(MockSiteConnector::new(fixture)),
            provisioner: Arc::new(MockProvisioner::new(site_root)),
            database: Arc::new(MockDatabaseEngine::with_schemas(schemas)),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            site: self.site.clone(),
            provisioner: self.provisioner.clone(),
            database: self.database.clone(),
            archiver: Arc::new(CoreArchiver::new()),
        }
    }
}
