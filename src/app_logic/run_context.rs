/*
 * The immutable state of one run: what was asked for (verb, directories,
 * overrides, switches) and the run defaults, plus the collaborator set the
 * orchestrators drive. Both are built once in `main` and only borrowed
 * afterwards.
 */
use super::invocation::{ExportSwitches, Invocation, Overrides, Verb};
use crate::core::config::RunDefaults;
use crate::core::{
    AdminSection, ArchiverOperations, CoreArchiver, CoreProcessRunner, DatabaseEngineOperations,
    DatabaseSection, MysqlDatabaseEngine, ProcessRunnerOperations, ProvisioningOperations,
    SiteConnectorOperations, WpCli, WpCliProvisioner, WpSiteConnector,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub verb: Verb,
    /// Site installation to read from (export) or build into (restore).
    pub site_root: PathBuf,
    pub output_dir: PathBuf,
    pub input_dir: PathBuf,
    pub overrides: Overrides,
    pub switches: ExportSwitches,
    pub defaults: RunDefaults,
}

impl RunContext {
    /// `path` falls back to `current_dir`; `output` and `input` fall back to `path`.
    pub fn new(invocation: Invocation, defaults: RunDefaults, current_dir: &Path) -> Self {
        let site_root = invocation
            .path
            .unwrap_or_else(|| current_dir.to_path_buf());
        RunContext {
            verb: invocation.verb,
            output_dir: invocation.output.unwrap_or_else(|| site_root.clone()),
            input_dir: invocation.input.unwrap_or_else(|| site_root.clone()),
            site_root,
            overrides: invocation.overrides,
            switches: invocation.switches,
            defaults,
        }
    }

    /*
     * Database credentials: command line over package over defaults, field by
     * field. An empty package value counts as not given. The dump reference
     * has no default; it is only taken from the command line or the package.
     */
    pub fn resolve_database(&self, package: &DatabaseSection) -> DatabaseSection {
        let defaults = &self.defaults.database;
        let overrides = &self.overrides;
        DatabaseSection {
            host: layered(&overrides.db_host, &package.host, &defaults.host),
            user: layered(&overrides.db_user, &package.user, &defaults.user),
            password: layered(&overrides.db_password, &package.password, &defaults.password),
            name: layered(&overrides.db_name, &package.name, &defaults.name),
            source: overrides
                .db_source
                .clone()
                .or_else(|| package.source.clone())
                .filter(|source| !source.trim().is_empty()),
        }
    }

    pub fn resolve_admin(&self, package: Option<&AdminSection>) -> AdminSection {
        let defaults = &self.defaults.admin;
        let overrides = &self.overrides;
        let empty = AdminSection::default();
        let package = package.unwrap_or(&empty);
        AdminSection {
            login: layered(&overrides.admin_login, &package.login, &defaults.login),
            password: layered(&overrides.admin_password, &package.password, &defaults.password),
            email: layered(&overrides.admin_email, &package.email, &defaults.email),
        }
    }

    pub fn resolve_domain(&self, package_domain: &str) -> String {
        layered(&self.overrides.domain, package_domain, "")
    }
}

fn layered(cli: &Option<String>, package: &str, default: &str) -> String {
    if let Some(value) = cli {
        return value.clone();
    }
    if !package.is_empty() {
        return package.to_string();
    }
    default.to_string()
}

/// The external collaborators of a run.
#[derive(Clone)]
pub struct Collaborators {
    pub site: Arc<dyn SiteConnectorOperations>,
    pub provisioner: Arc<dyn ProvisioningOperations>,
    pub database: Arc<dyn DatabaseEngineOperations>,
    pub archiver: Arc<dyn ArchiverOperations>,
}

impl Collaborators {
    /// Production collaborators: wp-cli, the mysql client programs and native zip.
    pub fn for_site(defaults: &RunDefaults, site_root: &Path) -> Self {
        let runner: Arc<dyn ProcessRunnerOperations> = Arc::new(CoreProcessRunner::new());
        let wp_cli = &defaults.wp_cli;
        Collaborators {
            site: Arc::new(WpSiteConnector::new(
                Arc::clone(&runner),
                &wp_cli.program,
                wp_cli.allow_root,
            )),
            provisioner: Arc::new(WpCliProvisioner::new(
                Arc::clone(&runner),
                WpCli::new(&wp_cli.program, site_root, wp_cli.allow_root),
            )),
            database: Arc::new(MysqlDatabaseEngine::new(
                Arc::clone(&runner),
                &defaults.mysql_program,
                &defaults.mysqldump_program,
            )),
            archiver: Arc::new(CoreArchiver::new()),
        }
    }
}
