/*
 * Provisioning tool collaborator: the package-manager CLI (wp-cli) that
 * downloads core, writes the configuration file, runs the installer and
 * installs/activates plugins and themes. Each operation maps to exactly one
 * `wp` invocation with one argv entry per option.
 */
use super::process::{ProcessError, ProcessInvocation, ProcessRunnerOperations};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
pub enum ProvisionError {
    Process(ProcessError),
    NothingToInstall,
}

impl From<ProcessError> for ProvisionError {
    fn from(err: ProcessError) -> Self {
        ProvisionError::Process(err)
    }
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::Process(e) => write!(f, "Provisioning tool failed: {e}"),
            ProvisionError::NothingToInstall => write!(f, "No references given to install"),
        }
    }
}

impl std::error::Error for ProvisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProvisionError::Process(e) => Some(e),
            ProvisionError::NothingToInstall => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Builds `wp` invocations bound to one site directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WpCli {
    program: String,
    site_path: PathBuf,
    allow_root: bool,
}

impl WpCli {
    pub fn new(program: impl Into<String>, site_path: impl Into<PathBuf>, allow_root: bool) -> Self {
        WpCli {
            program: program.into(),
            site_path: site_path.into(),
            allow_root,
        }
    }

    pub fn command(&self, words: &[&str]) -> ProcessInvocation {
        let mut invocation = ProcessInvocation::new(&self.program);
        for word in words {
            invocation = invocation.arg(*word);
        }
        invocation = invocation.option("path", self.site_path.to_string_lossy());
        if self.allow_root {
            invocation = invocation.flag("allow-root");
        }
        invocation
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreInstall<'a> {
    pub url: Option<&'a str>,
    pub title: Option<&'a str>,
    pub admin_user: Option<&'a str>,
    pub admin_password: Option<&'a str>,
    pub admin_email: Option<&'a str>,
}

pub trait ProvisioningOperations: Send + Sync {
    fn core_download(&self, version: Option<&str>, locale: Option<&str>) -> Result<()>;
    fn config_create(
        &self,
        db_name: &str,
        db_user: &str,
        db_password: Option<&str>,
        db_host: Option<&str>,
    ) -> Result<()>;
    fn core_install(&self, install: &CoreInstall<'_>) -> Result<()>;
    /// Installs registry slugs or archive paths, optionally activating them.
    fn plugin_install(&self, references: &[String], activate: bool) -> Result<()>;
    fn theme_install(&self, references: &[String]) -> Result<()>;
    fn theme_activate(&self, slug: &str) -> Result<()>;
}

pub struct WpCliProvisioner {
    runner: Arc<dyn ProcessRunnerOperations>,
    cli: WpCli,
}

impl WpCliProvisioner {
    pub fn new(runner: Arc<dyn ProcessRunnerOperations>, cli: WpCli) -> Self {
        WpCliProvisioner { runner, cli }
    }

    fn run(&self, invocation: ProcessInvocation) -> Result<()> {
        log::info!("WpCliProvisioner: {invocation}");
        self.runner.run(&invocation)?;
        Ok(())
    }

    pub(crate) fn core_download_invocation(
        &self,
        version: Option<&str>,
        locale: Option<&str>,
    ) -> ProcessInvocation {
        self.cli
            .command(&["core", "download"])
            .optional("version", version)
            .optional("locale", locale)
    }

    pub(crate) fn config_create_invocation(
        &self,
        db_name: &str,
        db_user: &str,
        db_password: Option<&str>,
        db_host: Option<&str>,
    ) -> ProcessInvocation {
        let mut invocation = self
            .cli
            .command(&["config", "create"])
            .option("dbname", db_name)
            .option("dbuser", db_user);
        if let Some(password) = db_password.filter(|p| !p.is_empty()) {
            invocation = invocation.secret_option("dbpass", password);
        }
        invocation.optional("dbhost", db_host)
    }

    pub(crate) fn core_install_invocation(&self, install: &CoreInstall<'_>) -> ProcessInvocation {
        let mut invocation = self
            .cli
            .command(&["core", "install"])
            .optional("url", install.url)
            .optional("title", install.title)
            .optional("admin_user", install.admin_user);
        if let Some(password) = install.admin_password.filter(|p| !p.is_empty()) {
            invocation = invocation.secret_option("admin_password", password);
        }
        invocation.optional("admin_email", install.admin_email)
    }

    fn install_invocation(&self, kind: &str, references: &[String]) -> Result<ProcessInvocation> {
        if references.is_empty() {
            return Err(ProvisionError::NothingToInstall);
        }
        let mut invocation = self.cli.command(&[kind, "install"]);
        for reference in references {
            invocation = invocation.arg(reference.as_str());
        }
        Ok(invocation)
    }
}

impl ProvisioningOperations for WpCliProvisioner {
    fn core_download(&self, version: Option<&str>, locale: Option<&str>) -> Result<()> {
        self.run(self.core_download_invocation(version, locale))
    }

    fn config_create(
        &self,
        db_name: &str,
        db_user: &str,
        db_password: Option<&str>,
        db_host: Option<&str>,
    ) -> Result<()> {
        self.run(self.config_create_invocation(db_name, db_user, db_password, db_host))
    }

    fn core_install(&self, install: &CoreInstall<'_>) -> Result<()> {
        self.run(self.core_install_invocation(install))
    }

    fn plugin_install(&self, references: &[String], activate: bool) -> Result<()> {
        let mut invocation = self.install_invocation("plugin", references)?;
        if activate {
            invocation = invocation.flag("activate");
        }
        self.run(invocation)
    }

    fn theme_install(&self, references: &[String]) -> Result<()> {
        let invocation = self.install_invocation("theme", references)?;
        self.run(invocation)
    }

    fn theme_activate(&self, slug: &str) -> Result<()> {
        self.run(self.cli.command(&["theme", "activate", slug]))
    }
}
