/*
 * This module consolidates the core, platform-agnostic logic of the application:
 * the package document model, the reference classifier and the archive manager,
 * plus the collaborator abstractions the orchestrators drive
 * (`SiteConnectorOperations`, `ProvisioningOperations`,
 * `DatabaseEngineOperations`, `ArchiverOperations`, `ProcessRunnerOperations`)
 * with their concrete implementations, run defaults and path/checksum utilities.
 */
pub mod archive_manager;
pub mod archiver;
pub mod checksum_utils;
pub mod config;
pub mod database;
pub mod header_scanner;
pub mod package;
pub mod path_utils;
pub mod process;
pub mod provisioning;
pub mod reference_classifier;
pub mod site_runtime;

// Re-export the package model
pub use package::{
    AdminSection, DatabaseSection, ItemReference, Package, PackageError, PluginEntry, Section,
    ThemeEntry,
};

pub use reference_classifier::{Classification, classify};

// Re-export archiving
pub use archive_manager::{
    ArchiveManager, ArchiveManagerError, ArchiveTarget, BundleOutcome, CustomKind, MEDIA_TARGET,
    PLUGINS_TARGET, THEMES_TARGET,
};
pub use archiver::{ArchiverOperations, CoreArchiver};

// Re-export collaborators
pub use database::{DatabaseConnection, DatabaseEngineOperations, DatabaseError, MysqlDatabaseEngine};
pub use process::{CoreProcessRunner, ProcessRunnerOperations};
pub use provisioning::{CoreInstall, ProvisionError, ProvisioningOperations, WpCli, WpCliProvisioner};
pub use site_runtime::{
    InstalledPlugin, InstalledTheme, SiteConnectorOperations, SiteError, SiteIdentity,
    SiteRuntimeOperations, WpSiteConnector,
};

// Re-export config related items
pub use config::{ConfigError, ConfigManagerOperations, CoreConfigManager, RunDefaults};
