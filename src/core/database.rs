/*
 * Database engine collaborator. `DatabaseEngineOperations` exposes the schema
 * operations the orchestrators need; `MysqlDatabaseEngine` implements them with
 * the `mysql` and `mysqldump` client programs through the process runner.
 *
 * The password is handed over in the `MYSQL_PWD` environment variable so it never
 * shows up in argv. Schema names are validated before they are spliced into SQL.
 */
use super::package::DatabaseSection;
use super::process::{ProcessError, ProcessInvocation, ProcessRunnerOperations};
use regex::Regex;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::{Arc, LazyLock};

static SCHEMA_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_$][A-Za-z0-9_$-]{0,63}$").expect("static pattern"));

#[derive(Debug)]
pub enum DatabaseError {
    InvalidSchemaName(String),
    Io(io::Error),
    Process(ProcessError),
}

impl From<ProcessError> for DatabaseError {
    fn from(err: ProcessError) -> Self {
        DatabaseError::Process(err)
    }
}

impl From<io::Error> for DatabaseError {
    fn from(err: io::Error) -> Self {
        DatabaseError::Io(err)
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::InvalidSchemaName(name) => {
                write!(f, "Refusing to use schema name '{name}'")
            }
            DatabaseError::Io(e) => write!(f, "Database I/O error: {e}"),
            DatabaseError::Process(e) => write!(f, "Database client failed: {e}"),
        }
    }
}

impl std::error::Error for DatabaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatabaseError::InvalidSchemaName(_) => None,
            DatabaseError::Io(e) => Some(e),
            DatabaseError::Process(e) => Some(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Server address and account, without a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConnection {
    pub host: String,
    pub user: String,
    pub password: String,
}

impl From<&DatabaseSection> for DatabaseConnection {
    fn from(section: &DatabaseSection) -> Self {
        DatabaseConnection {
            host: section.host.clone(),
            user: section.user.clone(),
            password: section.password.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostEndpoint<'a> {
    Host(&'a str),
    HostPort(&'a str, &'a str),
    HostSocket(&'a str, &'a str),
}

// wp-config.php allows "host", "host:port" and "host:/path/to/socket".
fn split_host(host: &str) -> HostEndpoint<'_> {
    if host.matches(':').count() != 1 {
        return HostEndpoint::Host(host);
    }
    match host.split_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            HostEndpoint::HostPort(name, port)
        }
        Some((name, socket)) if socket.starts_with('/') => HostEndpoint::HostSocket(name, socket),
        _ => HostEndpoint::Host(host),
    }
}

pub fn validate_schema_name(name: &str) -> Result<()> {
    if SCHEMA_NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(DatabaseError::InvalidSchemaName(name.to_string()))
    }
}

pub trait DatabaseEngineOperations: Send + Sync {
    fn schema_exists(&self, connection: &DatabaseConnection, schema: &str) -> Result<bool>;
    fn drop_schema(&self, connection: &DatabaseConnection, schema: &str) -> Result<()>;
    fn create_schema(
        &self,
        connection: &DatabaseConnection,
        schema: &str,
        if_not_exists: bool,
    ) -> Result<()>;
    fn dump_schema(&self, connection: &DatabaseConnection, schema: &str, dest: &Path) -> Result<()>;
    fn restore_schema(
        &self,
        connection: &DatabaseConnection,
        schema: &str,
        source: &Path,
    ) -> Result<()>;
}

pub struct MysqlDatabaseEngine {
    runner: Arc<dyn ProcessRunnerOperations>,
    mysql_program: String,
    mysqldump_program: String,
}

impl MysqlDatabaseEngine {
    pub fn new(
        runner: Arc<dyn ProcessRunnerOperations>,
        mysql_program: impl Into<String>,
        mysqldump_program: impl Into<String>,
    ) -> Self {
        MysqlDatabaseEngine {
            runner,
            mysql_program: mysql_program.into(),
            mysqldump_program: mysqldump_program.into(),
        }
    }

    fn client(program: &str, connection: &DatabaseConnection) -> ProcessInvocation {
        let mut invocation = ProcessInvocation::new(program);
        invocation = match split_host(&connection.host) {
            HostEndpoint::Host("") => invocation,
            HostEndpoint::Host(host) => invocation.option("host", host),
            HostEndpoint::HostPort(host, port) => invocation.option("host", host).option("port", port),
            HostEndpoint::HostSocket(host, socket) => {
                invocation.option("host", host).option("socket", socket)
            }
        };
        invocation = invocation.option("user", &connection.user);
        if !connection.password.is_empty() {
            invocation = invocation.env("MYSQL_PWD", connection.password.clone());
        }
        invocation
    }

    pub(crate) fn statement_invocation(
        &self,
        connection: &DatabaseConnection,
        sql: &str,
    ) -> ProcessInvocation {
        Self::client(&self.mysql_program, connection)
            .flag("batch")
            .flag("skip-column-names")
            .option("execute", sql)
    }

    pub(crate) fn dump_invocation(
        &self,
        connection: &DatabaseConnection,
        schema: &str,
        dest: &Path,
    ) -> ProcessInvocation {
        Self::client(&self.mysqldump_program, connection)
            .option("result-file", dest.to_string_lossy())
            .arg(schema)
    }

    pub(crate) fn restore_invocation(
        &self,
        connection: &DatabaseConnection,
        schema: &str,
        source: &Path,
    ) -> ProcessInvocation {
        Self::client(&self.mysql_program, connection)
            .arg(schema)
            .stdin_from(source)
    }
}

impl DatabaseEngineOperations for MysqlDatabaseEngine {
    fn schema_exists(&self, connection: &DatabaseConnection, schema: &str) -> Result<bool> {
        validate_schema_name(schema)?;
        let sql = format!(
            "SELECT SCHEMA_NAME FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME = '{schema}'"
        );
        let output = self.runner.run(&self.statement_invocation(connection, &sql))?;
        let exists = output.stdout.lines().any(|line| line.trim() == schema);
        log::debug!("MysqlDatabaseEngine: Schema '{schema}' exists: {exists}");
        Ok(exists)
    }

    fn drop_schema(&self, connection: &DatabaseConnection, schema: &str) -> Result<()> {
        validate_schema_name(schema)?;
        log::info!("MysqlDatabaseEngine: Dropping schema '{schema}'");
        let sql = format!("DROP DATABASE IF EXISTS `{schema}`");
        self.runner.run(&self.statement_invocation(connection, &sql))?;
        Ok(())
    }

    fn create_schema(
        &self,
        connection: &DatabaseConnection,
        schema: &str,
        if_not_exists: bool,
    ) -> Result<()> {
        validate_schema_name(schema)?;
        log::info!("MysqlDatabaseEngine: Creating schema '{schema}'");
        let sql = if if_not_exists {
            format!("CREATE DATABASE IF NOT EXISTS `{schema}`")
        } else {
            format!("CREATE DATABASE `{schema}`")
        };
        self.runner.run(&self.statement_invocation(connection, &sql))?;
        Ok(())
    }

    fn dump_schema(&self, connection: &DatabaseConnection, schema: &str, dest: &Path) -> Result<()> {
        validate_schema_name(schema)?;
        log::info!("MysqlDatabaseEngine: Dumping schema '{schema}' to {dest:?}");
        self.runner
            .run(&self.dump_invocation(connection, schema, dest))?;
        Ok(())
    }

    fn restore_schema(
        &self,
        connection: &DatabaseConnection,
        schema: &str,
        source: &Path,
    ) -> Result<()> {
        validate_schema_name(schema)?;
        log::info!("MysqlDatabaseEngine: Restoring schema '{schema}' from {source:?}");
        self.runner
            .run(&self.restore_invocation(connection, schema, source))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::process::{self, ProcessOutput};
    use std::sync::Mutex;

    struct RecordingRunner {
        calls: Mutex<Vec<ProcessInvocation>>,
        stdout: String,
    }

    impl RecordingRunner {
        fn new(stdout: &str) -> Arc<Self> {
            Arc::new(RecordingRunner {
                calls: Mutex::new(Vec::new()),
                stdout: stdout.to_string(),
            })
        }
    }

    impl ProcessRunnerOperations for RecordingRunner {
        fn run(&self, invocation: &ProcessInvocation) -> process::Result<ProcessOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            Ok(ProcessOutput {
                stdout: self.stdout.clone(),
            })
        }
    }

    fn connection(host: &str, password: &str) -> DatabaseConnection {
        DatabaseConnection {
            host: host.to_string(),
            user: "wpuser".to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_split_host_forms() {
        assert_eq!(split_host("localhost"), HostEndpoint::Host("localhost"));
        assert_eq!(
            split_host("db.internal:3307"),
            HostEndpoint::HostPort("db.internal", "3307")
        );
        assert_eq!(
            split_host("localhost:/run/mysqld/mysqld.sock"),
            HostEndpoint::HostSocket("localhost", "/run/mysqld/mysqld.sock")
        );
        assert_eq!(split_host("::1"), HostEndpoint::Host("::1"));
    }

    #[test]
    fn test_schema_name_validation() {
        assert!(validate_schema_name("wordpress_01").is_ok());
        assert!(validate_schema_name("wp-site").is_ok());
        assert!(validate_schema_name("").is_err());
        assert!(validate_schema_name("wp`; DROP TABLE x; --").is_err());
        assert!(validate_schema_name("name with space").is_err());
        // A leading dash would be read as an option by the client programs.
        assert!(validate_schema_name("--all-databases").is_err());
        assert!(validate_schema_name("-wp").is_err());
        assert!(validate_schema_name(&"a".repeat(64)).is_ok());
        assert!(validate_schema_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_password_travels_in_environment() {
        let runner = RecordingRunner::new("");
        let engine = MysqlDatabaseEngine::new(runner.clone(), "mysql", "mysqldump");
        engine
            .create_schema(&connection("db:3307", "s3cret"), "wp", false)
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        let call = &calls[0];
        assert_eq!(call.program, "mysql");
        assert_eq!(
            call.arg_values(),
            vec![
                "--host=db",
                "--port=3307",
                "--user=wpuser",
                "--batch",
                "--skip-column-names",
                "--execute=CREATE DATABASE `wp`"
            ]
        );
        assert_eq!(call.env, vec![("MYSQL_PWD".to_string(), "s3cret".to_string())]);
        assert!(!call.to_string().contains("s3cret"));
    }

    #[test]
    fn test_schema_exists_reads_client_output() {
        let runner = RecordingRunner::new("wp\n");
        let engine = MysqlDatabaseEngine::new(runner.clone(), "mysql", "mysqldump");
        assert!(engine.schema_exists(&connection("localhost", ""), "wp").unwrap());
        assert!(!engine.schema_exists(&connection("localhost", ""), "other").unwrap());
        assert!(runner.calls.lock().unwrap()[0].env.is_empty());
    }

    #[test]
    fn test_dump_and_restore_invocations() {
        let runner = RecordingRunner::new("");
        let engine = MysqlDatabaseEngine::new(runner.clone(), "mysql", "mysqldump");
        let conn = connection("localhost", "");
        engine
            .dump_schema(&conn, "wp", Path::new("/out/database/wp.sql"))
            .unwrap();
        engine
            .restore_schema(&conn, "wp", Path::new("/in/database/wp.sql"))
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].program, "mysqldump");
        assert!(calls[0].has_arg("--result-file=/out/database/wp.sql"));
        assert_eq!(calls[0].arg_values().last(), Some(&"wp"));
        assert_eq!(calls[1].program, "mysql");
        assert_eq!(
            calls[1].stdin_file.as_deref(),
            Some(Path::new("/in/database/wp.sql"))
        );
    }

    #[test]
    fn test_invalid_schema_never_reaches_the_client() {
        let runner = RecordingRunner::new("");
        let engine = MysqlDatabaseEngine::new(runner.clone(), "mysql", "mysqldump");
        let result = engine.drop_schema(&connection("localhost", ""), "x'; --");
        assert!(matches!(result, Err(DatabaseError::InvalidSchemaName(_))));
        assert!(runner.calls.lock().unwrap().is_empty());
    }
}
