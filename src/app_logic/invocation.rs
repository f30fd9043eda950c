/*
 * Turns the raw argument list into an `Invocation`. Every argument is either a
 * presence-only word (a verb or a switch such as `-b`) or a `key=value` pair,
 * split on the first `=`. The verb is the first known verb word present, in
 * `Verb::ALL` order; without one the run is an export.
 */
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    UnknownArgument(String),
    UnknownKey(String),
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationError::UnknownArgument(arg) => write!(f, "Unknown argument '{arg}'"),
            InvocationError::UnknownKey(key) => write!(f, "Unknown setting '{key}='"),
        }
    }
}

impl std::error::Error for InvocationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Export,
    DbDump,
    MediaDump,
    PluginsDump,
    ThemesDump,
    Restore,
    DbRestore,
    PatchAdmin,
    PatchDatabase,
}

impl Verb {
    /// Selection order when several verbs are given.
    pub const ALL: [Verb; 9] = [
        Verb::Export,
        Verb::DbDump,
        Verb::MediaDump,
        Verb::PluginsDump,
        Verb::ThemesDump,
        Verb::Restore,
        Verb::DbRestore,
        Verb::PatchAdmin,
        Verb::PatchDatabase,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Verb::Export => "export",
            Verb::DbDump => "db_dump",
            Verb::MediaDump => "media_dump",
            Verb::PluginsDump => "plugins_dump",
            Verb::ThemesDump => "themes_dump",
            Verb::Restore => "restore",
            Verb::DbRestore => "db_restore",
            Verb::PatchAdmin => "patch_admin",
            Verb::PatchDatabase => "patch_database",
        }
    }

    fn from_keyword(word: &str) -> Option<Verb> {
        if word == "default" {
            return Some(Verb::Export);
        }
        Verb::ALL.into_iter().find(|verb| verb.keyword() == word)
    }
}

/// Values given on the command line that take precedence over the package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub domain: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_host: Option<String>,
    pub db_name: Option<String>,
    pub db_source: Option<String>,
    pub admin_login: Option<String>,
    pub admin_password: Option<String>,
    pub admin_email: Option<String>,
}

/// Export switches: `-b` database dump, `-m` media, `-t` themes bundle, `-p` plugins bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSwitches {
    pub database: bool,
    pub media: bool,
    pub themes: bool,
    pub plugins: bool,
}

impl ExportSwitches {
    pub fn any_bundle(&self) -> bool {
        self.media || self.themes || self.plugins
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub verb: Verb,
    pub path: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub overrides: Overrides,
    pub switches: ExportSwitches,
    /// 0 = info, 1 = debug (`-v`), 2 = trace (`-vv`).
    pub verbosity: u8,
}

pub fn parse_arguments<I, S>(args: I) -> Result<Invocation, InvocationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut verbs = Vec::new();
    let mut invocation = Invocation {
        verb: Verb::Export,
        path: None,
        output: None,
        input: None,
        config: None,
        log_file: None,
        overrides: Overrides::default(),
        switches: ExportSwitches::default(),
        verbosity: 0,
    };

    for arg in args {
        let arg = arg.as_ref();
        let Some((key, value)) = arg.split_once('=') else {
            match arg {
                "-b" => invocation.switches.database = true,
                "-m" => invocation.switches.media = true,
                "-t" => invocation.switches.themes = true,
                "-p" => invocation.switches.plugins = true,
                "-v" => invocation.verbosity = invocation.verbosity.max(1),
                "-vv" => invocation.verbosity = 2,
                word => match Verb::from_keyword(word) {
                    Some(verb) => verbs.push(verb),
                    None => return Err(InvocationError::UnknownArgument(word.to_string())),
                },
            }
            continue;
        };

        let value = value.to_string();
        let overrides = &mut invocation.overrides;
        match key {
            "path" => invocation.path = Some(PathBuf::from(value)),
            "output" => invocation.output = Some(PathBuf::from(value)),
            "input" => invocation.input = Some(PathBuf::from(value)),
            "config" => invocation.config = Some(PathBuf::from(value)),
            "log_file" => invocation.log_file = Some(PathBuf::from(value)),
            "domain" => overrides.domain = Some(value),
            "db_user" => overrides.db_user = Some(value),
            "db_password" => overrides.db_password = Some(value),
            "db_host" => overrides.db_host = Some(value),
            "db_name" => overrides.db_name = Some(value),
            "db_source" => overrides.db_source = Some(value),
            "admin_login" => overrides.admin_login = Some(value),
            "admin_password" => overrides.admin_password = Some(value),
            "admin_email" => overrides.admin_email = Some(value),
            other => return Err(InvocationError::UnknownKey(other.to_string())),
        }
    }

    if let Some(verb) = Verb::ALL.into_iter().find(|verb| verbs.contains(verb)) {
        invocation.verb = verb;
    }
    Ok(invocation)
}
