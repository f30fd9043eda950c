/*
 * Maps the selected verb to the procedure that implements it. Each procedure
 * gets the run context and the collaborator set and owns its orchestrator for
 * the duration of the call.
 */
use super::error::Result;
use super::export;
use super::invocation::Verb;
use super::patch;
use super::restore;
use super::run_context::{Collaborators, RunContext};

pub type Procedure = fn(&RunContext, &Collaborators) -> Result<()>;

impl Verb {
    pub fn procedure(self) -> Procedure {
        match self {
            Verb::Export => export::run_export,
            Verb::DbDump => export::run_db_dump,
            Verb::MediaDump => export::run_media_dump,
            Verb::PluginsDump => export::run_plugins_dump,
            Verb::ThemesDump => export::run_themes_dump,
            Verb::Restore => restore::run_restore,
            Verb::DbRestore => restore::run_db_restore,
            Verb::PatchAdmin => patch::run_patch_admin,
            Verb::PatchDatabase => patch::run_patch_database,
        }
    }
}

pub fn route(context: &RunContext, collaborators: &Collaborators) -> Result<()> {
    log::debug!("Router: Dispatching '{}'", context.verb.keyword());
    (context.verb.procedure())(context, collaborators)
}
