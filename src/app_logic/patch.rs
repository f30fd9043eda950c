/*
 * Package patch helpers: fill in the admin or database section of an existing
 * package from the command line and the run defaults, then write the result to
 * the output directory. The input document is only replaced when input and
 * output are the same directory.
 */
use super::error::Result;
use super::run_context::{Collaborators, RunContext};
use crate::core::package;

pub fn run_patch_admin(context: &RunContext, _collaborators: &Collaborators) -> Result<()> {
    let mut package = package::load_from_dir(&context.input_dir)?;
    package.admin = Some(context.resolve_admin(package.admin.as_ref()));
    let path = package::write_to_dir(&package, &context.output_dir)?;
    log::info!("Patch: Admin credentials written to {path:?}");
    Ok(())
}

pub fn run_patch_database(context: &RunContext, _collaborators: &Collaborators) -> Result<()> {
    let mut package = package::load_from_dir(&context.input_dir)?;
    package.database = context.resolve_database(&package.database);
    let path = package::write_to_dir(&package, &context.output_dir)?;
    log::info!("Patch: Database credentials written to {path:?}");
    Ok(())
}
