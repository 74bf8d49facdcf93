//! Command-line interface definitions for the `kiln` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `kiln` binary.
#[derive(Debug, Parser)]
#[command(
    name = "kiln",
    about = "Build UpCloud storage templates from a disposable server",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Build templates using the configured source storage.
    #[command(
        name = "build",
        about = "Create, provision, and templatize a build server"
    )]
    Build(BuildCommand),
}

/// Arguments for the `kiln build` subcommand.
///
/// Each flag overrides the matching value from `kiln.toml` or the `KILN_*`
/// environment for this run only.
#[derive(Debug, Default, Parser)]
pub(crate) struct BuildCommand {
    /// Zone hosting the build server.
    #[arg(long, value_name = "ZONE")]
    pub(crate) zone: Option<String>,
    /// Identifier of the storage to clone.
    #[arg(long, value_name = "UUID")]
    pub(crate) storage_uuid: Option<String>,
    /// Case-insensitive substring of the template title to clone.
    #[arg(long, value_name = "NAME")]
    pub(crate) storage_name: Option<String>,
    /// Prefix for the server and template titles.
    #[arg(long, value_name = "PREFIX")]
    pub(crate) template_prefix: Option<String>,
    /// Extra zone receiving a copy of the template. Repeatable.
    #[arg(long = "clone-zone", value_name = "ZONE")]
    pub(crate) clone_zones: Vec<String>,
    /// Command run on the build server before it is stopped. Repeatable.
    #[arg(long = "provision", value_name = "COMMAND")]
    pub(crate) provision_commands: Vec<String>,
}
