//! CLI argument parsing for crewfile.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Crewfile: declarative crew assembly for agent orchestration.
///
/// A crew document declares agents and their tasks in templated YAML.
/// These commands render, validate, and assemble such documents without
/// executing anything.
#[derive(Parser, Debug)]
#[command(name = "crewfile")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for crewfile.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a crew document.
    ///
    /// Renders the template, parses the YAML, and builds the registry,
    /// reporting the first error found or a summary of the declarations.
    Validate(ValidateArgs),

    /// Show the declarations in a crew document.
    ///
    /// Prints each agent with its tasks and context links, or a single
    /// agent when --agent is given.
    Show(ShowArgs),

    /// Assemble a crew plan and print it as JSON.
    ///
    /// Selects agents (all by default), assigns every declared task in
    /// declaration order with its declared context, and prints the
    /// resulting plan.
    Plan(PlanArgs),
}

/// Arguments for the `validate` command.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to the crew document.
    pub file: PathBuf,

    /// Template variable as KEY=VALUE (repeatable).
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,
}

/// Arguments for the `show` command.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Path to the crew document.
    pub file: PathBuf,

    /// Template variable as KEY=VALUE (repeatable).
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Show only this agent.
    #[arg(long)]
    pub agent: Option<String>,
}

/// Arguments for the `plan` command.
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Path to the crew document.
    pub file: PathBuf,

    /// Template variable as KEY=VALUE (repeatable).
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Agents to select (default: all declared agents).
    #[arg(long, value_delimiter = ',')]
    pub agents: Vec<String>,

    /// Fail on unresolved references instead of dropping them.
    #[arg(long)]
    pub strict: bool,

    /// Topologically sort assignments by context before resolving.
    #[arg(long)]
    pub sorted: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
