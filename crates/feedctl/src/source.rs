//! `feedctl source`: parse, validate and dispatch source-management requests.
//!
//! The processor is a strictly linear pipeline over a [`SourceCommandSpec`]:
//! [`SourceRegistryProcessor::parse_command`] → [`SourceRegistryProcessor::validate`]
//! → [`SourceRegistryProcessor::dispatch`]. Every step fails closed and none
//! of them touch persisted state; that belongs to the [`RegistryService`].

use std::fmt;

use anyhow::Result;
use thiserror::Error;

/// Source-management sub-commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SourceCommand {
    #[default]
    List,
    Add,
    Remove,
    Disable,
    Enable,
}

impl SourceCommand {
    pub const ALL: [SourceCommand; 5] = [
        SourceCommand::List,
        SourceCommand::Add,
        SourceCommand::Remove,
        SourceCommand::Disable,
        SourceCommand::Enable,
    ];

    /// Case-insensitive parse. `None` for anything that is not a sub-command
    /// name, including the empty string; callers decide the fallback.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.as_str().eq_ignore_ascii_case(token.trim()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceCommand::List => "list",
            SourceCommand::Add => "add",
            SourceCommand::Remove => "remove",
            SourceCommand::Disable => "disable",
            SourceCommand::Enable => "enable",
        }
    }

    /// Everything except `list` identifies a single source.
    pub fn requires_name(self) -> bool {
        self != SourceCommand::List
    }
}

impl fmt::Display for SourceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed source-management request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceCommandSpec {
    pub command: SourceCommand,
    pub name: Option<String>,
    /// Feed URL or file-system location. Empty when not given.
    pub source: String,
    pub username: Option<String>,
    /// Plain-text password as typed; the registry service encrypts it.
    pub password: Option<String>,
    /// Positional tokens joined by a single space, for diagnostics.
    pub input: String,
}

impl SourceCommandSpec {
    /// The name, if present and not blank.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("A single sources command must be listed. Please see the help menu for those commands")]
    TooManyArguments,

    #[error("When specifying the subcommand '{command}', you must also specify --name.")]
    MissingRequiredField { command: SourceCommand },
}

/// Persistent source store behind `feedctl source`.
///
/// `noop` is the dry-run counterpart of every mutating call and receives the
/// same spec.
pub trait RegistryService {
    fn list(&mut self, spec: &SourceCommandSpec) -> Result<()>;
    fn add(&mut self, spec: &SourceCommandSpec) -> Result<()>;
    fn remove(&mut self, spec: &SourceCommandSpec) -> Result<()>;
    fn disable(&mut self, spec: &SourceCommandSpec) -> Result<()>;
    fn enable(&mut self, spec: &SourceCommandSpec) -> Result<()>;
    fn noop(&mut self, spec: &SourceCommandSpec) -> Result<()>;
}

/// Stateless processor for the `source` command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceRegistryProcessor;

impl SourceRegistryProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the sub-command from the positional tokens left after flag
    /// extraction. An unknown or missing sub-command means `list`.
    pub fn parse_command(
        &self,
        positional: &[String],
        spec: &mut SourceCommandSpec,
    ) -> Result<(), SourceError> {
        spec.input = positional.join(" ");

        if positional.len() > 1 {
            return Err(SourceError::TooManyArguments);
        }

        let token = positional.first().map(String::as_str).unwrap_or_default();
        spec.command = SourceCommand::parse(token).unwrap_or(SourceCommand::List);

        Ok(())
    }

    pub fn validate(&self, spec: &SourceCommandSpec) -> Result<(), SourceError> {
        if spec.command.requires_name() && spec.name().is_none() {
            return Err(SourceError::MissingRequiredField {
                command: spec.command,
            });
        }

        Ok(())
    }

    /// Route to exactly one registry capability.
    pub fn dispatch(
        &self,
        spec: &SourceCommandSpec,
        registry: &mut dyn RegistryService,
    ) -> Result<()> {
        match spec.command {
            SourceCommand::List => registry.list(spec),
            SourceCommand::Add => registry.add(spec),
            SourceCommand::Remove => registry.remove(spec),
            SourceCommand::Disable => registry.disable(spec),
            SourceCommand::Enable => registry.enable(spec),
        }
    }

    /// Dry-run counterpart of [`dispatch`](Self::dispatch).
    pub fn dispatch_noop(
        &self,
        spec: &SourceCommandSpec,
        registry: &mut dyn RegistryService,
    ) -> Result<()> {
        registry.noop(spec)
    }

    /// Parse and validate. Needs no registry, so argument errors surface
    /// before any persisted state is read.
    pub fn prepare(
        &self,
        positional: &[String],
        mut spec: SourceCommandSpec,
    ) -> Result<SourceCommandSpec, SourceError> {
        self.parse_command(positional, &mut spec)?;
        self.validate(&spec)?;
        Ok(spec)
    }

    /// Dispatch a prepared spec, or its dry run when `noop` is set.
    pub fn execute(
        &self,
        spec: &SourceCommandSpec,
        registry: &mut dyn RegistryService,
        noop: bool,
    ) -> Result<()> {
        if noop {
            self.dispatch_noop(spec, registry)
        } else {
            self.dispatch(spec, registry)
        }
    }

    /// [`prepare`](Self::prepare) then [`execute`](Self::execute).
    pub fn run(
        &self,
        positional: &[String],
        spec: SourceCommandSpec,
        registry: &mut dyn RegistryService,
        noop: bool,
    ) -> Result<()> {
        let spec = self.prepare(positional, spec)?;
        self.execute(&spec, registry, noop)
    }

    pub fn help_message() -> &'static str {
        HELP
    }
}

const HELP: &str = "\
Interact with package feed sources.

Usage: feedctl source [list]|add|remove|disable|enable [options]

Examples:

 feedctl source
 feedctl source list
 feedctl source add -n=bob -s=https://somewhere/out/there/api/v2/
 feedctl source add -n=bob -s=https://somewhere/out/there/api/v2/ -u=bob -p=12345
 feedctl source disable -n=bob
 feedctl source enable -n=bob
 feedctl source remove -n=bob
";
