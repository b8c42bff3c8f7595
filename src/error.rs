//! Error types for crewfile.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use crate::template::TemplateError;
use std::fmt;
use thiserror::Error;

/// Which kind of name failed to resolve during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// An agent name in the invocation settings map.
    Agent,
    /// A task name in an assignment.
    Task,
    /// A context task name in an assignment.
    Context,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::Agent => write!(f, "agent"),
            RefKind::Task => write!(f, "task"),
            RefKind::Context => write!(f, "context task"),
        }
    }
}

/// Main error type for crewfile operations.
#[derive(Error, Debug)]
pub enum CrewError {
    /// The document structure could not be parsed or failed validation.
    #[error("failed to parse crew document: {0}")]
    ConfigParse(String),

    /// Template rendering failed (undefined variable or bad syntax).
    #[error("template rendering failed: {0}")]
    TemplateRender(#[from] TemplateError),

    /// A declaration is missing a required field.
    #[error("{entity} is missing required field '{field}'")]
    MissingField {
        /// The declaration the field belongs to (e.g. `agent 'researcher'`).
        entity: String,
        /// The missing field name.
        field: String,
    },

    /// Two declarations in the same scope share a name.
    #[error("duplicate name '{name}' in {scope}")]
    DuplicateName {
        /// The scope of the collision (e.g. `agents`, `tasks of agent 'x'`).
        scope: String,
        /// The colliding name.
        name: String,
    },

    /// A model selector named no registered factory. Raised lazily by the
    /// model catalog, never during settings merge.
    #[error("unknown model selector '{0}'")]
    UnknownModelSelector(String),

    /// Strict assembly found a reference that names nothing.
    #[error("unresolved {kind} reference '{name}'")]
    UnresolvedReference {
        /// What kind of name failed to resolve.
        kind: RefKind,
        /// The offending name.
        name: String,
    },

    /// Topological ordering found a cycle in the assignment context graph.
    #[error("cyclic task dependency involving '{0}'")]
    CyclicDependency(String),

    /// File I/O failed, or caller input was malformed.
    #[error("{0}")]
    Io(String),
}

impl CrewError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            CrewError::ConfigParse(_)
            | CrewError::TemplateRender(_)
            | CrewError::MissingField { .. }
            | CrewError::DuplicateName { .. } => exit_codes::PARSE_FAILURE,
            CrewError::UnknownModelSelector(_)
            | CrewError::UnresolvedReference { .. }
            | CrewError::CyclicDependency(_) => exit_codes::ASSEMBLY_FAILURE,
            CrewError::Io(_) => exit_codes::USER_ERROR,
        }
    }
}

/// Result type alias for crewfile operations.
pub type Result<T> = std::result::Result<T, CrewError>;
