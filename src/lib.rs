//! Crewfile: declarative crew assembly for agent orchestration.
//!
//! A crew is declared once, in a templated YAML document: agents with roles,
//! goals, and backstories, each owning named tasks with expected outputs and
//! context dependencies on other tasks. This crate renders the template,
//! validates the declarations into a name-indexed registry, and assembles a
//! `CrewPlan` (agent specs plus resolved tasks with instance-level context
//! links) for an external execution engine to run.
//!
//! The crate constructs the input graph only: it does not execute agents,
//! hold conversation state, or talk to model backends. Model selection is a
//! name that the [`model::ModelCatalog`] resolves lazily into a client
//! configuration.
//!
//! # Example
//!
//! ```
//! use crewfile::{assemble, AssemblyOptions, CrewManager, InvocationSettings, TaskAssignment};
//! use crewfile::template::vars;
//! use std::collections::BTreeMap;
//!
//! let doc = r#"
//! agents:
//!   - name: extractor
//!     role: "Metadata Extractor"
//!     goal: "Extract metadata from {{ text }}"
//!     description: "An analyst trained on document structure."
//!     tasks:
//!       - name: metadata_task
//!         description: "Extract metadata."
//!         expected_output: "A JSON object of metadata fields."
//!       - name: summary_task
//!         description: "Summarize the metadata."
//!         expected_output: "A short prose summary."
//! "#;
//!
//! let manager = CrewManager::from_yaml(doc, vars([("text", "the annual report")]))?;
//! let registry = manager.snapshot();
//!
//! let settings = BTreeMap::from([(
//!     "extractor".to_string(),
//!     InvocationSettings::with_llm("groq-8b"),
//! )]);
//! let assignments = [
//!     TaskAssignment::new("metadata_task"),
//!     TaskAssignment::with_context("summary_task", ["metadata_task"]),
//! ];
//!
//! let plan = assemble(&registry, &settings, &assignments, AssemblyOptions::default())?;
//! assert_eq!(plan.tasks[1].context[0].name, "metadata_task");
//! # Ok::<(), crewfile::CrewError>(())
//! ```

pub mod assemble;
pub mod error;
pub mod exit_codes;
pub mod manager;
pub mod model;
pub mod registry;
pub mod schema;
pub mod template;

pub use assemble::{
    assemble, merge_settings, AgentSpec, AssemblyOptions, CrewPlan, InvocationSettings,
    OrderPolicy, ResolutionMode, ResolvedTask, TaskAssignment,
};
pub use error::{CrewError, RefKind, Result};
pub use manager::CrewManager;
pub use registry::{AgentDeclaration, Registry, TaskDeclaration};
pub use schema::CrewDocument;
