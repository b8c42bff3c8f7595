//! Crew manager: document loading, reload, and registry snapshots.
//!
//! The manager owns the one piece of shared state in the crate: the current
//! registry. Reload follows a replace-whole-reference discipline: the new
//! registry is built completely off to the side, and only on success is the
//! shared `Arc` swapped. A failed reload leaves the previous registry intact,
//! and concurrent readers always observe either the fully-old or fully-new
//! registry, never a mixture.

use crate::error::{CrewError, Result};
use crate::registry::{AgentDeclaration, Registry, TaskDeclaration};
use crate::schema::CrewDocument;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Where the document text comes from on load and reload.
#[derive(Debug, Clone)]
enum DocumentSource {
    /// Re-read from this path on every reload.
    File(PathBuf),
    /// Fixed in-memory text (tests, CLI stdin, embedded documents).
    Inline(String),
}

impl DocumentSource {
    fn read(&self) -> Result<String> {
        match self {
            DocumentSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                CrewError::Io(format!(
                    "failed to read crew document '{}': {}",
                    path.display(),
                    e
                ))
            }),
            DocumentSource::Inline(text) => Ok(text.clone()),
        }
    }
}

/// Loads a templated crew document and serves registry snapshots.
#[derive(Debug)]
pub struct CrewManager {
    source: DocumentSource,
    variables: RwLock<HashMap<String, String>>,
    registry: RwLock<Arc<Registry>>,
}

impl CrewManager {
    /// Load a crew document from a file, rendering `variables` into it.
    pub fn load<P: AsRef<Path>>(path: P, variables: HashMap<String, String>) -> Result<Self> {
        Self::from_source(DocumentSource::File(path.as_ref().to_path_buf()), variables)
    }

    /// Load a crew document from an in-memory string.
    pub fn from_yaml(text: &str, variables: HashMap<String, String>) -> Result<Self> {
        Self::from_source(DocumentSource::Inline(text.to_string()), variables)
    }

    fn from_source(source: DocumentSource, variables: HashMap<String, String>) -> Result<Self> {
        let registry = build_registry(&source, &variables)?;
        Ok(Self {
            source,
            variables: RwLock::new(variables),
            registry: RwLock::new(Arc::new(registry)),
        })
    }

    /// Re-read and re-render the document with a new variable mapping, then
    /// atomically replace the registry.
    ///
    /// On any error the previous registry (and the previous variables) remain
    /// in effect; reload never partially applies.
    pub fn reload(&self, new_variables: HashMap<String, String>) -> Result<()> {
        let registry = build_registry(&self.source, &new_variables)?;

        *self.variables.write().expect("variables lock poisoned") = new_variables;
        *self.registry.write().expect("registry lock poisoned") = Arc::new(registry);
        Ok(())
    }

    /// A consistent snapshot of the current registry.
    ///
    /// The snapshot is immutable and unaffected by later reloads; callers
    /// that need a stable view across several lookups should take one
    /// snapshot and query it.
    pub fn snapshot(&self) -> Arc<Registry> {
        Arc::clone(&self.registry.read().expect("registry lock poisoned"))
    }

    /// Retrieve an agent declaration by name from the current registry.
    pub fn get_agent(&self, name: &str) -> Option<AgentDeclaration> {
        self.snapshot().agent(name).cloned()
    }

    /// Retrieve a task declaration by agent name and task name.
    pub fn get_task(&self, agent_name: &str, task_name: &str) -> Option<TaskDeclaration> {
        self.snapshot().task(agent_name, task_name).cloned()
    }
}

fn build_registry(
    source: &DocumentSource,
    variables: &HashMap<String, String>,
) -> Result<Registry> {
    let text = source.read()?;
    let doc = CrewDocument::render_and_parse(&text, variables)?;
    Registry::build(&doc)
}
