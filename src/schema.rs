//! Raw document schema for crew documents.
//!
//! This module defines the YAML shape of a crew document and the two-stage
//! loading pipeline: template rendering over the raw text, then structural
//! parsing into a declaration tree.
//!
//! # File Format
//!
//! ```yaml
//! agents:
//!   - name: metadata_extraction_agent
//!     role: "Metadata Extractor"
//!     goal: "Extract structured metadata from {{ text }}"
//!     description: "An analyst trained to pull metadata out of raw text."
//!     delegation: false
//!     tasks:
//!       - name: metadata_task
//!         description: "Extract metadata from the provided text."
//!         expected_output: "A JSON object of metadata fields."
//!       - name: summary_task
//!         description: "Summarize the extracted metadata."
//!         expected_output: "A short prose summary."
//!         context:
//!           - metadata_task
//! ```
//!
//! Required fields (role, goal, description, task name, task description,
//! expected_output) are optional at this layer so that a missing field
//! surfaces as a `MissingField` error naming the offending entity, rather
//! than as an opaque YAML deserialization failure. The registry builder
//! performs that validation.

use crate::error::{CrewError, Result};
use crate::template;
use serde::Deserialize;
use std::collections::HashMap;

/// A parsed crew document: the declaration tree before validation.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrewDocument {
    /// Agent declarations in document order.
    pub agents: Vec<RawAgent>,
}

/// One agent entry as written in the document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAgent {
    /// Unique agent name, used as the registry key.
    pub name: Option<String>,

    /// The role the agent plays (required).
    pub role: Option<String>,

    /// The goal the agent works toward (required).
    pub goal: Option<String>,

    /// Backstory text handed to the execution engine (required).
    pub description: Option<String>,

    /// Whether the agent may delegate work to other agents.
    pub delegation: bool,

    /// Default model selector for this agent.
    pub llm: Option<String>,

    /// Iteration cap passed through to the execution engine.
    pub max_iter: Option<u32>,

    /// Requests-per-minute cap passed through to the execution engine.
    pub max_rpm: Option<u32>,

    /// Default verbosity flag.
    pub verbose: bool,

    /// Tool names available to the agent.
    pub tools: Vec<String>,

    /// Task declarations owned by this agent, in document order.
    pub tasks: Vec<RawTask>,
}

/// One task entry as written in the document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTask {
    /// Task name, unique within the owning agent (required).
    pub name: Option<String>,

    /// What the task does (required).
    pub description: Option<String>,

    /// Specification of the expected output (required).
    pub expected_output: Option<String>,

    /// Tool names available to the task.
    pub tools: Vec<String>,

    /// Names of tasks whose output this task consumes. Forward references
    /// are allowed at declaration time.
    pub context: Vec<String>,
}

impl CrewDocument {
    /// Parse a crew document from a YAML string.
    ///
    /// Unknown fields are silently ignored for forward compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| CrewError::ConfigParse(e.to_string()))
    }

    /// Render the template variables into the raw text, then parse.
    ///
    /// This is the full document-loading pipeline minus file I/O: rendering
    /// failures surface as `TemplateRender`, structural failures as
    /// `ConfigParse`.
    pub fn render_and_parse(text: &str, variables: &HashMap<String, String>) -> Result<Self> {
        let rendered = template::render(text, variables)?;
        Self::from_yaml(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::vars;

    #[test]
    fn test_parse_minimal_document() {
        let yaml = r#"
agents:
  - name: solo
    role: "Worker"
    goal: "Do the work"
    description: "A worker."
    tasks:
      - name: only_task
        description: "The single task."
        expected_output: "Done."
"#;
        let doc = CrewDocument::from_yaml(yaml).unwrap();
        assert_eq!(doc.agents.len(), 1);

        let agent = &doc.agents[0];
        assert_eq!(agent.name.as_deref(), Some("solo"));
        assert_eq!(agent.role.as_deref(), Some("Worker"));
        assert!(!agent.delegation);
        assert_eq!(agent.tasks.len(), 1);
        assert_eq!(agent.tasks[0].name.as_deref(), Some("only_task"));
        assert!(agent.tasks[0].context.is_empty());
    }

    #[test]
    fn test_parse_full_document() {
        let yaml = r#"
agents:
  - name: extractor
    role: "Extractor"
    goal: "Extract metadata"
    description: "Pulls metadata out of text."
    delegation: true
    llm: groq-8b
    max_iter: 10
    max_rpm: 30
    verbose: true
    tools:
      - web_search
    tasks:
      - name: metadata_task
        description: "Extract metadata."
        expected_output: "JSON metadata."
      - name: question_task
        description: "Extract questions."
        expected_output: "A question list."
        tools:
          - calculator
        context:
          - metadata_task
"#;
        let doc = CrewDocument::from_yaml(yaml).unwrap();
        let agent = &doc.agents[0];

        assert!(agent.delegation);
        assert_eq!(agent.llm.as_deref(), Some("groq-8b"));
        assert_eq!(agent.max_iter, Some(10));
        assert_eq!(agent.max_rpm, Some(30));
        assert!(agent.verbose);
        assert_eq!(agent.tools, vec!["web_search"]);

        let question = &agent.tasks[1];
        assert_eq!(question.tools, vec!["calculator"]);
        assert_eq!(question.context, vec!["metadata_task"]);
    }

    #[test]
    fn test_missing_fields_parse_as_none() {
        // Field-level validation happens in the registry builder, not here.
        let yaml = r#"
agents:
  - name: incomplete
    tasks:
      - name: bare_task
"#;
        let doc = CrewDocument::from_yaml(yaml).unwrap();
        let agent = &doc.agents[0];
        assert!(agent.role.is_none());
        assert!(agent.tasks[0].description.is_none());
    }

    #[test]
    fn test_empty_document() {
        let doc = CrewDocument::from_yaml("").unwrap();
        assert!(doc.agents.is_empty());
    }

    #[test]
    fn test_malformed_structure_fails() {
        let result = CrewDocument::from_yaml("agents: 5");
        assert!(matches!(result, Err(CrewError::ConfigParse(_))));

        let result = CrewDocument::from_yaml("agents:\n  - tasks: not_a_list");
        assert!(matches!(result, Err(CrewError::ConfigParse(_))));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let yaml = r#"
future_top_level: true
agents:
  - name: a
    role: r
    goal: g
    description: d
    future_field: "ignored"
    tasks: []
"#;
        let doc = CrewDocument::from_yaml(yaml).unwrap();
        assert_eq!(doc.agents.len(), 1);
    }

    #[test]
    fn test_render_and_parse() {
        let text = r#"
agents:
  - name: extractor
    role: "Extractor"
    goal: "Extract metadata from {{ text }}"
    description: "Works on {{ text }}."
    tasks: []
"#;
        let vars = vars([("text", "the quarterly report")]);
        let doc = CrewDocument::render_and_parse(text, &vars).unwrap();
        assert_eq!(
            doc.agents[0].goal.as_deref(),
            Some("Extract metadata from the quarterly report")
        );
    }

    #[test]
    fn test_render_and_parse_undefined_variable() {
        let text = "agents:\n  - name: {{ missing }}\n";
        let result = CrewDocument::render_and_parse(text, &HashMap::new());
        assert!(matches!(result, Err(CrewError::TemplateRender(_))));
    }
}
