//! Agent/task registry built from a parsed crew document.
//!
//! This module converts the raw declaration tree into validated, immutable
//! `AgentDeclaration`/`TaskDeclaration` records indexed by name. The registry
//! preserves declaration order: iterating agents (and each agent's tasks)
//! yields them exactly as written in the document, which is what the
//! assembler relies on for output ordering.

use crate::error::{CrewError, Result};
use crate::schema::{CrewDocument, RawAgent, RawTask};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Default iteration cap for agents that do not declare one.
const DEFAULT_MAX_ITER: u32 = 25;

/// Regex pattern for valid agent and task names.
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("Invalid name regex"));

/// A validated agent declaration.
///
/// Created at load time and immutable afterward; a reload replaces the whole
/// registry rather than mutating declarations in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDeclaration {
    /// Unique agent name (registry key).
    pub name: String,
    /// The role the agent plays.
    pub role: String,
    /// The goal the agent works toward.
    pub goal: String,
    /// Backstory text handed to the execution engine.
    pub description: String,
    /// Default model selector, if declared.
    pub llm: Option<String>,
    /// Whether the agent may delegate work.
    pub allow_delegation: bool,
    /// Iteration cap (defaults to 25).
    pub max_iter: u32,
    /// Requests-per-minute cap, if declared.
    pub max_rpm: Option<u32>,
    /// Default verbosity flag.
    pub verbose: bool,
    /// Tool names available to the agent.
    pub tools: Vec<String>,

    tasks: Vec<TaskDeclaration>,
    task_index: HashMap<String, usize>,
}

impl AgentDeclaration {
    /// Retrieve a task owned by this agent, by name.
    pub fn task(&self, name: &str) -> Option<&TaskDeclaration> {
        self.task_index.get(name).map(|&i| &self.tasks[i])
    }

    /// Iterate over this agent's tasks in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskDeclaration> {
        self.tasks.iter()
    }

    /// Number of tasks owned by this agent.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

/// A validated task declaration, owned by exactly one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDeclaration {
    /// Task name, unique within the owning agent.
    pub name: String,
    /// What the task does.
    pub description: String,
    /// Specification of the expected output.
    pub expected_output: String,
    /// Tool names available to the task.
    pub tools: Vec<String>,
    /// Names of tasks whose output this task consumes.
    pub context: Vec<String>,
}

/// The name-indexed store of all declared agents and tasks.
///
/// Built atomically from a document: any validation failure aborts the build
/// and no registry is produced.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    agents: Vec<AgentDeclaration>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    /// Build a registry from a parsed document.
    ///
    /// Validation rules:
    /// - every agent needs `name`, `role`, `goal`, `description`
    /// - every task needs `name`, `description`, `expected_output`
    /// - agent and task names must match `[A-Za-z_][A-Za-z0-9_-]*`
    /// - agent names are unique; task names are unique within their agent
    pub fn build(doc: &CrewDocument) -> Result<Self> {
        let mut registry = Registry::default();

        for (position, raw) in doc.agents.iter().enumerate() {
            let agent = build_agent(raw, position)?;

            if registry.by_name.contains_key(&agent.name) {
                return Err(CrewError::DuplicateName {
                    scope: "agents".to_string(),
                    name: agent.name,
                });
            }

            registry
                .by_name
                .insert(agent.name.clone(), registry.agents.len());
            registry.agents.push(agent);
        }

        Ok(registry)
    }

    /// Retrieve an agent declaration by name.
    pub fn agent(&self, name: &str) -> Option<&AgentDeclaration> {
        self.by_name.get(name).map(|&i| &self.agents[i])
    }

    /// Retrieve a task declaration by agent name and task name.
    pub fn task(&self, agent_name: &str, task_name: &str) -> Option<&TaskDeclaration> {
        self.agent(agent_name).and_then(|a| a.task(task_name))
    }

    /// Iterate over all agents in declaration order.
    pub fn agents(&self) -> impl Iterator<Item = &AgentDeclaration> {
        self.agents.iter()
    }

    /// Number of declared agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry has no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

fn build_agent(raw: &RawAgent, position: usize) -> Result<AgentDeclaration> {
    let name = require(&raw.name, &format!("agent at position {}", position), "name")?;
    validate_name(&name, "agent")?;

    let entity = format!("agent '{}'", name);
    let role = require(&raw.role, &entity, "role")?;
    let goal = require(&raw.goal, &entity, "goal")?;
    let description = require(&raw.description, &entity, "description")?;

    let mut tasks = Vec::with_capacity(raw.tasks.len());
    let mut task_index = HashMap::with_capacity(raw.tasks.len());

    for (task_position, raw_task) in raw.tasks.iter().enumerate() {
        let task = build_task(raw_task, &name, task_position)?;

        if task_index.contains_key(&task.name) {
            return Err(CrewError::DuplicateName {
                scope: format!("tasks of agent '{}'", name),
                name: task.name,
            });
        }

        task_index.insert(task.name.clone(), tasks.len());
        tasks.push(task);
    }

    Ok(AgentDeclaration {
        name,
        role,
        goal,
        description,
        llm: raw.llm.clone(),
        allow_delegation: raw.delegation,
        max_iter: raw.max_iter.unwrap_or(DEFAULT_MAX_ITER),
        max_rpm: raw.max_rpm,
        verbose: raw.verbose,
        tools: raw.tools.clone(),
        tasks,
        task_index,
    })
}

fn build_task(raw: &RawTask, agent_name: &str, position: usize) -> Result<TaskDeclaration> {
    let name = require(
        &raw.name,
        &format!("task at position {} of agent '{}'", position, agent_name),
        "name",
    )?;
    validate_name(&name, "task")?;

    let entity = format!("task '{}' of agent '{}'", name, agent_name);
    let description = require(&raw.description, &entity, "description")?;
    let expected_output = require(&raw.expected_output, &entity, "expected_output")?;

    Ok(TaskDeclaration {
        name,
        description,
        expected_output,
        tools: raw.tools.clone(),
        context: raw.context.clone(),
    })
}

fn require(field: &Option<String>, entity: &str, field_name: &str) -> Result<String> {
    match field {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(CrewError::MissingField {
            entity: entity.to_string(),
            field: field_name.to_string(),
        }),
    }
}

fn validate_name(name: &str, kind: &str) -> Result<()> {
    if !NAME_REGEX.is_match(name) {
        return Err(CrewError::ConfigParse(format!(
            "invalid {} name '{}': names must start with a letter or underscore \
             and contain only letters, digits, '_' or '-'",
            kind, name
        )));
    }
    Ok(())
}
