//! Crew assembly: settings merge, context resolution, and plan construction.
//!
//! This module turns a registry plus caller-supplied invocation settings and
//! task assignments into a `CrewPlan`: the two ordered collections (agent
//! specs, resolved tasks) an external execution engine consumes.
//!
//! # Resolution contract
//!
//! The resolver makes a single forward pass over the assignments in caller
//! order. A task's context list is built from the running map of
//! already-resolved instances, so an assignment can only see context tasks
//! that appear *earlier* in the list. The caller orders, the resolver trusts:
//! there is no reordering and no cycle detection unless the caller opts into
//! `OrderPolicy::Topological`, which pre-sorts the assignments and rejects
//! cycles.
//!
//! In the default `Lenient` mode, names that resolve to nothing (a task no
//! selected agent owns, a context task not yet resolved) are silently
//! dropped. `Strict` mode promotes every such omission to an
//! `UnresolvedReference` error.

use crate::error::{CrewError, RefKind, Result};
use crate::registry::{AgentDeclaration, Registry};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Per-assembly override bundle for one agent.
///
/// The merge is flat and right-biased: every field here replaces its
/// counterpart on the declaration, including `llm: None` clearing a declared
/// default selector. There is no field-by-field null-coalescing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationSettings {
    /// Model selector override. `None` clears the declared default.
    pub llm: Option<String>,
    /// Whether the engine should give the agent memory.
    pub memory: bool,
    /// Verbosity override.
    pub verbose: bool,
}

impl InvocationSettings {
    /// Settings that select a model and leave the flags off.
    pub fn with_llm(selector: impl Into<String>) -> Self {
        Self {
            llm: Some(selector.into()),
            ..Self::default()
        }
    }
}

/// Caller instruction: instantiate the named task with the named context.
///
/// The position of an assignment in the list is load-bearing: context
/// references only resolve against assignments that came before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAssignment {
    /// Name of a declared task to instantiate.
    pub task_name: String,
    /// Names of previously-assigned tasks whose output this one consumes.
    pub context: Vec<String>,
}

impl TaskAssignment {
    /// An assignment with no context links.
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            context: Vec::new(),
        }
    }

    /// An assignment consuming the listed context tasks.
    pub fn with_context<I, S>(task_name: impl Into<String>, context: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            task_name: task_name.into(),
            context: context.into_iter().map(Into::into).collect(),
        }
    }
}

/// Fully-merged agent construction record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    /// Agent name, kept for plan output.
    pub name: String,
    /// Role from the declaration.
    pub role: String,
    /// Goal from the declaration.
    pub goal: String,
    /// Backstory (the declaration's description).
    pub backstory: String,
    /// Tools from the declaration.
    pub tools: Vec<String>,
    /// Delegation flag from the declaration.
    pub allow_delegation: bool,
    /// Iteration cap from the declaration.
    pub max_iter: u32,
    /// Rate cap from the declaration.
    pub max_rpm: Option<u32>,
    /// Model selector from the override bundle.
    pub llm: Option<String>,
    /// Memory flag from the override bundle.
    pub memory: bool,
    /// Verbosity from the override bundle.
    pub verbose: bool,
}

/// One materialized task: declaration data bound to its agent instance and
/// its resolved context instances.
#[derive(Debug, Clone)]
pub struct ResolvedTask {
    /// The assignment's task name (the key later assignments resolve against).
    pub name: String,
    /// Description from the declaration.
    pub description: String,
    /// Expected output from the declaration.
    pub expected_output: String,
    /// Tools from the declaration.
    pub tools: Vec<String>,
    /// The pre-built agent instance that owns this task.
    pub agent: Arc<AgentSpec>,
    /// Resolved context instances, not names.
    pub context: Vec<Arc<ResolvedTask>>,
}

/// The assembled crew: agents in selection order, tasks in resolution order.
#[derive(Debug, Clone, Default)]
pub struct CrewPlan {
    /// Agent instances, registry declaration order intersected with selection.
    pub agents: Vec<Arc<AgentSpec>>,
    /// Resolved task instances in the order they were processed.
    pub tasks: Vec<Arc<ResolvedTask>>,
}

impl CrewPlan {
    /// Render the plan as JSON for inspection. Context links are rendered as
    /// task names to keep the output finite.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "agents": self.agents.iter().map(|a| json!({
                "name": a.name,
                "role": a.role,
                "goal": a.goal,
                "backstory": a.backstory,
                "tools": a.tools,
                "allow_delegation": a.allow_delegation,
                "max_iter": a.max_iter,
                "max_rpm": a.max_rpm,
                "llm": a.llm,
                "memory": a.memory,
                "verbose": a.verbose,
            })).collect::<Vec<_>>(),
            "tasks": self.tasks.iter().map(|t| json!({
                "name": t.name,
                "description": t.description,
                "expected_output": t.expected_output,
                "tools": t.tools,
                "agent": t.agent.name,
                "context": t.context.iter().map(|c| c.name.clone()).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
        })
    }
}

/// How unresolved names are handled during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionMode {
    /// Silently drop names that resolve to nothing (historical behavior).
    #[default]
    Lenient,
    /// Fail with `UnresolvedReference` on any name that resolves to nothing.
    Strict,
}

/// How the assignment list is ordered before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderPolicy {
    /// Trust the caller's order. Forward references never resolve.
    #[default]
    CallerOrder,
    /// Topologically sort assignments by their context edges first, failing
    /// with `CyclicDependency` when the context graph has a cycle.
    Topological,
}

/// Assembly knobs. The default reproduces the historical lenient,
/// caller-ordered behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblyOptions {
    /// Unresolved-name policy.
    pub mode: ResolutionMode,
    /// Assignment ordering policy.
    pub order: OrderPolicy,
}

/// Merge an agent declaration with an invocation override bundle.
///
/// Declared fields (role, goal, backstory, tools, delegation, caps) form the
/// base; the override fields (llm, memory, verbose) are layered on top and
/// always win. Model selectors are not validated here; a bad selector fails
/// lazily at the model catalog.
pub fn merge_settings(decl: &AgentDeclaration, settings: &InvocationSettings) -> AgentSpec {
    AgentSpec {
        name: decl.name.clone(),
        role: decl.role.clone(),
        goal: decl.goal.clone(),
        backstory: decl.description.clone(),
        tools: decl.tools.clone(),
        allow_delegation: decl.allow_delegation,
        max_iter: decl.max_iter,
        max_rpm: decl.max_rpm,
        llm: settings.llm.clone(),
        memory: settings.memory,
        verbose: settings.verbose,
    }
}

/// Assemble a crew plan from the registry.
///
/// Only agents named in `settings` participate; registry agents not selected
/// are excluded entirely, along with their tasks. Assignments are processed
/// per `options.order`, and each one binds to the first selected agent (in
/// registry order) that owns the task name.
pub fn assemble(
    registry: &Registry,
    settings: &BTreeMap<String, InvocationSettings>,
    assignments: &[TaskAssignment],
    options: AssemblyOptions,
) -> Result<CrewPlan> {
    if options.mode == ResolutionMode::Strict {
        for name in settings.keys() {
            if registry.agent(name).is_none() {
                return Err(CrewError::UnresolvedReference {
                    kind: RefKind::Agent,
                    name: name.clone(),
                });
            }
        }
    }

    // Selection filter: registry declaration order intersected with settings.
    let selected: Vec<(&AgentDeclaration, Arc<AgentSpec>)> = registry
        .agents()
        .filter_map(|decl| {
            settings
                .get(&decl.name)
                .map(|s| (decl, Arc::new(merge_settings(decl, s))))
        })
        .collect();

    let ordered: Vec<&TaskAssignment> = match options.order {
        OrderPolicy::CallerOrder => assignments.iter().collect(),
        OrderPolicy::Topological => topological_order(assignments)?,
    };

    let mut tasks: Vec<Arc<ResolvedTask>> = Vec::with_capacity(ordered.len());
    let mut resolved: HashMap<String, Arc<ResolvedTask>> = HashMap::new();

    for assignment in ordered {
        // First selected agent owning this task name.
        let owner = selected
            .iter()
            .find_map(|(decl, spec)| decl.task(&assignment.task_name).map(|t| (t, spec)));

        let (task_decl, agent_spec) = match owner {
            Some(found) => found,
            None if options.mode == ResolutionMode::Strict => {
                return Err(CrewError::UnresolvedReference {
                    kind: RefKind::Task,
                    name: assignment.task_name.clone(),
                });
            }
            None => continue,
        };

        let mut context = Vec::with_capacity(assignment.context.len());
        for ctx_name in &assignment.context {
            match resolved.get(ctx_name) {
                Some(instance) => context.push(Arc::clone(instance)),
                None if options.mode == ResolutionMode::Strict => {
                    return Err(CrewError::UnresolvedReference {
                        kind: RefKind::Context,
                        name: ctx_name.clone(),
                    });
                }
                None => {}
            }
        }

        let instance = Arc::new(ResolvedTask {
            name: assignment.task_name.clone(),
            description: task_decl.description.clone(),
            expected_output: task_decl.expected_output.clone(),
            tools: task_decl.tools.clone(),
            agent: Arc::clone(agent_spec),
            context,
        });

        tasks.push(Arc::clone(&instance));
        // Aliasing: a repeated assignment name overwrites the earlier entry,
        // so later context lookups see the newest instance.
        resolved.insert(assignment.task_name.clone(), instance);
    }

    Ok(CrewPlan {
        agents: selected.into_iter().map(|(_, spec)| spec).collect(),
        tasks,
    })
}

/// Order assignments so every context provider precedes its dependents.
///
/// Builds a directed graph with one node per assignment and an edge from each
/// context provider to its dependent, then topologically sorts it. Context
/// names that match no assignment get no edge; they are handled by the
/// resolution pass. When the same task name is assigned twice, edges resolve
/// against the last occurrence, matching the aliasing rule.
fn topological_order(assignments: &[TaskAssignment]) -> Result<Vec<&TaskAssignment>> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut by_name: HashMap<&str, NodeIndex> = HashMap::new();

    let nodes: Vec<NodeIndex> = assignments
        .iter()
        .enumerate()
        .map(|(i, assignment)| {
            let node = graph.add_node(i);
            by_name.insert(assignment.task_name.as_str(), node);
            node
        })
        .collect();

    for (i, assignment) in assignments.iter().enumerate() {
        for ctx_name in &assignment.context {
            if let Some(&provider) = by_name.get(ctx_name.as_str())
                && provider != nodes[i]
            {
                graph.add_edge(provider, nodes[i], ());
            }
        }
    }

    let sorted = toposort(&graph, None).map_err(|cycle| {
        let index = graph[cycle.node_id()];
        CrewError::CyclicDependency(assignments[index].task_name.clone())
    })?;

    Ok(sorted
        .into_iter()
        .map(|node| &assignments[graph[node]])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CrewDocument;

    const CREW_DOC: &str = r#"
agents:
  - name: extractor
    role: "Metadata Extractor"
    goal: "Extract metadata"
    description: "Pulls metadata out of text."
    llm: groq-70b
    max_iter: 10
    tasks:
      - name: metadata_task
        description: "Extract metadata."
        expected_output: "JSON metadata."
  - name: questioner
    role: "Question Extractor"
    goal: "Extract questions"
    description: "Finds questions."
    delegation: true
    tasks:
      - name: question_task
        description: "Extract questions."
        expected_output: "A question list."
        tools:
          - segmenter
"#;

    fn registry() -> Registry {
        Registry::build(&CrewDocument::from_yaml(CREW_DOC).unwrap()).unwrap()
    }

    fn select_all() -> BTreeMap<String, InvocationSettings> {
        BTreeMap::from([
            ("extractor".to_string(), InvocationSettings::default()),
            ("questioner".to_string(), InvocationSettings::default()),
        ])
    }

    #[test]
    fn test_round_trip_declared_names_in_order() {
        let registry = registry();
        let assignments = [
            TaskAssignment::new("metadata_task"),
            TaskAssignment::new("question_task"),
        ];

        let plan = assemble(
            &registry,
            &select_all(),
            &assignments,
            AssemblyOptions::default(),
        )
        .unwrap();

        let agent_names: Vec<&str> = plan.agents.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(agent_names, vec!["extractor", "questioner"]);

        let task_names: Vec<&str> = plan.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(task_names, vec!["metadata_task", "question_task"]);
    }

    #[test]
    fn test_merge_is_right_biased() {
        let registry = registry();
        let decl = registry.agent("extractor").unwrap();

        let spec = merge_settings(
            decl,
            &InvocationSettings {
                llm: Some("gpt-4o".to_string()),
                memory: true,
                verbose: true,
            },
        );

        // Declared fields survive.
        assert_eq!(spec.role, "Metadata Extractor");
        assert_eq!(spec.backstory, "Pulls metadata out of text.");
        assert_eq!(spec.max_iter, 10);
        // Override wins over the declared groq-70b default.
        assert_eq!(spec.llm.as_deref(), Some("gpt-4o"));
        assert!(spec.memory);
        assert!(spec.verbose);
    }

    #[test]
    fn test_merge_override_clears_declared_llm() {
        // Flat merge: an absent override selector replaces the declared one.
        let registry = registry();
        let decl = registry.agent("extractor").unwrap();

        let spec = merge_settings(decl, &InvocationSettings::default());
        assert_eq!(spec.llm, None);
    }

    #[test]
    fn test_ordering_sensitivity_forward_reference_drops() {
        let registry = registry();
        let assignments = [
            TaskAssignment::with_context("question_task", ["metadata_task"]),
            TaskAssignment::new("metadata_task"),
        ];

        let plan = assemble(
            &registry,
            &select_all(),
            &assignments,
            AssemblyOptions::default(),
        )
        .unwrap();

        // question_task was processed before metadata_task existed.
        assert_eq!(plan.tasks[0].name, "question_task");
        assert!(plan.tasks[0].context.is_empty());
    }

    #[test]
    fn test_ordering_sensitivity_backward_reference_resolves() {
        let registry = registry();
        let assignments = [
            TaskAssignment::new("metadata_task"),
            TaskAssignment::with_context("question_task", ["metadata_task"]),
        ];

        let plan = assemble(
            &registry,
            &select_all(),
            &assignments,
            AssemblyOptions::default(),
        )
        .unwrap();

        let question = &plan.tasks[1];
        assert_eq!(question.context.len(), 1);
        assert_eq!(question.context[0].name, "metadata_task");
        assert_eq!(question.context[0].description, "Extract metadata.");
    }

    #[test]
    fn test_empty_settings_yield_empty_plan() {
        let registry = registry();
        let assignments = [TaskAssignment::new("metadata_task")];

        let plan = assemble(
            &registry,
            &BTreeMap::new(),
            &assignments,
            AssemblyOptions::default(),
        )
        .unwrap();

        assert!(plan.agents.is_empty());
        assert!(plan.tasks.is_empty());
    }

    #[test]
    fn test_unselected_agents_and_their_tasks_are_excluded() {
        let registry = registry();
        let settings =
            BTreeMap::from([("questioner".to_string(), InvocationSettings::default())]);
        let assignments = [
            TaskAssignment::new("metadata_task"),
            TaskAssignment::new("question_task"),
        ];

        let plan = assemble(&registry, &settings, &assignments, AssemblyOptions::default())
            .unwrap();

        assert_eq!(plan.agents.len(), 1);
        assert_eq!(plan.agents[0].name, "questioner");
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].name, "question_task");
    }

    #[test]
    fn test_unknown_agent_in_settings_ignored_in_lenient() {
        let registry = registry();
        let mut settings = select_all();
        settings.insert("phantom".to_string(), InvocationSettings::default());

        let plan = assemble(&registry, &settings, &[], AssemblyOptions::default()).unwrap();
        assert_eq!(plan.agents.len(), 2);
    }

    #[test]
    fn test_duplicate_assignment_aliasing() {
        let registry = registry();
        let assignments = [
            TaskAssignment::new("metadata_task"),
            TaskAssignment::new("metadata_task"),
            TaskAssignment::with_context("question_task", ["metadata_task"]),
        ];

        let plan = assemble(
            &registry,
            &select_all(),
            &assignments,
            AssemblyOptions::default(),
        )
        .unwrap();

        assert_eq!(plan.tasks.len(), 3);
        // The context link points at the second instance, not the first.
        let question = &plan.tasks[2];
        assert!(Arc::ptr_eq(&question.context[0], &plan.tasks[1]));
        assert!(!Arc::ptr_eq(&question.context[0], &plan.tasks[0]));
    }

    #[test]
    fn test_task_binds_to_its_owning_agent() {
        let registry = registry();
        let assignments = [TaskAssignment::new("question_task")];

        let plan = assemble(
            &registry,
            &select_all(),
            &assignments,
            AssemblyOptions::default(),
        )
        .unwrap();

        let task = &plan.tasks[0];
        assert_eq!(task.agent.name, "questioner");
        assert!(task.agent.allow_delegation);
        assert_eq!(task.tools, vec!["segmenter"]);
    }

    #[test]
    fn test_strict_unknown_agent_fails() {
        let registry = registry();
        let settings = BTreeMap::from([("phantom".to_string(), InvocationSettings::default())]);

        let err = assemble(
            &registry,
            &settings,
            &[],
            AssemblyOptions {
                mode: ResolutionMode::Strict,
                ..AssemblyOptions::default()
            },
        )
        .unwrap_err();

        assert!(matches!(
            err,
            CrewError::UnresolvedReference {
                kind: RefKind::Agent,
                ..
            }
        ));
    }

    #[test]
    fn test_strict_unknown_task_fails() {
        let registry = registry();
        let assignments = [TaskAssignment::new("no_such_task")];

        let err = assemble(
            &registry,
            &select_all(),
            &assignments,
            AssemblyOptions {
                mode: ResolutionMode::Strict,
                ..AssemblyOptions::default()
            },
        )
        .unwrap_err();

        match err {
            CrewError::UnresolvedReference { kind, name } => {
                assert_eq!(kind, RefKind::Task);
                assert_eq!(name, "no_such_task");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_strict_forward_context_fails() {
        let registry = registry();
        let assignments = [
            TaskAssignment::with_context("question_task", ["metadata_task"]),
            TaskAssignment::new("metadata_task"),
        ];

        let err = assemble(
            &registry,
            &select_all(),
            &assignments,
            AssemblyOptions {
                mode: ResolutionMode::Strict,
                ..AssemblyOptions::default()
            },
        )
        .unwrap_err();

        match err {
            CrewError::UnresolvedReference { kind, name } => {
                assert_eq!(kind, RefKind::Context);
                assert_eq!(name, "metadata_task");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_topological_order_resolves_forward_references() {
        let registry = registry();
        // Caller order is backwards; the pre-pass fixes it.
        let assignments = [
            TaskAssignment::with_context("question_task", ["metadata_task"]),
            TaskAssignment::new("metadata_task"),
        ];

        let plan = assemble(
            &registry,
            &select_all(),
            &assignments,
            AssemblyOptions {
                order: OrderPolicy::Topological,
                ..AssemblyOptions::default()
            },
        )
        .unwrap();

        assert_eq!(plan.tasks[0].name, "metadata_task");
        assert_eq!(plan.tasks[1].name, "question_task");
        assert_eq!(plan.tasks[1].context.len(), 1);
    }

    #[test]
    fn test_topological_order_rejects_cycles() {
        let registry = registry();
        let assignments = [
            TaskAssignment::with_context("metadata_task", ["question_task"]),
            TaskAssignment::with_context("question_task", ["metadata_task"]),
        ];

        let err = assemble(
            &registry,
            &select_all(),
            &assignments,
            AssemblyOptions {
                order: OrderPolicy::Topological,
                ..AssemblyOptions::default()
            },
        )
        .unwrap_err();

        assert!(matches!(err, CrewError::CyclicDependency(_)));
    }

    #[test]
    fn test_self_reference_is_not_a_cycle() {
        // A task naming itself as context resolves to nothing in a single
        // pass; the topological pre-pass must not treat it as a cycle.
        let registry = registry();
        let assignments = [TaskAssignment::with_context(
            "metadata_task",
            ["metadata_task"],
        )];

        let plan = assemble(
            &registry,
            &select_all(),
            &assignments,
            AssemblyOptions {
                order: OrderPolicy::Topological,
                ..AssemblyOptions::default()
            },
        )
        .unwrap();

        assert_eq!(plan.tasks.len(), 1);
        assert!(plan.tasks[0].context.is_empty());
    }

    #[test]
    fn test_plan_json_shape() {
        let registry = registry();
        let assignments = [
            TaskAssignment::new("metadata_task"),
            TaskAssignment::with_context("question_task", ["metadata_task"]),
        ];

        let plan = assemble(
            &registry,
            &select_all(),
            &assignments,
            AssemblyOptions::default(),
        )
        .unwrap();

        let value = plan.to_json();
        assert_eq!(value["agents"].as_array().unwrap().len(), 2);
        assert_eq!(value["tasks"][1]["context"][0], "metadata_task");
        assert_eq!(value["tasks"][0]["agent"], "extractor");
    }
}
