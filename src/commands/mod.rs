//! Command implementations for crewfile.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. All commands share the same front half: parse `--var`
//! pairs, load the document through `CrewManager`, take a registry snapshot.

use crate::cli::{Command, PlanArgs, ShowArgs, ValidateArgs};
use crewfile::assemble::{
    assemble, AssemblyOptions, InvocationSettings, OrderPolicy, ResolutionMode, TaskAssignment,
};
use crewfile::error::{CrewError, Result};
use crewfile::manager::CrewManager;
use crewfile::registry::AgentDeclaration;
use std::collections::{BTreeMap, HashMap};

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Validate(args) => cmd_validate(args),
        Command::Show(args) => cmd_show(args),
        Command::Plan(args) => cmd_plan(args),
    }
}

/// Execute the `crewfile validate` command.
fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let variables = parse_vars(&args.vars)?;
    let manager = CrewManager::load(&args.file, variables)?;
    let registry = manager.snapshot();

    let task_count: usize = registry.agents().map(|a| a.task_count()).sum();
    println!(
        "{}: OK ({} agents, {} tasks)",
        args.file.display(),
        registry.len(),
        task_count
    );
    Ok(())
}

/// Execute the `crewfile show` command.
fn cmd_show(args: ShowArgs) -> Result<()> {
    let variables = parse_vars(&args.vars)?;
    let manager = CrewManager::load(&args.file, variables)?;
    let registry = manager.snapshot();

    if let Some(ref name) = args.agent {
        let agent = registry.agent(name).ok_or_else(|| {
            CrewError::Io(format!(
                "agent '{}' not found in '{}'.\n\
                 Declared agents: {}",
                name,
                args.file.display(),
                registry
                    .agents()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;
        print_agent(agent);
        return Ok(());
    }

    for agent in registry.agents() {
        print_agent(agent);
    }
    Ok(())
}

fn print_agent(agent: &AgentDeclaration) {
    println!("================================================================================");
    println!("{}", agent.name);
    println!("================================================================================");
    println!();
    println!("Role:        {}", agent.role);
    println!("Goal:        {}", agent.goal);
    println!("Backstory:   {}", agent.description);
    println!("Delegation:  {}", agent.allow_delegation);
    println!("Max iter:    {}", agent.max_iter);

    if let Some(llm) = &agent.llm {
        println!("Model:       {}", llm);
    }
    if let Some(max_rpm) = agent.max_rpm {
        println!("Max RPM:     {}", max_rpm);
    }
    if !agent.tools.is_empty() {
        println!("Tools:       {}", agent.tools.join(", "));
    }

    println!();
    println!("Tasks:");
    for task in agent.tasks() {
        println!("  {}", task.name);
        println!("    Description:     {}", task.description);
        println!("    Expected output: {}", task.expected_output);
        if !task.context.is_empty() {
            println!("    Context:         {}", task.context.join(", "));
        }
    }
    println!();
}

/// Execute the `crewfile plan` command.
///
/// Builds default invocation settings for the selected agents (the declared
/// model selector passes through) and one assignment per declared task in
/// declaration order with its declared context.
fn cmd_plan(args: PlanArgs) -> Result<()> {
    let variables = parse_vars(&args.vars)?;
    let manager = CrewManager::load(&args.file, variables)?;
    let registry = manager.snapshot();

    let mut settings: BTreeMap<String, InvocationSettings> = BTreeMap::new();
    if args.agents.is_empty() {
        for agent in registry.agents() {
            settings.insert(agent.name.clone(), default_settings(agent));
        }
    } else {
        for name in &args.agents {
            let defaults = registry.agent(name).map(default_settings).unwrap_or_default();
            settings.insert(name.clone(), defaults);
        }
    }

    let assignments: Vec<TaskAssignment> = registry
        .agents()
        .filter(|a| settings.contains_key(&a.name))
        .flat_map(|a| a.tasks())
        .map(|t| TaskAssignment::with_context(&t.name, t.context.iter().cloned()))
        .collect();

    let options = AssemblyOptions {
        mode: if args.strict {
            ResolutionMode::Strict
        } else {
            ResolutionMode::Lenient
        },
        order: if args.sorted {
            OrderPolicy::Topological
        } else {
            OrderPolicy::CallerOrder
        },
    };

    let plan = assemble(&registry, &settings, &assignments, options)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&plan.to_json())
            .map_err(|e| CrewError::Io(format!("failed to render plan JSON: {}", e)))?
    );
    Ok(())
}

fn default_settings(agent: &AgentDeclaration) -> InvocationSettings {
    InvocationSettings {
        llm: agent.llm.clone(),
        ..InvocationSettings::default()
    }
}

/// Parse repeated `KEY=VALUE` pairs into a template variable map.
fn parse_vars(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut variables = HashMap::with_capacity(pairs.len());
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                variables.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(CrewError::Io(format!(
                    "invalid --var '{}': expected KEY=VALUE",
                    pair
                )));
            }
        }
    }
    Ok(variables)
}
