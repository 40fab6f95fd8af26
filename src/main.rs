//! task-graph command-line entry point.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use task_graph::cli::{Cli, Command, TagsCommand};
use task_graph::config::{Config, ConfigLoader};
use task_graph::error::Error;
use task_graph::graph::analysis::{CriticalPathEntry, ImpactAnalysis};
use task_graph::graph::deps::{DependencyGraphManager, FixSummary};
use task_graph::graph::ValidationReport;
use task_graph::logging;
use task_graph::manager::stats::TaskStats;
use task_graph::manager::{DeleteOptions, TaskManager};
use task_graph::render::Rendered;
use task_graph::store::{TagSummary, TaskStore};
use task_graph::types::{Task, TaskRef};
use tracing::debug;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err, json);
            ExitCode::FAILURE
        }
    }
}

fn report_error(err: &anyhow::Error, json: bool) {
    match (err.downcast_ref::<Error>(), json) {
        (Some(engine), true) => {
            let text = serde_json::to_string_pretty(&engine.to_report())
                .unwrap_or_else(|_| engine.to_string());
            eprintln!("{}", text);
        }
        (None, true) => {
            eprintln!("{}", serde_json::json!({ "code": "ERROR", "message": format!("{:#}", err) }));
        }
        (_, false) => eprintln!("Error: {:#}", err),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut loader = match &cli.config {
        Some(path) => ConfigLoader::load_explicit(path)?,
        None => ConfigLoader::load()?,
    };
    for (tier, path) in loader.sources() {
        debug!(%tier, path = ?path, "config tier applied");
    }

    let config = loader.config_mut();
    if let Some(file) = &cli.file {
        config.storage.tasks_path = file.clone();
    }
    if let Some(tag) = &cli.tag {
        config.tasks.default_tag = tag.clone();
    }
    Ok(loader.into_config())
}

fn run(cli: Cli) -> Result<ExitCode> {
    logging::init(cli.verbose, &cli.log).context("initializing logging")?;
    let config = load_config(&cli)?;

    let store = TaskStore::new(&config.storage.tasks_path).with_lock_timeout(config.storage.lock_timeout());
    let tasks = TaskManager::new(store.clone(), config.tasks.clone());
    let deps = DependencyGraphManager::new(store.clone(), config.analysis.clone());
    let tag = config.tasks.default_tag.as_str();
    let out = Output { json: cli.json };

    match cli.command {
        Command::Add(args) => {
            let task = tasks.create_task(tag, args.into_new_task())?;
            out.emit(&task, || format!("Created task {}: {}", task.id, task.title))?;
        }
        Command::AddSubtask { parent, task } => {
            let task = tasks.create_subtask(&parent, task.into_new_task(), tag)?;
            out.emit(&task, || format!("Created subtask {}: {}", task.id, task.title))?;
        }
        Command::Update(args) => {
            let (id, patch) = args.into_patch();
            let task = tasks.update_task(&id, patch, tag)?;
            out.emit(&task, || format!("Updated task {}", task.id))?;
        }
        Command::SetStatus { id, status } => {
            let task = tasks.update_task_status(&id, status, tag)?;
            out.emit(&task, || format!("Task {} is now {}", task.id, task.status))?;
        }
        Command::Remove { id, force } => {
            let outcome = tasks.delete_task(&id, tag, DeleteOptions { force })?;
            out.emit(&outcome, || {
                let mut text = format!("Deleted {}", outcome.deleted.join(", "));
                if !outcome.updated_dependents.is_empty() {
                    text.push_str(&format!(
                        "\nRemoved references from {}",
                        outcome.updated_dependents.join(", ")
                    ));
                }
                text
            })?;
        }
        Command::List(args) => {
            let listed = tasks.list_tasks(&args.into_filter(), tag)?;
            out.emit(&listed, || format_task_table(&listed))?;
        }
        Command::Show { id } => {
            let task = tasks.get_task(&id, tag)?;
            let dependencies = deps.get_dependencies(&id, tag)?;
            let dependents = deps.get_dependents(&id, tag)?;
            out.emit(&task, || format_task_detail(&task, &dependencies, &dependents))?;
        }
        Command::Next => {
            let next = tasks.next_task(tag)?;
            out.emit(&next, || match &next {
                Some(task) => format_task_detail(task, &[], &[]),
                None => "No actionable task: everything is done or blocked.".to_string(),
            })?;
        }
        Command::Stats => {
            let stats = tasks.get_stats(tag)?;
            out.emit(&stats, || format_stats(tag, &stats))?;
        }
        Command::AddDep { task, depends_on } => {
            let added = deps.add_dependency(&task, &depends_on, tag)?;
            out.emit(&serde_json::json!({ "added": added }), || {
                if added {
                    format!("Task {} now depends on {}", task, depends_on)
                } else {
                    format!("Task {} already depends on {}", task, depends_on)
                }
            })?;
        }
        Command::RemoveDep { task, depends_on } => {
            let removed = deps.remove_dependency(&task, &depends_on, tag)?;
            out.emit(&serde_json::json!({ "removed": removed }), || {
                if removed {
                    format!("Task {} no longer depends on {}", task, depends_on)
                } else {
                    format!("Task {} did not depend on {}", task, depends_on)
                }
            })?;
        }
        Command::Validate => {
            let report = deps.validate_dependencies(tag)?;
            out.emit(&report, || format_validation(&report))?;
            if !report.valid {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::FixDeps => {
            let summary = deps.fix_dependencies(tag)?;
            out.emit(&summary, || format_fix(&summary))?;
        }
        Command::Deps { id } => {
            let dependencies = deps.get_dependencies(&id, tag)?;
            let dependents = deps.get_dependents(&id, tag)?;
            let value = serde_json::json!({
                "id": id,
                "dependencies": dependencies,
                "dependents": dependents,
            });
            out.emit(&value, || {
                format!(
                    "Depends on:\n{}\nRequired by:\n{}",
                    format_refs(&dependencies),
                    format_refs(&dependents)
                )
            })?;
        }
        Command::CriticalPath => {
            let path = deps.critical_path(tag)?;
            out.emit(&path, || format_critical_path(&path))?;
        }
        Command::Impact => {
            let impact = deps.impact_analysis(tag)?;
            out.emit(&impact, || format_impact(&impact))?;
        }
        Command::Graph(args) => {
            let target = args.output.clone();
            let report = deps.report(&args.into_request(tag))?;
            let body = match (&report.rendered, cli.json) {
                (Rendered::Text(text), false) => text.clone(),
                (Rendered::Object(value), false) => serde_json::to_string_pretty(value)?,
                _ => serde_json::to_string_pretty(&report)?,
            };
            match target {
                Some(path) => {
                    std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
                    if !cli.json {
                        println!("Wrote {} graph to {}", report.metadata.format, path.display());
                    }
                }
                None => print!("{}", ensure_newline(body)),
            }
        }
        Command::Tags(TagsCommand::List) => {
            let tags = store.list_tags()?;
            out.emit(&tags, || format_tags(&tags))?;
        }
        Command::Tags(TagsCommand::Copy { from, to }) => {
            let copied = store.copy_tag(&from, &to)?;
            out.emit(&serde_json::json!({ "copied": copied }), || {
                format!("Copied {} tasks from '{}' to '{}'", copied, from, to)
            })?;
        }
        Command::Tags(TagsCommand::Delete { name }) => {
            let deleted = store.delete_tag(&name)?;
            out.emit(&serde_json::json!({ "deleted": deleted }), || {
                format!("Deleted tag '{}' ({} tasks)", name, deleted)
            })?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Prints either pretty JSON or the human-readable text.
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            print!("{}", ensure_newline(text()));
        }
        Ok(())
    }
}

fn ensure_newline(mut s: String) -> String {
    if !s.ends_with('\n') {
        s.push('\n');
    }
    s
}

fn format_task_table(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks found.".to_string();
    }
    let width = tasks.iter().map(|t| t.id.len()).max().unwrap_or(2).max(2);
    let mut out = format!("{:<width$}  {:<11}  {:<8}  {:<10}  TITLE\n", "ID", "STATUS", "PRIORITY", "DEPS");
    for task in tasks {
        let deps = if task.dependencies.is_empty() {
            "-".to_string()
        } else {
            task.dependencies.join(",")
        };
        out.push_str(&format!(
            "{:<width$}  {:<11}  {:<8}  {:<10}  {}\n",
            task.id,
            task.status.as_str(),
            task.priority.as_str(),
            deps,
            task.title
        ));
    }
    out
}

fn format_task_detail(task: &Task, dependencies: &[TaskRef], dependents: &[TaskRef]) -> String {
    let mut out = format!("[{}] {}\n", task.id, task.title);
    out.push_str(&format!("  status:   {}\n  priority: {}\n", task.status, task.priority));
    if let Some(ty) = &task.task_type {
        out.push_str(&format!("  type:     {}\n", ty));
    }
    if let Some(assignee) = &task.assignee {
        out.push_str(&format!("  assignee: {}\n", assignee));
    }
    if !task.tags.is_empty() {
        out.push_str(&format!("  labels:   {}\n", task.tags.join(", ")));
    }
    out.push_str(&format!("  effort:   {}h\n", task.effort()));
    if let Some(due) = task.due_date {
        out.push_str(&format!("  due:      {}\n", due.format("%Y-%m-%d")));
    }
    if !task.description.is_empty() {
        out.push_str(&format!("\n{}\n", task.description));
    }
    if !task.details.is_empty() {
        out.push_str(&format!("\nDetails:\n{}\n", task.details));
    }
    if !task.subtasks.is_empty() {
        out.push_str("\nSubtasks:\n");
        for sub in &task.subtasks {
            out.push_str(&format!("  [{}] {} ({})\n", sub.id, sub.title, sub.status));
        }
    }
    if !dependencies.is_empty() {
        out.push_str(&format!("\nDepends on:\n{}\n", format_refs(dependencies)));
    } else if !task.dependencies.is_empty() {
        out.push_str(&format!("\nDepends on: {}\n", task.dependencies.join(", ")));
    }
    if !dependents.is_empty() {
        out.push_str(&format!("\nRequired by:\n{}\n", format_refs(dependents)));
    }
    out
}

fn format_refs(refs: &[TaskRef]) -> String {
    if refs.is_empty() {
        return "  (none)".to_string();
    }
    refs.iter()
        .map(|r| match r.status {
            Some(status) => format!("  [{}] {} ({})", r.id, r.title, status),
            None => format!("  [{}] {} (missing)", r.id, r.title),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_stats(tag: &str, stats: &TaskStats) -> String {
    let mut out = format!(
        "Tag '{}': {} tasks, {} subtasks, {:.1}% complete\n",
        tag, stats.total_tasks, stats.total_subtasks, stats.completion_percentage
    );
    out.push_str(&format!(
        "  ready: {}  blocked by dependencies: {}  overdue: {}\n",
        stats.ready, stats.blocked_by_dependencies, stats.overdue
    ));
    out.push_str("  by status:");
    for (status, count) in &stats.by_status {
        out.push_str(&format!(" {}={}", status, count));
    }
    out.push_str("\n  by priority:");
    for (priority, count) in &stats.by_priority {
        out.push_str(&format!(" {}={}", priority, count));
    }
    out.push_str("\n  by type:");
    for (ty, count) in &stats.by_type {
        out.push_str(&format!(" {}={}", ty, count));
    }
    out.push('\n');
    out
}

fn format_validation(report: &ValidationReport) -> String {
    let mut out = if report.valid {
        "Dependencies are valid.\n".to_string()
    } else {
        "Dependencies are INVALID.\n".to_string()
    };
    for issue in &report.errors {
        out.push_str(&format!(
            "  error: task {} -> {} ({:?})\n",
            issue.task_id, issue.dependency_id, issue.kind
        ));
    }
    for cycle in &report.cycles {
        out.push_str(&format!("  cycle: {}\n", cycle.join(" -> ")));
    }
    for warning in &report.warnings {
        out.push_str(&format!("  warning: {}\n", warning.message));
    }
    out
}

fn format_fix(summary: &FixSummary) -> String {
    let mut out = if summary.changed() {
        format!("Removed {} invalid dependency reference(s)\n", summary.removed.len())
    } else {
        "Nothing to fix.\n".to_string()
    };
    for issue in &summary.removed {
        out.push_str(&format!("  task {}: dropped {} ({:?})\n", issue.task_id, issue.dependency_id, issue.kind));
    }
    for cycle in &summary.remaining_cycles {
        out.push_str(&format!("  cycle left in place: {}\n", cycle.join(" -> ")));
    }
    out
}

fn format_critical_path(path: &[CriticalPathEntry]) -> String {
    if path.is_empty() {
        return "No tasks on the critical path.".to_string();
    }
    path.iter()
        .enumerate()
        .map(|(i, e)| format!("{:>2}. [{}] {} ({}, {}h, score {:.1})", i + 1, e.id, e.title, e.priority, e.effort, e.score))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_impact(impact: &[ImpactAnalysis]) -> String {
    if impact.is_empty() {
        return "No tasks.".to_string();
    }
    impact
        .iter()
        .map(|i| {
            format!(
                "[{}] score {} ({} direct, {} total){}",
                i.id,
                i.impact_score,
                i.direct_dependents,
                i.total_impact,
                if i.is_critical { " HIGH" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_tags(tags: &[TagSummary]) -> String {
    if tags.is_empty() {
        return "No tags.".to_string();
    }
    tags.iter()
        .map(|t| format!("{}  ({} tasks, {} done)", t.name, t.task_count, t.completed_count))
        .collect::<Vec<_>>()
        .join("\n")
}
