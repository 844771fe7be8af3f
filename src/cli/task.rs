//! stm task command implementations.

use std::path::PathBuf;

use chrono::Utc;

use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::projection::{project, StatusFilter, TaskStats};
use crate::storage::FileKvStore;
use crate::store::{Stored, TaskStore};
use crate::suggest::{self, SuggestOutcome};
use crate::task::{parse_due_date, NewTask, Task, TaskPatch, TaskStatus};

/// Flags shared by every command
pub struct GlobalOptions {
    pub dir: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

impl GlobalOptions {
    fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

pub struct AddOptions {
    pub title: String,
    pub due: String,
    pub description: String,
}

pub struct ListOptions {
    pub query: String,
    pub status: String,
}

pub struct EditOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum StatusChange {
    Complete,
    Reopen,
    Toggle,
}

struct TaskContext {
    store: TaskStore<FileKvStore>,
    config: Config,
}

pub fn run_add(options: AddOptions, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.clone())?;
    let title = options.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument("title cannot be empty".to_string()));
    }
    let due_date = parse_due_date(&options.due)?;

    let input = NewTask::new(title, due_date).with_description(options.description.trim());
    let stored = ctx.store.create(input);

    let mut human = HumanOutput::new("Task created");
    push_persist_warning(&mut human, &stored);
    human.push_summary("ID", stored.id.clone());
    human.push_summary("Title", stored.title.clone());
    human.push_summary("Due", stored.due_date.to_string());

    emit_success(
        global.output(),
        "add",
        &TaskOutput::from(stored),
        Some(&human),
    )
}

pub fn run_list(options: ListOptions, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.clone())?;
    let filter: StatusFilter = options.status.parse()?;

    // Stored order is creation order; show newest first.
    let mut all = ctx.store.list();
    all.reverse();
    let tasks = project(&all, &options.query, filter);

    let output = TaskListOutput {
        total: tasks.len(),
        query: options.query.clone(),
        status: filter,
        tasks: tasks.clone(),
    };

    let now = Utc::now();
    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    if !output.query.trim().is_empty() {
        human.push_summary("Query", output.query.clone());
    }
    if filter != StatusFilter::All {
        human.push_summary("Status", filter.to_string());
    }
    if tasks.is_empty() {
        human.push_detail(if all.is_empty() {
            "No tasks yet"
        } else {
            "No tasks match your search"
        });
    }
    for task in &tasks {
        human.push_detail(task_line(task, now));
    }

    emit_success(global.output(), "list", &output, Some(&human))
}

pub fn run_show(id: String, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.clone())?;
    let resolved = ctx.store.resolve_id(&id)?;
    let task = ctx
        .store
        .get(&resolved)
        .ok_or_else(|| Error::TaskNotFound(resolved.clone()))?;

    let mut human = HumanOutput::new(format!("Task {}", task.id));
    push_task_summary(&mut human, &task);

    emit_success(global.output(), "show", &task, Some(&human))
}

pub fn run_edit(options: EditOptions, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.clone())?;
    let resolved = ctx.store.resolve_id(&options.id)?;

    let mut patch = TaskPatch::default();
    if let Some(title) = options.title.as_ref() {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }
        patch.title = Some(trimmed.to_string());
    }
    if let Some(description) = options.description.as_ref() {
        patch.description = Some(description.trim().to_string());
    }
    if let Some(due) = options.due.as_deref() {
        patch.due_date = Some(parse_due_date(due)?);
    }
    if patch.is_empty() {
        return Err(Error::InvalidArgument(
            "edit requires --title, --description or --due".to_string(),
        ));
    }

    let stored = ctx
        .store
        .update(&resolved, patch)
        .ok_or_else(|| Error::TaskNotFound(resolved.clone()))?;

    let mut human = HumanOutput::new("Task updated");
    push_persist_warning(&mut human, &stored);
    push_task_summary(&mut human, &stored);

    emit_success(
        global.output(),
        "edit",
        &TaskOutput::from(stored),
        Some(&human),
    )
}

pub fn run_set_status(id: String, change: StatusChange, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.clone())?;
    let resolved = ctx.store.resolve_id(&id)?;

    let (command, stored) = match change {
        StatusChange::Complete => (
            "done",
            ctx.store.set_status(&resolved, TaskStatus::Completed),
        ),
        StatusChange::Reopen => (
            "reopen",
            ctx.store.set_status(&resolved, TaskStatus::Pending),
        ),
        StatusChange::Toggle => ("toggle", ctx.store.toggle_status(&resolved)),
    };
    let stored = stored.ok_or_else(|| Error::TaskNotFound(resolved.clone()))?;

    let header = match stored.status {
        TaskStatus::Completed => "Task completed",
        TaskStatus::Pending => "Task reopened",
    };
    let mut human = HumanOutput::new(header);
    push_persist_warning(&mut human, &stored);
    human.push_summary("ID", stored.id.clone());
    human.push_summary("Title", stored.title.clone());
    human.push_summary("Status", stored.status.to_string());

    emit_success(
        global.output(),
        command,
        &TaskOutput::from(stored),
        Some(&human),
    )
}

pub fn run_delete(id: String, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.clone())?;
    let resolved = ctx.store.resolve_id(&id)?;

    let stored = ctx.store.delete(&resolved);
    if !stored.value {
        return Err(Error::TaskNotFound(resolved));
    }

    let mut human = HumanOutput::new("Task deleted");
    push_persist_warning(&mut human, &stored);
    human.push_summary("ID", resolved.clone());

    let output = TaskDeleteOutput {
        id: resolved,
        deleted: true,
        persisted: stored.persisted,
    };
    emit_success(global.output(), "delete", &output, Some(&human))
}

pub fn run_subtasks(
    id: String,
    items: Vec<String>,
    command: &str,
    global: GlobalOptions,
) -> Result<()> {
    let ctx = load_context(global.dir.clone())?;
    let resolved = ctx.store.resolve_id(&id)?;

    let subtasks: Vec<String> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();

    let stored = ctx
        .store
        .set_subtasks(&resolved, subtasks)
        .ok_or_else(|| Error::TaskNotFound(resolved.clone()))?;

    let mut human = HumanOutput::new(if stored.subtasks.is_empty() {
        "Subtasks cleared"
    } else {
        "Subtasks updated"
    });
    push_persist_warning(&mut human, &stored);
    human.push_summary("ID", stored.id.clone());
    for (idx, subtask) in stored.subtasks.iter().enumerate() {
        human.push_detail(format!("{}. {}", idx + 1, subtask));
    }

    emit_success(
        global.output(),
        command,
        &TaskOutput::from(stored),
        Some(&human),
    )
}

pub fn run_suggest(id: String, global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.clone())?;
    let resolved = ctx.store.resolve_id(&id)?;
    let suggester = suggest::from_config(&ctx.config.suggest)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(suggest::apply_suggestions(
        &ctx.store,
        &suggester,
        &resolved,
    ));

    let (output, human) = match outcome {
        SuggestOutcome::NotFound => return Err(Error::TaskNotFound(resolved)),
        SuggestOutcome::Applied(stored) => {
            let mut human = HumanOutput::new(if stored.subtasks.is_empty() {
                "No usable subtasks suggested; subtasks cleared"
            } else {
                "Subtasks suggested"
            });
            push_persist_warning(&mut human, &stored);
            human.push_summary("ID", stored.id.clone());
            for (idx, subtask) in stored.subtasks.iter().enumerate() {
                human.push_detail(format!("{}. {}", idx + 1, subtask));
            }
            let output = SuggestOutput {
                id: resolved,
                applied: true,
                subtasks: stored.subtasks.clone(),
                persisted: stored.persisted,
                error: None,
            };
            (output, human)
        }
        SuggestOutcome::Failed(reason) => {
            let mut human = HumanOutput::new("Suggestion failed; subtasks unchanged");
            human.push_summary("ID", resolved.clone());
            human.push_warning(reason.clone());
            let output = SuggestOutput {
                id: resolved,
                applied: false,
                subtasks: Vec::new(),
                persisted: true,
                error: Some(reason),
            };
            (output, human)
        }
    };

    emit_success(global.output(), "suggest", &output, Some(&human))
}

pub fn run_stats(global: GlobalOptions) -> Result<()> {
    let ctx = load_context(global.dir.clone())?;
    let stats = TaskStats::from_tasks(&ctx.store.list(), Utc::now());

    let mut human = HumanOutput::new("Task stats");
    human.push_summary("Total", stats.total.to_string());
    human.push_summary("Completed", stats.completed.to_string());
    human.push_summary("Pending", stats.pending.to_string());
    human.push_summary("Overdue", stats.overdue.to_string());

    emit_success(global.output(), "stats", &stats, Some(&human))
}

#[derive(serde::Serialize)]
struct TaskOutput {
    task: Task,
    persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    write_error: Option<String>,
}

impl From<Stored<Task>> for TaskOutput {
    fn from(stored: Stored<Task>) -> Self {
        Self {
            task: stored.value,
            persisted: stored.persisted,
            write_error: stored.write_error,
        }
    }
}

#[derive(serde::Serialize)]
struct TaskListOutput {
    total: usize,
    query: String,
    status: StatusFilter,
    tasks: Vec<Task>,
}

#[derive(serde::Serialize)]
struct TaskDeleteOutput {
    id: String,
    deleted: bool,
    persisted: bool,
}

#[derive(serde::Serialize)]
struct SuggestOutput {
    id: String,
    applied: bool,
    subtasks: Vec<String>,
    persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn load_context(dir: Option<PathBuf>) -> Result<TaskContext> {
    let dir = match dir {
        Some(dir) => dir,
        None => config::default_data_dir()?,
    };
    let config = Config::load_from_dir(&dir);
    let backend = FileKvStore::new(&dir).with_lock_timeout(config.storage.lock_timeout_ms);
    let store = TaskStore::with_key(backend, config.storage.key.clone());
    tracing::debug!(dir = %dir.display(), key = %store.key(), "opened task store");
    Ok(TaskContext { store, config })
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn task_line(task: &Task, now: chrono::DateTime<Utc>) -> String {
    let mut line = format!(
        "[{}] {} {} (due {})",
        task.status,
        short_id(&task.id),
        task.title,
        task.due_date
    );
    if task.is_overdue(now) {
        line.push_str(" OVERDUE");
    }
    if !task.subtasks.is_empty() {
        line.push_str(&format!(" [{} subtasks]", task.subtasks.len()));
    }
    line
}

fn push_persist_warning<T>(human: &mut HumanOutput, stored: &Stored<T>) {
    if stored.persisted {
        return;
    }
    let reason = stored.write_error.as_deref().unwrap_or("unknown error");
    human.push_warning(format!("not saved: {reason}"));
}

fn push_task_summary(human: &mut HumanOutput, task: &Task) {
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Status", task.status.to_string());
    human.push_summary("Due", task.due_date.to_string());
    if task.is_overdue(Utc::now()) {
        human.push_summary("Overdue", "yes");
    }
    human.push_summary("Created", task.created_at.to_rfc3339());
    human.push_summary("Updated", task.updated_at.to_rfc3339());
    if !task.description.is_empty() {
        human.push_detail(task.description.clone());
    }
    for (idx, subtask) in task.subtasks.iter().enumerate() {
        human.push_detail(format!("{}. {}", idx + 1, subtask));
    }
}
