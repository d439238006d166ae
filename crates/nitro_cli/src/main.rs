//! CLI entry point over `nitro_core`.
//!
//! # Responsibility
//! - Map one subcommand to one façade call.
//! - Keep output line-oriented for scripting.

mod cli;

use clap::Parser;
use log::error;
use nitro_core::{
    AppContext, Collaborators, ContextError, CoreConfig, ListTasks, NewList, NewTask,
    ReconcileService, ServiceError, Task, TaskPatch,
};
use std::process::ExitCode;

use crate::cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("nitro: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ContextError> {
    let mut config = CoreConfig::default();
    if let Some(path) = cli.db {
        config = config.with_db_path(path);
    }
    if let Some(dir) = cli.log_dir {
        config = config.with_log_dir(dir);
    }
    if let Some(level) = cli.log_level {
        config = config.with_log_level(level);
    }

    let mut context = AppContext::open(&config, Collaborators::offline())?;
    execute(context.service_mut(), cli.command)?;
    context.close()
}

fn execute(service: &mut ReconcileService, command: Command) -> Result<(), ServiceError> {
    match command {
        Command::Lists => {
            for summary in service.get_lists() {
                println!("{}\t{}\t{}", summary.list.id, summary.count, summary.list.name);
            }
        }
        Command::AddList { name } => {
            let list = service.add_list(NewList::new(name))?;
            println!("{}", list.id);
        }
        Command::Add { list, name, notes } => {
            let mut draft = NewTask::new(list, name);
            draft.notes = notes;
            let task = service.add_task(draft)?;
            println!("{}\t{}", task.id, task.list);
        }
        Command::Tasks { list } => {
            let Some(ListTasks { tasks, order }) = service.get_tasks(&list) else {
                return Err(ServiceError::ListNotFound(list));
            };
            for id in &order {
                if let Some(task) = tasks.iter().find(|task| &task.id == id) {
                    print_task(task);
                }
            }
        }
        Command::Complete { id } => {
            let task = service.complete_task(&id)?;
            print_task(&task);
        }
        Command::Move { id, list } => {
            let patch = TaskPatch {
                list: Some(list),
                ..TaskPatch::default()
            };
            let task = service.update_task(&id, patch)?;
            print_task(&task);
        }
        Command::Delete { id } => service.delete_task(&id)?,
        Command::DeleteList { id } => service.delete_list(&id)?,
        Command::Archive { list } => {
            let outcome = service.archive_completed(&list)?;
            println!("archived={}", outcome.archived.len());
        }
    }
    Ok(())
}

fn print_task(task: &Task) {
    let mark = if task.completed.is_some() { "x" } else { " " };
    println!("[{mark}] {}\t{}", task.id, task.name);
}
