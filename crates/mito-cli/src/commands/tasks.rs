use crate::cli::TaskCommands;
use crate::commands::common::{build_changes, format_task_line, parse_record_id, settle, AppContext};
use crate::error::CliError;

pub async fn run_departments(context: &AppContext, json: bool) -> Result<(), CliError> {
    let departments = context.api.get_departments().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&departments)?);
    } else if departments.is_empty() {
        println!("No departments");
    } else {
        for department in &departments {
            println!("{}  {}", department.id, department.name.as_deref().unwrap_or("-"));
        }
    }
    Ok(())
}

pub async fn run_tasks(context: &AppContext, command: TaskCommands) -> Result<(), CliError> {
    let session = context.session()?;
    match command {
        TaskCommands::List { all, json } => {
            let assignee = (!all).then_some(&session.user.id);
            let tasks = context.api.get_tasks(&session.token, assignee).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks");
            } else {
                for task in &tasks {
                    println!("{}", format_task_line(task));
                }
            }
        }
        TaskCommands::Show { id, json } => {
            let task = context
                .api
                .get_task(&session.token, &parse_record_id(&id)?)
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                println!("{}", format_task_line(&task));
                if let Some(priority) = task.priority.as_deref() {
                    println!("priority: {priority}");
                }
                if let Some(description) = task.description.as_deref() {
                    println!();
                    println!("{}", description.trim());
                }
            }
        }
        TaskCommands::Update {
            id,
            status,
            title,
            priority,
            fields,
        } => {
            let task_id = parse_record_id(&id)?;
            let changes = build_changes(
                &[
                    ("status", status.as_deref()),
                    ("title", title.as_deref()),
                    ("priority", priority.as_deref()),
                ],
                &fields,
            )?;
            let result = context
                .api
                .update_task(&session.token, &task_id, &changes)
                .await;
            if let Some(task) = settle(result)? {
                println!("{}", format_task_line(&task));
            }
        }
    }
    Ok(())
}
