use chrono::Utc;

use crate::cli::CommentCommands;
use crate::commands::common::{
    format_comment_line, normalize_content, parse_record_id, settle, AppContext,
};
use crate::error::CliError;

pub async fn run_comments(context: &AppContext, command: CommentCommands) -> Result<(), CliError> {
    let session = context.session()?;
    match command {
        CommentCommands::List { task_id, json } => {
            let comments = context
                .api
                .get_task_comments(&session.token, &parse_record_id(&task_id)?)
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&comments)?);
            } else if comments.is_empty() {
                println!("No comments");
            } else {
                let now = Utc::now();
                for comment in &comments {
                    println!("{}", format_comment_line(comment, now));
                }
            }
        }
        CommentCommands::Add { task_id, content } => {
            let content = normalize_content(&content.join(" ")).ok_or(CliError::EmptyContent)?;
            let result = context
                .api
                .add_task_comment(&session.token, &parse_record_id(&task_id)?, &content)
                .await;
            if let Some(comment) = settle(result)? {
                println!("{}", comment.id);
            }
        }
        CommentCommands::Delete { comment_id } => {
            let result = context
                .api
                .delete_task_comment(&session.token, &parse_record_id(&comment_id)?)
                .await;
            if settle(result)?.is_some() {
                println!("Deleted comment {comment_id}");
            }
        }
    }
    Ok(())
}
