use crate::cli::FileCommands;
use crate::commands::common::{parse_record_id, settle, AppContext};
use crate::error::CliError;

pub async fn run_files(context: &AppContext, command: FileCommands) -> Result<(), CliError> {
    let session = context.session()?;
    match command {
        FileCommands::Upload { task_id, path } => {
            let task_id = parse_record_id(&task_id)?;
            let data = tokio::fs::read(&path).await?;
            let file_name = path.to_string_lossy();
            let result = context
                .api
                .upload_task_attachment(&session.token, &task_id, &file_name, data)
                .await;
            if let Some(attachment) = settle(result)? {
                println!(
                    "{}  {}",
                    attachment.id,
                    attachment.filename.as_deref().unwrap_or("upload")
                );
            }
        }
        FileCommands::Delete { file_id } => {
            let result = context
                .api
                .delete_task_attachment(&session.token, &parse_record_id(&file_id)?)
                .await;
            if settle(result)?.is_some() {
                println!("Deleted attachment {file_id}");
            }
        }
    }
    Ok(())
}
