use chrono::Utc;
use mito_core::notifications::NotificationCenter;

use crate::cli::NotificationCommands;
use crate::commands::common::{format_notification_line, parse_record_id, settle, AppContext};
use crate::error::CliError;

pub async fn run_notifications(
    context: &AppContext,
    command: NotificationCommands,
) -> Result<(), CliError> {
    let session = context.session()?;
    let center = NotificationCenter::default();

    match command {
        NotificationCommands::List { unread, json } => {
            let items = context.api.get_notifications(&session.token).await?;
            center.load_remote(&items);
            let notifications = center
                .notifications()
                .into_iter()
                .filter(|notification| !unread || !notification.is_read)
                .collect::<Vec<_>>();

            if json {
                println!("{}", serde_json::to_string_pretty(&notifications)?);
            } else if notifications.is_empty() {
                println!("No notifications");
            } else {
                let now = Utc::now();
                for notification in &notifications {
                    println!("{}", format_notification_line(notification, now));
                }
            }
        }
        NotificationCommands::Read { id } => {
            let result = context
                .api
                .mark_notification_read(&session.token, &parse_record_id(&id)?)
                .await;
            if settle(result)?.is_some() {
                println!("Marked {id} as read");
            }
        }
        NotificationCommands::ReadAll => {
            let result = context.api.mark_all_notifications_read(&session.token).await;
            if settle(result)?.is_some() {
                println!("Marked all notifications as read");
            }
        }
        NotificationCommands::Delete { id } => {
            let result = context
                .api
                .delete_notification(&session.token, &parse_record_id(&id)?)
                .await;
            if settle(result)?.is_some() {
                println!("Deleted notification {id}");
            }
        }
        NotificationCommands::Unread => {
            let count = center
                .refresh_unread_count(&context.api, &session.token)
                .await?;
            println!("{count}");
        }
    }
    Ok(())
}
