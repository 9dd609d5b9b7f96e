use mito_core::auth::Session;
use mito_core::config::RealtimeConfig;
use mito_core::notifications::NotificationCenter;
use mito_core::realtime::{ConnectionState, RealtimeChannel, RealtimeEvent, Topic};
use tokio::sync::broadcast::error::RecvError;

use crate::commands::common::{preview, AppContext};
use crate::commands::sync::format_sync_report;
use crate::error::CliError;

pub async fn run_watch(context: &AppContext, no_sync: bool) -> Result<(), CliError> {
    let session = context.session()?;
    let center = NotificationCenter::default();
    let channel = RealtimeChannel::new(context.config.realtime_url()?, RealtimeConfig::default());

    for topic in Topic::ALL {
        match topic {
            Topic::Notification => {}
            Topic::NotificationRemoved => {
                let center = center.clone();
                channel.add_listener(topic, move |event| {
                    if let RealtimeEvent::NotificationRemoved(removed) = event {
                        center.remove(&removed.notification_id);
                    }
                    println!("{}", describe_event(event));
                });
            }
            _ => channel.add_listener(topic, |event| println!("{}", describe_event(event))),
        }
    }

    let mut toasts = center.subscribe_toasts();
    let sweeper = center.spawn_sweeper();
    let inbox = center.clone();
    let mut handle = channel.connect(&session.token, &session.user.id, move |raw| {
        inbox.ingest(raw);
    });
    println!("Connecting to {} ...", context.config.realtime_url()?);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            state = handle.changed() => match state {
                Some(ConnectionState::Connected) => {
                    println!("Connected as {}", session.user.display_name());
                    on_connected(context, &center, &session, no_sync).await;
                }
                Some(ConnectionState::Connecting) => {
                    context.connectivity.set_online(false);
                    println!("Connection lost, reconnecting...");
                }
                Some(ConnectionState::Disconnected) | None => {
                    break Err(CliError::RealtimeUnavailable);
                }
            },
            toast = toasts.recv() => match toast {
                Ok(toast) => println!("[notification] {}", toast.message),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Dropped notification toasts");
                }
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    sweeper.abort();
    channel.disconnect();
    println!("{} unread notification(s)", center.unread_count());
    outcome
}

async fn on_connected(context: &AppContext, center: &NotificationCenter, session: &Session, no_sync: bool) {
    context.connectivity.set_online(true);

    if !no_sync && !context.action_log.is_empty() {
        match context.sync_coordinator().drain(&session.token).await {
            Ok(report) => {
                for line in format_sync_report(&report, context.action_log.len()) {
                    println!("{line}");
                }
            }
            Err(error) => tracing::warn!("Sync after reconnect failed: {}", error),
        }
    }

    match center.refresh_unread_count(&context.api, &session.token).await {
        Ok(unread) => println!("{unread} unread notification(s)"),
        Err(error) => tracing::warn!("Could not load notifications: {}", error),
    }
}

/// One-line summary of a realtime event.
pub fn describe_event(event: &RealtimeEvent) -> String {
    let detail = match event {
        RealtimeEvent::TaskUpdate(task) => format!(
            "task {} {}",
            task.id,
            preview(task.title.as_deref().unwrap_or(""), 60)
        ),
        RealtimeEvent::TaskStatusChange(change) => format!(
            "task {} is now {}",
            change.task_id,
            change.status.as_deref().unwrap_or("unknown")
        ),
        RealtimeEvent::TaskAssignmentChange(change) => match &change.assigned_to_id {
            Some(assignee) => format!("task {} assigned to {assignee}", change.task_id),
            None => format!("task {} unassigned", change.task_id),
        },
        RealtimeEvent::TaskDeleted(deleted) => format!("task {} deleted", deleted.task_id),
        RealtimeEvent::NewComment(comment) | RealtimeEvent::CommentUpdate(comment) => format!(
            "comment {} {}",
            comment.id,
            preview(comment.content.as_deref().unwrap_or(""), 60)
        ),
        RealtimeEvent::CommentDeleted(deleted) => format!("comment {} deleted", deleted.comment_id),
        RealtimeEvent::NotificationRemoved(removed) => {
            format!("notification {} removed", removed.notification_id)
        }
        RealtimeEvent::PerformanceUpdate(_) => "performance figures changed".to_string(),
        RealtimeEvent::Notification(raw) => preview(&raw.to_string(), 60),
    };
    format!("[{}] {detail}", event.topic())
}
