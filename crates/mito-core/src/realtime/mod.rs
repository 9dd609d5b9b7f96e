//! Realtime push channel: typed events from the backend, one handler per
//! topic.

mod channel;
pub mod frame;
mod topic;

pub use channel::{ChannelHandle, ConnectionState, Handler, NotificationHandler, RealtimeChannel};
pub use topic::{
    CommentDeleted, NotificationRemoved, RealtimeEvent, TaskAssignmentChanged, TaskDeleted,
    TaskStatusChanged, Topic,
};
