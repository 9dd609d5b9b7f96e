//! Data models for MITO

mod id;
mod notification;
mod record;

pub use id::RecordId;
pub use notification::{NormalizedNotification, NotificationType};
pub use record::{Attachment, Comment, Department, Task, User};
