pub mod auth_cmd;
pub mod comments;
pub mod common;
pub mod completions;
pub mod files;
pub mod notifications;
pub mod profile;
pub mod sync;
pub mod tasks;
pub mod watch;
