use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "mito")]
#[command(about = "Work your MITO tasks from the terminal, online or off")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory for the offline action log (defaults to the platform data dir)
    #[arg(long, global = true, value_name = "PATH", env = "MITO_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Backend API base URL, overriding MITO_API_URL and the tier default
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Treat the network as unavailable: mutations are saved for later sync
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, sign out and manage credentials
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// List departments
    Departments {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Browse and update tasks
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Read and write task comments
    Comments {
        #[command(subcommand)]
        command: CommentCommands,
    },
    /// Manage notifications
    Notifications {
        #[command(subcommand)]
        command: NotificationCommands,
    },
    /// Upload or remove task attachments
    Files {
        #[command(subcommand)]
        command: FileCommands,
    },
    /// Show actions saved while offline
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay actions saved while offline
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stay connected for live task updates and notifications
    Watch {
        /// Do not replay the offline queue when the connection comes up
        #[arg(long)]
        no_sync: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Department id
        #[arg(long)]
        department: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Status {
        /// Validate the stored session against the backend
        #[arg(long)]
        check: bool,
    },
    /// Request a password reset email
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    /// Set a new password with a reset token
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: String,
    },
    /// Check whether a reset token is still valid
    VerifyResetToken { token: String },
    /// Change the password of the signed-in account
    ChangePassword {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show the stored profile (refreshed from the backend when online)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update profile fields
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Extra field as KEY=VALUE (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List tasks assigned to you
    List {
        /// List every task instead of only yours
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one task
    Show {
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a task
    Update {
        id: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        /// Extra field as KEY=VALUE (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum CommentCommands {
    /// List comments on a task
    List {
        task_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Comment on a task
    Add {
        task_id: String,
        /// Comment text
        #[arg(required = true)]
        content: Vec<String>,
    },
    /// Delete a comment
    Delete { comment_id: String },
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List notifications, newest first
    List {
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark one notification as read
    Read { id: String },
    /// Mark every notification as read
    ReadAll,
    /// Delete a notification
    Delete { id: String },
    /// Print the unread count
    Unread,
}

#[derive(Subcommand)]
pub enum FileCommands {
    /// Attach a file to a task
    Upload { task_id: String, path: PathBuf },
    /// Remove an attachment
    Delete { file_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
