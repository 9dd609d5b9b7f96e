use mito_core::api::Registration;
use mito_core::RecordId;
use serde_json::Value;

use crate::cli::AuthCommands;
use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_auth(context: &AppContext, command: AuthCommands) -> Result<(), CliError> {
    match command {
        AuthCommands::Login { email, password } => {
            let session = context.auth.login(&email, &password).await?;
            println!("Signed in as {}", session.user.display_name());
        }
        AuthCommands::Register {
            name,
            email,
            password,
            department,
        } => {
            let registration = Registration {
                name,
                email,
                password,
                department_id: department.map(|id| RecordId::new(id.trim())),
                ..Registration::default()
            };
            let user = context.auth.register(&registration).await?;
            println!(
                "Account created for {}. Run `mito auth login` to sign in.",
                user.display_name()
            );
        }
        AuthCommands::Logout => {
            context.auth.logout().await?;
            println!("Signed out");
        }
        AuthCommands::Status { check } => run_status(context, check).await?,
        AuthCommands::ForgotPassword { email } => {
            let response = context.auth.forgot_password(&email).await?;
            println!("{}", message_or(&response, "Check your inbox for a reset link."));
        }
        AuthCommands::ResetPassword { token, password } => {
            let response = context.auth.reset_password(&token, &password).await?;
            println!("{}", message_or(&response, "Password updated."));
        }
        AuthCommands::VerifyResetToken { token } => {
            let response = context.auth.verify_reset_token(&token).await?;
            println!("{}", message_or(&response, "Reset token is valid."));
        }
        AuthCommands::ChangePassword { current, new } => {
            let response = context.auth.change_password(&current, &new).await?;
            println!("{}", message_or(&response, "Password changed."));
        }
    }
    Ok(())
}

async fn run_status(context: &AppContext, check: bool) -> Result<(), CliError> {
    let session = if check {
        context.auth.restore().await?
    } else {
        context.auth.current()?
    };

    match session {
        Some(session) => {
            let user = &session.user;
            println!("Signed in as {} ({})", user.display_name(), user.id);
            if let Some(role) = user.role.as_deref() {
                println!("Role: {role}");
            }
        }
        None if check => println!("Not signed in (stored session was missing or rejected)"),
        None => println!("Not signed in"),
    }
    println!("Backend: {}", context.config.api_base_url);
    Ok(())
}

/// The backend's `message` field, or a default.
pub fn message_or(response: &Value, fallback: &str) -> String {
    response
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map_or_else(|| fallback.to_string(), str::to_string)
}
