use mito_core::User;

use crate::cli::ProfileCommands;
use crate::commands::common::{build_changes, settle, AppContext};
use crate::error::CliError;

pub async fn run_profile(context: &AppContext, command: ProfileCommands) -> Result<(), CliError> {
    match command {
        ProfileCommands::Show { json } => {
            let session = if context.connectivity.is_online() {
                context.auth.refresh_profile().await?
            } else {
                context.session()?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&session.user)?);
            } else {
                print_user(&session.user);
            }
        }
        ProfileCommands::Update {
            name,
            email,
            fields,
        } => {
            let changes = build_changes(
                &[("name", name.as_deref()), ("email", email.as_deref())],
                &fields,
            )?;
            if let Some(session) = settle(context.auth.update_profile(&changes).await)? {
                println!("Profile updated for {}", session.user.display_name());
            }
        }
    }
    Ok(())
}

fn print_user(user: &User) {
    println!("id:    {}", user.id);
    println!("name:  {}", user.name.as_deref().unwrap_or("-"));
    println!("email: {}", user.email.as_deref().unwrap_or("-"));
    if let Some(role) = user.role.as_deref() {
        println!("role:  {role}");
    }
    let department = user.department.as_ref().and_then(|department| {
        department
            .get("name")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .or_else(|| department.as_str().map(str::to_string))
    });
    if let Some(department) = department {
        println!("dept:  {department}");
    }
}
