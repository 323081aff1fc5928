//! Session command handlers: login, register, logout, whoami.

use dialoguer::Input;
use secrecy::SecretString;

use toonsync_core::MANAGEMENT_FEATURE;
use toonsync_core::api::{Credentials, Profile as UserProfile, Registration};

use crate::cli::{GlobalOpts, LoginArgs, RegisterArgs};
use crate::context::App;
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(user: &UserProfile) -> String {
    let name = format!("{} {}", user.first_name, user.last_name);
    let features = if user.features.is_empty() {
        "-".to_owned()
    } else {
        user.features.join(", ")
    };
    [
        format!("ID:       {}", user.id),
        format!("Username: {}", user.username),
        format!("Name:     {}", name.trim()),
        format!("Email:    {}", user.email),
        format!("Role:     {}", if user.role.is_empty() { "-" } else { user.role.as_str() }),
        format!("Features: {features}"),
        format!(
            "Manage:   {}",
            if user.has_feature(MANAGEMENT_FEATURE) { "yes" } else { "no" }
        ),
    ]
    .join("\n")
}

fn prompt_password(prompt: &str) -> Result<String, CliError> {
    let password = rpassword::prompt_password(prompt).map_err(util::prompt_err)?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(password)
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn login(app: &App, args: LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let username = match args.username.or_else(|| app.profile.username.clone()) {
        Some(username) => username,
        None => Input::new()
            .with_prompt("Username")
            .interact_text()
            .map_err(util::prompt_err)?,
    };
    let password = match toonsync_config::resolve_password(&app.profile_name) {
        Some(password) => password,
        None => SecretString::from(prompt_password("Password: ")?),
    };

    let user = app
        .client
        .login(&Credentials::new(username, password))
        .await?;

    if !global.quiet {
        eprintln!("✓ Signed in as {} (profile '{}')", user.username, app.profile_name);
        if !user.has_feature(MANAGEMENT_FEATURE) {
            eprintln!("  Note: this account cannot manage webtoons yet.");
        }
    }
    Ok(())
}

pub async fn register(app: &App, args: RegisterArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let password = match toonsync_config::resolve_password(&app.profile_name) {
        Some(password) => password,
        None => {
            let first = prompt_password("Password: ")?;
            let again = prompt_password("Repeat password: ")?;
            if first != again {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "passwords do not match".into(),
                });
            }
            SecretString::from(first)
        }
    };

    let registration = Registration {
        username: args.username,
        email: args.email,
        password,
    };
    let user = app.client.register(&registration).await?;

    if !global.quiet {
        eprintln!("✓ Account created, signed in as {}", user.username);
    }
    Ok(())
}

pub fn logout(app: &App, global: &GlobalOpts) {
    app.client.logout();
    if !global.quiet {
        eprintln!("Signed out of profile '{}'", app.profile_name);
    }
}

pub async fn whoami(app: &App, global: &GlobalOpts) -> Result<(), CliError> {
    let user = app.require_session().await?;
    let out = output::render_single(&global.output, &user, detail, |u| u.username.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}
