//! Config subcommand handlers.

use dialoguer::{Input, Select};

use toonsync_config::{self as config, DEFAULT_PROFILE, KEYRING_SERVICE, Profile, TokenStoreKind};
use toonsync_core::api::DEFAULT_BASE_URL;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util::prompt_err;

const STORE_CHOICES: &[(&str, TokenStoreKind)] = &[
    ("System keyring (recommended)", TokenStoreKind::Keyring),
    ("File in the data directory", TokenStoreKind::File),
    ("Memory only (sign in every run)", TokenStoreKind::Memory),
];

fn keyring_err(e: &keyring::Error) -> CliError {
    CliError::Storage {
        message: format!("keyring: {e}"),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("toonsync configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let mut cfg = config::load_config_or_default();

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default(
                    global
                        .profile
                        .clone()
                        .unwrap_or_else(|| DEFAULT_PROFILE.into()),
                )
                .interact_text()
                .map_err(prompt_err)?;

            let api_url: String = Input::new()
                .with_prompt("API base URL")
                .default(DEFAULT_BASE_URL.into())
                .interact_text()
                .map_err(prompt_err)?;

            let username: String = Input::new()
                .with_prompt("Username (optional)")
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;

            let labels: Vec<&str> = STORE_CHOICES.iter().map(|(label, _)| *label).collect();
            let selection = Select::new()
                .with_prompt("Where should session tokens be kept?")
                .items(&labels)
                .default(0)
                .interact()
                .map_err(prompt_err)?;

            let profile = Profile {
                api_url,
                username: Some(username).filter(|u| !u.trim().is_empty()),
                token_store: Some(STORE_CHOICES[selection].1),
                ..Profile::default()
            };
            // Reject a bad URL before it lands on disk.
            config::profile_to_client_config(&profile, &cfg.defaults)?;

            cfg.profiles.insert(profile_name.clone(), profile);
            cfg.default_profile = Some(profile_name.clone());
            config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Next: toonsync login");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let out = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|_| format!("{c:#?}")),
                |_| "config".into(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or(DEFAULT_PROFILE);
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: toonsync config init");
            } else {
                let mut names: Vec<&String> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ──────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if name != DEFAULT_PROFILE && !cfg.profiles.contains_key(&name) {
                let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
                names.sort_unstable();
                return Err(CliError::ProfileNotFound {
                    available: if names.is_empty() {
                        "(none)".into()
                    } else {
                        names.join(", ")
                    },
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── SetPassword ─────────────────────────────────────────────
        ConfigCommand::SetPassword => {
            let cfg = config::load_config_or_default();
            let profile_name = cfg.profile_name(global.profile.as_deref());

            let password = rpassword::prompt_password(format!("Password for '{profile_name}': "))
                .map_err(prompt_err)?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }

            let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
                .map_err(|e| keyring_err(&e))?;
            entry.set_password(&password).map_err(|e| keyring_err(&e))?;
            eprintln!("✓ Password stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}
