//! Config subcommand handlers.

use std::io::IsTerminal;

use dialoguer::Input;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, InitArgs};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init(init) => init_profile(init, global),

        ConfigCommand::Show => {
            let mut cfg = config::load_config()?;
            for profile in cfg.profiles.values_mut() {
                if profile.password.is_some() {
                    profile.password = Some(REDACTED.into());
                }
            }
            let rendered = toml::to_string_pretty(&cfg).map_err(|e| CliError::Validation {
                field: "config".into(),
                reason: format!("failed to serialize config: {e}"),
            })?;
            output::print_output(rendered.trim_end());
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string());
            Ok(())
        }
    }
}

/// Create or replace a profile. Values missing from the flags are prompted
/// for on a terminal; without one they are an error.
fn init_profile(args: InitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let interactive = std::io::stdin().is_terminal();
    let mut cfg: Config = config::load_config()?;

    let name = match args.name.or_else(|| global.profile.clone()) {
        Some(name) => name,
        None if interactive => Input::new()
            .with_prompt("Profile name")
            .default("default".into())
            .interact_text()
            .map_err(prompt_err)?,
        None => "default".into(),
    };

    let host = required(global.host.clone(), "host", "Device address", interactive)?;
    let username = required(global.username.clone(), "username", "Username", interactive)?;

    let mut profile = Profile::new(host);
    profile.username = Some(username);
    profile.device_id = args.device_id;
    if let Some(channel) = global.channel {
        profile.channel = channel;
    }
    if let Some(interval) = global.poll_interval {
        profile.poll_interval = Some(interval);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    if let Some(env_name) = args.password_env {
        profile.password_env = Some(env_name);
    } else if let Some(ref password) = global.password {
        profile.password = Some(password.clone());
    } else if interactive {
        let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
        if password.is_empty() {
            return Err(CliError::Validation {
                field: "password".into(),
                reason: "password cannot be empty".into(),
            });
        }
        profile.password = Some(password);
    } else {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "pass --password or --password-env when not running interactively".into(),
        });
    }

    // Reject an unusable host before saving.
    intelbras_config::host_url(&profile.host)?;

    let first_profile = cfg.profiles.is_empty();
    cfg.profiles.insert(name.clone(), profile);
    if args.set_default || first_profile {
        cfg.default_profile = Some(name.clone());
    }

    let path = config::save_config(&cfg)?;
    eprintln!("Saved profile '{name}' to {}", path.display());
    Ok(())
}

fn required(
    value: Option<String>,
    field: &str,
    prompt: &str,
    interactive: bool,
) -> Result<String, CliError> {
    let value = match value {
        Some(v) => v,
        None if interactive => Input::new()
            .with_prompt(prompt)
            .interact_text()
            .map_err(prompt_err)?,
        None => {
            return Err(CliError::Validation {
                field: field.into(),
                reason: format!("--{field} is required when not running interactively"),
            });
        }
    };

    if value.trim().is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "cannot be empty".into(),
        });
    }
    Ok(value.trim().to_owned())
}
