//! Config subcommand handlers.

use serde::Serialize;
use tabled::Tabled;

use tagsync_config::{self as store, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const MASK: &str = "********";

#[derive(Serialize)]
struct ProfileSummary {
    name: String,
    server: String,
    device: Option<String>,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Device")]
    device: String,
}

/// Replace plaintext tokens before display.
fn redact(cfg: &mut Config) {
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init {
            name,
            server,
            device,
        } => {
            server.parse::<url::Url>().map_err(|_| CliError::Validation {
                field: "server".into(),
                reason: format!("invalid URL: {server}"),
            })?;

            let mut cfg = store::load_config()?;
            let profile = cfg.profiles.entry(name.clone()).or_default();
            profile.server = server;
            if device.is_some() {
                profile.device = device;
            }
            if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
                cfg.default_profile = Some(name.clone());
            }

            let path = store::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Profile '{name}' written to {}", path.display());
                eprintln!("  Test it: tagsync stats --profile {name}");
            }
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let mut cfg = store::load_config()?;
            redact(&mut cfg);
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)?,
                format => {
                    output::render_single(format, &cfg, |_| String::new(), |_| String::new())?
                }
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", store::config_path().display());
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = store::load_config()?;
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: tagsync config init --server <URL>");
                return Ok(());
            }

            let default = cfg.default_profile_name();
            let mut summaries: Vec<ProfileSummary> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileSummary {
                    name: name.clone(),
                    server: p.server.clone(),
                    device: p.device.clone(),
                    default: name == default,
                })
                .collect();
            summaries.sort_by(|a, b| a.name.cmp(&b.name));

            let out = output::render_list(
                global.output,
                &summaries,
                |s| ProfileRow {
                    marker: if s.default { "*" } else { "" },
                    name: s.name.clone(),
                    server: s.server.clone(),
                    device: s.device.clone().unwrap_or_default(),
                },
                |s| {
                    if s.default {
                        format!("{} *", s.name)
                    } else {
                        s.name.clone()
                    }
                },
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = store::load_config()?;
            cfg.profile(&name)?;
            cfg.default_profile = Some(name.clone());
            store::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }

        // ── Tokens ──────────────────────────────────────────────────
        ConfigCommand::SetToken { token } => {
            if token.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "token cannot be empty".into(),
                });
            }
            let cfg = store::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);
            store::store_token(&name, &token)?;
            if !global.quiet {
                eprintln!("✓ Token stored in system keyring for profile '{name}'");
            }
            Ok(())
        }

        ConfigCommand::DeleteToken => {
            let cfg = store::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);
            store::delete_token(&name)?;
            if !global.quiet {
                eprintln!("✓ Token removed for profile '{name}'");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use tagsync_config::Profile;

    use super::*;

    #[test]
    fn redact_masks_only_present_tokens() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "a".into(),
            Profile {
                token: Some("secret".into()),
                ..Profile::default()
            },
        );
        cfg.profiles.insert("b".into(), Profile::default());

        redact(&mut cfg);

        assert_eq!(cfg.profiles["a"].token.as_deref(), Some(MASK));
        assert_eq!(cfg.profiles["b"].token, None);
    }
}
