//! CLI-side configuration: applies global flags on top of the shared
//! `tagsync_config` profiles to produce a `SyncConfig`.

use std::time::Duration;

use secrecy::SecretString;

use tagsync_config::{Config, config_path, profile_to_sync_config};
use tagsync_core::{SyncConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.default_profile_name().to_owned())
}

/// Translate the active profile plus global flags into a `SyncConfig`.
///
/// Flags win over the profile. Without a matching profile, `--server` is
/// enough on its own; an explicitly named profile must exist.
pub fn resolve_sync_config(
    global: &GlobalOpts,
    config: &Config,
    stream_enabled: bool,
) -> Result<SyncConfig, CliError> {
    let profile_name = active_profile_name(global, config);

    let profile = match config.profile(&profile_name) {
        Ok(profile) => Some(profile),
        Err(_) if global.profile.is_none() => None,
        Err(e) => return Err(e.into()),
    };

    let mut sync = match profile {
        Some(profile) => profile_to_sync_config(profile, &profile_name, &config.defaults)?,
        None => {
            let server = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            let mut sync = SyncConfig::new(parse_server(server)?);
            sync.timeout = Duration::from_secs(config.defaults.timeout);
            if config.defaults.insecure {
                sync.tls = TlsVerification::DangerAcceptInvalid;
            }
            sync
        }
    };

    if let Some(server) = global.server.as_deref() {
        sync.server_url = parse_server(server)?;
    }
    if let Some(device) = global.device.as_deref().filter(|d| !d.is_empty()) {
        device.clone_into(&mut sync.default_device_id);
    }
    if let Some(token) = &global.token {
        sync.auth_token = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        sync.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        sync.timeout = Duration::from_secs(secs);
    }
    sync.stream_enabled = stream_enabled;

    Ok(sync)
}

fn parse_server(raw: &str) -> Result<url::Url, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {raw}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;
    use tagsync_config::Profile;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["tagsync"];
        argv.extend_from_slice(args);
        argv.push("stats");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with_plant() -> Config {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "plant".into(),
            Profile {
                server: "http://10.0.0.5:8080".into(),
                device: Some("plc_007".into()),
                timeout: Some(5),
                ..Profile::default()
            },
        );
        cfg
    }

    #[test]
    fn server_flag_alone_is_enough() {
        let sync =
            resolve_sync_config(&global(&["--server", "http://gw:8080"]), &Config::default(), false)
                .unwrap();
        assert_eq!(sync.server_url.as_str(), "http://gw:8080/");
        assert_eq!(sync.default_device_id, "plc_001");
        assert!(!sync.stream_enabled);
    }

    #[test]
    fn missing_server_and_profile_is_no_config() {
        let err = resolve_sync_config(&global(&[]), &Config::default(), false).unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }

    #[test]
    fn flags_override_profile() {
        let sync = resolve_sync_config(
            &global(&["--profile", "plant", "--device", "plc_009", "--timeout", "2", "-k"]),
            &config_with_plant(),
            true,
        )
        .unwrap();
        assert_eq!(sync.server_url.as_str(), "http://10.0.0.5:8080/");
        assert_eq!(sync.default_device_id, "plc_009");
        assert_eq!(sync.timeout, Duration::from_secs(2));
        assert_eq!(sync.tls, TlsVerification::DangerAcceptInvalid);
        assert!(sync.stream_enabled);
    }

    #[test]
    fn explicit_unknown_profile_fails() {
        let err =
            resolve_sync_config(&global(&["--profile", "lab"]), &config_with_plant(), false)
                .unwrap_err();
        match err {
            CliError::ProfileNotFound { name, available } => {
                assert_eq!(name, "lab");
                assert_eq!(available, "plant");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
