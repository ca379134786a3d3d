//! CLI flag overrides on top of ndtviz-config profiles.
//!
//! Core never sees these types -- it receives a pre-built `DashboardConfig`.

use ndtviz_config::{Config, Profile, config_path, load_config_or_default, profile_to_dashboard_config};
use ndtviz_core::DashboardConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names for help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    names.sort();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

/// Build a `DashboardConfig` from the config file, profile, and CLI overrides.
///
/// Flag > env > profile. Without any profile, `--backend` alone suffices.
pub fn build_dashboard_config(global: &GlobalOpts) -> Result<DashboardConfig, CliError> {
    let cfg = load_config_or_default();
    let name = active_profile_name(global, &cfg);

    let mut profile = match (cfg.profiles.get(&name), &global.backend) {
        (Some(profile), _) => profile.clone(),
        (None, Some(backend)) => Profile {
            backend: backend.clone(),
            ..Profile::default()
        },
        (None, None) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(&cfg),
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(ref backend) = global.backend {
        profile.backend.clone_from(backend);
    }
    if let Some(ref feed) = global.feed {
        profile.feed = Some(feed.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    tracing::debug!(profile = %name, backend = %profile.backend, "resolved profile");
    Ok(profile_to_dashboard_config(&profile, &cfg.defaults)?)
}
