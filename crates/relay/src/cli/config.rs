use anyhow::{bail, Context};
use serde::Serialize;

use rc_domain::config::{Config, ConfigSeverity, ObservabilityConfig, RelayConfig};

use crate::credential::store_in_keychain;

/// Print every validation issue.  Returns `false` when any is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    for issue in &issues {
        println!("{issue}");
    }
    println!(
        "\n{} error(s), {} warning(s) in {config_path}",
        error_count,
        issues.len() - error_count,
    );

    error_count == 0
}

#[derive(Serialize)]
struct RelaySections<'a> {
    relay: &'a RelayConfig,
    observability: &'a ObservabilityConfig,
}

/// Render the relay's view of the config, with a plaintext key masked.
pub fn render(config: &Config) -> anyhow::Result<String> {
    let mut relay = config.relay.clone();
    if relay.auth.key.is_some() {
        relay.auth.key = Some("********".into());
    }
    let sections = RelaySections {
        relay: &relay,
        observability: &config.observability,
    };
    toml::to_string_pretty(&sections).context("serializing config")
}

pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", render(config)?);
    Ok(())
}

/// Prompt for the upstream key and store it in the OS keychain.
pub fn set_secret(config: &Config) -> anyhow::Result<()> {
    let auth = &config.relay.auth;
    let (Some(service), Some(account)) = (&auth.service, &auth.account) else {
        bail!("set relay.auth.service and relay.auth.account before storing a secret");
    };

    let secret = rpassword::prompt_password_stderr(&format!("API key for {service}/{account}: "))
        .context("reading API key")?;
    let secret = secret.trim();
    if secret.is_empty() {
        bail!("empty key, nothing stored");
    }

    store_in_keychain(service, account, secret)?;
    eprintln!("Stored key in the OS keychain ({service}/{account}).");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_masks_plaintext_key() {
        let mut config = Config::default();
        config.relay.auth.key = Some("super-secret".into());
        let out = render(&config).unwrap();
        assert!(!out.contains("super-secret"));
        assert!(out.contains("[relay]"));
        assert!(out.contains("port = 8787"));
    }

    #[test]
    fn rendered_sections_parse_back() {
        let out = render(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&out).unwrap();
        assert_eq!(parsed.relay.path, "/api/generate");
        assert_eq!(parsed.relay.presets.len(), 3);
    }
}
