//! Upstream API key lookup.

use rc_domain::config::AuthConfig;
use rc_domain::error::{Error, Result};

/// Resolve the upstream key from an [`AuthConfig`].
///
/// Precedence:
/// 1. `key` field (plaintext, warned)
/// 2. `service` + `account` in the OS keychain
/// 3. `env` variable
/// 4. `{SERVICE}_{ACCOUNT}` env variable, for hosts without a keychain
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    if let Some(key) = auth.key.as_deref().filter(|k| !k.is_empty()) {
        tracing::warn!("upstream key read from plaintext config field 'key'; prefer env or keychain");
        return Ok(key.to_owned());
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        match read_keychain(service, account) {
            Ok(secret) => return Ok(secret),
            Err(e) => tracing::warn!(
                service = %service,
                account = %account,
                error = %e,
                "keychain lookup failed, trying env"
            ),
        }
    }

    if let Some(var) = &auth.env {
        match std::env::var(var) {
            Ok(val) if !val.is_empty() => return Ok(val),
            _ => tracing::debug!(env_var = %var, "key env var unset"),
        }
    }

    if let (Some(service), Some(account)) = (&auth.service, &auth.account) {
        let var = keychain_fallback_env_name(service, account);
        if let Ok(val) = std::env::var(&var) {
            if !val.is_empty() {
                tracing::info!(env_var = %var, "upstream key read from keychain fallback env var");
                return Ok(val);
            }
        }
    }

    Err(Error::Auth(
        "no upstream API key: set relay.auth.env, relay.auth.service + account, or relay.auth.key"
            .into(),
    ))
}

pub fn read_keychain(service: &str, account: &str) -> Result<String> {
    keyring::Entry::new(service, account)
        .and_then(|entry| entry.get_password())
        .map_err(|e| Error::Auth(format!("keychain read failed: {e}")))
}

pub fn store_in_keychain(service: &str, account: &str, secret: &str) -> Result<()> {
    keyring::Entry::new(service, account)
        .and_then(|entry| entry.set_password(secret))
        .map_err(|e| Error::Auth(format!("keychain write failed: {e}")))
}

/// `("relaychat", "gemini-key")` → `"RELAYCHAT_GEMINI_KEY"`.
pub fn keychain_fallback_env_name(service: &str, account: &str) -> String {
    format!(
        "{}_{}",
        service.to_uppercase().replace('-', "_"),
        account.to_uppercase().replace('-', "_"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(key: Option<&str>, env: Option<&str>) -> AuthConfig {
        AuthConfig {
            key: key.map(Into::into),
            env: env.map(Into::into),
            service: None,
            account: None,
        }
    }

    #[test]
    fn fallback_env_name() {
        assert_eq!(
            keychain_fallback_env_name("relaychat", "gemini-key"),
            "RELAYCHAT_GEMINI_KEY"
        );
    }

    #[test]
    fn plaintext_key_wins() {
        let key = resolve_api_key(&auth(Some("k-123"), Some("RC_TEST_NEVER_SET_1"))).unwrap();
        assert_eq!(key, "k-123");
    }

    #[test]
    fn env_var_is_read() {
        std::env::set_var("RC_TEST_RELAY_KEY_2", "from-env");
        let key = resolve_api_key(&auth(None, Some("RC_TEST_RELAY_KEY_2"))).unwrap();
        assert_eq!(key, "from-env");
    }

    #[test]
    fn missing_everywhere_is_an_auth_error() {
        let err = resolve_api_key(&auth(None, Some("RC_TEST_NEVER_SET_3"))).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn headless_fallback_env() {
        std::env::set_var("RC_TEST_SVC_ACCT_4", "fallback");
        let cfg = AuthConfig {
            key: None,
            env: None,
            // No keychain daemon in CI; the lookup fails and falls through.
            service: Some("rc-test-svc".into()),
            account: Some("acct-4".into()),
        };
        assert_eq!(keychain_fallback_env_name("rc-test-svc", "acct-4"), "RC_TEST_SVC_ACCT_4");
        assert_eq!(resolve_api_key(&cfg).unwrap(), "fallback");
    }
}
