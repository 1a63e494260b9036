// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Org configuration — lazy creation and the generate-once signing secret.

use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, info};

use tracemark_core::error::{Result, TracemarkError};
use tracemark_core::{OrgConfig, OrgId};

use crate::store::OrgState;

/// Length of the generated signing secret in raw bytes (hex doubles it).
const SECRET_BYTES: usize = 32;

/// Return the org's config, creating it lazily on first touch.
pub fn ensure_config<'a>(
    state: &'a mut OrgState,
    org: &OrgId,
    owner_email: &str,
) -> &'a mut OrgConfig {
    if state.config.is_none() {
        info!(org = %org, "creating org forensics config");
        state.config = Some(OrgConfig::new(org.clone(), owner_email));
    }
    state
        .config
        .as_mut()
        .expect("config was just ensured")
}

/// Return the org's signing secret, generating it exactly once.
///
/// An existing secret is never overwritten: rotation would silently
/// invalidate every outstanding watermark signature.
pub fn ensure_secret(config: &mut OrgConfig) -> Result<String> {
    if let Some(secret) = &config.watermark_secret {
        return Ok(secret.clone());
    }
    let secret = generate_secret()?;
    config.watermark_secret = Some(secret.clone());
    debug!(org = %config.org_id, "signing secret generated");
    Ok(secret)
}

/// 32 random bytes from the system CSPRNG, hex-encoded.
pub fn generate_secret() -> Result<String> {
    let rng = SystemRandom::new();
    let mut buf = [0u8; SECRET_BYTES];
    rng.fill(&mut buf)
        .map_err(|_| TracemarkError::Configuration("secret generation failed".into()))?;
    Ok(hex::encode(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> OrgId {
        OrgId::new("org_1")
    }

    #[test]
    fn config_is_created_lazily() {
        let mut state = OrgState::default();
        assert!(state.config.is_none());

        let config = ensure_config(&mut state, &org(), "owner@example.com");
        assert_eq!(config.owner_email, "owner@example.com");
        assert!(state.config.is_some());
    }

    #[test]
    fn existing_config_keeps_its_owner() {
        let mut state = OrgState::default();
        ensure_config(&mut state, &org(), "owner@example.com");

        // A later call with a different email must not overwrite.
        let config = ensure_config(&mut state, &org(), "intruder@example.com");
        assert_eq!(config.owner_email, "owner@example.com");
    }

    #[test]
    fn secret_is_generated_once_and_stable() {
        let mut state = OrgState::default();
        let config = ensure_config(&mut state, &org(), "owner@example.com");

        let first = ensure_secret(config).unwrap();
        let second = ensure_secret(config).unwrap();
        assert_eq!(first, second, "secret must never be regenerated");
        assert_eq!(first.len(), SECRET_BYTES * 2);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_secrets_differ_between_orgs() {
        let a = generate_secret().unwrap();
        let b = generate_secret().unwrap();
        assert_ne!(a, b);
    }
}
