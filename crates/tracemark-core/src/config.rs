// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-organization forensics configuration.

use serde::{Deserialize, Serialize};

use crate::types::OrgId;

/// Persistent per-organization settings.
///
/// Created lazily on the first forensics or audit call for an org. The
/// signing secret is generated once, on first enable, and never rotated —
/// rotation would silently invalidate every outstanding watermark signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgConfig {
    pub org_id: OrgId,
    pub owner_email: String,
    pub watermarking_enabled: bool,
    /// Opaque HMAC signing secret (hex). `None` until first enable.
    pub watermark_secret: Option<String>,
    /// Whether org admins (not just the owner) may run direct verification.
    /// Stored per org but not consulted by the core workflow, which gates on
    /// the owner email alone; a transport layer that knows caller roles reads
    /// this flag to decide whether to route admins to the direct path.
    pub allow_admin_verify: bool,
}

impl OrgConfig {
    pub fn new(org_id: OrgId, owner_email: impl Into<String>) -> Self {
        Self {
            org_id,
            owner_email: owner_email.into(),
            watermarking_enabled: false,
            watermark_secret: None,
            allow_admin_verify: false,
        }
    }

    /// Redacted view for callers — exposes whether a secret exists, never
    /// the secret itself.
    pub fn view(&self) -> OrgConfigView {
        OrgConfigView {
            org_id: self.org_id.clone(),
            owner_email: self.owner_email.clone(),
            watermarking_enabled: self.watermarking_enabled,
            secret_configured: self.watermark_secret.is_some(),
        }
    }
}

/// What `GetOrgConfig` / `SetOrgConfig` return to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgConfigView {
    pub org_id: OrgId,
    pub owner_email: String,
    pub watermarking_enabled: bool,
    pub secret_configured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_starts_disabled_without_secret() {
        let config = OrgConfig::new(OrgId::new("org_1"), "owner@example.com");
        assert!(!config.watermarking_enabled);
        assert!(config.watermark_secret.is_none());
        assert!(!config.allow_admin_verify);
    }

    #[test]
    fn view_never_leaks_the_secret() {
        let mut config = OrgConfig::new(OrgId::new("org_1"), "owner@example.com");
        config.watermark_secret = Some("deadbeef".into());

        let view = config.view();
        assert!(view.secret_configured);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("deadbeef"));
    }
}
