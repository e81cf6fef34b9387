//! Certificate trust policy handed to the engine's networking layer.
//!
//! The policy is a value, not a process-wide switch: callers ask it how to
//! treat a connection made for a given purpose and configure their TLS
//! client accordingly. Relaxed trust only ever applies to
//! [`ConnectionPurpose::Discovery`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Why an outbound secure connection is being made.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConnectionPurpose {
    /// Any connection not covered by a narrower purpose.
    General,
    /// Device discovery and pairing with peers that present self-signed
    /// certificates.
    Discovery,
}

/// How certificates presented by a remote peer are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateTrust {
    /// Validate the chain and host name.
    Verify,
    /// Accept any certificate.
    AcceptAny,
}

/// Injectable certificate policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CertificatePolicy {
    trust_discovery: bool,
}

impl CertificatePolicy {
    /// Policy that verifies every certificate.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            trust_discovery: false,
        }
    }

    /// Policy that accepts any certificate for discovery connections only.
    #[must_use]
    pub const fn trusting_discovery() -> Self {
        Self {
            trust_discovery: true,
        }
    }

    /// Returns `true` when any purpose bypasses verification.
    #[must_use]
    pub const fn is_relaxed(&self) -> bool {
        self.trust_discovery
    }

    /// Trust applied to a connection made for `purpose`.
    #[must_use]
    pub const fn trust_for(&self, purpose: ConnectionPurpose) -> CertificateTrust {
        match purpose {
            ConnectionPurpose::Discovery if self.trust_discovery => CertificateTrust::AcceptAny,
            ConnectionPurpose::Discovery | ConnectionPurpose::General => CertificateTrust::Verify,
        }
    }
}
