//! Download gate
//!
//! Every file-info, preview, verify, and download request runs the same
//! fixed-order validity pipeline: existence (checked by the caller's lookup),
//! release date, expiry, download limit, then password. The order matters:
//! a link that is both released and expired reports expired, and a link
//! whose release date has not arrived reports that before anything else.

use crate::store::FileLink;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

mod password;

pub use password::{hash_password, verify_password};

/// Outcome of the validity pipeline, before any password check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// All checks passed.
    Allow,

    /// Content is gated until the carried instant (403, body includes it).
    NotYetReleased(DateTime<Utc>),

    /// Expiry passed. Caller eagerly deletes blob and record (410).
    Expired,

    /// Download limit reached. Caller eagerly deletes blob and record (410).
    LimitReached,
}

impl GateDecision {
    /// Whether the caller should eagerly delete the blob and record.
    pub fn requires_cleanup(&self) -> bool {
        matches!(self, GateDecision::Expired | GateDecision::LimitReached)
    }
}

/// Password check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordDecision {
    Allow,
    /// Link is protected and no password was supplied (401).
    Required,
    /// Supplied password does not match (401).
    Invalid,
}

/// Run the release/expiry/limit pipeline against a link at `now`.
pub fn evaluate(link: &FileLink, now: DateTime<Utc>) -> GateDecision {
    if let Some(release_date) = link.release_date {
        if now < release_date {
            return GateDecision::NotYetReleased(release_date);
        }
    }

    if let Some(expires_at) = link.expires_at {
        if now > expires_at {
            return GateDecision::Expired;
        }
    }

    if let Some(max) = link.max_downloads {
        if link.download_count >= max {
            return GateDecision::LimitReached;
        }
    }

    GateDecision::Allow
}

/// Check a supplied password against a link's stored hash.
///
/// Unprotected links always pass.
pub fn check_password(link: &FileLink, supplied: Option<&str>) -> PasswordDecision {
    let Some(ref stored) = link.password_hash else {
        return PasswordDecision::Allow;
    };

    match supplied {
        None => PasswordDecision::Required,
        Some(password) => {
            if verify_password(password, stored) {
                PasswordDecision::Allow
            } else {
                PasswordDecision::Invalid
            }
        }
    }
}

/// Hex SHA-256 of arbitrary bytes. Shared by password hashing and the
/// uploader's file fingerprint.
pub(crate) fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}
