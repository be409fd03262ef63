use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::ClientType;

/// Identifies whether a prior enclave is resumable for the current
/// configuration. Compared field-wise (§3, §4.5) rather than hashed, so a
/// mismatch can be reported per-field by the recovery engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub network: String,
    pub el_type: ClientType,
    pub cl_type: ClientType,
    pub el_image: String,
    pub cl_image: String,
    /// Order-sensitive: spec requires "order-equal" comparison for extra args.
    pub el_extra_args: Vec<String>,
    pub cl_extra_args: Vec<String>,
    /// Set-equal comparison for env is handled by the caller (recovery engine),
    /// which compares the key/value sets independent of map ordering.
    pub el_env: BTreeMap<String, String>,
    pub cl_env: BTreeMap<String, String>,
    pub enclave_name: String,
}

impl Fingerprint {
    /// Fields that differ between `self` and `other`, by name. Empty means a match.
    pub fn diff(&self, other: &Fingerprint) -> Vec<&'static str> {
        let mut mismatches = Vec::new();
        if self.network != other.network {
            mismatches.push("network");
        }
        if self.el_type != other.el_type {
            mismatches.push("el_type");
        }
        if self.cl_type != other.cl_type {
            mismatches.push("cl_type");
        }
        if self.el_image != other.el_image {
            mismatches.push("el_image");
        }
        if self.cl_image != other.cl_image {
            mismatches.push("cl_image");
        }
        if self.el_extra_args != other.el_extra_args {
            mismatches.push("el_extra_args");
        }
        if self.cl_extra_args != other.cl_extra_args {
            mismatches.push("cl_extra_args");
        }
        if self.el_env != other.el_env {
            mismatches.push("el_env");
        }
        if self.cl_env != other.cl_env {
            mismatches.push("cl_env");
        }
        if self.enclave_name != other.enclave_name {
            mismatches.push("enclave_name");
        }
        mismatches
    }

    pub fn matches(&self, other: &Fingerprint) -> bool {
        self.diff(other).is_empty()
    }

    /// Filesystem-safe key used for temp-report paths: `<network>_<el>_<cl>`,
    /// with any remaining non-alphanumeric run stripped to `_`.
    pub fn recovery_key(&self) -> String {
        sanitize(&format!("{}_{}_{}", self.network, self.el_type, self.cl_type))
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}
