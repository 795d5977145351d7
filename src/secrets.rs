//! Secret subsystem capability and the insecure-secrets data model.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A secret held directly in the writable configuration (insecure mode).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InsecureSecretsInfo {
    /// Name callers use to look the secret up
    pub secret_name: String,
    /// Key/value pairs making up the secret
    #[serde(default)]
    pub secret_data: HashMap<String, String>,
}

/// Insecure secrets keyed by their configuration entry name.
pub type InsecureSecrets = HashMap<String, InsecureSecretsInfo>;

/// The part of the secret subsystem the reconciler talks to.
pub trait SecretProvider: Send + Sync {
    /// Perform updates and callbacks for a secret that was added, changed, renamed or removed.
    fn secret_updated_at_secret_name(&self, secret_name: &str);

    /// Return an access token of `token_type` for `service_key`.
    ///
    /// Used to authenticate against the configuration provider.
    fn get_access_token(&self, token_type: &str, service_key: &str) -> Result<String>;
}

/// Secret names affected by a change from `previous` to `current`.
///
/// Covers removed entries (previous name), new entries (current name), entries whose
/// data changed (current name), and renames (both names). Sorted and de-duplicated.
pub fn secret_names_changed(previous: &InsecureSecrets, current: &InsecureSecrets) -> Vec<String> {
    let mut names = BTreeSet::new();

    for (key, previous_info) in previous {
        match current.get(key) {
            None => {
                names.insert(previous_info.secret_name.clone());
            }
            Some(current_info) if current_info != previous_info => {
                names.insert(current_info.secret_name.clone());
                if current_info.secret_name != previous_info.secret_name {
                    names.insert(previous_info.secret_name.clone());
                }
            }
            Some(_) => {}
        }
    }

    for (key, current_info) in current {
        if !previous.contains_key(key) {
            names.insert(current_info.secret_name.clone());
        }
    }

    names.into_iter().collect()
}
