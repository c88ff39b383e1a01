//! OS-keychain-backed resolver: a `keyring::Entry` under one service name,
//! keyed by the credential's own name rather than a fixed enum plus
//! username.

use keyring::Entry;
use zeroize::{Zeroize, Zeroizing};

use super::CredentialResolver;

const SERVICE_NAME: &str = "swarmkeep.credentials";

pub struct KeyringCredentialResolver;

impl KeyringCredentialResolver {
    pub fn new() -> Self {
        KeyringCredentialResolver
    }
}

impl Default for KeyringCredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialResolver for KeyringCredentialResolver {
    fn resolve(&self, name: &str) -> Option<Zeroizing<String>> {
        let entry = Entry::new(SERVICE_NAME, name).ok()?;
        let mut secret = entry.get_password().ok()?;
        let zeroized = Zeroizing::new(secret.clone());
        secret.zeroize();
        Some(zeroized)
    }
}
