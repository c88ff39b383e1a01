//! Credential resolver consumed-capability: infrastructure for the tool
//! registry's loader, not a credential vault (no storage or rotation
//! policy lives here — see DESIGN.md). Adapted from the reference
//! daemon's `services::credential_store` OS-keychain wrapper, generalized
//! from a fixed `CredentialType` enum and `(type, username)` key to a
//! single free-form credential name, and widened with an always-available
//! environment-variable resolver so tool resolution never hard-depends on
//! a keychain being present.

mod env;
#[cfg(feature = "keyring-store")]
mod keyring_store;

use std::sync::Arc;

pub use env::EnvCredentialResolver;
#[cfg(feature = "keyring-store")]
pub use keyring_store::KeyringCredentialResolver;

/// Resolves a named credential to its secret value. Implementations never
/// log the resolved value.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<zeroize::Zeroizing<String>>;
}

/// Tries each resolver in order, returning the first hit.
pub struct ChainResolver {
    resolvers: Vec<Box<dyn CredentialResolver>>,
}

impl ChainResolver {
    pub fn new(resolvers: Vec<Box<dyn CredentialResolver>>) -> Self {
        ChainResolver { resolvers }
    }
}

impl CredentialResolver for ChainResolver {
    fn resolve(&self, name: &str) -> Option<zeroize::Zeroizing<String>> {
        self.resolvers.iter().find_map(|r| r.resolve(name))
    }
}

/// The production-default resolver: OS keychain first (when the
/// `keyring-store` feature is on), falling back to `SWARMKEEP_CRED_<NAME>`
/// environment variables, which are always available.
pub fn default_resolver() -> Arc<dyn CredentialResolver> {
    #[cfg(feature = "keyring-store")]
    {
        Arc::new(ChainResolver::new(vec![
            Box::new(KeyringCredentialResolver::new()),
            Box::new(EnvCredentialResolver),
        ]))
    }
    #[cfg(not(feature = "keyring-store"))]
    {
        Arc::new(EnvCredentialResolver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverResolver;
    impl CredentialResolver for NeverResolver {
        fn resolve(&self, _name: &str) -> Option<zeroize::Zeroizing<String>> {
            None
        }
    }

    #[test]
    fn chain_falls_through_to_later_resolver() {
        std::env::set_var("SWARMKEEP_CRED_CHAIN_TEST", "chained-value");
        let chain = ChainResolver::new(vec![Box::new(NeverResolver), Box::new(EnvCredentialResolver)]);
        assert_eq!(
            chain.resolve("chain_test").as_deref().map(|s| s.as_str()),
            Some("chained-value")
        );
        std::env::remove_var("SWARMKEEP_CRED_CHAIN_TEST");
    }

    #[test]
    fn chain_with_no_hits_resolves_to_none() {
        let chain = ChainResolver::new(vec![Box::new(NeverResolver)]);
        assert!(chain.resolve("missing").is_none());
    }
}
