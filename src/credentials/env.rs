//! The always-available resolver: looks up `SWARMKEEP_CRED_<NAME>`, with
//! `name` upper-cased.

use zeroize::Zeroizing;

use super::CredentialResolver;

pub struct EnvCredentialResolver;

impl CredentialResolver for EnvCredentialResolver {
    fn resolve(&self, name: &str) -> Option<Zeroizing<String>> {
        let var = format!("SWARMKEEP_CRED_{}", name.to_uppercase());
        std::env::var(var).ok().map(Zeroizing::new)
    }
}
