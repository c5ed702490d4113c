//! Registry of issued client tokens.
//!
//! Every privileged operation is gated on [`ClientRegistry::is_known`].
//! Lookups take a shared lock; registration takes the exclusive lock only
//! for the duplicate check and the insert. Entries are never removed, so a
//! token stays valid for the life of the process.

use std::collections::HashMap;

use parking_lot::RwLock;
use statesync_types::{ClientToken, ClientType};

/// Map from issued token to the type the client declared.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientToken, ClientType>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh token and record the declared type against it.
    ///
    /// The uniqueness check and insert happen under one exclusive lock, so
    /// concurrent callers can never receive the same token.
    pub fn register(&self, client_type: ClientType) -> ClientToken {
        loop {
            let token = ClientToken::generate();
            let mut clients = self.clients.write();
            if !clients.contains_key(&token) {
                clients.insert(token.clone(), client_type);
                return token;
            }
        }
    }

    /// Whether `token` was issued by this registry.
    pub fn is_known(&self, token: &ClientToken) -> bool {
        self.clients.read().contains_key(token)
    }

    /// The type a client declared on connect.
    pub fn client_type(&self, token: &ClientToken) -> Option<ClientType> {
        self.clients.read().get(token).cloned()
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Whether no client has connected yet.
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn registered_token_is_known() {
        let registry = ClientRegistry::new();
        let token = registry.register(ClientType::from("unity"));
        assert!(registry.is_known(&token));
        assert_eq!(registry.client_type(&token), Some(ClientType::from("unity")));
        assert!(!registry.is_known(&ClientToken::from("forged")));
    }

    #[test]
    fn concurrent_registration_yields_distinct_tokens() {
        let registry = ClientRegistry::new();
        let tokens: Vec<ClientToken> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let registry = &registry;
                    scope.spawn(move || {
                        (0..250)
                            .map(|_| registry.register(ClientType::from("bot")))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap())
                .collect()
        });

        let unique: HashSet<&ClientToken> = tokens.iter().collect();
        assert_eq!(tokens.len(), 2000);
        assert_eq!(unique.len(), 2000);
        assert_eq!(registry.len(), 2000);
    }
}
