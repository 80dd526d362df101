//! Session lifecycle: the cache exists exactly as long as a signed-in
//! session does.

use chirp_core::{config::ChirpConfig, post::Author};

use crate::{store::Store, transport::Transport};

/// Owns the store for the signed-in user. There is no process-wide
/// state: dropping the session drops the cache, the views and the
/// pagination bookkeeping with it.
pub struct Session<T: Transport> {
    store: Option<Store<T>>,
}

impl<T: Transport> Session<T> {
    pub fn new() -> Self {
        Session { store: None }
    }

    /// Build a fresh, empty store for `user`. Signing in over an
    /// existing session discards the old store first.
    pub fn sign_in(&mut self, user: Author, transport: T, config: &ChirpConfig) -> &mut Store<T> {
        self.store = Some(Store::new(user, transport, config));
        self.store.as_mut().expect("store was just created")
    }

    /// Tear everything down. Responses still in flight die with the
    /// store they belonged to.
    pub fn sign_out(&mut self) {
        self.store = None;
    }

    pub fn is_signed_in(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Option<&Store<T>> {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> Option<&mut Store<T>> {
        self.store.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockServer;

    fn me() -> Author {
        Author {
            id: 1,
            username: "me".into(),
            display_name: "ME".into(),
            avatar: None,
        }
    }

    #[tokio::test]
    async fn sign_out_discards_all_state() {
        let config = ChirpConfig::default();
        let mut session = Session::new();

        let store = session.sign_in(me(), MockServer::seeded(me(), 5), &config);
        store.initial_load().await.unwrap();
        assert_eq!(store.feed_view().len(), 5);

        session.sign_out();
        assert!(!session.is_signed_in());
        assert!(session.store().is_none());

        // a new session starts from scratch
        let store = session.sign_in(me(), MockServer::seeded(me(), 3), &config);
        assert!(store.feed_view().is_empty());
        assert!(store.cache().table().is_empty());
    }
}
