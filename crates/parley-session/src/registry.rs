//! The online-user registry: who is in the room, by name.
//!
//! Every operation takes the single `RwLock` once and finishes before
//! releasing it, so no caller ever sees a half-applied change. Readers
//! (fan-out snapshots, listings, lookups) share the lock; registration,
//! removal, and rename take it exclusively.
//!
//! The lock is a `std::sync::RwLock`: critical sections are short and
//! never cross an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use parley_protocol::validate_name;
use parley_transport::ConnectionId;

use crate::{DisconnectReason, Session, SessionError, SessionState};

/// Name → session directory of the sessions currently `Online`.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a `Connecting` session under its current name and moves
    /// it to `Online`. Returns the name it was registered under.
    ///
    /// The default name is the remote address. If someone has already
    /// renamed themselves to that, the session is registered as
    /// `<address>#<connection number>` instead.
    ///
    /// # Errors
    /// - [`SessionError::NotOnline`] if the session is not `Connecting`.
    /// - [`SessionError::NameTaken`] if the fallback name is taken too.
    pub fn register(&self, session: &Arc<Session>) -> Result<String, SessionError> {
        let mut sessions = self.write();

        if session.state() != SessionState::Connecting {
            return Err(SessionError::NotOnline(session.id()));
        }

        let mut name = session.name();
        if sessions.contains_key(&name) {
            name = format!("{name}#{}", session.id().into_inner());
            if sessions.contains_key(&name) {
                return Err(SessionError::NameTaken(name));
            }
            session.set_name(name.clone());
        }

        sessions.insert(name.clone(), Arc::clone(session));
        session.transition(SessionState::Connecting, SessionState::Online);

        tracing::info!(session_id = %session.id(), %name, "session registered");
        Ok(name)
    }

    /// Removes a session from the registry and moves it to
    /// `Disconnecting`, then fires its cancellation token.
    ///
    /// This is the single entry point for every disconnect trigger (end
    /// of stream, read/write failure, heartbeat timeout, kick). Only the
    /// first call for a session does anything; later calls return
    /// `false`, which makes racing triggers harmless.
    pub fn unregister(&self, session: &Session, reason: DisconnectReason) -> bool {
        {
            let mut sessions = self.write();
            let left = session
                .transition(SessionState::Online, SessionState::Disconnecting)
                || session.transition(
                    SessionState::Connecting,
                    SessionState::Disconnecting,
                );
            if !left {
                return false;
            }
            session.set_reason(reason);

            let name = session.name();
            if sessions
                .get(&name)
                .is_some_and(|entry| entry.id() == session.id())
            {
                sessions.remove(&name);
            }
        }

        session.cancel();
        tracing::info!(
            session_id = %session.id(),
            name = %session.name(),
            %reason,
            "session unregistered"
        );
        true
    }

    /// Forces the named session out. Returns `false` if no such session
    /// is online (or it was already leaving).
    pub fn disconnect_by_name(&self, name: &str, reason: DisconnectReason) -> bool {
        match self.lookup(name) {
            Some(session) => self.unregister(&session, reason),
            None => false,
        }
    }

    /// Looks up an online session by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<Session>> {
        self.read().get(name).cloned()
    }

    /// Returns the sorted names of all online sessions except `excluding`.
    pub fn list_names(&self, excluding: ConnectionId) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .iter()
            .filter(|(_, session)| session.id() != excluding)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Returns a snapshot of all online sessions, for fan-out.
    pub fn online(&self) -> Vec<Arc<Session>> {
        self.read().values().cloned().collect()
    }

    /// Renames an online session. Returns the old name.
    ///
    /// The check, the removal of the old key, the name change, and the
    /// insertion of the new key all happen under one write-lock
    /// acquisition. On error nothing changes.
    ///
    /// # Errors
    /// - [`SessionError::InvalidName`] if `new_name` fails validation.
    /// - [`SessionError::NotOnline`] if the session is not `Online`.
    /// - [`SessionError::NameTaken`] if any online session (the caller
    ///   included) already uses `new_name`.
    pub fn rename(&self, session: &Session, new_name: &str) -> Result<String, SessionError> {
        validate_name(new_name)?;
        let mut sessions = self.write();

        if !session.state().is_online() {
            return Err(SessionError::NotOnline(session.id()));
        }
        if sessions.contains_key(new_name) {
            return Err(SessionError::NameTaken(new_name.to_string()));
        }

        let old_name = session.name();
        let entry = sessions
            .remove(&old_name)
            .ok_or(SessionError::NotOnline(session.id()))?;
        session.set_name(new_name.to_string());
        sessions.insert(new_name.to_string(), entry);

        tracing::info!(
            session_id = %session.id(),
            old_name = %old_name,
            new_name,
            "session renamed"
        );
        Ok(old_name)
    }

    /// Returns the number of online sessions.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if nobody is online.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionRegistry`.
    //!
    //! Naming convention: `test_{function}_{scenario}_{expected}`.

    use super::*;
    use crate::SessionConfig;
    use parley_protocol::ProtocolError;

    // -- Helpers ----------------------------------------------------------

    fn session(id: u64) -> Arc<Session> {
        let addr = format!("127.0.0.1:{}", 40000 + id).parse().unwrap();
        let (session, _rx) =
            Session::new(ConnectionId::new(id), addr, &SessionConfig::default());
        session
    }

    fn online(registry: &SessionRegistry, id: u64, name: &str) -> Arc<Session> {
        let s = session(id);
        registry.register(&s).unwrap();
        registry.rename(&s, name).unwrap();
        s
    }

    // =====================================================================
    // register()
    // =====================================================================

    #[test]
    fn test_register_connecting_session_goes_online() {
        let registry = SessionRegistry::new();
        let s = session(1);

        let name = registry.register(&s).expect("should register");

        assert_eq!(name, "127.0.0.1:40001");
        assert_eq!(s.state(), SessionState::Online);
        assert!(registry.lookup(&name).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_twice_rejected() {
        let registry = SessionRegistry::new();
        let s = session(1);
        registry.register(&s).unwrap();

        assert!(matches!(
            registry.register(&s),
            Err(SessionError::NotOnline(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_default_name_collision_gets_suffix() {
        let registry = SessionRegistry::new();
        let squatter = online(&registry, 1, "127.0.0.1:40002");
        let s = session(2);

        let name = registry.register(&s).unwrap();

        assert_eq!(name, "127.0.0.1:40002#2");
        assert_eq!(s.name(), name);
        assert_eq!(
            registry.lookup("127.0.0.1:40002").unwrap().id(),
            squatter.id()
        );
    }

    // =====================================================================
    // rename()
    // =====================================================================

    #[test]
    fn test_rename_moves_key_atomically() {
        let registry = SessionRegistry::new();
        let s = session(1);
        let default = registry.register(&s).unwrap();

        let old = registry.rename(&s, "alice").unwrap();

        assert_eq!(old, default);
        assert_eq!(s.name(), "alice");
        assert!(registry.lookup(&default).is_none());
        assert_eq!(registry.lookup("alice").unwrap().id(), s.id());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rename_to_taken_name_changes_nothing() {
        let registry = SessionRegistry::new();
        let alice = online(&registry, 1, "alice");
        let bob = online(&registry, 2, "bob");

        let result = registry.rename(&bob, "alice");

        assert!(matches!(result, Err(SessionError::NameTaken(n)) if n == "alice"));
        assert_eq!(alice.name(), "alice");
        assert_eq!(bob.name(), "bob");
        assert_eq!(registry.lookup("alice").unwrap().id(), alice.id());
        assert_eq!(registry.lookup("bob").unwrap().id(), bob.id());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_rename_to_own_name_is_taken() {
        let registry = SessionRegistry::new();
        let alice = online(&registry, 1, "alice");
        assert!(matches!(
            registry.rename(&alice, "alice"),
            Err(SessionError::NameTaken(_))
        ));
    }

    #[test]
    fn test_rename_invalid_name_rejected() {
        let registry = SessionRegistry::new();
        let alice = online(&registry, 1, "alice");
        assert!(matches!(
            registry.rename(&alice, "mary ann"),
            Err(SessionError::InvalidName(ProtocolError::InvalidName(_)))
        ));
        assert_eq!(alice.name(), "alice");
    }

    #[test]
    fn test_rename_after_unregister_rejected() {
        let registry = SessionRegistry::new();
        let alice = online(&registry, 1, "alice");
        registry.unregister(&alice, DisconnectReason::EndOfStream);

        assert!(matches!(
            registry.rename(&alice, "ghost"),
            Err(SessionError::NotOnline(_))
        ));
        assert!(registry.lookup("ghost").is_none());
    }

    // =====================================================================
    // unregister()
    // =====================================================================

    #[test]
    fn test_unregister_removes_and_cancels_once() {
        let registry = SessionRegistry::new();
        let alice = online(&registry, 1, "alice");

        assert!(registry.unregister(&alice, DisconnectReason::TimedOut));
        assert!(!registry.unregister(&alice, DisconnectReason::EndOfStream));

        assert!(registry.lookup("alice").is_none());
        assert!(registry.is_empty());
        assert_eq!(alice.state(), SessionState::Disconnecting);
        assert_eq!(alice.disconnect_reason(), Some(DisconnectReason::TimedOut));
        assert!(alice.is_cancelled());
    }

    #[test]
    fn test_unregister_does_not_remove_namesake() {
        let registry = SessionRegistry::new();
        let first = session(1);
        registry.register(&first).unwrap();
        registry.rename(&first, "alice").unwrap();
        registry.unregister(&first, DisconnectReason::EndOfStream);
        let second = online(&registry, 2, "alice");

        // A stale trigger for the first session must not evict the second.
        assert!(!registry.unregister(&first, DisconnectReason::Kicked));
        assert_eq!(registry.lookup("alice").unwrap().id(), second.id());
    }

    #[test]
    fn test_disconnect_by_name() {
        let registry = SessionRegistry::new();
        let bob = online(&registry, 1, "bob");

        assert!(registry.disconnect_by_name("bob", DisconnectReason::Kicked));
        assert!(!registry.disconnect_by_name("bob", DisconnectReason::Kicked));
        assert!(!registry.disconnect_by_name("nobody", DisconnectReason::Kicked));
        assert_eq!(bob.disconnect_reason(), Some(DisconnectReason::Kicked));
    }

    // =====================================================================
    // list_names() / online()
    // =====================================================================

    #[test]
    fn test_list_names_excludes_caller() {
        let registry = SessionRegistry::new();
        let me = online(&registry, 1, "me");
        online(&registry, 2, "z");
        online(&registry, 3, "x");
        online(&registry, 4, "y");

        assert_eq!(registry.list_names(me.id()), vec!["x", "y", "z"]);
        assert_eq!(registry.online().len(), 4);
    }

    #[test]
    fn test_list_names_alone_is_empty() {
        let registry = SessionRegistry::new();
        let me = online(&registry, 1, "me");
        assert!(registry.list_names(me.id()).is_empty());
    }

    // =====================================================================
    // Concurrency
    // =====================================================================

    #[test]
    fn test_concurrent_renames_to_same_name_one_winner() {
        let registry = Arc::new(SessionRegistry::new());
        let sessions: Vec<_> = (1..=16)
            .map(|id| {
                let s = session(id);
                registry.register(&s).unwrap();
                s
            })
            .collect();

        let handles: Vec<_> = sessions
            .iter()
            .cloned()
            .map(|s| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.rename(&s, "alice").is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 16);
        let named_alice = sessions.iter().filter(|s| s.name() == "alice").count();
        assert_eq!(named_alice, 1);
    }
}
