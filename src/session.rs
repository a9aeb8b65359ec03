// dkim-domain-proof – domain ownership proofs from DKIM-signed email
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! Sessions issued to requesters of a domain proof, and the store they are read
//! from.

use parking_lot::RwLock;
use std::{
    collections::HashMap,
    future::{self, Future, Ready},
    io,
    sync::Arc,
    time::{Duration, SystemTime},
};

/// A pending domain claim.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    /// The opaque session identifier.
    pub id: Box<str>,
    /// The claimed domain, in lower case.
    pub domain: Box<str>,
    /// The token that must appear in the *Subject* of the submitted message.
    pub nonce: Box<str>,
    pub created_at: SystemTime,
    pub ttl: Duration,
}

impl Session {
    /// Creates a session; the claimed domain is lower-cased.
    pub fn new(
        id: impl Into<Box<str>>,
        domain: &str,
        nonce: impl Into<Box<str>>,
        created_at: SystemTime,
        ttl: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            domain: domain.to_lowercase().into(),
            nonce: nonce.into(),
            created_at,
            ttl,
        }
    }

    /// The instant from which the session is no longer valid.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.created_at.checked_add(self.ttl)
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at().map_or(false, |t| now >= t)
    }
}

/// A trait for reading sessions from the store that owns them.
///
/// An absent session is reported as `Ok(None)` (or as an error of kind
/// `ErrorKind::NotFound`). Any other error is a failure of the store.
pub trait SessionStore: Send + Sync {
    /// The future resolving to the session, if any.
    type Query<'a>: Future<Output = io::Result<Option<Session>>> + Send + 'a
    where
        Self: 'a;

    /// Looks up a session by its identifier.
    fn get(&self, id: &str) -> Self::Query<'_>;
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    type Query<'a> = S::Query<'a> where Self: 'a;

    fn get(&self, id: &str) -> Self::Query<'_> {
        (**self).get(id)
    }
}

/// A session store kept in memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Box<str>, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Stores a session, returning the session previously stored under the
    /// same identifier.
    pub fn insert(&self, session: Session) -> Option<Session> {
        self.sessions.write().insert(session.id.clone(), session)
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    type Query<'a> = Ready<io::Result<Option<Session>>>;

    fn get(&self, id: &str) -> Self::Query<'_> {
        future::ready(Ok(self.sessions.read().get(id).cloned()))
    }
}
