//! Browser sessions: the anonymous cart, the logged-in staff member, the
//! polling checkpoint and one-shot flash messages.
//!
//! Sessions are kept in memory, keyed by a random id carried in the
//! `pos_session` cookie. Nothing survives a restart and nothing is shared
//! across devices. Sessions idle longer than the configured timeout are
//! dropped and a fresh one is issued.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::auth::StaffIdentity;
use crate::cart::Cart;
use crate::AppState;

pub const SESSION_COOKIE: &str = "pos_session";

#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub cart: Cart,
    pub staff: Option<StaffIdentity>,
    /// When this browser last asked for new orders.
    pub last_check: Option<DateTime<Utc>>,
    pub flash: Vec<String>,
}

struct Entry {
    data: SessionData,
    last_seen: DateTime<Utc>,
}

impl Entry {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            data: SessionData::default(),
            last_seen: now,
        }
    }
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Entry>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the presented id if it names a live session, otherwise issue a
    /// new one. The flag is true when a new session was created.
    pub fn resolve(&self, presented: Option<&str>) -> (String, bool) {
        let now = Utc::now();
        let mut sessions = self.guard();
        if let Some(id) = presented {
            if let Some(entry) = sessions.get_mut(id) {
                if now - entry.last_seen <= self.idle_timeout {
                    entry.last_seen = now;
                    return (id.to_string(), false);
                }
                debug!("session expired after inactivity");
                sessions.remove(id);
            }
        }

        let idle = self.idle_timeout;
        sessions.retain(|_, e| now - e.last_seen <= idle);

        let id = Uuid::new_v4().simple().to_string();
        sessions.insert(id.clone(), Entry::fresh(now));
        (id, true)
    }

    fn with<R>(&self, id: &str, f: impl FnOnce(&mut SessionData) -> R) -> R {
        let mut sessions = self.guard();
        let entry = sessions
            .entry(id.to_string())
            .or_insert_with(|| Entry::fresh(Utc::now()));
        f(&mut entry.data)
    }

    /// Move the session at `id` under a freshly issued id and return it.
    fn rotate(&self, id: &str) -> String {
        let now = Utc::now();
        let mut sessions = self.guard();
        let data = sessions.remove(id).map(|e| e.data).unwrap_or_default();
        let new_id = Uuid::new_v4().simple().to_string();
        sessions.insert(
            new_id.clone(),
            Entry {
                data,
                last_seen: now,
            },
        );
        new_id
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to the current request's session, placed in request extensions
/// by [`session_layer`]. Clones share the id, so a rotation made by a handler
/// is seen by the layer when it writes the cookie.
#[derive(Clone)]
pub struct Session {
    id: Arc<Mutex<String>>,
    store: Arc<SessionStore>,
}

impl Session {
    pub fn new(id: String, store: Arc<SessionStore>) -> Self {
        Self {
            id: Arc::new(Mutex::new(id)),
            store,
        }
    }

    pub fn id(&self) -> String {
        self.id.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&SessionData) -> R) -> R {
        self.store.with(&self.id(), |data| f(data))
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> R {
        self.store.with(&self.id(), f)
    }

    /// Issue a new id for this session, keeping its data.
    pub fn rotate(&self) {
        let mut id = self.id.lock().unwrap_or_else(|e| e.into_inner());
        *id = self.store.rotate(&id);
    }

    pub fn staff(&self) -> Option<StaffIdentity> {
        self.read(|d| d.staff.clone())
    }

    pub fn flash(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|d| d.flash.push(message));
    }

    pub fn take_flash(&self) -> Vec<String> {
        self.update(|d| std::mem::take(&mut d.flash))
    }
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

pub fn session_cookie(id: &str) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}

/// Middleware attaching a [`Session`] to every request.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let presented = cookie_value(req.headers(), SESSION_COOKIE).map(str::to_string);
    let (id, created) = state.sessions.resolve(presented.as_deref());
    let session = Session::new(id.clone(), state.sessions.clone());
    req.extensions_mut().insert(session.clone());

    let mut response = next.run(req).await;
    let current = session.id();
    if created || current != id {
        if let Ok(value) = HeaderValue::from_str(&session_cookie(&current)) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; pos_session=abc123 ; lang=zh"),
        );
        assert_eq!(cookie_value(&headers, SESSION_COOKIE), Some("abc123"));
        assert_eq!(cookie_value(&headers, "lang"), Some("zh"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn resolve_reuses_live_sessions_and_replaces_unknown_ids() {
        let store = SessionStore::new(Duration::minutes(30));
        let (id, created) = store.resolve(None);
        assert!(created);

        let (again, created) = store.resolve(Some(&id));
        assert_eq!(again, id);
        assert!(!created);

        let (other, created) = store.resolve(Some("forged"));
        assert!(created);
        assert_ne!(other, "forged");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn expired_sessions_are_replaced() {
        let store = SessionStore::new(Duration::zero() - Duration::seconds(1));
        let (id, _) = store.resolve(None);
        let (next, created) = store.resolve(Some(&id));
        assert!(created);
        assert_ne!(next, id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn flash_messages_are_one_shot() {
        let store = Arc::new(SessionStore::new(Duration::minutes(30)));
        let (id, _) = store.resolve(None);
        let session = Session::new(id, store);

        session.flash("購物車是空的");
        assert_eq!(session.take_flash(), vec!["購物車是空的".to_string()]);
        assert!(session.take_flash().is_empty());
    }

    #[test]
    fn rotation_keeps_data_and_retires_the_old_id() {
        let store = Arc::new(SessionStore::new(Duration::minutes(30)));
        let (old_id, _) = store.resolve(None);
        let session = Session::new(old_id.clone(), store.clone());
        session.flash("hello");

        let seen_by_layer = session.clone();
        session.rotate();

        assert_ne!(session.id(), old_id);
        assert_eq!(seen_by_layer.id(), session.id());
        assert_eq!(session.take_flash(), vec!["hello".to_string()]);
        assert_eq!(store.len(), 1);

        let (replacement, created) = store.resolve(Some(&old_id));
        assert!(created);
        assert_ne!(replacement, session.id());
    }
}
