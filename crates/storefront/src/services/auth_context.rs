//! Auth/role context: who is signed in on this device, and which role they
//! are wearing right now.
//!
//! # Initialization order
//!
//! [`AuthContext::init`] subscribes to session changes *before* asking for the
//! current session, so a sign-in that lands in between is never lost. Role
//! lookups are never made from inside the event listener: the listener only
//! enqueues a [`RoleFetch`] and a separate worker task performs it. This
//! keeps the session source from being re-entered while it is delivering an
//! event.
//!
//! # Degraded roles
//!
//! If the role lookup fails the user is treated as holding exactly
//! `customer`. The failure is logged, not surfaced.
//!
//! # Lifetime
//!
//! The listener and worker tasks are aborted when the context is dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use mandir_core::guard::Viewer;
use mandir_core::{ActiveRole, Role, RoleSet, UserId};

use super::session_hub::{SessionChange, SessionError, SessionSource, SessionSubscription};
use super::storage::DeviceStorage;
use crate::db::{RepositoryError, RoleRepository};
use crate::models::session::{CurrentUser, keys};

/// Version of the stored active-role preference.
pub const ROLE_PREFERENCE_VERSION: u32 = 1;

/// Where granted roles come from.
pub trait RoleSource: Send + Sync + 'static {
    fn granted_roles(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Role>, RepositoryError>> + Send;
}

/// [`RoleSource`] reading `user_roles`.
#[derive(Clone, Debug)]
pub struct PgRoleSource {
    pool: PgPool,
}

impl PgRoleSource {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RoleSource for PgRoleSource {
    async fn granted_roles(&self, user_id: UserId) -> Result<Vec<Role>, RepositoryError> {
        RoleRepository::new(&self.pool).granted_roles(user_id).await
    }
}

/// Stored active-role preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePreference {
    pub version: u32,
    pub role: Role,
}

/// Observable state of the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    /// Still resolving the session or its roles.
    pub loading: bool,
    pub user: Option<CurrentUser>,
    /// Present once roles are resolved for `user`.
    pub roles: Option<ActiveRole>,
    /// Bumped on every session change; stale role fetches are discarded.
    generation: u64,
}

impl AuthSnapshot {
    const fn initial() -> Self {
        Self {
            loading: true,
            user: None,
            roles: None,
            generation: 0,
        }
    }

    /// The viewer as a route guard sees it.
    #[must_use]
    pub fn viewer(&self) -> Viewer {
        if self.loading {
            return Viewer::Loading;
        }
        match (&self.user, &self.roles) {
            (Some(_), Some(roles)) => Viewer::SignedIn(roles.active()),
            (Some(_), None) => Viewer::Loading,
            (None, _) => Viewer::Anonymous,
        }
    }

    /// The active role, once resolved.
    #[must_use]
    pub fn active_role(&self) -> Option<Role> {
        self.roles.as_ref().map(ActiveRole::active)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.as_ref().is_some_and(ActiveRole::is_admin)
    }

    #[must_use]
    pub fn is_vendor(&self) -> bool {
        self.roles.as_ref().is_some_and(ActiveRole::is_vendor)
    }

    #[must_use]
    pub fn is_customer(&self) -> bool {
        self.roles.as_ref().is_some_and(ActiveRole::is_customer)
    }

    fn begin(&mut self, user: CurrentUser) {
        self.generation += 1;
        self.loading = true;
        self.user = Some(user);
        self.roles = None;
    }

    fn clear(&mut self) {
        self.generation += 1;
        self.loading = false;
        self.user = None;
        self.roles = None;
    }
}

/// A queued role lookup.
#[derive(Debug, Clone)]
pub struct RoleFetch {
    user_id: UserId,
    generation: u64,
}

/// Per-device auth and role state.
pub struct AuthContext<S: SessionSource, D: DeviceStorage> {
    state: Arc<watch::Sender<AuthSnapshot>>,
    session: Arc<S>,
    storage: Arc<D>,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: SessionSource, D: DeviceStorage> AuthContext<S, D> {
    /// Build the context and start resolving.
    ///
    /// Returns once the current session has been queried; roles may still be
    /// loading. Use [`Self::resolved`] to wait for them.
    pub async fn init<R: RoleSource>(session: S, roles: R, storage: D) -> Self {
        let session = Arc::new(session);
        let storage = Arc::new(storage);
        let (state, _) = watch::channel(AuthSnapshot::initial());
        let state = Arc::new(state);

        // 1. Subscribe first.
        let events = session.subscribe();

        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(role_worker(
            fetch_rx,
            roles,
            Arc::clone(&storage),
            Arc::clone(&state),
        ));
        let listener = tokio::spawn(session_listener(
            events,
            fetch_tx.clone(),
            Arc::clone(&state),
        ));

        // 2. Then look for an existing session.
        let generation = state.borrow().generation;
        match session.current_session().await {
            Ok(Some(user)) => {
                let mut queued = None;
                state.send_if_modified(|s| {
                    if s.generation != generation {
                        return false;
                    }
                    let user_id = user.id;
                    s.begin(user);
                    queued = Some(RoleFetch {
                        user_id,
                        generation: s.generation,
                    });
                    true
                });
                if let Some(fetch) = queued {
                    let _ = fetch_tx.send(fetch);
                }
            }
            Ok(None) => settle_anonymous(&state, generation),
            Err(e) => {
                tracing::warn!(error = %e, "could not read current session; treating as signed out");
                settle_anonymous(&state, generation);
            }
        }

        Self {
            state,
            session,
            storage,
            tasks: vec![listener, worker],
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Wait until nothing is loading, then return the state.
    pub async fn resolved(&self) -> AuthSnapshot {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|s| !s.loading).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Like [`Self::resolved`], but gives up after `limit`.
    ///
    /// Returns `None` if the state is still loading when time runs out, for
    /// example when this device's session event was lost.
    pub async fn resolved_within(&self, limit: Duration) -> Option<AuthSnapshot> {
        tokio::time::timeout(limit, self.resolved()).await.ok()
    }

    /// Sign a user in on this device.
    ///
    /// Roles are populated by the event listener and worker, not here.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session cannot be written.
    pub async fn sign_in(&self, user: &CurrentUser) -> Result<(), SessionError> {
        self.state.send_modify(|s| s.loading = true);
        if let Err(e) = self.session.begin_session(user).await {
            self.state.send_modify(|s| s.loading = false);
            return Err(e);
        }
        Ok(())
    }

    /// Sign out. Role state is cleared before the session is touched.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session cannot be written.
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.state.send_modify(AuthSnapshot::clear);
        self.session.end_session().await
    }

    /// Switch the active role.
    ///
    /// Only roles the user holds are accepted; anything else is ignored and
    /// `false` is returned. The choice is remembered for this user on this
    /// device.
    pub async fn switch_role(&self, role: Role) -> bool {
        let mut switched_for = None;
        self.state.send_if_modified(|s| {
            let (Some(user), Some(roles)) = (&s.user, &mut s.roles) else {
                return false;
            };
            if roles.active() == role {
                switched_for = Some(user.id);
                return false;
            }
            if roles.switch_to(role) {
                switched_for = Some(user.id);
                return true;
            }
            false
        });

        let Some(user_id) = switched_for else {
            tracing::debug!(%role, "ignoring switch to a role that is not held");
            return false;
        };

        let preference = RolePreference {
            version: ROLE_PREFERENCE_VERSION,
            role,
        };
        match serde_json::to_value(preference) {
            Ok(value) => {
                if let Err(e) = self.storage.store(&keys::active_role(user_id), value).await {
                    tracing::warn!(error = %e, %user_id, "could not persist active role");
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not encode active role"),
        }
        tracing::info!(%user_id, %role, "active role switched");
        true
    }
}

impl<S: SessionSource, D: DeviceStorage> Drop for AuthContext<S, D> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn settle_anonymous(state: &watch::Sender<AuthSnapshot>, generation: u64) {
    state.send_if_modified(|s| {
        if s.generation != generation || !s.loading || s.user.is_some() {
            return false;
        }
        s.loading = false;
        true
    });
}

/// Turns session changes into state updates and queued role fetches.
async fn session_listener(
    mut events: SessionSubscription,
    fetches: mpsc::UnboundedSender<RoleFetch>,
    state: Arc<watch::Sender<AuthSnapshot>>,
) {
    while let Some(change) = events.next().await {
        match change {
            SessionChange::SignedIn(user) => {
                let user_id = user.id;
                let mut generation = 0;
                state.send_modify(|s| {
                    s.begin(user);
                    generation = s.generation;
                });
                if fetches.send(RoleFetch { user_id, generation }).is_err() {
                    break;
                }
            }
            SessionChange::SignedOut => {
                state.send_modify(AuthSnapshot::clear);
            }
        }
    }
}

/// Resolves queued role fetches one at a time.
async fn role_worker<R: RoleSource, D: DeviceStorage>(
    mut fetches: mpsc::UnboundedReceiver<RoleFetch>,
    roles: R,
    storage: Arc<D>,
    state: Arc<watch::Sender<AuthSnapshot>>,
) {
    while let Some(fetch) = fetches.recv().await {
        let granted = match roles.granted_roles(fetch.user_id).await {
            Ok(grants) => RoleSet::from_grants(grants),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    user_id = %fetch.user_id,
                    "role lookup failed; falling back to customer"
                );
                RoleSet::customer_only()
            }
        };

        let preferred = load_preference(storage.as_ref(), fetch.user_id).await;
        let active = ActiveRole::resolve(granted, preferred);

        let applied = state.send_if_modified(|s| {
            let current = s.user.as_ref().map(|u| u.id);
            if s.generation != fetch.generation || current != Some(fetch.user_id) {
                return false;
            }
            s.roles = Some(active.clone());
            s.loading = false;
            true
        });

        if applied {
            tracing::debug!(user_id = %fetch.user_id, role = %active.active(), "roles resolved");
        }
    }
}

async fn load_preference<D: DeviceStorage>(storage: &D, user_id: UserId) -> Option<Role> {
    let key = keys::active_role(user_id);
    let value = match storage.load(&key).await {
        Ok(value) => value?,
        Err(e) => {
            tracing::warn!(error = %e, %user_id, "could not read active role preference");
            return None;
        }
    };

    match serde_json::from_value::<RolePreference>(value) {
        Ok(pref) if pref.version == ROLE_PREFERENCE_VERSION => Some(pref.role),
        _ => {
            tracing::debug!(%user_id, "discarding incompatible role preference");
            if let Err(e) = storage.remove(&key).await {
                tracing::warn!(error = %e, "could not clear role preference");
            }
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use mandir_core::Email;

    use super::*;
    use crate::services::session_hub::{DeviceId, SessionHub};
    use crate::services::storage::MemoryStorage;

    struct FakeSession {
        hub: SessionHub,
        device: DeviceId,
        current: Option<CurrentUser>,
    }

    impl SessionSource for FakeSession {
        fn subscribe(&self) -> SessionSubscription {
            self.hub.subscribe(self.device)
        }

        async fn current_session(&self) -> Result<Option<CurrentUser>, SessionError> {
            Ok(self.current.clone())
        }

        async fn begin_session(&self, user: &CurrentUser) -> Result<(), SessionError> {
            self.hub
                .publish(self.device, SessionChange::SignedIn(user.clone()));
            Ok(())
        }

        async fn end_session(&self) -> Result<(), SessionError> {
            self.hub.publish(self.device, SessionChange::SignedOut);
            Ok(())
        }
    }

    /// Writes sessions but never announces them.
    struct LossySession(SessionHub, DeviceId);

    impl SessionSource for LossySession {
        fn subscribe(&self) -> SessionSubscription {
            self.0.subscribe(self.1)
        }

        async fn current_session(&self) -> Result<Option<CurrentUser>, SessionError> {
            Ok(None)
        }

        async fn begin_session(&self, _user: &CurrentUser) -> Result<(), SessionError> {
            Ok(())
        }

        async fn end_session(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    struct FixedRoles(Option<Vec<Role>>);

    impl RoleSource for FixedRoles {
        async fn granted_roles(&self, _user_id: UserId) -> Result<Vec<Role>, RepositoryError> {
            self.0
                .clone()
                .ok_or(RepositoryError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    fn user(id: i32) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse("pujari@mandir.org").unwrap(),
        }
    }

    fn session(current: Option<CurrentUser>) -> FakeSession {
        FakeSession {
            hub: SessionHub::new(),
            device: DeviceId::new(),
            current,
        }
    }

    #[tokio::test]
    async fn test_anonymous_resolves_without_roles() {
        let ctx = AuthContext::init(
            session(None),
            FixedRoles(Some(vec![])),
            MemoryStorage::new(),
        )
        .await;
        let snap = ctx.resolved().await;
        assert_eq!(snap.viewer(), Viewer::Anonymous);
    }

    #[tokio::test]
    async fn test_existing_session_resolves_primary_role() {
        let ctx = AuthContext::init(
            session(Some(user(1))),
            FixedRoles(Some(vec![Role::Customer, Role::Vendor])),
            MemoryStorage::new(),
        )
        .await;
        let snap = ctx.resolved().await;
        assert_eq!(snap.active_role(), Some(Role::Vendor));
        assert!(snap.is_vendor());
    }

    #[tokio::test]
    async fn test_role_fetch_failure_degrades_to_customer() {
        let ctx = AuthContext::init(
            session(Some(user(1))),
            FixedRoles(None),
            MemoryStorage::new(),
        )
        .await;
        let snap = ctx.resolved().await;
        let roles = snap.roles.unwrap();
        assert_eq!(roles.active(), Role::Customer);
        assert_eq!(roles.granted().as_slice(), &[Role::Customer]);
    }

    #[tokio::test]
    async fn test_stored_preference_is_used_when_held() {
        let storage = MemoryStorage::new();
        storage
            .put(
                &keys::active_role(UserId::new(1)),
                json!({"version": ROLE_PREFERENCE_VERSION, "role": "customer"}),
            )
            .await;
        let ctx = AuthContext::init(
            session(Some(user(1))),
            FixedRoles(Some(vec![Role::Admin, Role::Customer])),
            storage,
        )
        .await;
        assert_eq!(ctx.resolved().await.active_role(), Some(Role::Customer));
    }

    #[tokio::test]
    async fn test_stale_preference_version_is_discarded() {
        let storage = MemoryStorage::new();
        let key = keys::active_role(UserId::new(1));
        storage.put(&key, json!("vendor")).await;
        let ctx = AuthContext::init(
            session(Some(user(1))),
            FixedRoles(Some(vec![Role::Admin, Role::Vendor])),
            storage.clone(),
        )
        .await;
        assert_eq!(ctx.resolved().await.active_role(), Some(Role::Admin));
        assert!(storage.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_switch_role_persists_and_rejects_unheld() {
        let storage = MemoryStorage::new();
        let ctx = AuthContext::init(
            session(Some(user(3))),
            FixedRoles(Some(vec![Role::Vendor, Role::Customer])),
            storage.clone(),
        )
        .await;
        ctx.resolved().await;

        assert!(!ctx.switch_role(Role::Admin).await);
        assert_eq!(ctx.snapshot().active_role(), Some(Role::Vendor));

        assert!(ctx.switch_role(Role::Customer).await);
        assert_eq!(ctx.snapshot().active_role(), Some(Role::Customer));
        assert_eq!(
            storage.get(&keys::active_role(UserId::new(3))).await,
            Some(json!({"version": ROLE_PREFERENCE_VERSION, "role": "customer"}))
        );
    }

    #[tokio::test]
    async fn test_sign_in_event_populates_roles() {
        let ctx = AuthContext::init(
            session(None),
            FixedRoles(Some(vec![Role::Admin, Role::Customer])),
            MemoryStorage::new(),
        )
        .await;
        assert_eq!(ctx.resolved().await.viewer(), Viewer::Anonymous);

        ctx.sign_in(&user(9)).await.unwrap();
        let snap = ctx.resolved().await;
        assert_eq!(snap.viewer(), Viewer::SignedIn(Role::Admin));
        assert_eq!(snap.user.map(|u| u.id), Some(UserId::new(9)));
    }

    #[tokio::test]
    async fn test_sign_out_clears_immediately() {
        let ctx = AuthContext::init(
            session(Some(user(1))),
            FixedRoles(Some(vec![Role::Admin])),
            MemoryStorage::new(),
        )
        .await;
        ctx.resolved().await;

        ctx.sign_out().await.unwrap();
        let snap = ctx.snapshot();
        assert!(snap.user.is_none());
        assert!(snap.roles.is_none());
        assert!(!snap.is_admin());
    }

    #[tokio::test]
    async fn test_lost_sign_in_event_times_out() {
        let ctx = AuthContext::init(
            LossySession(SessionHub::new(), DeviceId::new()),
            FixedRoles(Some(vec![Role::Admin])),
            MemoryStorage::new(),
        )
        .await;
        assert!(ctx.resolved_within(Duration::from_secs(1)).await.is_some());

        ctx.sign_in(&user(4)).await.unwrap();
        assert!(ctx.resolved_within(Duration::from_millis(50)).await.is_none());
        assert!(ctx.snapshot().loading);
    }
}
