//! Session-change events.
//!
//! Sign-in and sign-out publish a [`SessionEvent`] on the application-wide
//! [`SessionHub`]. Every event is scoped to the device (browser session) it
//! happened on, and a [`SessionSubscription`] only yields events for its own
//! device.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_sessions::Session;
use uuid::Uuid;

use crate::models::session::{CurrentUser, keys};

const HUB_CAPACITY: usize = 256;

/// Identifier of a browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(Uuid);

impl DeviceId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What happened to a device's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    SignedIn(CurrentUser),
    SignedOut,
}

/// A session change on a specific device.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub device: DeviceId,
    pub change: SessionChange,
}

/// Broadcast bus of session events.
#[derive(Clone, Debug)]
pub struct SessionHub {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHub {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is normal.
    pub fn publish(&self, device: DeviceId, change: SessionChange) {
        let receivers = self.tx.send(SessionEvent { device, change }).unwrap_or(0);
        tracing::debug!(%device, receivers, "session event published");
    }

    /// Subscribe to one device's events.
    #[must_use]
    pub fn subscribe(&self, device: DeviceId) -> SessionSubscription {
        SessionSubscription {
            device,
            rx: self.tx.subscribe(),
        }
    }
}

/// Stream of session changes for one device.
#[derive(Debug)]
pub struct SessionSubscription {
    device: DeviceId,
    rx: broadcast::Receiver<SessionEvent>,
}

impl SessionSubscription {
    /// The next change for this device, or `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<SessionChange> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.device == self.device => return Some(event.change),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(device = %self.device, skipped, "session events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Session failure.
#[derive(Debug, thiserror::Error)]
#[error("session error: {0}")]
pub struct SessionError(#[from] pub tower_sessions::session::Error);

/// Where the auth context learns about sessions.
pub trait SessionSource: Send + Sync + 'static {
    /// Subscribe to changes on this device.
    fn subscribe(&self) -> SessionSubscription;

    /// The session that already exists, if any.
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<CurrentUser>, SessionError>> + Send;

    /// Record a signed-in user and announce it.
    fn begin_session(
        &self,
        user: &CurrentUser,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Forget the signed-in user and announce it.
    fn end_session(&self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// [`SessionSource`] over a `tower-sessions` session and the hub.
#[derive(Clone, Debug)]
pub struct HubSession {
    hub: SessionHub,
    session: Session,
    device: DeviceId,
}

impl HubSession {
    /// Bind a request's session to the hub, assigning a device id on first use.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session store fails.
    pub async fn attach(hub: SessionHub, session: Session) -> Result<Self, SessionError> {
        let device = device_id(&session).await?;
        Ok(Self {
            hub,
            session,
            device,
        })
    }
}

impl SessionSource for HubSession {
    fn subscribe(&self) -> SessionSubscription {
        self.hub.subscribe(self.device)
    }

    async fn current_session(&self) -> Result<Option<CurrentUser>, SessionError> {
        Ok(self.session.get::<CurrentUser>(keys::CURRENT_USER).await?)
    }

    async fn begin_session(&self, user: &CurrentUser) -> Result<(), SessionError> {
        // New identity, new session id.
        self.session.cycle_id().await?;
        self.session.insert(keys::CURRENT_USER, user).await?;
        self.hub
            .publish(self.device, SessionChange::SignedIn(user.clone()));
        Ok(())
    }

    async fn end_session(&self) -> Result<(), SessionError> {
        self.session.remove::<CurrentUser>(keys::CURRENT_USER).await?;
        self.hub.publish(self.device, SessionChange::SignedOut);
        Ok(())
    }
}

/// The device id stored in a session, created if missing.
///
/// # Errors
///
/// Returns `SessionError` if the session store fails.
pub async fn device_id(session: &Session) -> Result<DeviceId, SessionError> {
    if let Some(device) = session.get::<DeviceId>(keys::DEVICE_ID).await? {
        return Ok(device);
    }
    let device = DeviceId::new();
    session.insert(keys::DEVICE_ID, device).await?;
    Ok(device)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mandir_core::{Email, UserId};

    use super::*;

    fn user() -> CurrentUser {
        CurrentUser {
            id: UserId::new(7),
            email: Email::parse("seva@mandir.org").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_subscription_filters_by_device() {
        let hub = SessionHub::new();
        let mine = DeviceId::new();
        let other = DeviceId::new();
        let mut sub = hub.subscribe(mine);

        hub.publish(other, SessionChange::SignedIn(user()));
        hub.publish(mine, SessionChange::SignedOut);

        assert_eq!(sub.next().await, Some(SessionChange::SignedOut));
    }

    #[tokio::test]
    async fn test_subscription_ends_when_hub_dropped() {
        let hub = SessionHub::new();
        let mut sub = hub.subscribe(DeviceId::new());
        drop(hub);
        assert_eq!(sub.next().await, None);
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        SessionHub::new().publish(DeviceId::new(), SessionChange::SignedOut);
    }
}
