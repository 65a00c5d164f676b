use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::ClientConfig,
    error::{ClientError, ClientResult},
    services::channel::{self, ChannelHandle},
    state::{auth::AuthContext, session::SessionView, state_machine::LifecycleSignal},
};

/// Live view of one planning session: a reducer fed by the realtime channel.
///
/// Every change to the view is published over a [`watch`] channel.
pub struct SessionSubscription {
    id: Uuid,
    session_id: String,
    view: Arc<watch::Sender<SessionView>>,
    channel: Option<ChannelHandle>,
}

impl SessionSubscription {
    /// Subscribe to `session_id` using the token held by `auth`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: &ClientConfig,
        auth: &AuthContext,
        session_id: &str,
    ) -> ClientResult<Self> {
        let token = auth
            .token()
            .ok_or_else(|| ClientError::InvalidArgument("auth token must not be empty".into()))?;

        let mut initial = SessionView::new(session_id);
        initial
            .transition(LifecycleSignal::Subscribe)
            .map_err(|err| ClientError::InvalidArgument(err.to_string()))?;
        let (view, _) = watch::channel(initial);
        let view = Arc::new(view);

        let publisher = Arc::clone(&view);
        let channel = channel::open(config, session_id, &token, move |signal| {
            publisher.send_if_modified(|view| view.apply(signal));
        })?;

        let id = Uuid::new_v4();
        info!(subscription = %id, session_id, "subscribed to planning session");
        Ok(Self {
            id,
            session_id: session_id.to_string(),
            view,
            channel: Some(channel),
        })
    }

    /// Identifier tagging this subscription's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver notified on every view change.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.subscribe()
    }

    /// Disconnect the channel, then tear the reducer down. Repeated calls are no-ops.
    pub fn close(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        channel.disconnect();
        self.view.send_if_modified(|view| match view.transition(LifecycleSignal::Unsubscribe) {
            Ok(changed) => changed,
            Err(err) => {
                warn!(subscription = %self.id, error = %err, "teardown rejected");
                false
            }
        });
        info!(subscription = %self.id, session_id = %self.session_id, "subscription closed");
    }

    /// Tear this subscription down, then subscribe to `session_id`.
    pub fn resubscribe(
        mut self,
        config: &ClientConfig,
        auth: &AuthContext,
        session_id: &str,
    ) -> ClientResult<Self> {
        self.close();
        Self::start(config, auth, session_id)
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        state::{ConnectionStatus, Participant, SubscriptionPhase},
        test_support::FakeBackend,
    };

    async fn wait_for_view<F>(subscription: &SessionSubscription, mut check: F) -> SessionView
    where
        F: FnMut(&SessionView) -> bool,
    {
        let mut updates = subscription.watch();
        let converged = updates.wait_for(|view| check(view));
        let view = tokio::time::timeout(Duration::from_secs(2), converged)
            .await
            .expect("view did not converge")
            .expect("publisher dropped")
            .clone();
        view
    }

    fn authenticated() -> AuthContext {
        let auth = AuthContext::in_memory();
        auth.set_token("tok-1");
        auth
    }

    #[test]
    fn start_requires_a_token() {
        let config = ClientConfig::new("http://127.0.0.1:9");
        let result = SessionSubscription::start(&config, &AuthContext::in_memory(), "S1");
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn folds_pushed_events_into_view() {
        let backend = FakeBackend::spawn_with(
            vec![
                r#"{"type":"joined","user_id":"u1","username":"Alice"}"#.into(),
                r#"{"type":"joined","user_id":"u2","username":"Bob"}"#.into(),
                r#"{"type":"left","user_id":"u1"}"#.into(),
                r#"{"type":"vote_submitted","vote_count":2}"#.into(),
                r#"{"type":"vote_submitted","vote_count":5}"#.into(),
                r#"{"type":"votes_revealed","votes":[{"user_id":"u2","value":"5"}],"average":5,"median":"5"}"#.into(),
                r#"{"type":"session_completed","final_estimate":"5"}"#.into(),
            ],
            true,
        )
        .await;
        let config = ClientConfig::new(backend.base_url());
        let subscription = SessionSubscription::start(&config, &authenticated(), "S1").unwrap();

        let view = wait_for_view(&subscription, |view| view.revealed().is_some()).await;

        assert_eq!(view.phase(), SubscriptionPhase::Live);
        assert_eq!(view.connection(), ConnectionStatus::Connected);
        assert_eq!(view.roster().len(), 1);
        assert_eq!(
            view.roster().get("u2"),
            Some(&Participant {
                username: Some("Bob".into())
            })
        );
        assert_eq!(view.vote_count(), 5);
        let revealed = view.revealed().unwrap();
        assert_eq!(revealed.votes[0].value, "5");
        assert_eq!(revealed.median, Some(5.0));
        assert_eq!(backend.sockets(), vec!["S1 tok-1".to_string()]);
    }

    #[tokio::test]
    async fn close_tears_down_and_is_idempotent() {
        let backend = FakeBackend::spawn().await;
        let config = ClientConfig::new(backend.base_url());
        let mut subscription =
            SessionSubscription::start(&config, &authenticated(), "S1").unwrap();
        wait_for_view(&subscription, |view| {
            view.connection() == ConnectionStatus::Connected
        })
        .await;

        subscription.close();
        subscription.close();

        let view = subscription.view();
        assert_eq!(view.phase(), SubscriptionPhase::TornDown);
        assert_eq!(view.connection(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn resubscribe_switches_sessions() {
        let backend = FakeBackend::spawn().await;
        let config = ClientConfig::new(backend.base_url());
        let auth = authenticated();
        let first = SessionSubscription::start(&config, &auth, "S1").unwrap();
        let first_id = first.id();
        let old_updates = first.watch();

        let second = first.resubscribe(&config, &auth, "S2").unwrap();
        assert_eq!(old_updates.borrow().phase(), SubscriptionPhase::TornDown);
        assert_eq!(second.session_id(), "S2");
        assert_ne!(second.id(), first_id);

        wait_for_view(&second, |view| view.phase() == SubscriptionPhase::Live).await;
        assert_eq!(
            backend.sockets().last().map(String::as_str),
            Some("S2 tok-1")
        );
    }

    #[tokio::test]
    async fn unreachable_backend_leaves_subscription_disconnected() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig::new(format!("http://{addr}"));
        let subscription = SessionSubscription::start(&config, &authenticated(), "S1").unwrap();

        let view = wait_for_view(&subscription, |view| {
            view.connection() == ConnectionStatus::Disconnected
        })
        .await;
        assert_eq!(view.phase(), SubscriptionPhase::Connecting);
    }
}
