use thiserror::Error;

/// Lifecycle phases of one session subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionPhase {
    /// Reducer built, channel not requested yet.
    #[default]
    Idle,
    /// Channel requested, handshake pending.
    Connecting,
    /// Handshake completed; events flow.
    Live,
    /// Terminal. Nothing mutates the view any more.
    TornDown,
}

/// Transport state shown to the user, derived only from lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Waiting for the handshake.
    Connecting,
    /// Channel open.
    Connected,
    /// Channel closed, failed or never opened.
    #[default]
    Disconnected,
}

/// Signals that drive the lifecycle machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The caller asked for a subscription.
    Subscribe,
    /// The realtime channel completed its handshake.
    ChannelOpened,
    /// The realtime channel ended (remote close, error or local disconnect).
    ChannelClosed,
    /// The caller released the subscription.
    Unsubscribe,
}

/// Error returned when a signal cannot be applied in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {signal:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the machine was in.
    pub from: SubscriptionPhase,
    /// Signal that was rejected.
    pub signal: LifecycleSignal,
}

/// Outcome of an accepted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Phase after the signal.
    pub phase: SubscriptionPhase,
    /// Connection status after the signal.
    pub connection: ConnectionStatus,
}

/// Compute the next phase and connection status for `signal`.
///
/// `Unsubscribe` is accepted from every phase so that teardown can be repeated safely.
pub fn compute_transition(
    from: SubscriptionPhase,
    signal: LifecycleSignal,
) -> Result<Transition, InvalidTransition> {
    let (phase, connection) = match (from, signal) {
        (SubscriptionPhase::Idle, LifecycleSignal::Subscribe) => {
            (SubscriptionPhase::Connecting, ConnectionStatus::Connecting)
        }
        (SubscriptionPhase::Connecting, LifecycleSignal::ChannelOpened) => {
            (SubscriptionPhase::Live, ConnectionStatus::Connected)
        }
        (
            phase @ (SubscriptionPhase::Connecting | SubscriptionPhase::Live),
            LifecycleSignal::ChannelClosed,
        ) => (phase, ConnectionStatus::Disconnected),
        (_, LifecycleSignal::Unsubscribe) => {
            (SubscriptionPhase::TornDown, ConnectionStatus::Disconnected)
        }
        (from, signal) => return Err(InvalidTransition { from, signal }),
    };

    Ok(Transition { phase, connection })
}
