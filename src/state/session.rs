use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::dto::ws::{ChannelSignal, RevealedVote, SessionEvent};

use super::state_machine::{
    ConnectionStatus, InvalidTransition, LifecycleSignal, SubscriptionPhase, compute_transition,
};

/// One connected participant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Participant {
    /// Display name, when the backend sent one.
    pub username: Option<String>,
}

/// Votes and statistics disclosed by the last reveal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RevealResult {
    pub votes: Vec<RevealedVote>,
    pub average: Option<f64>,
    pub median: Option<f64>,
}

/// Live state of one session subscription, folded from channel signals.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    session_id: String,
    phase: SubscriptionPhase,
    connection: ConnectionStatus,
    roster: IndexMap<String, Participant>,
    vote_count: u64,
    revealed: Option<RevealResult>,
}

impl SessionView {
    /// Fresh view in the `Idle` phase.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            phase: SubscriptionPhase::Idle,
            connection: ConnectionStatus::Disconnected,
            roster: IndexMap::new(),
            vote_count: 0,
            revealed: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn phase(&self) -> SubscriptionPhase {
        self.phase
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    /// Connected participants keyed by user id, in join order.
    pub fn roster(&self) -> &IndexMap<String, Participant> {
        &self.roster
    }

    pub fn vote_count(&self) -> u64 {
        self.vote_count
    }

    pub fn revealed(&self) -> Option<&RevealResult> {
        self.revealed.as_ref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.phase == SubscriptionPhase::TornDown
    }

    /// Apply a lifecycle signal. Returns whether the view changed.
    pub fn transition(&mut self, signal: LifecycleSignal) -> Result<bool, InvalidTransition> {
        let next = compute_transition(self.phase, signal)?;
        let changed = next.phase != self.phase || next.connection != self.connection;
        self.phase = next.phase;
        self.connection = next.connection;
        if signal == LifecycleSignal::Subscribe {
            self.roster.clear();
            self.vote_count = 0;
            self.revealed = None;
        }
        Ok(changed)
    }

    /// Apply what the channel delivered. Returns whether the view changed.
    ///
    /// Signals the lifecycle rejects are logged and dropped.
    pub fn apply(&mut self, signal: ChannelSignal) -> bool {
        let lifecycle = match signal {
            ChannelSignal::Event(event) => return self.fold(&event),
            ChannelSignal::Opened => LifecycleSignal::ChannelOpened,
            ChannelSignal::Closed => LifecycleSignal::ChannelClosed,
        };
        if self.is_torn_down() {
            return false;
        }
        match self.transition(lifecycle) {
            Ok(changed) => changed,
            Err(err) => {
                warn!(session_id = %self.session_id, error = %err, "ignoring channel signal");
                false
            }
        }
    }

    /// Fold one inbound event. Returns whether the view changed.
    pub fn fold(&mut self, event: &SessionEvent) -> bool {
        if self.is_torn_down() {
            debug!(
                session_id = %self.session_id,
                event = event.kind(),
                "dropping event after teardown"
            );
            return false;
        }

        match event {
            SessionEvent::Joined { user_id, username } => {
                if user_id.is_empty() {
                    return false;
                }
                let participant = Participant {
                    username: username.clone(),
                };
                let previous = self.roster.insert(user_id.clone(), participant.clone());
                previous.as_ref() != Some(&participant)
            }
            SessionEvent::Left { user_id } => self.roster.shift_remove(user_id).is_some(),
            SessionEvent::VoteSubmitted {
                vote_count: Some(count),
            } => {
                let changed = self.vote_count != *count;
                self.vote_count = *count;
                changed
            }
            SessionEvent::VotesRevealed {
                votes,
                average,
                median,
            } => {
                let result = RevealResult {
                    votes: votes.clone(),
                    average: *average,
                    median: *median,
                };
                let changed = self.revealed.as_ref() != Some(&result);
                self.revealed = Some(result);
                changed
            }
            SessionEvent::VoteSubmitted { vote_count: None }
            | SessionEvent::SessionCompleted { .. }
            | SessionEvent::SessionCreated { .. }
            | SessionEvent::Unknown => false,
        }
    }
}

/// Pure fold: the view that results from applying `event` to `view`.
pub fn reduce(mut view: SessionView, event: &SessionEvent) -> SessionView {
    view.fold(event);
    view
}
