//! Client-side state: credentials, the per-session reducer and its lifecycle machine.

pub mod auth;
pub mod session;
pub mod state_machine;

pub use self::session::{Participant, RevealResult, SessionView, reduce};
pub use self::state_machine::{ConnectionStatus, InvalidTransition, SubscriptionPhase};
