//! Planning-poker session client: REST actions, a realtime channel and the reducer that
//! folds its events into a live session view.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;
