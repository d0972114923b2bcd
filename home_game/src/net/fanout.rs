//! Fan-out: deliver room events to subscribers.
//!
//! State events are personalized per seated player (their own hole cards
//! visible) with a single shared spectator view for everyone else. A
//! recipient with no live transport is skipped, not an error; the session
//! directory evicts the stale mapping on lookup.

use log::trace;
use std::sync::Arc;

use super::events::ServerEvent;
use super::session::SessionDirectory;
use crate::game::engine::HandEngine;
use crate::game::player::UserId;

#[derive(Clone)]
pub struct Broadcaster {
    sessions: Arc<SessionDirectory>,
}

impl Broadcaster {
    #[must_use]
    pub fn new(sessions: Arc<SessionDirectory>) -> Self {
        Self { sessions }
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionDirectory> {
        &self.sessions
    }

    /// Deliver one event to one user, if connected.
    pub async fn send_to(&self, user_id: &UserId, event: ServerEvent) {
        match self.sessions.get(user_id).await {
            Some(handle) => {
                handle.send(event);
            }
            None => trace!("no transport for {user_id}, skipping"),
        }
    }

    /// Deliver the same event to every subscriber.
    pub async fn broadcast<'a, I>(&self, recipients: I, event: ServerEvent)
    where
        I: IntoIterator<Item = &'a UserId>,
    {
        for user_id in recipients {
            self.send_to(user_id, event.clone()).await;
        }
    }

    /// Publish the engine state: one personalized payload per seated
    /// player, one spectator payload for every other subscriber.
    pub async fn publish_state<'a, I>(&self, engine: &HandEngine, recipients: I)
    where
        I: IntoIterator<Item = &'a UserId>,
    {
        let spectator = engine.state(None);
        for user_id in recipients {
            let event = if engine.player(user_id).is_some() {
                ServerEvent::GameState {
                    state: engine.state(Some(user_id)),
                }
            } else {
                ServerEvent::GameState {
                    state: spectator.clone(),
                }
            };
            self.send_to(user_id, event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::HandEngine;
    use std::collections::BTreeSet;
    use crate::game::rules::{CustomRules, Stakes};
    use crate::game::variant::Variant;
    use crate::net::session::ClientHandle;
    use tokio::sync::mpsc;

    async fn connect(sessions: &Arc<SessionDirectory>, id: &str) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(32);
        sessions.connect(ClientHandle::new(id.to_string(), tx)).await;
        rx
    }

    fn engine_with_two_seats() -> HandEngine {
        let mut engine = HandEngine::new(
            Variant::TexasHoldem,
            Stakes::default(),
            CustomRules::default(),
            9,
        )
        .unwrap();
        engine
            .add_player("anon_aaaaaaaa".into(), "a".into(), 0, 1000)
            .unwrap();
        engine
            .add_player("anon_bbbbbbbb".into(), "b".into(), 1, 1000)
            .unwrap();
        engine.start_hand(None, false).unwrap();
        engine
    }

    #[tokio::test]
    async fn players_see_only_their_own_cards() {
        let sessions = SessionDirectory::new();
        let mut rx_a = connect(&sessions, "anon_aaaaaaaa").await;
        let mut rx_spec = connect(&sessions, "anon_watcher1").await;
        let broadcaster = Broadcaster::new(sessions);

        let engine = engine_with_two_seats();
        let recipients: BTreeSet<UserId> = ["anon_aaaaaaaa", "anon_watcher1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        broadcaster.publish_state(&engine, &recipients).await;

        let ServerEvent::GameState { state } = rx_a.try_recv().unwrap() else {
            panic!("expected state");
        };
        let own = state
            .players
            .iter()
            .find(|p| p.user_id == "anon_aaaaaaaa")
            .unwrap();
        let other = state
            .players
            .iter()
            .find(|p| p.user_id == "anon_bbbbbbbb")
            .unwrap();
        assert!(own.cards.is_some());
        assert!(other.cards.is_none());

        let ServerEvent::GameState { state } = rx_spec.try_recv().unwrap() else {
            panic!("expected state");
        };
        assert!(state.players.iter().all(|p| p.cards.is_none()));
    }

    #[tokio::test]
    async fn missing_transport_is_skipped() {
        let sessions = SessionDirectory::new();
        let mut rx = connect(&sessions, "anon_aaaaaaaa").await;
        let broadcaster = Broadcaster::new(sessions);
        let recipients: BTreeSet<UserId> = ["anon_aaaaaaaa", "anon_gone0000"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        broadcaster
            .broadcast(
                &recipients,
                ServerEvent::error(crate::net::events::ErrorCode::NotInRoom, "x"),
            )
            .await;
        assert!(rx.try_recv().is_ok());
    }
}
