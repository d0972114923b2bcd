//! The per-room orchestrator.
//!
//! One actor task owns one room: the engine, the member list, and every
//! timer. Commands arrive on an mpsc inbox and a one-second tick drives
//! countdowns, so all work on a room is serialized and broadcast order
//! matches apply order. Fan-out goes through the session directory and
//! never blocks the loop.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use chrono::Utc;
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, interval};

use super::messages::RoomCommand;
use super::registry::RoomRegistry;
use super::timers::{
    NextHandTimer, RebuyBarrier, RunItTimer, StraddleTimer, Timers, TurnTimer, secs_until,
};
use super::{RoomId, RoomInfo, RoomOptions, RoomStatus};
use crate::game::constants::{
    NEXT_HAND_BASE_DELAY_MS, REBUY_TIMEOUT_SECS, RUN_IT_TIMEOUT_SECS, RUNOUT_DELAY_FLOP_MS,
    RUNOUT_DELAY_PREFLOP_MS, RUNOUT_DELAY_TURN_MS, STRADDLE_TIMEOUT_SECS,
};
use crate::game::engine::{ActionOutcome, HandEngine, PlayerAction};
use crate::game::errors::EngineError;
use crate::game::player::{PlayerStatus, UserId};
use crate::game::rules::{Chips, RulesUpdate, Stakes};
use crate::game::variant::{HandPhase, Variant};
use crate::net::events::{
    ChatMessage, ClientEvent, ErrorCode, RebuyDecision, RebuyPrompt, ServerEvent,
};
use crate::net::fanout::Broadcaster;

const CHAT_MAX_LEN: usize = 500;

pub struct RoomActor {
    id: RoomId,
    code: String,
    name: String,
    host_id: UserId,
    is_private: bool,
    password_hash: Option<String>,
    status: RoomStatus,

    engine: HandEngine,
    inbox: mpsc::Receiver<RoomCommand>,
    registry: Arc<RoomRegistry>,
    broadcaster: Broadcaster,

    /// Everyone in the room (seated or spectating), with display names.
    members: BTreeMap<UserId, String>,
    timers: Timers,
    is_closed: bool,
}

impl RoomActor {
    pub fn new(
        id: RoomId,
        code: String,
        options: RoomOptions,
        host_id: UserId,
        password_hash: Option<String>,
        registry: Arc<RoomRegistry>,
    ) -> (Self, mpsc::Sender<RoomCommand>) {
        let (sender, inbox) = mpsc::channel(100);
        let engine = HandEngine::new(
            options.variant,
            options.stakes,
            options.custom_rules,
            options.max_players,
        )
        .unwrap_or_else(|_| {
            // Unplayable variants are rejected at room creation; fall back
            // to hold'em if one slips through.
            HandEngine::new(
                Variant::TexasHoldem,
                options.stakes,
                crate::game::rules::CustomRules::default(),
                options.max_players,
            )
            .expect("hold'em always constructs")
        });
        let broadcaster = Broadcaster::new(Arc::clone(registry.sessions()));
        let actor = Self {
            id,
            code,
            name: options.name,
            host_id,
            is_private: options.is_private,
            password_hash,
            status: RoomStatus::Waiting,
            engine,
            inbox,
            registry,
            broadcaster,
            members: BTreeMap::new(),
            timers: Timers::default(),
            is_closed: false,
        };
        (actor, sender)
    }

    #[must_use]
    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            code: self.code.clone(),
            name: self.name.clone(),
            variant: self.engine.variant(),
            stakes: *self.engine.stakes(),
            max_players: self.engine.max_players(),
            is_private: self.is_private,
            host_id: self.host_id.clone(),
            status: self.status,
            custom_rules: self.engine.rules().clone(),
            player_count: self.engine.players().len(),
        }
    }

    /// Room event loop: commands plus a one-second countdown tick.
    pub async fn run(mut self) {
        info!("room {} '{}' starting", self.id, self.name);
        let mut tick = interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                command = self.inbox.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                    if self.is_closed {
                        break;
                    }
                }
                _ = tick.tick() => {
                    if !self.is_closed {
                        self.on_tick().await;
                    }
                }
            }
        }
        self.registry.release(self.id).await;
        info!("room {} '{}' closed", self.id, self.name);
    }

    async fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                user_id,
                username,
                password,
                respond,
            } => {
                let result = self.handle_join(user_id, username, password).await;
                let _ = respond.send(result);
            }
            RoomCommand::Client { user_id, event } => {
                if !self.members.contains_key(&user_id) {
                    self.send_error(&user_id, ErrorCode::NotInRoom, "join the room first")
                        .await;
                    return;
                }
                self.handle_client_event(user_id, event).await;
            }
            RoomCommand::Disconnected { user_id } => {
                self.handle_disconnect(user_id).await;
            }
            RoomCommand::GetInfo { respond } => {
                let _ = respond.send(self.info());
            }
            RoomCommand::GetState { viewer, respond } => {
                let _ = respond.send(self.engine.state(viewer.as_ref()));
            }
            RoomCommand::Close { respond } => {
                self.timers.cancel_all();
                self.is_closed = true;
                self.status = RoomStatus::Closed;
                if let Some(respond) = respond {
                    let _ = respond.send(());
                }
            }
        }
    }

    // === Membership =======================================================

    async fn handle_join(
        &mut self,
        user_id: UserId,
        username: String,
        password: Option<String>,
    ) -> Result<RoomInfo, ErrorCode> {
        if self.is_private
            && let Some(hash) = &self.password_hash
        {
            let Some(password) = password else {
                return Err(ErrorCode::JoinFailed);
            };
            let parsed = PasswordHash::new(hash).map_err(|_| ErrorCode::JoinFailed)?;
            if Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_err()
            {
                return Err(ErrorCode::JoinFailed);
            }
        }

        self.members.insert(user_id.clone(), username.clone());
        self.registry.bind_user(user_id.clone(), self.id).await;

        // A returning seated player comes back from disconnected.
        if self
            .engine
            .player(&user_id)
            .is_some_and(|p| p.status == PlayerStatus::Disconnected)
        {
            let _ = self
                .engine
                .set_player_status(&user_id, PlayerStatus::Active);
        }

        let info = self.info();
        self.broadcaster
            .send_to(
                &user_id,
                ServerEvent::RoomJoined {
                    room: info.clone(),
                    user_id: user_id.clone(),
                    username,
                },
            )
            .await;
        self.broadcaster
            .send_to(
                &user_id,
                ServerEvent::GameState {
                    state: self.engine.state(Some(&user_id)),
                },
            )
            .await;
        Ok(info)
    }

    async fn handle_leave(&mut self, user_id: UserId) {
        let mut announced = false;
        if self.engine.player(&user_id).is_some() {
            match self.engine.remove_player(&user_id) {
                Ok(outcome) => {
                    // Mid-hand the seat stays folded until the hand ends;
                    // the purge announces the departure then.
                    announced = !outcome.removed_now;
                    if let Some(fold) = outcome.fold_outcome {
                        self.continue_after_action(fold).await;
                    }
                }
                Err(err) => warn!("room {}: leave cleanup failed: {err}", self.id),
            }
        }
        self.members.remove(&user_id);
        self.registry.unbind_user(&user_id).await;
        if !announced {
            self.broadcast(ServerEvent::RoomPlayerLeft {
                player_id: user_id,
            })
            .await;
        }
        if self.members.is_empty() {
            info!("room {}: last member left, closing", self.id);
            self.timers.cancel_all();
            self.is_closed = true;
            self.status = RoomStatus::Closed;
            return;
        }
        self.publish_state().await;
    }

    async fn handle_disconnect(&mut self, user_id: UserId) {
        if self.engine.player(&user_id).is_some() {
            let _ = self
                .engine
                .set_player_status(&user_id, PlayerStatus::Disconnected);
        }
        // A listed seat that drops auto-declines its rebuy.
        let listed_pending = self
            .timers
            .rebuy
            .as_ref()
            .is_some_and(|b| matches!(b.decisions.get(&user_id), Some(RebuyDecision::Pending)));
        if listed_pending {
            if let Some(barrier) = self.timers.rebuy.as_mut() {
                barrier
                    .decisions
                    .insert(user_id.clone(), RebuyDecision::Decline);
            }
            self.broadcast_rebuy_prompt().await;
            if self.timers.rebuy.as_ref().is_some_and(RebuyBarrier::all_decided) {
                self.close_rebuy_barrier().await;
            }
        }
        self.publish_state().await;
    }

    // === Client events ====================================================

    async fn handle_client_event(&mut self, user_id: UserId, event: ClientEvent) {
        match event {
            ClientEvent::RoomJoin { .. } => {
                // Joins arrive as RoomCommand::Join; a stray event here is a
                // client bug.
                self.send_error(&user_id, ErrorCode::InvalidAction, "already joined")
                    .await;
            }
            ClientEvent::RoomLeave => self.handle_leave(user_id).await,
            ClientEvent::RoomSit { seat, buy_in } => self.handle_sit(user_id, seat, buy_in).await,
            ClientEvent::RoomStand => self.handle_stand(user_id).await,
            ClientEvent::RoomSitOut { sitting_out } => {
                let status = if sitting_out {
                    PlayerStatus::SittingOut
                } else {
                    PlayerStatus::Active
                };
                match self.engine.set_player_status(&user_id, status) {
                    Ok(()) => self.publish_state().await,
                    Err(err) => self.send_engine_error(&user_id, &err).await,
                }
            }
            ClientEvent::RoomRebuy { amount } => self.handle_rebuy(user_id, amount).await,
            ClientEvent::RoomDeclineRebuy => self.handle_decline_rebuy(user_id).await,
            ClientEvent::RoomChat { text } => self.handle_chat(user_id, text).await,
            ClientEvent::RoomUpdateRules { rules } => {
                self.handle_update_rules(user_id, rules).await;
            }
            ClientEvent::RoomUpdateSettings {
                stakes,
                max_players,
                custom_rules,
            } => {
                self.handle_update_settings(user_id, stakes, max_players, custom_rules)
                    .await;
            }
            ClientEvent::RoomSwitchVariant { variant } => {
                if user_id != self.host_id {
                    self.send_error(&user_id, ErrorCode::Unauthorized, "host only")
                        .await;
                    return;
                }
                self.switch_variant(&user_id, variant).await;
            }
            ClientEvent::GameChooseVariant { variant } => {
                let is_dealer = self
                    .engine
                    .players()
                    .iter()
                    .any(|p| p.seat == self.engine.dealer_seat() && p.user_id == user_id);
                if !is_dealer {
                    self.send_error(&user_id, ErrorCode::NotDealer, "dealer's choice")
                        .await;
                    return;
                }
                self.switch_variant(&user_id, variant).await;
            }
            ClientEvent::GameStart => self.handle_game_start(user_id).await,
            ClientEvent::GameAction { action, .. } => self.handle_action(user_id, action).await,
            ClientEvent::GameStraddle { accept } => self.handle_straddle(user_id, accept).await,
            ClientEvent::GameShowHand => match self.engine.show_hand(&user_id) {
                Ok(cards) => {
                    self.broadcast(ServerEvent::GameHandShown {
                        player_id: user_id,
                        cards,
                    })
                    .await;
                    self.publish_state().await;
                }
                Err(err) => self.send_engine_error(&user_id, &err).await,
            },
            ClientEvent::GameRunItSelect { choice } => {
                match self.engine.process_run_it_choice(&user_id, choice) {
                    Ok(decision) => {
                        self.broadcast(ServerEvent::GameRunItDecision {
                            player_id: user_id,
                            choice: decision.choice,
                            confirmed: decision.confirmed,
                        })
                        .await;
                        self.maybe_finalize_run_it().await;
                    }
                    Err(err) => self.send_engine_error(&user_id, &err).await,
                }
            }
            ClientEvent::GameRunItConfirm => {
                match self.engine.confirm_run_it_choice(&user_id) {
                    Ok(decision) => {
                        self.broadcast(ServerEvent::GameRunItDecision {
                            player_id: user_id,
                            choice: decision.choice,
                            confirmed: decision.confirmed,
                        })
                        .await;
                        self.maybe_finalize_run_it().await;
                    }
                    Err(err) => self.send_engine_error(&user_id, &err).await,
                }
            }
            ClientEvent::SetBombPotPreference { enabled } => {
                match self.engine.set_bomb_pot_preference(&user_id, enabled) {
                    Ok(()) => self.publish_state().await,
                    Err(err) => self.send_engine_error(&user_id, &err).await,
                }
            }
            ClientEvent::SetStraddlePreference { enabled } => {
                match self.engine.set_straddle_preference(&user_id, enabled) {
                    Ok(()) => self.publish_state().await,
                    Err(err) => self.send_engine_error(&user_id, &err).await,
                }
            }
        }
    }

    async fn handle_sit(&mut self, user_id: UserId, seat: usize, buy_in: Chips) {
        let stakes = *self.engine.stakes();
        if buy_in < stakes.min_buy_in || buy_in > stakes.max_buy_in {
            self.send_error(
                &user_id,
                ErrorCode::InvalidAmount,
                format!(
                    "buy-in must be between {} and {}",
                    stakes.min_buy_in, stakes.max_buy_in
                ),
            )
            .await;
            return;
        }
        let username = self
            .members
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| user_id.clone());
        match self.engine.add_player(user_id.clone(), username, seat, buy_in) {
            Ok(()) => {
                let view = self.engine.state(None);
                if let Some(player) = view.players.iter().find(|p| p.user_id == user_id) {
                    self.broadcast(ServerEvent::RoomPlayerJoined {
                        player: player.clone(),
                    })
                    .await;
                }
                self.publish_state().await;
            }
            Err(err) => self.send_engine_error(&user_id, &err).await,
        }
    }

    async fn handle_stand(&mut self, user_id: UserId) {
        match self.engine.remove_player(&user_id) {
            Ok(outcome) => {
                if outcome.removed_now {
                    self.broadcast(ServerEvent::RoomPlayerLeft {
                        player_id: user_id,
                    })
                    .await;
                    self.publish_state().await;
                } else if let Some(fold) = outcome.fold_outcome {
                    self.continue_after_action(fold).await;
                } else {
                    self.publish_state().await;
                }
            }
            Err(err) => self.send_engine_error(&user_id, &err).await,
        }
    }

    async fn handle_rebuy(&mut self, user_id: UserId, amount: Chips) {
        let listed = self
            .timers
            .rebuy
            .as_ref()
            .is_some_and(|b| b.listed(&user_id));
        if !listed && self.engine.is_hand_active() {
            self.send_error(&user_id, ErrorCode::NoRebuyPrompt, "no rebuy available now")
                .await;
            return;
        }
        match self.engine.rebuy(&user_id, amount) {
            Ok(credited) => {
                self.broadcast(ServerEvent::RoomPlayerRebuy {
                    player_id: user_id.clone(),
                    amount: credited,
                })
                .await;
                if listed {
                    if let Some(barrier) = self.timers.rebuy.as_mut() {
                        barrier.decisions.insert(user_id, RebuyDecision::Rebuy);
                    }
                    self.broadcast_rebuy_prompt().await;
                    if self
                        .timers
                        .rebuy
                        .as_ref()
                        .is_some_and(RebuyBarrier::all_decided)
                    {
                        self.close_rebuy_barrier().await;
                    }
                }
                self.publish_state().await;
            }
            Err(err) => self.send_engine_error(&user_id, &err).await,
        }
    }

    async fn handle_decline_rebuy(&mut self, user_id: UserId) {
        let listed = self
            .timers
            .rebuy
            .as_ref()
            .is_some_and(|b| b.listed(&user_id));
        if !listed {
            self.send_error(&user_id, ErrorCode::NoRebuyPrompt, "nothing to decline")
                .await;
            return;
        }
        let _ = self
            .engine
            .set_player_status(&user_id, PlayerStatus::SittingOut);
        if let Some(barrier) = self.timers.rebuy.as_mut() {
            barrier.decisions.insert(user_id, RebuyDecision::Decline);
        }
        self.broadcast_rebuy_prompt().await;
        if self
            .timers
            .rebuy
            .as_ref()
            .is_some_and(RebuyBarrier::all_decided)
        {
            self.close_rebuy_barrier().await;
        }
        self.publish_state().await;
    }

    async fn handle_chat(&mut self, user_id: UserId, text: String) {
        let text: String = text.chars().take(CHAT_MAX_LEN).collect();
        if text.trim().is_empty() {
            return;
        }
        let username = self
            .members
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| user_id.clone());
        self.broadcast(ServerEvent::RoomChat {
            message: ChatMessage {
                user_id,
                username,
                text,
                sent_at: Utc::now(),
            },
        })
        .await;
    }

    async fn handle_update_rules(&mut self, user_id: UserId, update: RulesUpdate) {
        if user_id != self.host_id {
            self.send_error(&user_id, ErrorCode::Unauthorized, "host only")
                .await;
            return;
        }
        let rules = self.engine.update_rules(&update);
        self.broadcast(ServerEvent::RoomRulesUpdated { rules }).await;
    }

    async fn handle_update_settings(
        &mut self,
        user_id: UserId,
        stakes: Option<Stakes>,
        max_players: Option<usize>,
        custom_rules: Option<RulesUpdate>,
    ) {
        if user_id != self.host_id {
            self.send_error(&user_id, ErrorCode::Unauthorized, "host only")
                .await;
            return;
        }
        if let Some(stakes) = stakes
            && let Err(err) = self.engine.update_stakes(stakes)
        {
            self.send_engine_error(&user_id, &err).await;
            return;
        }
        if let Some(max_players) = max_players
            && let Err(err) = self.engine.set_max_players(max_players)
        {
            self.send_engine_error(&user_id, &err).await;
            return;
        }
        if let Some(update) = custom_rules {
            self.engine.update_rules(&update);
        }
        self.broadcast(ServerEvent::RoomSettingsUpdated { room: self.info() })
            .await;
    }

    async fn switch_variant(&mut self, user_id: &UserId, variant: Variant) {
        match self.engine.switch_variant(variant) {
            Ok(()) => {
                self.broadcast(ServerEvent::GameVariantChanged { variant })
                    .await;
            }
            Err(err) => self.send_engine_error(user_id, &err).await,
        }
    }

    // === Hand driving =====================================================

    async fn handle_game_start(&mut self, user_id: UserId) {
        let seated = self
            .engine
            .player(&user_id)
            .is_some_and(|p| p.status == PlayerStatus::Active);
        if !seated {
            self.send_error(&user_id, ErrorCode::NotSeated, "sit down first")
                .await;
            return;
        }
        if self.engine.is_hand_active() {
            self.send_error(&user_id, ErrorCode::InvalidAction, "hand already running")
                .await;
            return;
        }
        if let Err(err) = self.attempt_hand_start().await {
            self.send_engine_error(&user_id, &err).await;
        }
    }

    /// Start the next hand, honoring the next dealer's bomb-pot preference.
    async fn attempt_hand_start(&mut self) -> Result<(), EngineError> {
        self.timers.next_hand = None;
        let rules = self.engine.rules().clone();
        let (bomb_pot, dual_board) = match self.engine.peek_next_dealer() {
            Some(dealer) if rules.bomb_pot_enabled && dealer.bomb_pot_when_dealer => {
                let amount = if rules.bomb_pot_amount > 0 {
                    rules.bomb_pot_amount
                } else {
                    self.engine.stakes().big_blind.saturating_mul(10)
                };
                (Some(amount), rules.bomb_pot_double_board)
            }
            _ => (None, false),
        };

        match self.engine.start_hand(bomb_pot, dual_board) {
            Ok(()) => {
                self.update_status();
                if self.engine.phase() == HandPhase::Complete {
                    // Antes or blinds put everyone all-in and the board ran
                    // out during the start itself.
                    self.on_hand_complete().await;
                    return Ok(());
                }
                self.publish_state().await;
                if bomb_pot.is_none() && self.engine.rules().straddle_enabled {
                    self.advance_straddle_chain().await;
                } else {
                    self.start_turn_timer();
                }
                Ok(())
            }
            Err(err) => {
                self.update_status();
                Err(err)
            }
        }
    }

    async fn handle_action(&mut self, user_id: UserId, action: PlayerAction) {
        match self.engine.process_action(&user_id, action) {
            Ok(outcome) => {
                self.timers.turn = None;
                self.broadcast(ServerEvent::GameAction {
                    action: outcome.applied.clone(),
                })
                .await;
                self.continue_after_action(outcome).await;
            }
            Err(err @ (EngineError::DeckExhausted | EngineError::ChipConservation)) => {
                self.handle_engine_failure(err).await;
            }
            Err(err) => self.send_engine_error(&user_id, &err).await,
        }
    }

    /// Shared post-action path: publish the new state and schedule whatever
    /// the engine's transition calls for.
    async fn continue_after_action(&mut self, outcome: ActionOutcome) {
        self.timers.turn = None;
        if outcome.run_it_pending {
            self.publish_state().await;
            self.open_run_it_prompt().await;
        } else if outcome.hand_complete {
            self.on_hand_complete().await;
        } else {
            self.publish_state().await;
            self.start_turn_timer();
        }
    }

    async fn handle_straddle(&mut self, user_id: UserId, accept: bool) {
        match self.engine.process_straddle(&user_id, accept) {
            Ok(outcome) => {
                self.timers.straddle = None;
                if let Some(entry) = &outcome.entry {
                    self.broadcast(ServerEvent::GameStraddlePlaced {
                        player_id: entry.player_id.clone(),
                        amount: entry.amount,
                        seat: entry.seat,
                    })
                    .await;
                } else {
                    self.broadcast(ServerEvent::GameStraddleDeclined { seat: outcome.seat })
                        .await;
                }
                if outcome.chain_complete {
                    self.finish_straddle_phase().await;
                } else {
                    self.advance_straddle_chain().await;
                }
            }
            Err(err) => self.send_engine_error(&user_id, &err).await,
        }
    }

    /// Walk the straddle chain: auto-accept the UTG preference, prompt the
    /// next seat otherwise, finish when the chain ends.
    async fn advance_straddle_chain(&mut self) {
        loop {
            match self.engine.start_straddle_prompt() {
                None => {
                    self.finish_straddle_phase().await;
                    return;
                }
                Some((prompt, auto)) => {
                    if auto {
                        match self.engine.process_straddle(&prompt.player_id, true) {
                            Ok(outcome) => {
                                if let Some(entry) = &outcome.entry {
                                    self.broadcast(ServerEvent::GameStraddlePlaced {
                                        player_id: entry.player_id.clone(),
                                        amount: entry.amount,
                                        seat: entry.seat,
                                    })
                                    .await;
                                }
                                if outcome.chain_complete {
                                    self.finish_straddle_phase().await;
                                    return;
                                }
                            }
                            Err(err) => {
                                warn!("room {}: auto-straddle failed: {err}", self.id);
                                self.finish_straddle_phase().await;
                                return;
                            }
                        }
                    } else {
                        self.timers.straddle = Some(StraddleTimer {
                            user_id: prompt.player_id.clone(),
                            seat: prompt.seat,
                            deadline: Instant::now()
                                + Duration::from_secs(STRADDLE_TIMEOUT_SECS),
                        });
                        self.publish_state().await;
                        return;
                    }
                }
            }
        }
    }

    async fn finish_straddle_phase(&mut self) {
        self.timers.straddle = None;
        self.engine.end_straddle_phase();
        self.publish_state().await;
        self.start_turn_timer();
    }

    // === Run-it ===========================================================

    async fn open_run_it_prompt(&mut self) {
        match self.engine.start_run_it_prompt() {
            Ok(prompt) => {
                self.broadcast(ServerEvent::GameRunItPrompt { prompt }).await;
                self.timers.run_it = Some(RunItTimer {
                    deadline: Instant::now() + Duration::from_secs(RUN_IT_TIMEOUT_SECS),
                });
            }
            Err(err) => {
                warn!("room {}: run-it prompt failed: {err}", self.id);
                self.finalize_run_it().await;
            }
        }
    }

    async fn maybe_finalize_run_it(&mut self) {
        if self.engine.all_run_it_choices_confirmed() || self.engine.all_confirmed_choices_same() {
            self.finalize_run_it().await;
        }
    }

    async fn finalize_run_it(&mut self) {
        self.timers.run_it = None;
        let final_choice = self.engine.final_run_it_choice();
        let result = if final_choice > 1 {
            self.engine.execute_run_it(final_choice)
        } else {
            self.engine.skip_run_it()
        };
        match result {
            Ok(()) => {
                if final_choice > 1 {
                    self.broadcast(ServerEvent::GameRunItResult {
                        boards: self.engine.boards().to_vec(),
                        final_choice,
                    })
                    .await;
                }
                self.on_hand_complete().await;
            }
            Err(err) => self.handle_engine_failure(err).await,
        }
    }

    // === Hand completion ==================================================

    async fn on_hand_complete(&mut self) {
        self.timers.cancel_hand_timers();
        self.publish_state().await;
        self.broadcast(ServerEvent::GameWinner {
            winners: self.engine.winners().to_vec(),
        })
        .await;
        if let Some(bonus) = self.engine.seven_deuce_bonus().cloned() {
            self.broadcast(ServerEvent::GameSevenDeuceBonus { bonus }).await;
        }
        for removed in self.engine.purge_pending_removals() {
            self.broadcast(ServerEvent::RoomPlayerLeft {
                player_id: removed.user_id,
            })
            .await;
        }
        self.update_status();

        if self.engine.rules().wait_for_all_rebuys && self.open_rebuy_barrier().await {
            return;
        }
        self.schedule_next_hand();
    }

    /// Open the rebuy barrier if any live seat busted. Returns whether the
    /// barrier is now holding the next hand.
    async fn open_rebuy_barrier(&mut self) -> bool {
        let listed: Vec<UserId> = self
            .engine
            .players()
            .iter()
            .filter(|p| {
                p.chips == 0
                    && !matches!(
                        p.status,
                        PlayerStatus::Disconnected | PlayerStatus::SittingOut
                    )
            })
            .map(|p| p.user_id.clone())
            .collect();
        if listed.is_empty() {
            return false;
        }
        let barrier = RebuyBarrier {
            decisions: listed
                .into_iter()
                .map(|id| (id, RebuyDecision::Pending))
                .collect(),
            deadline: Instant::now() + Duration::from_secs(REBUY_TIMEOUT_SECS),
            timeout_at: Utc::now() + chrono::Duration::seconds(REBUY_TIMEOUT_SECS as i64),
        };
        self.timers.rebuy = Some(barrier);
        self.broadcast_rebuy_prompt().await;
        true
    }

    fn rebuy_prompt_view(&self) -> Option<RebuyPrompt> {
        self.timers.rebuy.as_ref().map(|barrier| RebuyPrompt {
            player_ids: barrier.decisions.keys().cloned().collect(),
            decisions: barrier.decisions.clone(),
            timeout_at: barrier.timeout_at,
        })
    }

    async fn broadcast_rebuy_prompt(&mut self) {
        let prompt = self.rebuy_prompt_view();
        self.broadcast(ServerEvent::RoomRebuyPrompt { prompt }).await;
    }

    async fn close_rebuy_barrier(&mut self) {
        self.timers.rebuy = None;
        self.broadcast(ServerEvent::RoomRebuyPrompt { prompt: None })
            .await;
        self.schedule_next_hand();
    }

    async fn expire_rebuy_barrier(&mut self) {
        let pending: Vec<UserId> = self
            .timers
            .rebuy
            .as_ref()
            .map(|b| {
                b.decisions
                    .iter()
                    .filter(|(_, d)| matches!(d, RebuyDecision::Pending))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default();
        for user_id in pending {
            let _ = self
                .engine
                .set_player_status(&user_id, PlayerStatus::SittingOut);
            if let Some(barrier) = self.timers.rebuy.as_mut() {
                barrier.decisions.insert(user_id, RebuyDecision::Decline);
            }
        }
        self.publish_state().await;
        self.close_rebuy_barrier().await;
    }

    /// Schedule the next hand: the base delay plus whatever time the client
    /// needs to animate a runout.
    fn schedule_next_hand(&mut self) {
        let mut delay_ms = NEXT_HAND_BASE_DELAY_MS;
        delay_ms += match self.engine.runout_from() {
            Some(HandPhase::Preflop) => RUNOUT_DELAY_PREFLOP_MS,
            Some(HandPhase::Flop) => RUNOUT_DELAY_FLOP_MS,
            Some(HandPhase::Turn) => RUNOUT_DELAY_TURN_MS,
            _ => 0,
        };
        self.timers.next_hand = Some(NextHandTimer {
            deadline: Instant::now() + Duration::from_millis(delay_ms),
        });
    }

    async fn try_start_next_hand(&mut self) {
        if self.timers.rebuy.is_some() || self.engine.is_hand_active() {
            return;
        }
        if self.engine.playable_count() < crate::game::constants::MIN_PLAYERS {
            self.update_status();
            self.publish_state().await;
            return;
        }
        if let Err(err) = self.attempt_hand_start().await {
            warn!("room {}: next hand not started: {err}", self.id);
            self.update_status();
        }
    }

    // === Timers ===========================================================

    fn start_turn_timer(&mut self) {
        self.timers.turn = None;
        let rules = self.engine.rules();
        if !rules.turn_time_enabled {
            return;
        }
        let Some(actor) = self.engine.current_actor() else {
            return;
        };
        self.timers.turn = Some(TurnTimer {
            user_id: actor.user_id.clone(),
            seat: actor.seat,
            deadline: Instant::now() + Duration::from_secs(rules.turn_time_seconds),
            warned: false,
        });
    }

    async fn on_tick(&mut self) {
        let now = Instant::now();

        if let Some(turn) = self.timers.turn.clone() {
            if now >= turn.deadline {
                if turn.warned {
                    self.timers.turn = None;
                    self.auto_fold(turn.user_id).await;
                } else {
                    let extra_time = self.engine.rules().warning_time_seconds;
                    if let Some(t) = self.timers.turn.as_mut() {
                        t.warned = true;
                        t.deadline = now + Duration::from_secs(extra_time);
                    }
                    self.broadcast(ServerEvent::GameTimerWarning {
                        player_id: turn.user_id,
                        extra_time,
                    })
                    .await;
                }
            } else {
                self.broadcast(ServerEvent::GameTimer {
                    time_remaining: secs_until(now, turn.deadline),
                    player_id: Some(turn.user_id),
                })
                .await;
            }
        }

        if let Some(straddle) = self.timers.straddle.clone() {
            if now >= straddle.deadline {
                self.timers.straddle = None;
                match self.engine.process_straddle(&straddle.user_id, false) {
                    Ok(outcome) => {
                        self.broadcast(ServerEvent::GameStraddleDeclined { seat: outcome.seat })
                            .await;
                        self.finish_straddle_phase().await;
                    }
                    Err(err) => {
                        warn!("room {}: straddle timeout cleanup failed: {err}", self.id);
                        self.finish_straddle_phase().await;
                    }
                }
            } else {
                self.broadcast(ServerEvent::GameTimer {
                    time_remaining: secs_until(now, straddle.deadline),
                    player_id: Some(straddle.user_id),
                })
                .await;
            }
        }

        if let Some(timer) = self.timers.run_it.clone() {
            if now >= timer.deadline {
                self.finalize_run_it().await;
            } else {
                self.broadcast(ServerEvent::GameTimer {
                    time_remaining: secs_until(now, timer.deadline),
                    player_id: None,
                })
                .await;
            }
        }

        if self
            .timers
            .rebuy
            .as_ref()
            .is_some_and(|b| now >= b.deadline)
        {
            self.expire_rebuy_barrier().await;
        }

        if self
            .timers
            .next_hand
            .as_ref()
            .is_some_and(|t| now >= t.deadline)
        {
            self.timers.next_hand = None;
            self.try_start_next_hand().await;
        }
    }

    /// Fold a player whose warning extension ran out, sit them out, and
    /// move on.
    async fn auto_fold(&mut self, user_id: UserId) {
        match self.engine.process_action(&user_id, PlayerAction::Fold) {
            Ok(outcome) => {
                let _ = self
                    .engine
                    .set_player_status(&user_id, PlayerStatus::SittingOut);
                self.broadcast(ServerEvent::GameAction {
                    action: outcome.applied.clone(),
                })
                .await;
                self.broadcast(ServerEvent::GameAutoFold {
                    player_id: user_id.clone(),
                })
                .await;
                self.continue_after_action(outcome).await;
            }
            Err(err) => {
                // The actor may have acted in the same tick; nothing to do.
                warn!("room {}: auto-fold skipped: {err}", self.id);
            }
        }
    }

    // === Plumbing =========================================================

    async fn handle_engine_failure(&mut self, err: EngineError) {
        error!("room {}: engine failure: {err}; aborting hand", self.id);
        self.engine.abort_hand();
        self.timers.cancel_hand_timers();
        self.update_status();
        self.publish_state().await;
    }

    fn update_status(&mut self) {
        if self.is_closed {
            self.status = RoomStatus::Closed;
        } else if self.engine.is_hand_active() {
            self.status = RoomStatus::Playing;
        } else {
            self.status = RoomStatus::Waiting;
        }
    }

    async fn broadcast(&self, event: ServerEvent) {
        self.broadcaster.broadcast(self.members.keys(), event).await;
    }

    async fn publish_state(&self) {
        self.broadcaster
            .publish_state(&self.engine, self.members.keys())
            .await;
    }

    async fn send_error(
        &self,
        user_id: &UserId,
        code: ErrorCode,
        message: impl Into<String>,
    ) {
        self.broadcaster
            .send_to(user_id, ServerEvent::error(code, message))
            .await;
    }

    async fn send_engine_error(&self, user_id: &UserId, err: &EngineError) {
        self.broadcaster
            .send_to(user_id, ServerEvent::error(ErrorCode::from(err), err.to_string()))
            .await;
    }
}
