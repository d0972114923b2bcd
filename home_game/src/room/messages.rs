//! Room actor command types.

use tokio::sync::oneshot;

use super::RoomInfo;
use crate::game::player::UserId;
use crate::game::view::GameStateView;
use crate::net::events::{ClientEvent, ErrorCode};

/// Messages the registry and transport layer send to a `RoomActor`. All
/// gameplay flows through `Client`; the request/response commands serve the
/// HTTP boundary and the join handshake.
#[derive(Debug)]
pub enum RoomCommand {
    /// A user joins the room (as a spectator until they sit).
    Join {
        user_id: UserId,
        username: String,
        password: Option<String>,
        respond: oneshot::Sender<Result<RoomInfo, ErrorCode>>,
    },

    /// A client event from a user already in the room.
    Client { user_id: UserId, event: ClientEvent },

    /// The user's transport dropped.
    Disconnected { user_id: UserId },

    /// Room snapshot for listings.
    GetInfo {
        respond: oneshot::Sender<RoomInfo>,
    },

    /// Personalized game state for one viewer.
    GetState {
        viewer: Option<UserId>,
        respond: oneshot::Sender<GameStateView>,
    },

    /// Shut the room down: cancel timers, notify members, release the code.
    Close {
        respond: Option<oneshot::Sender<()>>,
    },
}
