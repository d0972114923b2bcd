//! The room directory.
//!
//! Maps room ids and six-character invite codes to live room actors, and
//! persistent user ids to the room they are currently in. Codes are drawn
//! uniformly from a confusion-free alphabet and rejection-sampled against
//! the open-room set, so a code is unique for as long as its room lives.

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use log::info;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc, oneshot};
use uuid::Uuid;

use super::actor::RoomActor;
use super::messages::RoomCommand;
use super::{RoomId, RoomInfo, RoomOptions};
use crate::game::constants::{CODE_ALPHABET, CODE_LENGTH};
use crate::game::player::UserId;
use crate::net::session::SessionDirectory;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid room options: {0}")]
    InvalidOptions(String),
    #[error("failed to hash room password")]
    PasswordHash,
    #[error("room is closed")]
    RoomClosed,
}

/// Cheap handle for sending commands to one room actor.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    id: RoomId,
    code: String,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    #[must_use]
    pub fn id(&self) -> RoomId {
        self.id
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    pub async fn send(&self, command: RoomCommand) -> Result<(), RegistryError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| RegistryError::RoomClosed)
    }

    pub async fn info(&self) -> Option<RoomInfo> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { respond: tx }).await.ok()?;
        rx.await.ok()
    }
}

pub struct RoomRegistry {
    sessions: Arc<SessionDirectory>,
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    codes: RwLock<HashMap<String, RoomId>>,
    user_rooms: RwLock<HashMap<UserId, RoomId>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(sessions: Arc<SessionDirectory>) -> Arc<Self> {
        Arc::new(Self {
            sessions,
            rooms: RwLock::new(HashMap::new()),
            codes: RwLock::new(HashMap::new()),
            user_rooms: RwLock::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionDirectory> {
        &self.sessions
    }

    /// Create a room, allocate its code, and spawn its actor task.
    pub async fn create(
        self: &Arc<Self>,
        options: RoomOptions,
        host_id: UserId,
    ) -> Result<RoomInfo, RegistryError> {
        options
            .validate()
            .map_err(RegistryError::InvalidOptions)?;

        let password_hash = match options.password.as_deref() {
            Some(password) if options.is_private => {
                let salt = SaltString::generate(&mut OsRng);
                let hash = Argon2::default()
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|_| RegistryError::PasswordHash)?;
                Some(hash.to_string())
            }
            _ => None,
        };

        let id = Uuid::new_v4();
        let code = self.allocate_code(id).await;

        let (actor, sender) = RoomActor::new(
            id,
            code.clone(),
            options,
            host_id,
            password_hash,
            Arc::clone(self),
        );
        let info = actor.info();

        let handle = RoomHandle {
            id,
            code: code.clone(),
            sender,
        };
        self.rooms.write().await.insert(id, handle);

        tokio::spawn(actor.run());

        info!("room {id} created with code {code}");
        Ok(info)
    }

    /// Draw codes until one misses every open room.
    async fn allocate_code(&self, id: RoomId) -> String {
        let mut codes = self.codes.write().await;
        loop {
            let code = generate_code();
            if !codes.contains_key(&code) {
                codes.insert(code.clone(), id);
                return code;
            }
        }
    }

    pub async fn get(&self, id: RoomId) -> Option<RoomHandle> {
        self.rooms.read().await.get(&id).cloned()
    }

    /// Case-insensitive code lookup.
    pub async fn get_by_code(&self, code: &str) -> Option<RoomHandle> {
        let code = code.trim().to_ascii_uppercase();
        let id = *self.codes.read().await.get(&code)?;
        self.get(id).await
    }

    /// Ask a room to shut down. The actor releases its own entries when it
    /// exits.
    pub async fn close(&self, id: RoomId) {
        if let Some(handle) = self.get(id).await {
            let (tx, rx) = oneshot::channel();
            if handle
                .send(RoomCommand::Close { respond: Some(tx) })
                .await
                .is_ok()
            {
                let _ = rx.await;
            }
        }
    }

    /// Drop a closed room from every map. Called by the actor as it exits;
    /// this is what frees the invite code for reuse.
    pub async fn release(&self, id: RoomId) {
        let removed = self.rooms.write().await.remove(&id);
        if let Some(handle) = removed {
            self.codes.write().await.remove(handle.code());
        }
        self.user_rooms.write().await.retain(|_, room| *room != id);
        info!("room {id} released");
    }

    pub async fn bind_user(&self, user_id: UserId, room_id: RoomId) {
        self.user_rooms.write().await.insert(user_id, room_id);
    }

    pub async fn unbind_user(&self, user_id: &UserId) {
        self.user_rooms.write().await.remove(user_id);
    }

    /// The room a user is currently in.
    pub async fn room_of(&self, user_id: &UserId) -> Option<RoomHandle> {
        let id = *self.user_rooms.read().await.get(user_id)?;
        self.get(id).await
    }

    pub async fn list_public(&self) -> Vec<RoomInfo> {
        let handles: Vec<RoomHandle> = self.rooms.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(info) = handle.info().await
                && !info.is_private
            {
                infos.push(info);
            }
        }
        infos
    }

    pub async fn open_room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}
