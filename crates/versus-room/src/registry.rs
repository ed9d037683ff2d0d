//! Room registry: creates rooms, hands out their codes and host
//! credentials, and looks rooms up by code.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use versus_protocol::{HostCredential, RoomId};

use crate::room::spawn_room;
use crate::{BroadcastGateway, RoomConfig, RoomError, RoomHandle};

/// Characters room codes are drawn from. No `I`, `O`, `0` or `1`, since
/// those are easy to misread on a projector.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const ROOM_CODE_LEN: usize = 6;

/// Owns every live room of one server.
///
/// Creation takes `&mut self`, so two rooms can never be handed the same
/// code. Independent registries share nothing, which keeps tests isolated.
pub struct RoomRegistry<G: BroadcastGateway> {
    rooms: HashMap<RoomId, RoomHandle>,
    gateway: Arc<G>,
    config: Arc<RoomConfig>,
}

impl<G: BroadcastGateway> RoomRegistry<G> {
    /// Creates an empty registry whose rooms broadcast through `gateway`.
    pub fn new(gateway: Arc<G>, config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            gateway,
            config: Arc::new(config.validated()),
        }
    }

    /// Spawns a new room in `IDLE` at level 1.
    ///
    /// Returns the room's code and the host credential. The credential is
    /// returned only here; rooms never send it to anyone.
    pub fn create_room(&mut self) -> (RoomId, HostCredential) {
        let room_id = loop {
            let candidate = generate_room_code();
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
            tracing::debug!(room_id = %candidate, "room code collision, drawing again");
        };
        let credential = generate_credential();

        let handle = spawn_room(
            room_id.clone(),
            credential.clone(),
            Arc::clone(&self.config),
            Arc::clone(&self.gateway),
        );
        self.rooms.insert(room_id.clone(), handle);
        tracing::info!(%room_id, rooms = self.rooms.len(), "room created");
        (room_id, credential)
    }

    /// Looks a room up by the code a client typed. Case is ignored.
    pub fn get_room(&self, code: &str) -> Result<RoomHandle, RoomError> {
        let room_id = RoomId::new(code);
        self.rooms
            .get(&room_id)
            .cloned()
            .ok_or(RoomError::NotFound(room_id))
    }

    /// Shuts a room down and forgets it. Its code may be reused afterwards.
    pub async fn remove_room(&mut self, code: &str) -> Result<(), RoomError> {
        let room_id = RoomId::new(code);
        let handle = self
            .rooms
            .remove(&room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        if let Err(e) = handle.shutdown().await {
            tracing::debug!(%room_id, error = %e, "room actor already stopped");
        }

        tracing::info!(%room_id, "room removed");
        Ok(())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().cloned().collect()
    }

    /// The validated config every room of this registry runs with.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }
}

fn generate_room_code() -> RoomId {
    let mut rng = rand::rng();
    let code: String = (0..ROOM_CODE_LEN)
        .map(|_| char::from(ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())]))
        .collect();
    RoomId::new(code)
}

/// 128 random bits as 32 lowercase hex characters.
fn generate_credential() -> HostCredential {
    let bytes: [u8; 16] = rand::rng().random();
    HostCredential::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_code_shape() {
        for _ in 0..200 {
            let code = generate_room_code();
            assert_eq!(code.as_str().len(), ROOM_CODE_LEN);
            assert!(
                code.as_str().bytes().all(|c| ROOM_CODE_ALPHABET.contains(&c)),
                "unexpected character in {code}"
            );
        }
    }

    #[test]
    fn test_credential_is_32_lowercase_hex() {
        let cred = generate_credential();
        let secret = cred.expose();
        assert_eq!(secret.len(), 32);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_credentials_differ() {
        assert_ne!(generate_credential(), generate_credential());
    }
}
