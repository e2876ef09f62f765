//! Room codes and the store keys derived from them.

use rand::Rng;
use tactoe_protocol::RoomId;

const ROOM_ID_LEN: usize = 5;
const ROOM_ID_CHARS: &[u8] = b"1234567890";

const RECORD_KEY_PREFIX: &str = "tic_tac_toe_id";
const MEMBERS_KEY_PREFIX: &str = "tic_tac_toe_member";
const STREAM_KEY_PREFIX: &str = "tic_tac_toe_stream";

/// Draws a random five-digit room code. Not checked for uniqueness; the
/// repository reserves it.
pub fn generate_room_id() -> RoomId {
    let mut rng = rand::rng();
    let code: String = (0..ROOM_ID_LEN)
        .map(|_| char::from(ROOM_ID_CHARS[rng.random_range(0..ROOM_ID_CHARS.len())]))
        .collect();
    RoomId::new(code)
}

/// The three store keys making up one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomKeys {
    /// Reservation string. Its presence is what makes the room exist.
    pub record: String,
    /// Set of login ids currently in the room.
    pub members: String,
    /// Log of battle snapshots.
    pub stream: String,
}

impl RoomKeys {
    pub fn new(room_id: &RoomId) -> Self {
        Self {
            record: format!("{RECORD_KEY_PREFIX}:{room_id}"),
            members: format!("{MEMBERS_KEY_PREFIX}:{room_id}"),
            stream: format!("{STREAM_KEY_PREFIX}:{room_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_room_id_is_five_digits() {
        for _ in 0..100 {
            let id = generate_room_id();
            assert_eq!(id.as_str().len(), 5);
            assert!(id.as_str().bytes().all(|b| b.is_ascii_digit()), "{id}");
        }
    }

    #[test]
    fn test_room_keys_format() {
        let keys = RoomKeys::new(&RoomId::new("40213"));
        assert_eq!(keys.record, "tic_tac_toe_id:40213");
        assert_eq!(keys.members, "tic_tac_toe_member:40213");
        assert_eq!(keys.stream, "tic_tac_toe_stream:40213");
    }
}
