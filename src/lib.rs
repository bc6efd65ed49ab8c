use serde::{Deserialize, Serialize};

use crate::{
    coordinator::EndReason,
    display::DisplayEvent,
    logic::{Side, Square},
    move_log::LogEntry,
};

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod display;
pub mod error;
pub mod logic;
pub mod machine;
pub mod move_log;
pub mod opponent;
pub mod signal;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    InitialSetup { player_name: String },
    SelectSquare(Square),
    Resign,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    InitialSetup {
        first_mover: Side,
        opponent_name: String,
    },
    Display(DisplayEvent),
    Rejected {
        reason: String,
    },
    GameOver {
        reason: EndReason,
        log: Vec<LogEntry>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_square_wire_format() {
        let request = ClientRequest::SelectSquare("e2".parse().unwrap());
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"SelectSquare":"e2"}"#);
        assert_eq!(serde_json::from_str::<ClientRequest>(&json).unwrap(), request);
    }

    #[test]
    fn off_board_selection_is_rejected_at_the_wire() {
        for json in [
            r#"{"SelectSquare":{"pos":[4,12]}}"#,
            r#"{"SelectSquare":{"pos":[300,0]}}"#,
            r#"{"SelectSquare":"e9"}"#,
            r#"{"SelectSquare":"i1"}"#,
        ] {
            assert!(serde_json::from_str::<ClientRequest>(json).is_err(), "{json}");
        }
    }

    #[test]
    fn game_over_carries_the_log() {
        let message = ServerMessage::GameOver {
            reason: EndReason::Resigned { side: Side::Local },
            log: vec![LogEntry {
                side: Side::Local,
                notation: "e2:e4".into(),
            }],
        };
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(serde_json::from_str::<ServerMessage>(&json).unwrap(), message);
    }
}
