//! Common types used throughout the matchmaking server

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sequential identifier assigned to a player at sign-up
pub type PlayerId = u64;

/// Integer Elo rating, never below zero
pub type Rating = u32;

/// Unique identifier for lobbies
pub type LobbyId = Uuid;

/// Unique identifier for matches
pub type MatchId = Uuid;

/// Presence of a player as seen by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerStatus {
    #[serde(rename = "ONLINE")]
    Online,
    #[serde(rename = "OFFLINE")]
    Offline,
    #[serde(rename = "IN QUEUE")]
    InQueue,
    #[serde(rename = "IN GAME")]
    InGame,
}

impl std::fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerStatus::Online => write!(f, "ONLINE"),
            PlayerStatus::Offline => write!(f, "OFFLINE"),
            PlayerStatus::InQueue => write!(f, "IN QUEUE"),
            PlayerStatus::InGame => write!(f, "IN GAME"),
        }
    }
}

/// Skill class derived from a rating in 200-point bins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RatingClass {
    E,
    D,
    C,
    B,
    A,
    S,
    SS,
    SSS,
}

impl RatingClass {
    /// Derive the class of a rating (half-open bins, lower bound inclusive)
    pub fn from_rating(rating: Rating) -> Self {
        match rating {
            0..=1199 => RatingClass::E,
            1200..=1399 => RatingClass::D,
            1400..=1599 => RatingClass::C,
            1600..=1799 => RatingClass::B,
            1800..=1999 => RatingClass::A,
            2000..=2199 => RatingClass::S,
            2200..=2399 => RatingClass::SS,
            _ => RatingClass::SSS,
        }
    }
}

impl std::fmt::Display for RatingClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RatingClass::E => "E",
            RatingClass::D => "D",
            RatingClass::C => "C",
            RatingClass::B => "B",
            RatingClass::A => "A",
            RatingClass::S => "S",
            RatingClass::SS => "SS",
            RatingClass::SSS => "SSS",
        };
        f.write_str(name)
    }
}

/// Rating change information for a player after a rated match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    pub player_id: PlayerId,
    pub old_rating: Rating,
    pub new_rating: Rating,
    /// Final placement, 1 = first place
    pub rank: u32,
    pub expected_score: f64,
}

impl RatingChange {
    /// Signed difference between the new and the old rating
    pub fn delta(&self) -> i64 {
        self.new_rating as i64 - self.old_rating as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_boundaries() {
        assert_eq!(RatingClass::from_rating(0), RatingClass::E);
        assert_eq!(RatingClass::from_rating(1199), RatingClass::E);
        assert_eq!(RatingClass::from_rating(1200), RatingClass::D);
        assert_eq!(RatingClass::from_rating(1399), RatingClass::D);
        assert_eq!(RatingClass::from_rating(1400), RatingClass::C);
        assert_eq!(RatingClass::from_rating(1600), RatingClass::B);
        assert_eq!(RatingClass::from_rating(1800), RatingClass::A);
        assert_eq!(RatingClass::from_rating(2000), RatingClass::S);
        assert_eq!(RatingClass::from_rating(2200), RatingClass::SS);
        assert_eq!(RatingClass::from_rating(2399), RatingClass::SS);
        assert_eq!(RatingClass::from_rating(2400), RatingClass::SSS);
        assert_eq!(RatingClass::from_rating(9000), RatingClass::SSS);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&PlayerStatus::InQueue).unwrap(),
            "\"IN QUEUE\""
        );
        assert_eq!(
            serde_json::to_string(&PlayerStatus::InGame).unwrap(),
            "\"IN GAME\""
        );
        assert_eq!(PlayerStatus::Offline.to_string(), "OFFLINE");
    }

    #[test]
    fn test_rating_change_delta() {
        let change = RatingChange {
            player_id: 1,
            old_rating: 1200,
            new_rating: 1184,
            rank: 2,
            expected_score: 1.5,
        };
        assert_eq!(change.delta(), -16);
    }
}
