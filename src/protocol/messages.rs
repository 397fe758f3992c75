//! Message bodies exchanged with clients

use crate::player::Player;
use crate::types::{Rating, RatingClass};
use crate::utils::round_two_decimals;
use serde::{Deserialize, Serialize};

/// Credentials record.
///
/// The server sends it with both fields empty as a template; the client
/// returns it filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "USERNAME")]
    pub username: Option<String>,
    #[serde(rename = "PASSWORD")]
    pub password: Option<String>,
}

impl Credentials {
    /// Empty template sent before SIGN UP and SIGN IN
    pub fn template() -> Self {
        Self::default()
    }

    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }
}

/// One row of the leaderboard or of a match snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    #[serde(rename = "RANK")]
    pub rank: Option<u32>,
    #[serde(rename = "USERNAME")]
    pub username: String,
    #[serde(rename = "RATING")]
    pub rating: Rating,
    #[serde(rename = "CLASS")]
    pub class: RatingClass,
}

impl PlayerSummary {
    /// Summary carrying an explicit rank (lobby position or leaderboard rank)
    pub fn ranked(player: &Player, rank: u32) -> Self {
        Self {
            rank: Some(rank),
            username: player.username.clone(),
            rating: player.rating,
            class: player.class,
        }
    }

    /// Summary carrying the player's own leaderboard rank
    pub fn from_player(player: &Player) -> Self {
        Self {
            rank: player.rank,
            username: player.username.clone(),
            rating: player.rating,
            class: player.class,
        }
    }
}

/// A member's predicted placement before the match is played
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    /// Expected placement, rounded to two decimals
    #[serde(rename = "RANK")]
    pub expected_rank: f64,
    #[serde(rename = "USERNAME")]
    pub username: String,
    #[serde(rename = "RATING")]
    pub rating: Rating,
    #[serde(rename = "CLASS")]
    pub class: RatingClass,
}

impl PredictionSummary {
    pub fn new(player: &Player, expected_rank: f64) -> Self {
        Self {
            expected_rank: round_two_decimals(expected_rank),
            username: player.username.clone(),
            rating: player.rating,
            class: player.class,
        }
    }
}

/// Result delivered to every member of a finished match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Roster in admission order, before the match
    #[serde(rename = "BEFORE")]
    pub before: Vec<PlayerSummary>,
    #[serde(rename = "PREDICTIONS")]
    pub predictions: Vec<PredictionSummary>,
    /// Roster in final placement order, after rating updates
    #[serde(rename = "AFTER")]
    pub after: Vec<PlayerSummary>,
}

/// Reply to a request the session refuses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    #[serde(rename = "ERROR")]
    pub error: String,
}

impl ErrorReply {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_template_has_null_fields() {
        let json = serde_json::to_string(&Credentials::template()).unwrap();
        assert_eq!(json, r#"{"USERNAME":null,"PASSWORD":null}"#);
    }

    #[test]
    fn test_credentials_accept_filled_template() {
        let credentials: Credentials =
            serde_json::from_str(r#"{"USERNAME":"alice","PASSWORD":"pw"}"#).unwrap();
        assert_eq!(credentials, Credentials::new("alice", "pw"));
    }

    #[test]
    fn test_prediction_rounds_expected_rank() {
        let player = Player::new(0, "alice", 1300);
        let summary = PredictionSummary::new(&player, 1.35997);
        assert_eq!(summary.expected_rank, 1.36);
    }

    #[test]
    fn test_match_report_keys() {
        let player = Player::new(0, "alice", 1200);
        let report = MatchReport {
            before: vec![PlayerSummary::ranked(&player, 1)],
            predictions: vec![PredictionSummary::new(&player, 1.5)],
            after: vec![PlayerSummary::ranked(&player, 1)],
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["BEFORE"][0]["RANK"], 1);
        assert_eq!(value["BEFORE"][0]["CLASS"], "D");
        assert_eq!(value["PREDICTIONS"][0]["RANK"], 1.5);
        assert_eq!(value["AFTER"][0]["USERNAME"], "alice");
    }
}
