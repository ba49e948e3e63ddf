//! Core domain types shared by every game variant: session codes, seats and the session record.

use std::{fmt, ops::RangeInclusive, str::FromStr, time::SystemTime};

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::{
    content::RoundContent,
    rules::GameRule,
    state_machine::{RoundPhase, TurnState},
};

/// Index of a seat inside a session, in `[0, capacity)`.
pub type SeatIndex = u32;

/// Characters allowed in a session code; visually confusable ones (`I`, `O`, `0`, `1`) are left out.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Number of characters in a session code.
pub const CODE_LENGTH: usize = 6;

/// Short join key displayed by the host and typed or scanned by players.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionCode(String);

impl SessionCode {
    /// Draw a random code from [`CODE_ALPHABET`].
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Borrow the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a string is not a well-formed session code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid session code `{0}`")]
pub struct InvalidSessionCode(pub String);

impl FromStr for SessionCode {
    type Err = InvalidSessionCode;

    /// Parse a code, accepting lowercase input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let valid = normalized.len() == CODE_LENGTH
            && normalized.bytes().all(|b| CODE_ALPHABET.contains(&b));
        if valid {
            Ok(Self(normalized))
        } else {
            Err(InvalidSessionCode(s.to_string()))
        }
    }
}

impl<'de> Deserialize<'de> for SessionCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The five supported party games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Everyone but one seat shares a secret word.
    Impostor,
    /// Hidden mafia/civilian roles.
    Mafia,
    /// One seat mimes a word, the others take timed guesses.
    Charades,
    /// Slot-and-symbol guessing.
    Casino,
    /// One seat guesses the character everybody else can see.
    WhoAmI,
}

impl Variant {
    /// Seat counts accepted at creation.
    pub fn capacity_range(self) -> RangeInclusive<u32> {
        match self {
            Variant::Impostor | Variant::Casino => 3..=20,
            Variant::Mafia => 4..=20,
            Variant::Charades | Variant::WhoAmI => 2..=20,
        }
    }

    /// Path segment used in join links.
    pub fn slug(self) -> &'static str {
        match self {
            Variant::Impostor => "impostor",
            Variant::Mafia => "mafia",
            Variant::Charades => "charades",
            Variant::Casino => "casino",
            Variant::WhoAmI => "who-am-i",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Persisted lifecycle flag of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Seats are still being claimed or observed for the current round.
    Waiting,
    /// The round's gate opened; turns are being played.
    Active,
}

/// A piece of secret text (word or character) with an optional category hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Word {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Word {
    /// Build a word without category.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: None,
        }
    }

    /// Build a word carrying a category hint.
    pub fn categorized(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: Some(category.into()),
        }
    }
}

/// Cosmetic tag shown on a casino seat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Symbol(pub String);

/// A claimed seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub index: SeatIndex,
    pub claimed_at: SystemTime,
    /// Round in which the seat's device last acknowledged its content.
    pub observed_round: Option<u32>,
    pub observed_at: Option<SystemTime>,
}

impl Seat {
    /// Whether this seat has observed the content of `round`.
    pub fn has_observed(&self, round: u32) -> bool {
        self.observed_round == Some(round)
    }
}

/// Authoritative state of one room as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub code: SessionCode,
    pub rule: GameRule,
    pub capacity: u32,
    /// Whether the host device sits at `capacity - 1` instead of being a pure controller.
    pub host_occupies_seat: bool,
    pub status: SessionStatus,
    /// Starts at 1 and increases with every round reset.
    pub round: u32,
    /// Bumped by every transition; actions may be stamped with the value they were issued against.
    pub turn_seq: u64,
    pub content: RoundContent,
    pub turn: TurnState,
    /// Impostor only: seat that opens the discussion, chosen once the round is revealed.
    pub starting_seat: Option<SeatIndex>,
    pub created_at: SystemTime,
}

impl Session {
    /// Variant tag of the session's rule.
    pub fn variant(&self) -> Variant {
        self.rule.variant()
    }

    /// Seat reserved for the host device, if the host occupies one.
    pub fn host_seat(&self) -> Option<SeatIndex> {
        self.host_occupies_seat.then(|| self.capacity - 1)
    }

    /// Whether `index` is a valid seat of this session.
    pub fn contains(&self, index: SeatIndex) -> bool {
        index < self.capacity
    }

    /// Derived round phase.
    pub fn phase(&self) -> RoundPhase {
        match (self.status, self.round) {
            (SessionStatus::Active, _) => RoundPhase::Active,
            (SessionStatus::Waiting, 1) => RoundPhase::Setup,
            (SessionStatus::Waiting, _) => RoundPhase::RoundComplete,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn generated_codes_use_the_unambiguous_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = SessionCode::generate(&mut rng);
            assert_eq!(code.as_str().len(), CODE_LENGTH);
            assert!(
                code.as_str()
                    .bytes()
                    .all(|b| !matches!(b, b'I' | b'O' | b'0' | b'1'))
            );
            assert_eq!(code.as_str().parse::<SessionCode>().unwrap(), code);
        }
    }

    #[test]
    fn parsing_normalizes_case_and_rejects_confusable_characters() {
        assert_eq!(
            "abc234".parse::<SessionCode>().unwrap().as_str(),
            "ABC234"
        );
        assert!("ABC10O".parse::<SessionCode>().is_err());
        assert!("ABC23".parse::<SessionCode>().is_err());
        assert!("ABC2345".parse::<SessionCode>().is_err());
    }

    #[test]
    fn capacity_ranges_follow_variant_minimums() {
        assert_eq!(*Variant::Mafia.capacity_range().start(), 4);
        assert_eq!(*Variant::Charades.capacity_range().start(), 2);
        assert_eq!(*Variant::Impostor.capacity_range().end(), 20);
    }
}
