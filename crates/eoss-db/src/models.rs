//! Row model and lifecycle state for the metadata catalog.

use eoss_common::{EossError, Result};

/// Lifecycle state, persisted as the `state` integer column (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed = 0,
    Init = 1,
    Staged = 2,
}

impl State {
    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for State {
    type Error = EossError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(State::Closed),
            1 => Ok(State::Init),
            2 => Ok(State::Staged),
            other => Err(EossError::Internal(format!("unknown state code {other}"))),
        }
    }
}

/// A metadata row as persisted in `METADATA_DB_TABLE`.
#[derive(Debug, Clone)]
pub struct Row {
    pub id: String,
    pub filename: String,
    pub version: Option<String>,
    pub size: Option<i64>,
    pub timestamp: Option<i64>,
    pub state: State,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_its_integer_code() {
        assert_eq!(State::try_from(0).unwrap().as_i64(), 0);
        assert_eq!(State::try_from(1).unwrap().as_i64(), 1);
        assert_eq!(State::try_from(2).unwrap().as_i64(), 2);
        assert!(State::try_from(3).is_err());
    }
}
