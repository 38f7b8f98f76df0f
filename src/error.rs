// Error types shared by the reservation client and the reconciliation engine

use thiserror::Error;

// Failures surfaced by a reservation service call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Bad slot: {0}")]
    BadSlot(String),

    #[error("Not processed: {0}")]
    NotProcessed(String),

    #[error("Slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("Reservation limit reached: {0}")]
    ReservationLimit(String),

    #[error("Unexpected status code {status}: {reason}")]
    UnexpectedStatus { status: u16, reason: String },

    #[error("Request failed after {attempts} attempts: {last_failure}")]
    RetriesExhausted { attempts: u32, last_failure: String },

    #[error("Response decode error: {0}")]
    Decode(String),
}

impl ReservationError {
    /// Maps a non-200, non-5xx status onto its error kind.
    pub fn from_status(status: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        match status {
            400 => Self::BadRequest(reason),
            401 => Self::InvalidToken(reason),
            403 => Self::BadSlot(reason),
            404 => Self::NotProcessed(reason),
            409 => Self::SlotUnavailable(reason),
            451 => Self::ReservationLimit(reason),
            _ => Self::UnexpectedStatus { status, reason },
        }
    }

    // The service answered and refused this particular slot
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::BadSlot(_)
                | Self::NotProcessed(_)
                | Self::SlotUnavailable(_)
                | Self::ReservationLimit(_)
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::InvalidToken(_) => Some(401),
            Self::BadSlot(_) => Some(403),
            Self::NotProcessed(_) => Some(404),
            Self::SlotUnavailable(_) => Some(409),
            Self::ReservationLimit(_) => Some(451),
            Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::RetriesExhausted { .. } | Self::Decode(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ReservationError::from_status(400, "bad"),
            ReservationError::BadRequest("bad".to_string())
        );
        assert_eq!(
            ReservationError::from_status(401, "token"),
            ReservationError::InvalidToken("token".to_string())
        );
        assert_eq!(
            ReservationError::from_status(403, "slot"),
            ReservationError::BadSlot("slot".to_string())
        );
        assert_eq!(
            ReservationError::from_status(404, "missing"),
            ReservationError::NotProcessed("missing".to_string())
        );
        assert_eq!(
            ReservationError::from_status(409, "taken"),
            ReservationError::SlotUnavailable("taken".to_string())
        );
        assert_eq!(
            ReservationError::from_status(451, "limit"),
            ReservationError::ReservationLimit("limit".to_string())
        );
        assert_eq!(
            ReservationError::from_status(302, "Found"),
            ReservationError::UnexpectedStatus {
                status: 302,
                reason: "Found".to_string()
            }
        );
    }

    #[test]
    fn test_status_round_trips_through_kind() {
        for code in [400, 401, 403, 404, 409, 451, 418] {
            assert_eq!(ReservationError::from_status(code, "x").status(), Some(code));
        }
    }

    #[test]
    fn test_rejection_kinds() {
        assert!(ReservationError::SlotUnavailable(String::new()).is_rejection());
        assert!(ReservationError::ReservationLimit(String::new()).is_rejection());
        assert!(!ReservationError::InvalidToken(String::new()).is_rejection());
        assert!(!ReservationError::RetriesExhausted {
            attempts: 3,
            last_failure: "503".to_string()
        }
        .is_rejection());
    }

    #[test]
    fn test_display_includes_reason() {
        let err = ReservationError::UnexpectedStatus {
            status: 418,
            reason: "I'm a teapot".to_string(),
        };
        assert_eq!(err.to_string(), "Unexpected status code 418: I'm a teapot");
    }
}
