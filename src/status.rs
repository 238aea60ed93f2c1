//! Status codes raised towards the host accessory framework.

use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// The discrete failures a characteristic get/set can end with. Each maps to
/// exactly one HomeKit status code; no free text reaches the end user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HapStatus {
    /// Refresh lock contended beyond its wait bound; the caller should retry.
    ResourceBusy,
    /// A requested trait is absent from the last known snapshot.
    ResourceDoesNotExist,
    /// Device unreachable, or no snapshot could ever be fetched.
    ServiceCommunicationFailure,
    /// Eco mode or a mode mismatch blocks the write.
    NotAllowedInCurrentState,
    /// Requested mode is not one the device supports.
    InvalidValueInRequest,
    /// Write attempted on a characteristic this bridge never writes.
    ReadOnlyCharacteristic,
}

impl HapStatus {
    pub fn code(self) -> i32 {
        match self {
            HapStatus::ServiceCommunicationFailure => -70402,
            HapStatus::ResourceBusy => -70403,
            HapStatus::ReadOnlyCharacteristic => -70404,
            HapStatus::ResourceDoesNotExist => -70409,
            HapStatus::InvalidValueInRequest => -70410,
            HapStatus::NotAllowedInCurrentState => -70412,
        }
    }
}

impl Display for HapStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            HapStatus::ResourceBusy => "resource busy",
            HapStatus::ResourceDoesNotExist => "resource does not exist",
            HapStatus::ServiceCommunicationFailure => "service communication failure",
            HapStatus::NotAllowedInCurrentState => "not allowed in current state",
            HapStatus::InvalidValueInRequest => "invalid value in request",
            HapStatus::ReadOnlyCharacteristic => "read-only characteristic",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

impl Error for HapStatus {}
