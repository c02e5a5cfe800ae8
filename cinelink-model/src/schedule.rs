use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// The single daily schedule slot, as submitted from the dashboard form.
///
/// Setting a new slot replaces the previous one outright; there is never
/// more than one active schedule. Fields stay private so every slot,
/// deserialized ones included, has passed range validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleSlot {
    hour: u8,
    minute: u8,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleSlotError {
    #[error("schedule must be HH:MM, got '{0}'")]
    Format(String),

    #[error("schedule out of range: {0:02}:{1:02}")]
    OutOfRange(u8, u8),
}

impl ScheduleSlot {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ScheduleSlotError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleSlotError::OutOfRange(hour, minute));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl<'de> Deserialize<'de> for ScheduleSlot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            hour: u8,
            minute: u8,
        }

        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.hour, raw.minute).map_err(serde::de::Error::custom)
    }
}

impl FromStr for ScheduleSlot {
    type Err = ScheduleSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| ScheduleSlotError::Format(s.to_string()))?;
        let hour: u8 = hour
            .parse()
            .map_err(|_| ScheduleSlotError::Format(s.to_string()))?;
        let minute: u8 = minute
            .parse()
            .map_err(|_| ScheduleSlotError::Format(s.to_string()))?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for ScheduleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_round_trip() {
        let slot: ScheduleSlot = "09:05".parse().unwrap();
        assert_eq!(slot, ScheduleSlot::new(9, 5).unwrap());
        assert_eq!(slot.to_string(), "09:05");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            "930".parse::<ScheduleSlot>(),
            Err(ScheduleSlotError::Format(_))
        ));
        assert!(matches!(
            "nine:30".parse::<ScheduleSlot>(),
            Err(ScheduleSlotError::Format(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_times() {
        assert_eq!(
            "24:00".parse::<ScheduleSlot>(),
            Err(ScheduleSlotError::OutOfRange(24, 0))
        );
        assert_eq!(
            "12:60".parse::<ScheduleSlot>(),
            Err(ScheduleSlotError::OutOfRange(12, 60))
        );
    }

    #[test]
    fn deserialization_rejects_out_of_range_times() {
        let err = serde_json::from_str::<ScheduleSlot>(r#"{"hour":99,"minute":0}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("out of range"), "unexpected error: {err}");

        let slot: ScheduleSlot = serde_json::from_str(r#"{"hour":23,"minute":59}"#).unwrap();
        assert_eq!(slot, ScheduleSlot::new(23, 59).unwrap());
    }
}
