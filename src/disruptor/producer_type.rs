//! Producer Type Implementation
//!
//! Selects which claim strategy the ring buffer's sequencer is built with.

use serde::{Deserialize, Serialize};

/// Specifies how many threads will claim and publish slots
///
/// # Examples
/// ```
/// use slotring::disruptor::ProducerType;
///
/// assert!(ProducerType::Single.is_single());
/// assert!(ProducerType::Multi.is_multi());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerType {
    /// Exactly one thread claims and publishes.
    ///
    /// The claim counter is advanced with plain loads and stores and publish never
    /// has to wait for a predecessor. Using it from more than one thread corrupts
    /// the sequence.
    #[default]
    Single,

    /// Any number of threads claim and publish concurrently.
    ///
    /// Claims use an atomic fetch-add and every publish waits until the previous
    /// sequence is visible, so consumers always observe publishes in order.
    Multi,
}

impl ProducerType {
    /// True for [`ProducerType::Single`]
    pub fn is_single(self) -> bool {
        matches!(self, ProducerType::Single)
    }

    /// True for [`ProducerType::Multi`]
    pub fn is_multi(self) -> bool {
        matches!(self, ProducerType::Multi)
    }
}

impl std::fmt::Display for ProducerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProducerType::Single => write!(f, "single"),
            ProducerType::Multi => write!(f, "multi"),
        }
    }
}

impl std::str::FromStr for ProducerType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(ProducerType::Single),
            "multi" | "multiple" => Ok(ProducerType::Multi),
            _ => Err(format!("Invalid producer type: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_single() {
        assert_eq!(ProducerType::default(), ProducerType::Single);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("single".parse::<ProducerType>().unwrap(), ProducerType::Single);
        assert_eq!("MULTI".parse::<ProducerType>().unwrap(), ProducerType::Multi);
        assert!("both".parse::<ProducerType>().is_err());
        assert_eq!(ProducerType::Multi.to_string(), "multi");
    }

    #[test]
    fn test_serde_round_names() {
        let json = serde_json::to_string(&ProducerType::Multi).unwrap();
        assert_eq!(json, "\"multi\"");
        let parsed: ProducerType = serde_json::from_str("\"single\"").unwrap();
        assert!(parsed.is_single());
    }
}
