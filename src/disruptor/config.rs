//! Ring buffer configuration
//!
//! Serde-backed description of how a [`RingBuffer`](crate::disruptor::RingBuffer)
//! is built, so a pipeline can be set up from a JSON file or command line.

use crate::disruptor::{
    ceiling_next_power_of_two, BlockingWaitStrategy, BusySpinWaitStrategy, DisruptorError,
    ProducerType, Result, WaitStrategy, YieldingWaitStrategy,
};
use serde::{Deserialize, Serialize};

/// Wait strategy used by consumers while no new data is available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategyKind {
    #[default]
    Blocking,
    Yielding,
    BusySpin,
}

impl WaitStrategyKind {
    /// Instantiate the wait strategy this kind names
    pub fn build(self) -> WaitStrategy {
        match self {
            WaitStrategyKind::Blocking => WaitStrategy::Blocking(BlockingWaitStrategy::new()),
            WaitStrategyKind::Yielding => WaitStrategy::Yielding(YieldingWaitStrategy::new()),
            WaitStrategyKind::BusySpin => WaitStrategy::BusySpin(BusySpinWaitStrategy::new()),
        }
    }
}

impl std::str::FromStr for WaitStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blocking" => Ok(WaitStrategyKind::Blocking),
            "yielding" => Ok(WaitStrategyKind::Yielding),
            "busy-spin" | "busy_spin" | "busyspin" => Ok(WaitStrategyKind::BusySpin),
            _ => Err(format!("Invalid wait strategy: {s}")),
        }
    }
}

/// How a producer waits while the ring is too full to hand out a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimWait {
    BusySpin,
    #[default]
    Yielding,
}

impl ClaimWait {
    #[inline]
    pub(crate) fn idle(self) {
        match self {
            ClaimWait::BusySpin => std::hint::spin_loop(),
            ClaimWait::Yielding => std::thread::yield_now(),
        }
    }
}

impl std::str::FromStr for ClaimWait {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "busy-spin" | "busy_spin" | "busyspin" => Ok(ClaimWait::BusySpin),
            "yielding" => Ok(ClaimWait::Yielding),
            _ => Err(format!("Invalid claim wait policy: {s}")),
        }
    }
}

/// Full option set for building a ring buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingBufferConfig {
    /// Requested number of slots, rounded up to the next power of two
    pub capacity: usize,
    pub producer_type: ProducerType,
    pub wait_strategy: WaitStrategyKind,
    /// Safety margin kept free between producers and the slowest gating consumer
    pub reserve_threshold: usize,
    pub claim_wait: ClaimWait,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            producer_type: ProducerType::Single,
            wait_strategy: WaitStrategyKind::Blocking,
            reserve_threshold: 0,
            claim_wait: ClaimWait::Yielding,
        }
    }
}

impl RingBufferConfig {
    /// Default configuration with the given requested capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Set the producer type
    pub fn producer_type(mut self, producer_type: ProducerType) -> Self {
        self.producer_type = producer_type;
        self
    }

    /// Set the consumer wait strategy
    pub fn wait_strategy(mut self, wait_strategy: WaitStrategyKind) -> Self {
        self.wait_strategy = wait_strategy;
        self
    }

    /// Set how many extra slots producers leave free
    pub fn reserve_threshold(mut self, reserve_threshold: usize) -> Self {
        self.reserve_threshold = reserve_threshold;
        self
    }

    /// Set how producers idle while the ring is full
    pub fn claim_wait(mut self, claim_wait: ClaimWait) -> Self {
        self.claim_wait = claim_wait;
        self
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DisruptorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The capacity the ring buffer will actually have
    pub fn effective_capacity(&self) -> Result<usize> {
        ceiling_next_power_of_two(self.capacity)
            .filter(|capacity| i64::try_from(*capacity).is_ok())
            .ok_or(DisruptorError::InvalidCapacity(self.capacity))
    }

    /// Check the capacity rounds up to something usable and the reserve
    /// leaves room to claim
    ///
    /// # Errors
    /// `InvalidCapacity` or `InvalidReserveThreshold`
    pub fn validate(&self) -> Result<()> {
        let capacity = self.effective_capacity()?;
        if self.reserve_threshold >= capacity {
            return Err(DisruptorError::InvalidReserveThreshold {
                reserve: self.reserve_threshold,
                capacity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RingBufferConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_capacity().unwrap(), 1024);
    }

    #[test]
    fn test_capacity_is_rounded() {
        let config = RingBufferConfig::new(20);
        assert_eq!(config.effective_capacity().unwrap(), 32);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = RingBufferConfig::new(0);
        assert!(matches!(
            config.validate(),
            Err(DisruptorError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn test_reserve_must_leave_room() {
        let config = RingBufferConfig::new(8).reserve_threshold(8);
        assert!(matches!(
            config.validate(),
            Err(DisruptorError::InvalidReserveThreshold {
                reserve: 8,
                capacity: 8
            })
        ));
        assert!(RingBufferConfig::new(8).reserve_threshold(7).validate().is_ok());
    }

    #[test]
    fn test_from_json_with_defaults() {
        let config = RingBufferConfig::from_json_str(
            r#"{ "capacity": 100, "producer_type": "multi", "wait_strategy": "busy_spin" }"#,
        )
        .unwrap();

        assert_eq!(config.capacity, 100);
        assert_eq!(config.producer_type, ProducerType::Multi);
        assert_eq!(config.wait_strategy, WaitStrategyKind::BusySpin);
        assert_eq!(config.reserve_threshold, 0);
        assert_eq!(config.claim_wait, ClaimWait::Yielding);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            RingBufferConfig::from_json_str("{ \"capacity\": \"lots\" }"),
            Err(DisruptorError::Config(_))
        ));
        assert!(matches!(
            RingBufferConfig::from_json_str("{ \"capacity\": 0 }"),
            Err(DisruptorError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!("busy-spin".parse::<WaitStrategyKind>().unwrap(), WaitStrategyKind::BusySpin);
        assert_eq!("Yielding".parse::<ClaimWait>().unwrap(), ClaimWait::Yielding);
        assert!("sleeping".parse::<WaitStrategyKind>().is_err());
    }
}
