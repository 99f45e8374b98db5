use crate::defs::{
    CLIENT_READ_POLL_MSEC, CLIENT_WRITE_TIMEOUT_MSEC, DEFAULT_LISTEN_ADDR, INITIAL_BURST_MAX,
    INITIAL_BURST_MIN, NEW_ORDER_PROBABILITY, ORDER_RETENTION_SEC, SIMULATION_TICK_SEC,
    SWEEP_PERIOD_SEC,
};
use crate::errors::ConfigError;

use rand_distr::Bernoulli;
use std::time::Duration;

/// Knobs of the simulation loop.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Time between two simulation ticks.
    pub tick: Duration,
    /// Probability that a tick creates an order rather than completing one.
    pub new_order_probability: f64,
    /// Smallest initial burst size (inclusive).
    pub burst_min: usize,
    /// Largest initial burst size (inclusive).
    pub burst_max: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(SIMULATION_TICK_SEC),
            new_order_probability: NEW_ORDER_PROBABILITY,
            burst_min: INITIAL_BURST_MIN,
            burst_max: INITIAL_BURST_MAX,
        }
    }
}

impl SimulationConfig {
    /// Checks the simulation knobs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroDuration("simulation tick"));
        }
        if self.burst_min > self.burst_max {
            return Err(ConfigError::InvalidBurst {
                min: self.burst_min,
                max: self.burst_max,
            });
        }
        Bernoulli::new(self.new_order_probability)?;
        Ok(())
    }
}

/// Full server configuration.
///
/// Built from the constants in [`defs`](crate::defs) and overridden by the
/// command line of the `order_server` binary.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub listen_addr: String,
    /// How often the order sweep runs.
    pub sweep_period: Duration,
    /// How old a `done` order must be before the sweep evicts it.
    pub order_retention: Duration,
    /// Deadline for a single write to a client.
    pub write_timeout: Duration,
    /// Read poll interval of the session loop.
    pub read_poll: Duration,
    /// Simulation loop knobs.
    pub simulation: SimulationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            sweep_period: Duration::from_secs(SWEEP_PERIOD_SEC),
            order_retention: Duration::from_secs(ORDER_RETENTION_SEC),
            write_timeout: Duration::from_millis(CLIENT_WRITE_TIMEOUT_MSEC),
            read_poll: Duration::from_millis(CLIENT_READ_POLL_MSEC),
            simulation: SimulationConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Rejects values that would make the server misbehave.
    ///
    /// Zero durations are refused because a zero socket timeout means
    /// "block forever" and a zero sweep period would spin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_period.is_zero() {
            return Err(ConfigError::ZeroDuration("sweep period"));
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("write timeout"));
        }
        if self.read_poll.is_zero() {
            return Err(ConfigError::ZeroDuration("read poll interval"));
        }
        self.simulation.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sweep_period, Duration::from_secs(60));
        assert_eq!(config.order_retention, Duration::from_secs(300));
        assert_eq!(config.simulation.tick, Duration::from_secs(20));
        assert_eq!(config.simulation.burst_min, 3);
        assert_eq!(config.simulation.burst_max, 5);
    }

    #[test]
    fn test_rejects_zero_durations() {
        let mut config = ServerConfig::default();
        config.write_timeout = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDuration("write timeout"))
        ));

        let mut config = ServerConfig::default();
        config.simulation.tick = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDuration("simulation tick"))
        ));
    }

    #[test]
    fn test_rejects_inverted_burst() {
        let mut config = SimulationConfig::default();
        config.burst_min = 6;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBurst { min: 6, max: 5 })
        ));
    }

    #[test]
    fn test_rejects_bad_probability() {
        let mut config = SimulationConfig::default();
        config.new_order_probability = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidProbability(_))
        ));
    }
}
