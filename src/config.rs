//! Validated simulation and channel configuration.

use crate::error::{Result, UoarError};
use crate::modem::AcousticModem;
use crate::protocol::messages::{Addr, BROADCAST_ADDR, HEADER_SIZE};

/// Acoustic channel parameterization.
#[derive(Clone, Debug)]
pub struct AcousticParams {
    /// Spreading factor k; must be 1.0 (cylindrical), 1.5 (practical) or
    /// 2.0 (spherical).
    pub spreading_factor: f64,

    /// Shipping activity factor, within [0, 1].
    pub shipping_activity: f64,

    /// Wind speed in m/s, non-negative.
    pub wind_speed: f64,
}

impl Default for AcousticParams {
    fn default() -> Self {
        Self {
            spreading_factor: 2.0,
            shipping_activity: 0.0,
            wind_speed: 0.0,
        }
    }
}

impl AcousticParams {
    pub fn validate(&self) -> Result<()> {
        if ![1.0, 1.5, 2.0].contains(&self.spreading_factor) {
            return Err(UoarError::InvalidSpreadingFactor(self.spreading_factor));
        }
        if !(0.0..=1.0).contains(&self.shipping_activity) {
            return Err(UoarError::InvalidShippingActivity(self.shipping_activity));
        }
        if self.wind_speed < 0.0 {
            return Err(UoarError::InvalidWindSpeed(self.wind_speed));
        }
        Ok(())
    }
}

/// Optical channel parameterization. Receiver and transmitter hardware
/// constants come from the optical modem table and are not configurable.
#[derive(Clone, Debug)]
pub struct OpticalParams {
    /// Beer-Lambert extinction coefficient, in 1/m.
    pub attenuation: f64,

    /// Water temperature, in K.
    pub temperature: f64,

    /// Transmitter inclination angle, in rad.
    pub inclination: f64,
}

impl Default for OpticalParams {
    fn default() -> Self {
        Self {
            attenuation: 4.3e-2,
            temperature: 298.15,
            inclination: 0.0,
        }
    }
}

impl OpticalParams {
    pub fn validate(&self) -> Result<()> {
        if self.attenuation <= 0.0 {
            return Err(UoarError::Config(format!(
                "attenuation coefficient must be positive, got {}",
                self.attenuation
            )));
        }
        if self.temperature <= 0.0 {
            return Err(UoarError::Config(format!(
                "temperature must be positive kelvin, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Simulation configuration.
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Application packet size in length-units; must be set before a run.
    pub packet_size: usize,

    /// Time-slot duration in seconds. When unset, the simulator derives it
    /// as 1.5x the time to transmit one full packet acoustically.
    pub time_interval: Option<f64>,

    /// When application traffic starts, in seconds.
    pub app_start: Option<f64>,

    /// Cadence of application traffic injection, in seconds.
    pub app_interval: Option<f64>,

    /// When application traffic stops; `None` keeps it running for the
    /// whole simulation.
    pub app_stop: Option<f64>,

    /// RNG seed; equal seeds replay identical simulations.
    pub seed: u64,

    /// Addresses treated as data sinks by traffic injection.
    pub sink_addrs: Vec<Addr>,

    /// Acoustic channel parameters.
    pub acoustic: AcousticParams,

    /// Optical channel parameters.
    pub optical: OpticalParams,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            packet_size: 0,
            time_interval: None,
            app_start: None,
            app_interval: None,
            app_stop: None,
            seed: 1,
            sink_addrs: vec![1],
            acoustic: AcousticParams::default(),
            optical: OpticalParams::default(),
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application packet size in length-units.
    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    /// Override the derived time-slot duration.
    pub fn with_time_interval(mut self, interval: f64) -> Self {
        self.time_interval = Some(interval);
        self
    }

    /// Schedule periodic application traffic.
    pub fn with_app_traffic(mut self, start: f64, interval: f64) -> Self {
        self.app_start = Some(start);
        self.app_interval = Some(interval);
        self
    }

    /// Stop injecting application traffic at `stop`.
    pub fn with_app_stop(mut self, stop: f64) -> Self {
        self.app_stop = Some(stop);
        self
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the sink address set.
    pub fn with_sink_addrs(mut self, sink_addrs: Vec<Addr>) -> Self {
        self.sink_addrs = sink_addrs;
        self
    }

    /// Set custom acoustic channel parameters.
    pub fn with_acoustic(mut self, acoustic: AcousticParams) -> Self {
        self.acoustic = acoustic;
        self
    }

    /// Set custom optical channel parameters.
    pub fn with_optical(mut self, optical: OpticalParams) -> Self {
        self.optical = optical;
        self
    }

    /// Time-slot duration: the configured value, or 1.5x the acoustic
    /// transmit time of one full packet.
    pub fn slot_duration(&self) -> f64 {
        match self.time_interval {
            Some(interval) => interval,
            None => 1.5 * (self.packet_size * 8) as f64 / AcousticModem::TRANSMISSION_RATE,
        }
    }

    /// Per-node application payload chunk size, in length-units.
    pub fn app_chunk_size(&self) -> usize {
        self.packet_size.saturating_sub(2 * HEADER_SIZE)
    }

    /// Validate the configuration.
    ///
    /// # Checks
    ///
    /// - Packet size set and positive
    /// - Application traffic start and interval configured, interval
    ///   positive, stop (when set) after start
    /// - Time interval (when set) positive
    /// - No sink at the broadcast address
    /// - Channel parameters within their physical domains
    pub fn validate(&self) -> Result<()> {
        if self.packet_size == 0 {
            return Err(UoarError::Config("packet size must be positive".into()));
        }
        if let Some(interval) = self.time_interval {
            if interval <= 0.0 {
                return Err(UoarError::Config(format!(
                    "time interval must be positive, got {interval}"
                )));
            }
        }

        let start = match self.app_start {
            Some(start) => start,
            None => {
                return Err(UoarError::Config(
                    "application traffic start time is not configured".into(),
                ))
            }
        };
        match self.app_interval {
            Some(interval) if interval > 0.0 => {}
            Some(interval) => {
                return Err(UoarError::Config(format!(
                    "application traffic interval must be positive, got {interval}"
                )))
            }
            None => {
                return Err(UoarError::Config(
                    "application traffic interval is not configured".into(),
                ))
            }
        }
        if let Some(stop) = self.app_stop {
            if stop <= start {
                return Err(UoarError::Config(format!(
                    "application traffic stop ({stop}) must come after start ({start})"
                )));
            }
        }

        if self.sink_addrs.contains(&BROADCAST_ADDR) {
            return Err(UoarError::ReservedAddress(BROADCAST_ADDR));
        }

        self.acoustic.validate()?;
        self.optical.validate()?;
        Ok(())
    }
}
