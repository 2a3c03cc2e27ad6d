//! Hardware constant tables for the two physical transports.
//!
//! Values transcribed from the vendor datasheets of the modeled devices:
//!
//! - Acoustic: Evologics S2CR 18/34 acoustic modem
//! - Optical: BlueComm 200 optical modem with a Si PIN Hamamatsu S5971
//!   high-speed photodiode
//!
//! The channel formulas and the energy accounting consume these as static
//! configuration; nothing here is tunable at run time.

/// Evologics S2CR 18/34 acoustic modem.
pub struct AcousticModem;

impl AcousticModem {
    /// Lower edge of the operating band, in kHz
    pub const MIN_FREQUENCY: f64 = 18.0;
    /// Upper edge of the operating band, in kHz
    pub const MAX_FREQUENCY: f64 = 34.0;
    /// Carrier frequency used by the channel model, in kHz
    pub const FREQUENCY: f64 = 26.0;
    /// Idle draw, in W
    pub const IDLE_POWER_CONSUMPTION: f64 = 2.5e-3;
    /// Receive draw, in W
    pub const RX_POWER_CONSUMPTION: f64 = 1.3;
    /// Transmit draw, in W
    pub const TX_POWER_CONSUMPTION: f64 = 2.8;
    /// Source level, in dB re uPa
    pub const TX_POWER: f64 = 158.0;
    /// Nominal maximum range, in m
    pub const MAX_RANGE: f64 = 1.0e3;
    /// Link rate, in bit/s (10 kbps)
    pub const TRANSMISSION_RATE: f64 = 1.0e4;
}

/// BlueComm 200 optical modem.
pub struct OpticalModem;

impl OpticalModem {
    /// Emitter wavelength, in nm
    pub const WAVE_LENGTH: f64 = 514.0;
    /// Transmitter beam divergence angle, in rad
    pub const BEAM_DIVERGENCE: f64 = 0.5;
    /// System bandwidth, in Hz
    pub const BANDWIDTH: f64 = 1.0e5;
    /// Photodiode shunt resistance, in ohm
    pub const SHUNT_RESISTANCE: f64 = 1.43e9;
    /// Photodiode dark current, in A
    pub const MAX_DARK_CURRENT: f64 = 1.0e-9;
    /// Photodiode current under incident light, in A
    pub const INCIDENT_CURRENT: f64 = 1.0e-6;
    /// Receiver aperture area, in m^2
    pub const RECEIVER_AREA: f64 = 1.1e-6;
    /// Transmitter aperture size, in m^2
    pub const TRANSMITTER_SIZE: f64 = 1.0e-5;
    /// Receiver sensitivity, in A/W
    pub const SENSITIVITY: f64 = 0.26;
    /// Transmit power, in dBm (6 W)
    pub const TX_POWER: f64 = 37.78;
    /// Receive draw, in W
    pub const RX_POWER_CONSUMPTION: f64 = 10.0;
    /// Transmit draw, in W
    pub const TX_POWER_CONSUMPTION: f64 = 15.0;
    /// Nominal maximum range, in m
    pub const MAX_RANGE: f64 = 50.0;
    /// Link rate, in bit/s (1 Mbps)
    pub const TRANSMISSION_RATE: f64 = 1.0e6;
}

/// Time and energy needed to transmit `encoded_len` length-units.
///
/// One length-unit is one payload element plus header bookkeeping, eight
/// bits each on the wire.
pub fn transmit_cost(encoded_len: usize, acoustic: bool) -> (f64, f64) {
    let bits = (encoded_len * 8) as f64;
    if acoustic {
        let time = bits / AcousticModem::TRANSMISSION_RATE;
        (time, time * AcousticModem::TX_POWER_CONSUMPTION)
    } else {
        let time = bits / OpticalModem::TRANSMISSION_RATE;
        (time, time * OpticalModem::TX_POWER_CONSUMPTION)
    }
}

/// Time and energy needed to receive `encoded_len` length-units.
pub fn receive_cost(encoded_len: usize, acoustic: bool) -> (f64, f64) {
    let bits = (encoded_len * 8) as f64;
    if acoustic {
        let time = bits / AcousticModem::TRANSMISSION_RATE;
        (time, time * AcousticModem::RX_POWER_CONSUMPTION)
    } else {
        let time = bits / OpticalModem::TRANSMISSION_RATE;
        (time, time * OpticalModem::RX_POWER_CONSUMPTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acoustic_table_is_consistent() {
        assert!(AcousticModem::MIN_FREQUENCY < AcousticModem::MAX_FREQUENCY);
        assert!(AcousticModem::FREQUENCY >= AcousticModem::MIN_FREQUENCY);
        assert!(AcousticModem::FREQUENCY <= AcousticModem::MAX_FREQUENCY);
        assert!(AcousticModem::TX_POWER_CONSUMPTION > AcousticModem::RX_POWER_CONSUMPTION);
        assert!(AcousticModem::RX_POWER_CONSUMPTION > AcousticModem::IDLE_POWER_CONSUMPTION);
    }

    #[test]
    fn optical_link_is_shorter_and_faster() {
        assert!(OpticalModem::MAX_RANGE < AcousticModem::MAX_RANGE);
        assert!(OpticalModem::TRANSMISSION_RATE > AcousticModem::TRANSMISSION_RATE);
    }

    #[test]
    fn costs_scale_with_length() {
        let (t1, e1) = transmit_cost(10, true);
        let (t2, e2) = transmit_cost(20, true);
        assert!((t2 - 2.0 * t1).abs() < 1e-12);
        assert!((e2 - 2.0 * e1).abs() < 1e-12);
    }

    #[test]
    fn acoustic_transmission_is_slower_than_optical() {
        let (ta, _) = transmit_cost(64, true);
        let (to, _) = transmit_cost(64, false);
        assert!(ta > to);
    }

    #[test]
    fn receiving_draws_less_than_transmitting() {
        let (_, etx) = transmit_cost(64, true);
        let (_, erx) = receive_cost(64, true);
        assert!(erx < etx);
    }
}
