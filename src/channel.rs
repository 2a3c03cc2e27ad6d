//! Probabilistic channel models for the two underwater transports.
//!
//! Each channel maps a transmission attempt (power, geometry, packet size)
//! to a delivery outcome: path loss and noise give an SNR, the SNR gives a
//! BPSK bit error rate, independent bit errors give a packet error rate,
//! and a Bernoulli draw against that PER decides delivery. Both channels
//! are pure functions of their inputs; the only state is the constructor
//! parameterization, and all randomness comes from the caller's [`SimRng`].

use crate::error::{Result, UoarError};
use crate::modem::OpticalModem;
use crate::sim::rng::SimRng;

/// Electron charge, in C.
const ELECTRON_CHARGE: f64 = 1.6e-19;
/// Boltzmann constant, in J/K.
const BOLTZMANN: f64 = 1.38e-23;

/// Underwater acoustic channel.
///
/// Path loss follows the spreading-factor-weighted log-distance law plus
/// Thorp's empirical absorption; ambient noise combines turbulence,
/// shipping, wind and thermal sources in the linear power domain. The bit
/// error rate is BPSK under Rayleigh fading.
#[derive(Debug, Clone)]
pub struct AcousticChannel {
    /// Spreading factor: 1.0 (cylindrical), 1.5 (practical) or 2.0 (spherical)
    k: f64,
    /// Shipping activity, in [0, 1]
    s: f64,
    /// Wind speed, in m/s
    w: f64,
}

impl AcousticChannel {
    /// Sound speed in water, in m/s.
    pub const SOUND_SPEED: f64 = 1500.0;

    const K_VALUES: [f64; 3] = [1.0, 1.5, 2.0];
    /// Receiver bandwidth factor applied to the ambient noise.
    const NOISE_BANDWIDTH: f64 = 2.35;

    pub fn new(k: f64, s: f64, w: f64) -> Result<Self> {
        if !Self::K_VALUES.contains(&k) {
            return Err(UoarError::InvalidSpreadingFactor(k));
        }
        if !(0.0..=1.0).contains(&s) {
            return Err(UoarError::InvalidShippingActivity(s));
        }
        if w < 0.0 {
            return Err(UoarError::InvalidWindSpeed(w));
        }
        Ok(Self { k, s, w })
    }

    /// Attempt one transmission; true when the packet arrives intact.
    ///
    /// `frequency` in kHz, `power` in dB re uPa, `distance` in meters,
    /// `size` in bytes.
    pub fn transmit(
        &self,
        frequency: f64,
        power: f64,
        distance: f64,
        size: usize,
        rng: &SimRng,
    ) -> bool {
        let per = self.per(distance, frequency, power, size);
        !rng.next_bool(per)
    }

    /// Packet error rate for a transmission attempt.
    pub fn per(&self, distance: f64, frequency: f64, tx_power: f64, size: usize) -> f64 {
        let pl = self.path_loss(distance, frequency);
        let nf = Self::NOISE_BANDWIDTH * self.noise(frequency);
        let snr_db = tx_power - pl - nf;
        let snr = 10f64.powf(snr_db / 10.0);
        // BPSK bit error rate under Rayleigh fading
        let ber = 0.5 * (1.0 - (snr / (1.0 + snr)).sqrt());
        1.0 - (1.0 - ber).powi(8 * size as i32)
    }

    /// Transmission loss over `distance` meters at `frequency` kHz, in dB.
    fn path_loss(&self, distance: f64, frequency: f64) -> f64 {
        10.0 * self.k * distance.log10() + distance * self.thorp(frequency)
    }

    /// Thorp's attenuation, in dB/m. Two-regime fit keyed on frequency,
    /// linear below 0.63 kHz and rational above.
    fn thorp(&self, frequency: f64) -> f64 {
        let f = frequency * frequency;
        let atten = if f > 0.4 {
            0.11 * f / (1.0 + f) + 44.0 * (f / (4100.0 + frequency)) + 2.75e-4 * f + 0.003
        } else {
            0.002 + 0.11 * (f / (1.0 + f)) + 0.011 * f
        };
        atten / 1000.0
    }

    /// Ambient noise at `frequency` kHz, in dB re uPa.
    ///
    /// Empirical source levels from Urick, "Principles of Underwater
    /// Sound", summed in the linear power domain.
    fn noise(&self, frequency: f64) -> f64 {
        let turbulence = 17.0 - 30.0 * frequency.log10();
        let turbulence = 10f64.powf(turbulence * 0.1);
        let shipping = 40.0 + 20.0 * (self.s - 0.5) + 26.0 * frequency.log10()
            - 60.0 * (frequency + 0.03).log10();
        let shipping = 10f64.powf(shipping * 0.1);
        let wind = 50.0 + 7.5 * self.w.sqrt() + 20.0 * frequency.log10()
            - 40.0 * (frequency + 0.4).log10();
        let wind = 10f64.powf(wind * 0.1);
        let thermal = 20.0 * frequency.log10() - 15.0;
        let thermal = 10f64.powf(thermal * 0.1);
        10.0 * (turbulence + shipping + wind + thermal).log10()
    }
}

/// Underwater optical channel.
///
/// Received power follows a Lambertian line-of-sight model with
/// Beer-Lambert extinction; SNR pits the photodiode response against the
/// combined thermal and shot noise, and the bit error rate is the
/// Gaussian-channel erfc BPSK form.
#[derive(Debug, Clone)]
pub struct OpticalChannel {
    /// Beam light attenuation coefficient, in 1/m
    c: f64,
    /// Water temperature, in K
    t: f64,
    /// Receiver sensitivity, in A/W
    s: f64,
    /// Photodiode shunt resistance, in ohm
    r: f64,
    /// Photodiode dark current, in A
    dark_current: f64,
    /// Photodiode current under incident light, in A
    light_current: f64,
    /// Receiver aperture area, in m^2
    receiver_area: f64,
    /// Transmitter aperture size, in m^2
    transmitter_size: f64,
    /// System bandwidth, in Hz
    bandwidth: f64,
    /// Transmitter beam divergence angle, in rad
    theta: f64,
}

impl OpticalChannel {
    /// Light speed in water, in m/s.
    pub const LIGHT_SPEED: f64 = 2.25e8;

    /// Channel over water with the given attenuation coefficient and
    /// temperature; receiver and transmitter constants come from the
    /// optical modem table.
    pub fn new(c: f64, t: f64) -> Self {
        Self {
            c,
            t,
            s: OpticalModem::SENSITIVITY,
            r: OpticalModem::SHUNT_RESISTANCE,
            dark_current: OpticalModem::MAX_DARK_CURRENT,
            light_current: OpticalModem::INCIDENT_CURRENT,
            receiver_area: OpticalModem::RECEIVER_AREA,
            transmitter_size: OpticalModem::TRANSMITTER_SIZE,
            bandwidth: OpticalModem::BANDWIDTH,
            theta: OpticalModem::BEAM_DIVERGENCE,
        }
    }

    /// Attempt one transmission; true when the packet arrives intact.
    ///
    /// `power` in dBm, `distance` the perpendicular distance and `d` the
    /// path length in meters (the simulator passes the same value for
    /// both), `beta` the inclination angle in rad, `size` in bytes.
    pub fn transmit(
        &self,
        power: f64,
        distance: f64,
        d: f64,
        beta: f64,
        size: usize,
        rng: &SimRng,
    ) -> bool {
        let per = self.per(power, distance, d, beta, size);
        !rng.next_bool(per)
    }

    /// Signal-to-noise ratio at the receiver, in dB.
    pub fn snr_db(&self, power: f64, distance: f64, d: f64, beta: f64) -> f64 {
        // Lambertian line-of-sight received power with Beer-Lambert
        // extinction over the path length.
        let mut p = 2.0 * power * self.receiver_area * beta.cos();
        p /= std::f64::consts::PI * distance * distance * (1.0 - self.theta.cos())
            + 2.0 * self.transmitter_size;
        p *= (-self.c * d).exp();

        let thermal = 4.0 * BOLTZMANN * self.t * self.bandwidth / self.r;
        let shot = 2.0 * ELECTRON_CHARGE * (self.dark_current + self.light_current) * self.bandwidth;
        let snr = (self.s * p).powi(2) / (thermal + shot);
        10.0 * snr.log10()
    }

    /// Packet error rate for a transmission attempt.
    pub fn per(&self, power: f64, distance: f64, d: f64, beta: f64, size: usize) -> f64 {
        let snr = self.snr_db(power, distance, d, beta);
        // BPSK over a Gaussian channel. Below 0 dB the erfc argument has
        // no real square root; the link is unusable there, so the bit
        // error rate saturates at coin-flip.
        let ber = if snr <= 0.0 {
            0.5
        } else {
            0.5 * libm::erfc(snr.sqrt())
        };
        1.0 - (1.0 - ber).powi(8 * size as i32)
    }
}
