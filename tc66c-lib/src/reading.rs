use crate::packet::{Pac1Block, Pac2Block};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single decoded telemetry snapshot.
///
/// Only built from a packet whose three blocks all passed tag and checksum
/// validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // pac1 block
    pub product: String,    // Product name (e.g. "TC66")
    pub version: String,    // Firmware version (e.g. "1.14")
    pub serial_number: u32, // Module serial number
    pub num_runs: u32,      // Power-on count
    pub voltage: f64,       // Volts
    pub current: f64,       // Amperes
    pub power: f64,         // Watts

    // pac2 block
    pub resistance: f64, // Ohms
    pub group0_mah: u32,
    pub group0_mwh: u32,
    pub group1_mah: u32,
    pub group1_mwh: u32,
    /// Temperature in °C. The device reports magnitude and sign separately
    /// and gives no scale factor, so this is a whole number of degrees.
    pub temperature: f64,
    pub dplus_voltage: f64,  // D+ line, Volts
    pub dminus_voltage: f64, // D- line, Volts
}

impl Reading {
    /// Build a reading from validated pac1 and pac2 blocks
    pub(crate) fn from_blocks(pac1: &Pac1Block, pac2: &Pac2Block) -> Self {
        let temperature_magnitude = pac2.temperature.get() as f64;
        let temperature = if pac2.temperature_sign.get() != 0 {
            -temperature_magnitude
        } else {
            temperature_magnitude
        };

        Reading {
            product: trim_padding(&pac1.product),
            version: trim_padding(&pac1.version),
            serial_number: pac1.serial_number.get(),
            num_runs: pac1.num_runs.get(),
            voltage: pac1.voltage.get() as f64 / 10_000.0,
            current: pac1.current.get() as f64 / 100_000.0,
            power: pac1.power.get() as f64 / 10_000.0,
            resistance: pac2.resistance.get() as f64 / 100.0,
            group0_mah: pac2.group0_mah.get(),
            group0_mwh: pac2.group0_mwh.get(),
            group1_mah: pac2.group1_mah.get(),
            group1_mwh: pac2.group1_mwh.get(),
            temperature,
            dplus_voltage: pac2.dplus_voltage.get() as f64 / 100.0,
            dminus_voltage: pac2.dminus_voltage.get() as f64 / 100.0,
        }
    }

    /// Compact one-line representation, used when polling
    pub fn short_summary(&self) -> String {
        format!(
            "V: {:.4}V | I: {:.5}A | P: {:.4}W | R: {:.2}Ω | T: {:.1}°C | D+: {:.2}V | D-: {:.2}V",
            self.voltage,
            self.current,
            self.power,
            self.resistance,
            self.temperature,
            self.dplus_voltage,
            self.dminus_voltage
        )
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Product: {}", self.product)?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Serial: {}", self.serial_number)?;
        writeln!(f, "Runs: {}", self.num_runs)?;
        writeln!(f, "Voltage: {:.4} V", self.voltage)?;
        writeln!(f, "Current: {:.5} A", self.current)?;
        writeln!(f, "Power: {:.4} W", self.power)?;
        writeln!(f, "Resistance: {:.2} Ω", self.resistance)?;
        writeln!(f, "Group 0: {} mAh / {} mWh", self.group0_mah, self.group0_mwh)?;
        writeln!(f, "Group 1: {} mAh / {} mWh", self.group1_mah, self.group1_mwh)?;
        writeln!(f, "Temperature: {:.1} °C", self.temperature)?;
        writeln!(f, "D+ Voltage: {:.2} V", self.dplus_voltage)?;
        write!(f, "D- Voltage: {:.2} V", self.dminus_voltage)
    }
}

/// One voltage/current pair from the on-device recording buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordingEntry {
    pub voltage: f64, // Volts
    pub current: f64, // Amperes
}

impl RecordingEntry {
    pub(crate) fn from_raw(voltage_raw: u32, current_raw: u32) -> Self {
        RecordingEntry {
            voltage: voltage_raw as f64 / 10_000.0,
            current: current_raw as f64 / 100_000.0,
        }
    }
}

impl fmt::Display for RecordingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V: {:.4} V, I: {:.5} A", self.voltage, self.current)
    }
}

/// Text field padded with NULs up to its fixed width
fn trim_padding(field: &[u8]) -> String {
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..len]).to_string()
}
