//! Common test utilities for gribcore tests
//!
//! Provides helpers for:
//! - Building synthetic GRIB2 messages
//! - Assembling the four-message "flux" sample file
//! - Writing bytes to scratch files

#![allow(dead_code)]

use std::io::Write;
use chrono::{Duration, TimeZone, Utc};
use tempfile::NamedTempFile;

pub const FLUX_NI: u32 = 192;
pub const FLUX_N: u32 = 47;
pub const SURFACE_PRESSURE_MIN: f64 = 49650.0;
pub const SURFACE_PRESSURE_MAX: f64 = 109330.0;
pub const MAX_TEMPERATURE_MIN: f64 = 223.7;
pub const MAX_TEMPERATURE_MAX: f64 = 319.9;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sign-magnitude encoding used by GRIB for signed fields
fn sign_magnitude32(v: i32) -> u32 {
    if v < 0 { v.unsigned_abs() | 0x8000_0000 } else { v as u32 }
}

fn sign_magnitude16(v: i16) -> u16 {
    if v < 0 { v.unsigned_abs() | 0x8000 } else { v as u16 }
}

/// Build a minimal GRIB2 message with the specified parameters
#[derive(Clone)]
pub struct MessageBuilder {
    discipline: u8,
    centre: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    // Grid definition
    grid_template: u16,
    ni: u32,
    nj: u32,
    la1: i32,      // microdegrees
    lo1: i32,
    la2: i32,
    lo2: i32,
    di: u32,
    dj_or_n: u32,  // Dj for 3.0, N for 3.40
    scanning_mode: u8,
    // Product definition
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_value: u32,
    forecast_hour: u32,
    statistics: Option<(u8, u32)>, // (process, length in hours) for template 4.8
    // Data
    decimal_scale_factor: i16,
    bits_per_value: u8,
    values: Vec<f64>,
}

impl MessageBuilder {
    /// T62 Gaussian grid (192 x 94) as used by the flux sample
    pub fn gaussian() -> Self {
        let n = FLUX_N;
        Self {
            discipline: 0,
            centre: 7,
            year: 2004,
            month: 2,
            day: 29,
            hour: 12,
            grid_template: 40,
            ni: FLUX_NI,
            nj: 2 * n,
            la1: 88_542_000,
            lo1: 0,
            la2: -88_542_000,
            lo2: 358_125_000,
            di: 1_875_000,
            dj_or_n: n,
            scanning_mode: 0,
            param_category: 0,
            param_number: 0,
            level_type: 1,
            level_value: 0,
            forecast_hour: 0,
            statistics: None,
            decimal_scale_factor: 0,
            bits_per_value: 16,
            values: vec![0.0; (FLUX_NI * 2 * n) as usize],
        }
    }

    /// Regular 1 degree lat/lon grid from (la1, lo1), scanning north to south
    pub fn regular_ll(ni: u32, nj: u32, la1: i32, lo1: i32) -> Self {
        let step = 1_000_000;
        Self {
            grid_template: 0,
            ni,
            nj,
            la1,
            lo1,
            la2: la1 - step * (nj as i32 - 1),
            lo2: lo1 + step * (ni as i32 - 1),
            di: step as u32,
            dj_or_n: step as u32,
            values: vec![0.0; (ni * nj) as usize],
            ..Self::gaussian()
        }
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_hour = hour;
        self
    }

    /// Switch to template 4.8 with one time range of `length` hours
    pub fn with_statistics(mut self, process: u8, length: u32) -> Self {
        self.statistics = Some((process, length));
        self
    }

    /// For lat/lon grids the last grid point follows the scan directions
    pub fn with_scanning_mode(mut self, scanning_mode: u8) -> Self {
        self.scanning_mode = scanning_mode;
        if self.grid_template == 0 {
            let i_sign = if scanning_mode & 0x80 != 0 { -1 } else { 1 };
            let j_sign = if scanning_mode & 0x40 != 0 { 1 } else { -1 };
            self.lo2 = self.lo1 + i_sign * (self.di * (self.ni - 1)) as i32;
            self.la2 = self.la1 + j_sign * (self.dj_or_n * (self.nj - 1)) as i32;
        }
        self
    }

    pub fn with_decimal_scale_factor(mut self, factor: i16) -> Self {
        self.decimal_scale_factor = factor;
        self
    }

    pub fn with_bits_per_value(mut self, bits: u8) -> Self {
        self.bits_per_value = bits;
        self
    }

    /// Values in wire order; NaN marks a missing point and produces a bitmap
    pub fn with_values(mut self, values: Vec<f64>) -> Self {
        self.values = values;
        self
    }

    pub fn with_fn(mut self, f: impl Fn(usize, usize) -> f64) -> Self {
        let ni = self.ni as usize;
        self.values = (0..self.values.len()).map(|k| f(k / ni, k % ni)).collect();
        self
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let sections = [
            self.build_section1(),
            self.build_section3(),
            self.build_section4(),
            self.build_section5(),
            self.build_section6(),
            self.build_section7(),
        ];

        let message_length = 16 + sections.iter().map(Vec::len).sum::<usize>() + 4;

        let mut message = Vec::with_capacity(message_length);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]);
        message.push(self.discipline);
        message.push(2);
        message.extend_from_slice(&(message_length as u64).to_be_bytes());
        for section in sections {
            message.extend_from_slice(&section);
        }
        message.extend_from_slice(b"7777");
        message
    }

    fn section(number: u8, body: Vec<u8>) -> Vec<u8> {
        let mut section = Vec::with_capacity(body.len() + 5);
        section.extend_from_slice(&((body.len() + 5) as u32).to_be_bytes());
        section.push(number);
        section.extend_from_slice(&body);
        section
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.centre.to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes()); // Sub-centre
        body.push(2);  // Master table version
        body.push(1);  // Local table version
        body.push(1);  // Start of forecast
        body.extend_from_slice(&self.year.to_be_bytes());
        body.extend_from_slice(&[self.month, self.day, self.hour, 0, 0]);
        body.push(0); // Operational
        body.push(1); // Forecast
        Self::section(1, body)
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(0);
        body.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        body.push(0);
        body.push(0);
        body.extend_from_slice(&self.grid_template.to_be_bytes());

        body.push(6); // Shape of Earth
        body.extend_from_slice(&[0, 0, 0, 0, 0]);
        body.extend_from_slice(&[0, 0, 0, 0, 0]);
        body.extend_from_slice(&[0, 0, 0, 0, 0]);
        body.extend_from_slice(&self.ni.to_be_bytes());
        body.extend_from_slice(&self.nj.to_be_bytes());
        body.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        body.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // Subdivisions
        body.extend_from_slice(&sign_magnitude32(self.la1).to_be_bytes());
        body.extend_from_slice(&sign_magnitude32(self.lo1).to_be_bytes());
        body.push(48);
        body.extend_from_slice(&sign_magnitude32(self.la2).to_be_bytes());
        body.extend_from_slice(&sign_magnitude32(self.lo2).to_be_bytes());
        body.extend_from_slice(&self.di.to_be_bytes());
        body.extend_from_slice(&self.dj_or_n.to_be_bytes());
        body.push(self.scanning_mode);
        Self::section(3, body)
    }

    fn build_section4(&self) -> Vec<u8> {
        let template: u16 = if self.statistics.is_some() { 8 } else { 0 };
        let mut body = Vec::new();
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&template.to_be_bytes());

        body.push(self.param_category);
        body.push(self.param_number);
        body.push(2); // Forecast
        body.push(0);
        body.push(81);
        body.extend_from_slice(&0u16.to_be_bytes());
        body.push(0);
        body.push(1); // Hours
        body.extend_from_slice(&self.forecast_hour.to_be_bytes());
        body.push(self.level_type);
        body.push(0);
        body.extend_from_slice(&self.level_value.to_be_bytes());
        body.push(255);
        body.push(0);
        body.extend_from_slice(&0u32.to_be_bytes());

        if let Some((process, length)) = self.statistics {
            let end = Utc.with_ymd_and_hms(self.year.into(), self.month.into(), self.day.into(), self.hour.into(), 0, 0)
                .unwrap() + Duration::hours((self.forecast_hour + length) as i64);
            body.extend_from_slice(&(end.format("%Y").to_string().parse::<u16>().unwrap()).to_be_bytes());
            for part in ["%m", "%d", "%H", "%M", "%S"] {
                body.push(end.format(part).to_string().parse::<u8>().unwrap());
            }
            body.push(1); // One time range
            body.extend_from_slice(&0u32.to_be_bytes());
            body.push(process);
            body.push(2);
            body.push(1);
            body.extend_from_slice(&length.to_be_bytes());
            body.push(255);
            body.extend_from_slice(&0u32.to_be_bytes());
        }
        Self::section(4, body)
    }

    fn present_values(&self) -> Vec<f64> {
        let decimal_scale = 10_f64.powi(self.decimal_scale_factor as i32);
        self.values.iter().filter(|v| !v.is_nan()).map(|v| v * decimal_scale).collect()
    }

    /// (reference, binary scale factor, bits)
    fn packing(&self) -> (f32, i16, u8) {
        let values = self.present_values();
        let (min, max) = values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| (min.min(v), max.max(v)));
        if values.is_empty() {
            return (0.0, 0, 0);
        }
        let range = max - min;
        if range == 0.0 {
            return (min as f32, 0, 0);
        }
        let max_packed = ((1u64 << self.bits_per_value) - 1) as f64;
        let e = (range / max_packed).log2().ceil() as i16;
        (min as f32, e, self.bits_per_value)
    }

    fn build_section5(&self) -> Vec<u8> {
        let (reference, e, bits) = self.packing();
        let mut body = Vec::new();
        body.extend_from_slice(&(self.present_values().len() as u32).to_be_bytes());
        body.extend_from_slice(&0u16.to_be_bytes());
        body.extend_from_slice(&reference.to_be_bytes());
        body.extend_from_slice(&sign_magnitude16(e).to_be_bytes());
        body.extend_from_slice(&sign_magnitude16(self.decimal_scale_factor).to_be_bytes());
        body.push(bits);
        body.push(0);
        Self::section(5, body)
    }

    fn build_section6(&self) -> Vec<u8> {
        if !self.values.iter().any(|v| v.is_nan()) {
            return Self::section(6, vec![255]);
        }
        let mut body = vec![0; 1 + (self.values.len() + 7) / 8];
        for (i, v) in self.values.iter().enumerate() {
            if !v.is_nan() {
                body[1 + i / 8] |= 0x80 >> (i % 8);
            }
        }
        Self::section(6, body)
    }

    fn build_section7(&self) -> Vec<u8> {
        let (reference, e, bits) = self.packing();
        let mut packed = Vec::new();
        let (mut acc, mut acc_bits) = (0u64, 0u32);
        if bits > 0 {
            let scale = 2_f64.powi(e as i32);
            for v in self.present_values() {
                let x = ((v - reference as f64) / scale).round().max(0.0) as u64;
                acc = (acc << bits) | x;
                acc_bits += bits as u32;
                while acc_bits >= 8 {
                    acc_bits -= 8;
                    packed.push((acc >> acc_bits) as u8);
                }
                acc &= (1u64 << acc_bits) - 1;
            }
            if acc_bits > 0 {
                packed.push((acc << (8 - acc_bits)) as u8);
            }
        }
        Self::section(7, packed)
    }
}

/// Surface pressure in Pa: integers spanning exactly [49650, 109330]
pub fn surface_pressure(j: usize, i: usize) -> f64 {
    let k = (i + 3 * j) % 61;
    (SURFACE_PRESSURE_MIN + (SURFACE_PRESSURE_MAX - SURFACE_PRESSURE_MIN) * k as f64 / 60.0).round()
}

/// Temperature in K with one decimal, spanning [223.7, 319.9]
pub fn temperature(j: usize, i: usize, offset: f64) -> f64 {
    let k = (5 * i + 3 * j) % 963;
    ((2237.0 + k as f64) / 10.0 - offset).max(MAX_TEMPERATURE_MIN)
}

/// The four messages of the flux sample, in file order:
/// precipitation rate (avg), surface pressure, max and min 2 m temperature.
pub fn flux_messages() -> Vec<Vec<u8>> {
    vec![
        MessageBuilder::gaussian()
            .with_parameter(1, 7)
            .with_forecast_hour(108)
            .with_statistics(0, 12)
            .with_decimal_scale_factor(6)
            .with_fn(|j, i| ((i * 7 + j * 3) % 100) as f64 * 1e-5)
            .build(),
        MessageBuilder::gaussian()
            .with_parameter(3, 0)
            .with_forecast_hour(120)
            .with_fn(surface_pressure)
            .build(),
        MessageBuilder::gaussian()
            .with_parameter(0, 4)
            .with_level(103, 2)
            .with_forecast_hour(108)
            .with_statistics(2, 12)
            .with_decimal_scale_factor(1)
            .with_fn(|j, i| temperature(j, i, 0.0))
            .build(),
        MessageBuilder::gaussian()
            .with_parameter(0, 5)
            .with_level(103, 2)
            .with_forecast_hour(108)
            .with_statistics(3, 12)
            .with_decimal_scale_factor(1)
            .with_fn(|j, i| temperature(j, i, 5.0))
            .build(),
    ]
}

pub fn flux_bytes() -> Vec<u8> {
    flux_messages().concat()
}

/// Offset of section `number` in an edition 2 message
pub fn find_section(message: &[u8], number: u8) -> usize {
    let mut offset = 16;
    loop {
        let length = u32::from_be_bytes(message[offset..offset + 4].try_into().unwrap()) as usize;
        if message[offset + 4] == number {
            return offset;
        }
        offset += length;
    }
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(bytes).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}

pub fn flux_file() -> NamedTempFile {
    write_temp(&flux_bytes())
}
