use num::ToPrimitive;
use crate::grib::GribError;
use crate::grib::sections::sect5::{Data, Data0, DataRepresentationDefinition};
use crate::grib::sections::sect7::Grib2DataDecoder;
use crate::grib::utils::{BitWriter, BitwiseIterator};

pub(crate) const MAX_NUM_BITS: usize = 32;

pub(crate) struct GridPointDataSimplePackingDecoder {}

impl Grib2DataDecoder for GridPointDataSimplePackingDecoder {
    fn decode(&self, data_repr_def: &DataRepresentationDefinition, slice: &[u8]) -> crate::grib::Result<Vec<f64>> {

        let data = match &data_repr_def.data {
            Data::Data0(data) => data,
            _ => {
                return Err(GribError::DecodeError(String::from("Wrong decoder")));
            }
        };

        if data.num_bits == 0 {
            let constant = (data.reference_value as f64) * 10_f64.powi(-(data.decimal_scale_factor as i32));
            return Ok(vec![constant; data_repr_def.num_points]);
        }

        if data.num_bits > MAX_NUM_BITS {
            return Err(GribError::Unsupported(format!("{} bits per value", data.num_bits)));
        }

        let decoder = SimpleDecoderIterator::new(
            BitwiseIterator::<u32>::new(slice, data.num_bits).take(data_repr_def.num_points),
            data.reference_value as f64, data.binary_scale_factor, data.decimal_scale_factor,
        );
        let decoded: Vec<f64> = decoder.collect();

        if decoded.len() != data_repr_def.num_points {
            return Err(GribError::MalformedMessage(format!(
                "data section holds {} values, {} declared", decoded.len(), data_repr_def.num_points
            )));
        }

        Ok(decoded)
    }
}

pub(crate) struct SimpleDecoderIterator<I: Iterator<Item = N>, N: ToPrimitive> {
    bitwise_iter: I,
    reference_value: f64,
    binary_scale: f64,
    decimal_scale: f64,
}

impl<I: Iterator<Item = N>, N: ToPrimitive> SimpleDecoderIterator<I, N> {
    pub(crate) fn new(bitwise_iter: I, reference_value: f64, binary_scale_factor: i16, decimal_scale_factor: i16) -> Self {
        Self {
            bitwise_iter,
            reference_value,
            binary_scale: 2_f64.powi(binary_scale_factor as i32),
            decimal_scale: 10_f64.powi(-decimal_scale_factor as i32),
        }
    }
}

impl<I: Iterator<Item = N>, N: ToPrimitive> Iterator for SimpleDecoderIterator<I, N> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        self.bitwise_iter.next().map(|encoded| {
            let encoded = encoded.to_f64().unwrap_or(f64::NAN);
            (self.reference_value + encoded * self.binary_scale) * self.decimal_scale
        })
    }
}

/// Simple packing: `Y * 10^D = R + X * 2^E` with `X` stored on `num_bits` bits.
pub(crate) struct GridPointDataSimplePackingEncoder {
    pub(crate) num_bits: usize,
    pub(crate) decimal_scale_factor: i16,
}

impl GridPointDataSimplePackingEncoder {
    /// `values` holds only the points present in the bitmap; all must be finite.
    pub(crate) fn encode(&self, values: &[f64]) -> crate::grib::Result<(Data0, Vec<u8>)> {
        if self.num_bits > MAX_NUM_BITS {
            return Err(GribError::InvalidAttribute {
                key: String::from("bitsPerValue"),
                reason: format!("{} exceeds {}", self.num_bits, MAX_NUM_BITS),
            });
        }

        let decimal_scale = 10_f64.powi(self.decimal_scale_factor as i32);
        let (min, max) = values.iter()
            .map(|v| v * decimal_scale)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| (min.min(v), max.max(v)));

        if values.is_empty() || min == max || self.num_bits == 0 {
            let reference_value = if values.is_empty() { 0.0 } else { min as f32 };
            return Ok((self.representation(reference_value, 0, 0), Vec::new()));
        }

        let max_packed = ((1_u64 << self.num_bits) - 1) as f64;
        let binary_scale_factor = ((max - min) / max_packed).log2().ceil()
            .clamp(i16::MIN as f64 + 1.0, i16::MAX as f64) as i16;
        let binary_scale = 2_f64.powi(binary_scale_factor as i32);
        let reference_value = f32_at_or_below(min);

        let mut writer = BitWriter::with_capacity(values.len() * self.num_bits);
        for value in values {
            let packed = ((value * decimal_scale - reference_value as f64) / binary_scale)
                .round()
                .clamp(0.0, max_packed);
            writer.push(packed as u64, self.num_bits);
        }

        Ok((self.representation(reference_value, binary_scale_factor, self.num_bits), writer.finish()))
    }

    fn representation(&self, reference_value: f32, binary_scale_factor: i16, num_bits: usize) -> Data0 {
        Data0 {
            reference_value,
            binary_scale_factor,
            decimal_scale_factor: self.decimal_scale_factor,
            num_bits,
            values_type: 0,
        }
    }
}

/// The reference value must not exceed the field minimum or packed values would go negative.
fn f32_at_or_below(value: f64) -> f32 {
    let rounded = value as f32;
    if (rounded as f64) <= value {
        return rounded;
    }
    let bits = rounded.to_bits();
    if rounded > 0.0 {
        f32::from_bits(bits - 1)
    } else if rounded == 0.0 {
        -f32::from_bits(1)
    } else {
        f32::from_bits(bits + 1)
    }
}
