use std::iter;
use crate::grib::GribError;
use crate::grib::sections::sect5::{Data, Data2, DataRepresentationDefinition};
use crate::grib::sections::sect7::{Grib2DataDecoder, groups};
use crate::grib::sections::sect7::simple::SimpleDecoderIterator;
use crate::grib::utils::BitwiseIterator;

pub(crate) struct GridPointDataComplexPackingDecoder {}

impl Grib2DataDecoder for GridPointDataComplexPackingDecoder {
    fn decode(&self, data_repr_def: &DataRepresentationDefinition, slice: &[u8]) -> crate::grib::Result<Vec<f64>> {

        let data = match &data_repr_def.data {
            Data::Data2(data) => data,
            _ => {
                return Err(GribError::DecodeError(String::from("Wrong decoder")));
            }
        };
        check_missing_value_management(data)?;

        let (group_iter, groups_num_bytes) = groups::decode(data_repr_def, slice)?;

        let decoded: Vec<f64> = SimpleDecoderIterator::new(
            ComplexPackingDecoderIterator::new(&slice[groups_num_bytes..], group_iter).flatten(),
            data.packing.reference_value as f64, data.packing.binary_scale_factor, data.packing.decimal_scale_factor
        ).collect();

        check_length(decoded, data_repr_def.num_points)
    }
}

pub(crate) fn check_missing_value_management(data: &Data2) -> crate::grib::Result<()> {
    if data.missing_value != 0 {
        return Err(GribError::Unsupported(format!(
            "missing value management {} in complex packing", data.missing_value
        )));
    }
    Ok(())
}

pub(crate) fn check_length<T>(decoded: Vec<T>, num_points: usize) -> crate::grib::Result<Vec<T>> {
    if decoded.len() != num_points {
        return Err(GribError::MalformedMessage(format!(
            "groups hold {} values, {} declared", decoded.len(), num_points
        )));
    }
    Ok(decoded)
}

/// Expands each group into `reference + packed` integers; groups are bit-contiguous.
pub(crate) struct ComplexPackingDecoderIterator<'a, I: Iterator<Item = (i64, usize, usize)>> {
    slice: &'a [u8],
    groups_iter: I,
    pos: usize,
    start_offset_num_bits: usize,
}

impl<'a, I: Iterator<Item = (i64, usize, usize)>> ComplexPackingDecoderIterator<'a, I> {
    pub(crate) fn new(slice: &'a [u8], groups_iter: I) -> Self {
        Self {
            slice,
            groups_iter,
            pos: 0,
            start_offset_num_bits: 0,
        }
    }
}

impl<'a, I: Iterator<Item = (i64, usize, usize)>> Iterator for ComplexPackingDecoderIterator<'a, I> {
    type Item = Vec<i64>;

    fn next(&mut self) -> Option<Vec<i64>> {

        let (reference_value, width, length) = self.groups_iter.next()?;

        if width == 0 {
            return Some(iter::repeat(reference_value).take(length).collect());
        }

        if width > 64 {
            return None;
        }

        let total_num_bits = width * length + self.start_offset_num_bits;
        let (pos_end, offset_num_bits) = (self.pos + total_num_bits / 8, total_num_bits % 8);
        let offset_byte = if offset_num_bits > 0 { 1 } else { 0 };

        if pos_end + offset_byte > self.slice.len() {
            return None;
        }

        let group_values =
            BitwiseIterator::<u64>::new(&self.slice[self.pos..pos_end + offset_byte], width)
                .with_offset(self.start_offset_num_bits)
                .take(length)
                .map(|v| reference_value + v as i64)
                .collect::<Vec<i64>>();
        self.pos = pos_end;
        self.start_offset_num_bits = offset_num_bits;
        Some(group_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grib::sections::sect5::{Data0, GroupDefinition};
    use crate::grib::utils::BitWriter;

    fn complex_representation(num_points: usize, num_groups: usize) -> Data2 {
        Data2 {
            packing: Data0 {
                reference_value: 100.0,
                binary_scale_factor: 0,
                decimal_scale_factor: 0,
                num_bits: 4,
                values_type: 0,
            },
            group_method: 1,
            missing_value: 0,
            missing_substitute_primary: 0,
            missing_substitute_secondary: 0,
            group_definition: GroupDefinition {
                num_groups,
                group_widths_reference: 0,
                group_widths_num_bits: 2,
                group_lengths_reference: 2,
                group_lengths_increment: 1,
                group_lengths_last: (num_points - 2 * (num_groups - 1)) as u32,
                group_scaled_lengths_num_bits: 1,
            },
        }
    }

    #[test]
    fn decodes_groups_with_constant_and_packed_members() {
        // Group 1: reference 5, width 0, length 2 -> 5, 5
        // Group 2: reference 1, width 3, length 3 -> 1 + [0, 6, 7]
        let mut writer = BitWriter::with_capacity(64);
        writer.push(5, 4);
        writer.push(1, 4);
        let mut bytes = writer.finish(); // references
        let mut writer = BitWriter::with_capacity(4);
        writer.push(0, 2);
        writer.push(3, 2);
        bytes.extend(writer.finish()); // widths
        let mut writer = BitWriter::with_capacity(2);
        writer.push(0, 1);
        writer.push(0, 1);
        bytes.extend(writer.finish()); // scaled lengths, last one ignored
        let mut writer = BitWriter::with_capacity(9);
        for v in [0, 6, 7] {
            writer.push(v, 3);
        }
        bytes.extend(writer.finish());

        let drs = DataRepresentationDefinition {
            num_points: 5,
            template_number: 2,
            data: Data::Data2(complex_representation(5, 2)),
        };
        let decoded = GridPointDataComplexPackingDecoder {}.decode(&drs, &bytes).unwrap();
        assert_eq!(decoded, vec![105.0, 105.0, 101.0, 107.0, 108.0]);
    }

    #[test]
    fn short_data_section_is_malformed() {
        let drs = DataRepresentationDefinition {
            num_points: 5,
            template_number: 2,
            data: Data::Data2(complex_representation(5, 2)),
        };
        assert!(matches!(
            GridPointDataComplexPackingDecoder {}.decode(&drs, &[0x51]),
            Err(GribError::MalformedMessage(_))
        ));
    }
}
