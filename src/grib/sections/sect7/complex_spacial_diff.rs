use crate::grib::GribError;
use crate::grib::sections::sect5::{Data, DataRepresentationDefinition};
use crate::grib::sections::sect7::{Grib2DataDecoder, groups};
use crate::grib::sections::sect7::complex::{check_length, check_missing_value_management, ComplexPackingDecoderIterator};
use crate::grib::sections::sect7::simple::SimpleDecoderIterator;
use crate::grib::utils::grib_int_from_octets;

pub(crate) struct GridPointDataComplexPackingSpacialDiffDecoder {}

impl Grib2DataDecoder for GridPointDataComplexPackingSpacialDiffDecoder {
    fn decode(&self, data_repr_def: &DataRepresentationDefinition, slice: &[u8]) -> crate::grib::Result<Vec<f64>> {

        let data = match &data_repr_def.data {
            Data::Data3(data) => data,
            _ => {
                return Err(GribError::DecodeError(String::from("Wrong decoder")));
            }
        };
        check_missing_value_management(&data.complex)?;

        let order = data.spacial_difference_order as usize;
        if order != 1 && order != 2 {
            return Err(GribError::Unsupported(format!("spatial differencing of order {}", order)));
        }
        let size = data.spacial_difference_size as usize;
        if size == 0 || size > 4 {
            return Err(GribError::MalformedMessage(format!("extra descriptors of {} octets", size)));
        }

        // First values (unsigned) then the overall minimum of the differences (signed).
        let descriptors_len = (order + 1) * size;
        if slice.len() < descriptors_len {
            return Err(GribError::MalformedMessage(String::from("data section shorter than its extra descriptors")));
        }
        let mut first_values = [0_i64; 2];
        for (i, first) in first_values.iter_mut().enumerate().take(order) {
            *first = slice[i * size..(i + 1) * size].iter().fold(0_i64, |acc, b| (acc << 8) | i64::from(*b));
        }
        let z_min = grib_int_from_octets(&slice[order * size..descriptors_len]);

        let (group_iter, groups_num_bytes) = groups::decode(data_repr_def, &slice[descriptors_len..])?;
        let to_skip = groups_num_bytes + descriptors_len;

        let spdiff_packed_iter = ComplexPackingDecoderIterator::new(&slice[to_skip..], group_iter).flatten();

        let spdiff_unpacked = SpatialDiffDecodeIterator::new(spdiff_packed_iter, order, first_values, z_min);

        let packing = &data.complex.packing;
        let decoded: Vec<f64> = SimpleDecoderIterator::new(
            spdiff_unpacked,
            packing.reference_value as f64, packing.binary_scale_factor, packing.decimal_scale_factor
        ).collect();

        check_length(decoded, data_repr_def.num_points)
    }
}

/// Undoes first or second order differencing; the leading `order` values are replaced
/// by the stored first values and every later difference is offset by `z_min`.
struct SpatialDiffDecodeIterator<I> {
    iter: I,
    order: usize,
    first_values: [i64; 2],
    z_min: i64,
    count: usize,
    prev1: i64,
    prev2: i64,
}

impl<I> SpatialDiffDecodeIterator<I> {
    pub(crate) fn new(iter: I, order: usize, first_values: [i64; 2], z_min: i64) -> Self {
        Self {
            iter,
            order,
            first_values,
            z_min,
            count: 0,
            prev1: 0,
            prev2: 0,
        }
    }
}

impl<I: Iterator<Item = i64>> Iterator for SpatialDiffDecodeIterator<I> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let count = self.count;
        let packed = self.iter.next()?;
        self.count += 1;

        let v = if count < self.order {
            self.first_values[count]
        } else if self.order == 1 {
            packed + self.z_min + self.prev1
        } else {
            packed + self.z_min + 2 * self.prev1 - self.prev2
        };

        (self.prev2, self.prev1) = (self.prev1, v);
        Some(v)
    }
}
