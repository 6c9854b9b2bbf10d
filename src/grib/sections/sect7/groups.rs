use std::iter;
use crate::grib::GribError;
use crate::grib::sections::sect5::{Data, Data2, Data3, DataRepresentationDefinition};
use crate::grib::utils::BitwiseIterator;

/// Group descriptors as `(reference, width, length)`, plus the number of octets they occupy.
pub(crate) fn decode<'a>(data_repr_def: &'a DataRepresentationDefinition, slice: &'a [u8]) -> crate::grib::Result<(impl Iterator<Item = (i64, usize, usize)> + 'a, usize)> {
    let complex = match &data_repr_def.data {
        Data::Data2(data) => data,
        Data::Data3(Data3 { complex, .. }) => complex,
        _ => {
            return Err(GribError::DecodeError(String::from("Wrong decoder")));
        }
    };
    let Data2 { packing, group_definition, .. } = complex;
    let num_bits = packing.num_bits;

    if group_definition.num_groups == 0 {
        return Err(GribError::MalformedMessage(String::from("complex packing without groups")));
    }

    if num_bits > 64 || group_definition.group_widths_num_bits > 64 || group_definition.group_scaled_lengths_num_bits > 64 {
        return Err(GribError::Unsupported(String::from("group descriptors wider than 64 bits")));
    }

    fn octet_length(num_bits: usize, num_groups: usize) -> usize {
        (num_groups * num_bits + 7) / 8
    }

    let (group_references_start, group_references_end) = (0, octet_length(num_bits, group_definition.num_groups));
    let (group_widths_start, group_widths_end) = (group_references_end, group_references_end + octet_length(group_definition.group_widths_num_bits, group_definition.num_groups));
    let (group_lengths_start, group_lengths_end) = (group_widths_end, group_widths_end + octet_length(group_definition.group_scaled_lengths_num_bits, group_definition.num_groups));

    if group_lengths_end > slice.len() {
        return Err(GribError::MalformedMessage(format!(
            "group descriptors need {} octets, data section holds {}", group_lengths_end, slice.len()
        )));
    }

    let references_iter = descriptors(&slice[group_references_start..group_references_end], num_bits)
        .take(group_definition.num_groups);

    let widths_iter = descriptors(&slice[group_widths_start..group_widths_end], group_definition.group_widths_num_bits)
        .map(move |v| u64::from(group_definition.group_widths_reference) + v)
        .take(group_definition.num_groups);

    let lengths_iter = descriptors(&slice[group_lengths_start..group_lengths_end], group_definition.group_scaled_lengths_num_bits)
        .take(group_definition.num_groups - 1)
        .map(move |v| u64::from(group_definition.group_lengths_reference) + u64::from(group_definition.group_lengths_increment) * v)
        .chain(iter::once(u64::from(group_definition.group_lengths_last)));

    let groups = GroupsIterator::new(references_iter, widths_iter, lengths_iter);

    Ok((groups, group_lengths_end))
}

/// Descriptors packed on zero bits are all zero.
fn descriptors(slice: &[u8], num_bits: usize) -> Box<dyn Iterator<Item = u64> + '_> {
    if num_bits == 0 {
        Box::new(iter::repeat(0))
    } else {
        Box::new(BitwiseIterator::<u64>::new(slice, num_bits))
    }
}

pub(crate) struct GroupsIterator<I: Iterator<Item = u64>, J: Iterator<Item = u64>, K: Iterator<Item = u64>>
{
    references_iter: I,
    widths_iter: J,
    lengths_iter: K,
}

impl<I: Iterator<Item = u64>, J: Iterator<Item = u64>, K: Iterator<Item = u64>> GroupsIterator<I, J, K>
{
    fn new(references_iter: I, widths_iter: J, lengths_iter: K) -> Self {
        Self {
            references_iter,
            widths_iter,
            lengths_iter,
        }
    }
}

impl<I: Iterator<Item = u64>, J: Iterator<Item = u64>, K: Iterator<Item = u64>> Iterator for GroupsIterator<I, J, K> {
    type Item = (i64, usize, usize);

    fn next(&mut self) -> Option<(i64, usize, usize)> {

        match (self.references_iter.next(), self.widths_iter.next(), self.lengths_iter.next()) {
            (Some(reference_value), Some(width), Some(length)) => {
                Some((reference_value as i64, width as usize, length as usize))
            }
            _ => None
        }
    }
}
