use crate::grib::sections::sect5::DataRepresentationDefinition;

pub(crate) mod simple;
pub(crate) mod complex;
mod groups;
pub(crate) mod complex_spacial_diff;

/// Unpacks section 7 into the values that were actually packed (bitmap not applied).
pub(crate) trait Grib2DataDecoder {
    fn decode(&self, data_repr_def: &DataRepresentationDefinition, slice: &[u8]) -> crate::grib::Result<Vec<f64>>;
}
