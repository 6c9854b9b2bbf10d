use crate::grib::Result;
use crate::grib::utils::{Buffer, BufferWriter};

#[derive(Debug, Clone, PartialEq)]
pub struct DataRepresentationDefinition {
    /// Number of values actually packed in section 7
    pub num_points: usize,
    pub template_number: u16,
    pub data: Data
}

impl DataRepresentationDefinition {
    pub(crate) fn write(&self) -> Vec<u8> {
        let mut out = BufferWriter::new();
        out.write(self.num_points as u32).write(self.template_number);
        match &self.data {
            Data::Data0(data) => data.write(&mut out),
            Data::Data2(data) => {
                data.packing.write(&mut out);
                data.write_groups(&mut out);
            }
            Data::Data3(data) => {
                data.complex.packing.write(&mut out);
                data.complex.write_groups(&mut out);
                out.write(data.spacial_difference_order).write(data.spacial_difference_size);
            }
            Data::Unknown(bytes) => {
                out.write_bytes(bytes);
            }
        }
        out.into_section(5)
    }

    /// Parameters shared by every grid point packing.
    pub fn packing(&self) -> Option<&Data0> {
        match &self.data {
            Data::Data0(data) => Some(data),
            Data::Data2(data) => Some(&data.packing),
            Data::Data3(data) => Some(&data.complex.packing),
            Data::Unknown(_) => None,
        }
    }

    pub(crate) fn packing_mut(&mut self) -> Option<&mut Data0> {
        match &mut self.data {
            Data::Data0(data) => Some(data),
            Data::Data2(data) => Some(&mut data.packing),
            Data::Data3(data) => Some(&mut data.complex.packing),
            Data::Unknown(_) => None,
        }
    }

    /// Short name of the packing, as used by the `packingType` key.
    pub fn packing_type(&self) -> &'static str {
        match self.template_number {
            0 => "grid_simple",
            2 => "grid_complex",
            3 => "grid_complex_spatial_differencing",
            40 => "grid_jpeg",
            41 => "grid_png",
            42 => "grid_ccsds",
            _ => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Data0(Data0),
    Data2(Data2),
    Data3(Data3),
    Unknown(Vec<u8>)
}

impl Data {
    pub(crate) fn from_template(template_number: u16, bytes: Vec<u8>) -> Result<Self> {

        let mut buf = Buffer::new(bytes);

        match template_number {
            0 => {
                Ok(Data::Data0(Data0::parse(&mut buf)?))
            }
            2 => {
                Ok(Data::Data2(Data2::parse(&mut buf)?))
            }
            3 => {
                Ok(Data::Data3(Data3 {
                    complex: Data2::parse(&mut buf)?,
                    spacial_difference_order: buf.read()?,
                    spacial_difference_size: buf.read()?,
                }))
            }
            _ => {
                Ok(Data::Unknown(buf.bytes))
            }
        }
    }
}

/// Data Representation Template 5.0: grid point data, simple packing
#[derive(Debug, Clone, PartialEq)]
pub struct Data0 {
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub num_bits: usize,
    pub values_type: u8,
}

impl Data0 {
    fn parse(buf: &mut Buffer) -> Result<Self> {
        Ok(Data0 {
            reference_value: buf.read()?,
            binary_scale_factor: buf.read_grib_int::<u16, i16>()?,
            decimal_scale_factor: buf.read_grib_int::<u16, i16>()?,
            num_bits: buf.read::<u8>()? as usize,
            values_type: buf.read()?,
        })
    }

    fn write(&self, out: &mut BufferWriter) {
        out.write(self.reference_value)
            .write_grib_int::<i16, u16>(self.binary_scale_factor)
            .write_grib_int::<i16, u16>(self.decimal_scale_factor)
            .write(self.num_bits as u8)
            .write(self.values_type);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupDefinition {
    pub num_groups: usize,
    pub group_widths_reference: u8,
    pub group_widths_num_bits: usize,
    pub group_lengths_reference: u32,
    pub group_lengths_increment: u8,
    pub group_lengths_last: u32,
    pub group_scaled_lengths_num_bits: usize
}

/// Data Representation Template 5.2: grid point data, complex packing
#[derive(Debug, Clone, PartialEq)]
pub struct Data2 {
    pub packing: Data0,
    pub group_method: u8,
    /// Missing value management (see Code Table 5.5)
    pub missing_value: u8,
    pub missing_substitute_primary: u32,
    pub missing_substitute_secondary: u32,
    pub group_definition: GroupDefinition,
}

impl Data2 {
    fn parse(buf: &mut Buffer) -> Result<Self> {
        Ok(Data2 {
            packing: Data0::parse(buf)?,
            group_method: buf.read()?,
            missing_value: buf.read()?,
            missing_substitute_primary: buf.read()?,
            missing_substitute_secondary: buf.read()?,
            group_definition: GroupDefinition {
                num_groups: buf.read::<u32>()? as usize,
                group_widths_reference: buf.read()?,
                group_widths_num_bits: buf.read::<u8>()? as usize,
                group_lengths_reference: buf.read()?,
                group_lengths_increment: buf.read()?,
                group_lengths_last: buf.read()?,
                group_scaled_lengths_num_bits: buf.read::<u8>()? as usize,
            },
        })
    }

    fn write_groups(&self, out: &mut BufferWriter) {
        let groups = &self.group_definition;
        out.write(self.group_method)
            .write(self.missing_value)
            .write(self.missing_substitute_primary)
            .write(self.missing_substitute_secondary)
            .write(groups.num_groups as u32)
            .write(groups.group_widths_reference)
            .write(groups.group_widths_num_bits as u8)
            .write(groups.group_lengths_reference)
            .write(groups.group_lengths_increment)
            .write(groups.group_lengths_last)
            .write(groups.group_scaled_lengths_num_bits as u8);
    }
}

/// Data Representation Template 5.3: complex packing and spatial differencing
#[derive(Debug, Clone, PartialEq)]
pub struct Data3 {
    pub complex: Data2,
    pub spacial_difference_order: u8,
    /// Number of octets of each extra descriptor leading section 7
    pub spacial_difference_size: u8
}
