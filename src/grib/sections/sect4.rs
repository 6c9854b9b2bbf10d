use chrono::{DateTime, Utc};
use crate::grib::Result;
use crate::grib::sections::sect1::{read_date_time, write_date_time};
use crate::grib::sections::sect3::MISSING_U32;
use crate::grib::utils::{Buffer, BufferWriter, GribInt, GribUint};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductDefinition {
    /// Number of coordinate values after Template
    pub num_coordinates: u16,
    /// Product Definition Template Number
    pub template_number: u16,
    pub product: Product,
    /// Optional list of coordinate values, 4 octets each, kept verbatim
    pub coordinates: Vec<u8>,
}

impl ProductDefinition {
    pub(crate) fn write(&self) -> Vec<u8> {
        let mut out = BufferWriter::new();
        out.write(self.num_coordinates).write(self.template_number);
        self.product.write(&mut out);
        out.write_bytes(&self.coordinates);
        out.into_section(4)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Product {
    Product0(Product0),
    Product8(Product8),
    Unknown(Vec<u8>)
}

impl Product {
    pub(crate) fn from_template(template_number: u16, bytes: Vec<u8>) -> Result<Self> {

        match template_number {
            0 => {
                let mut buf = Buffer::new(bytes);
                Ok(Product::Product0(Product0::parse(&mut buf)?))
            },
            8 => {
                let mut buf = Buffer::new(bytes);
                let horizontal = Product0::parse(&mut buf)?;
                let end_of_interval = read_date_time(&mut buf)?;
                let num_ranges: u8 = buf.read()?;
                let num_missing = buf.read()?;
                let ranges = (0..num_ranges)
                    .map(|_| TimeRange::parse(&mut buf))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Product::Product8(Product8 {
                    horizontal,
                    end_of_interval,
                    num_missing,
                    ranges,
                }))
            },
            _ => {
                Ok(Product::Unknown(bytes))
            }
        }
    }

    fn write(&self, out: &mut BufferWriter) {
        match self {
            Product::Product0(product) => product.write(out),
            Product::Product8(product) => {
                product.horizontal.write(out);
                write_date_time(out, &product.end_of_interval);
                out.write(product.ranges.len() as u8).write(product.num_missing);
                for range in &product.ranges {
                    range.write(out);
                }
            }
            Product::Unknown(bytes) => {
                out.write_bytes(bytes);
            }
        }
    }

    /// Fields common to the horizontal-level templates.
    pub fn horizontal(&self) -> Option<&Product0> {
        match self {
            Product::Product0(product) => Some(product),
            Product::Product8(product) => Some(&product.horizontal),
            Product::Unknown(_) => None,
        }
    }

    pub(crate) fn horizontal_mut(&mut self) -> Option<&mut Product0> {
        match self {
            Product::Product0(product) => Some(product),
            Product::Product8(product) => Some(&mut product.horizontal),
            Product::Unknown(_) => None,
        }
    }
}

/// Product Definition Template 4.0: analysis or forecast at a horizontal level at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Product0 {
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub process_type: u8,
    pub background_process: u8,
    pub analysis_process: u8,
    pub hours: u16,
    pub minutes: u8,
    /// Indicator of unit of time range (see Code Table 4.4)
    pub time_unit: u8,
    pub forecast_time: u32,
    pub first_surface: Surface,
    pub second_surface: Surface,
}

impl Product0 {
    fn parse(buf: &mut Buffer) -> Result<Self> {
        Ok(Product0 {
            parameter_category: buf.read()?,
            parameter_number: buf.read()?,
            process_type: buf.read()?,
            background_process: buf.read()?,
            analysis_process: buf.read()?,
            hours: buf.read()?,
            minutes: buf.read()?,
            time_unit: buf.read()?,
            forecast_time: buf.read()?,
            first_surface: Surface::parse(buf)?,
            second_surface: Surface::parse(buf)?,
        })
    }

    fn write(&self, out: &mut BufferWriter) {
        out.write(self.parameter_category)
            .write(self.parameter_number)
            .write(self.process_type)
            .write(self.background_process)
            .write(self.analysis_process)
            .write(self.hours)
            .write(self.minutes)
            .write(self.time_unit)
            .write(self.forecast_time);
        self.first_surface.write(out);
        self.second_surface.write(out);
    }
}

/// Product Definition Template 4.8: average, accumulation, extreme values or other
/// statistically processed values at a horizontal level in a continuous time interval
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Product8 {
    pub horizontal: Product0,
    /// End of the overall time interval
    pub end_of_interval: DateTime<Utc>,
    pub num_missing: u32,
    pub ranges: Vec<TimeRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeRange {
    /// Statistical process (see Code Table 4.10)
    pub statistical_process: u8,
    pub increment_type: u8,
    pub time_unit: u8,
    pub length: u32,
    pub increment_unit: u8,
    pub increment: u32,
}

impl TimeRange {
    fn parse(buf: &mut Buffer) -> Result<Self> {
        Ok(TimeRange {
            statistical_process: buf.read()?,
            increment_type: buf.read()?,
            time_unit: buf.read()?,
            length: buf.read()?,
            increment_unit: buf.read()?,
            increment: buf.read()?,
        })
    }

    fn write(&self, out: &mut BufferWriter) {
        out.write(self.statistical_process)
            .write(self.increment_type)
            .write(self.time_unit)
            .write(self.length)
            .write(self.increment_unit)
            .write(self.increment);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Surface {
    /// Type of fixed surface (see Code Table 4.5)
    pub surface_type: u8,
    /// Scale factor, sign-magnitude on the wire
    pub scale_factor: u8,
    pub scaled_value: u32,
}

impl Surface {
    fn parse(buf: &mut Buffer) -> Result<Self> {
        Ok(Surface {
            surface_type: buf.read()?,
            scale_factor: buf.read()?,
            scaled_value: buf.read()?,
        })
    }

    pub fn scale(&self) -> i8 {
        self.scale_factor.as_grib_int()
    }

    pub(crate) fn set_scale(&mut self, scale: i8) {
        self.scale_factor = scale.as_grib_uint();
    }

    /// `scaled_value * 10^-scale`, `None` when either is missing.
    pub fn value(&self) -> Option<f64> {
        if self.scaled_value == MISSING_U32 || self.scale_factor == u8::MAX {
            return None;
        }
        Some(self.scaled_value as f64 * 10_f64.powi(-i32::from(self.scale())))
    }

    fn write(&self, out: &mut BufferWriter) {
        out.write(self.surface_type)
            .write(self.scale_factor)
            .write(self.scaled_value);
    }
}
