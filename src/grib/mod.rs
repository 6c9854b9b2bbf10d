pub mod sections;
mod utils;

use std::io::{Cursor, Read};
use crate::field::Field;
use crate::grib::sections::{SectionHeader, Indicator, Section};
use crate::grib::sections::sect1::Identification;
use crate::grib::sections::sect3::GridDefinition;
use crate::grib::sections::sect4::{Product, ProductDefinition};
use crate::grib::sections::sect5::{Data, DataRepresentationDefinition};
use crate::grib::sections::sect6::{BitMap, BITMAP_ABSENT, BITMAP_PRESENT};
use crate::grib::sections::sect7::complex::GridPointDataComplexPackingDecoder;
use crate::grib::sections::sect7::complex_spacial_diff::GridPointDataComplexPackingSpacialDiffDecoder;
use crate::grib::sections::sect7::Grib2DataDecoder;
use crate::grib::sections::sect7::simple::{GridPointDataSimplePackingDecoder, GridPointDataSimplePackingEncoder};
use crate::grib::utils::BufferWriter;

pub(crate) const SECT0_IS_MAGIC: &[u8] = b"GRIB";
const SECT0_IS_MAGIC_SIZE: usize = SECT0_IS_MAGIC.len();
pub(crate) const SECT0_IS_SIZE: usize = 16;
pub(crate) const SECT_HEADER_SIZE: usize = 5;
const SECT8_ES_MAGIC: &[u8] = b"7777";
const SECT8_ES_SIZE: usize = SECT8_ES_MAGIC.len();

#[macro_export]
macro_rules! read_as {
    ($ty:ty, $buf:ident, $start:expr) => {{
        let mut raw = [0; std::mem::size_of::<$ty>()];
        raw.copy_from_slice(&$buf[$start..$start + std::mem::size_of::<$ty>()]);
        <$ty>::from_be_bytes(raw)
    }};
}

pub type Result<T, E = GribError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum GribError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("unsupported GRIB edition {0}")]
    UnsupportedEdition(u8),

    #[error("unsupported template {section}.{template}")]
    UnsupportedTemplate { section: u8, template: u16 },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid attribute `{key}`: {reason}")]
    InvalidAttribute { key: String, reason: String },

    #[error("decode error: {0}")]
    DecodeError(String),
}

/// One GRIB2 message with every section but the packed data parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub indicator: Indicator,
    pub identification: Identification,
    /// Section 2, kept verbatim
    pub local_use: Option<Vec<u8>>,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation_definition: DataRepresentationDefinition,
    pub bitmap: BitMap,
}

impl Message {
    /// Parses `bytes`, which must hold exactly one message, and unpacks its values.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Message, Field)> {
        if bytes.len() < SECT0_IS_SIZE {
            return Err(GribError::MalformedMessage(format!(
                "{} octets is shorter than the indicator section", bytes.len()
            )));
        }

        let mut reader = GribReader::new(Cursor::new(bytes));
        let (header, sect0) = reader.read_sect0()?;

        if sect0.total_length != bytes.len() as u64 {
            return Err(GribError::MalformedMessage(format!(
                "declared length {} but message spans {} octets", sect0.total_length, bytes.len()
            )));
        }

        let mut remaining_length = sect0.total_length - header.size as u64;
        let mut sections = vec![Section::Section0(sect0)];

        while remaining_length > 0 {

            debug!("Remaining size to read : {}/{}", remaining_length, bytes.len());

            if remaining_length < SECT8_ES_SIZE as u64 {
                return Err(GribError::MalformedMessage(format!(
                    "message truncated: {} octets left for the end section", remaining_length
                )));
            }

            if remaining_length == SECT8_ES_SIZE as u64 {
                sections.push(reader.read_sect8_body(SECT8_ES_SIZE).map_err(truncated)?);
                break;
            }

            let (header, section) = reader.read_section(remaining_length - SECT8_ES_SIZE as u64).map_err(truncated)?;

            remaining_length -= header.size as u64;
            sections.push(section);
        }

        let mut indicator = None;
        let mut identification = None;
        let mut local_use = None;
        let mut grid_definition = None;
        let mut product_definition = None;
        let mut data_representation_definition = None;
        let mut bitmap = None;
        let mut data = None;
        let mut seen = [false; 9];

        for section in sections {
            let number = section.number() as usize;
            if seen[number] {
                return Err(GribError::Unsupported(format!(
                    "section {} repeats (multi-field messages are not supported)", number
                )));
            }
            seen[number] = true;

            match section {
                Section::Section0(section) => { indicator = Some(section) }
                Section::Section1(section) => { identification = Some(section) }
                Section::Section2(section) => { local_use = Some(section) }
                Section::Section3(section) => { grid_definition = Some(section) }
                Section::Section4(section) => { product_definition = Some(section) }
                Section::Section5(section) => { data_representation_definition = Some(section) }
                Section::Section6(section) => { bitmap = Some(section) }
                Section::Section7(section) => { data = Some(section) }
                Section::Section8 => {}
            }
        }

        if !seen[8] {
            return Err(GribError::MalformedMessage(String::from("missing end section")));
        }

        let message = Message {
            indicator: indicator.ok_or(missing_section(0))?,
            identification: identification.ok_or(missing_section(1))?,
            local_use,
            grid_definition: grid_definition.ok_or(missing_section(3))?,
            product_definition: product_definition.ok_or(missing_section(4))?,
            data_representation_definition: data_representation_definition.ok_or(missing_section(5))?,
            bitmap: bitmap.ok_or(missing_section(6))?,
        };
        let data = data.ok_or(missing_section(7))?;

        let values = message.unpack(&data)?;

        Ok((message, values))
    }

    fn unpack(&self, data: &[u8]) -> Result<Field> {
        self.check_num_points()?;

        let drs = &self.data_representation_definition;
        let packed = match &drs.data {
            Data::Data0(_) => {
                GridPointDataSimplePackingDecoder{}.decode(drs, data)?
            }
            Data::Data2(_) => {
                GridPointDataComplexPackingDecoder{}.decode(drs, data)?
            }
            Data::Data3(_) => {
                GridPointDataComplexPackingSpacialDiffDecoder{}.decode(drs, data)?
            }
            Data::Unknown(_) => {
                warn!("Not implemented data decoder {}", drs.template_number);
                return Err(GribError::UnsupportedTemplate { section: 5, template: drs.template_number });
            }
        };

        let values = self.bitmap.apply(packed, self.grid_definition.num_points)?;
        let shape = self.shape();

        match self.grid_definition.grid.layout() {
            Some(layout) if layout.j_consecutive() && !layout.is_reduced() => {
                let (n_j, n_i) = shape;
                Ok(Field::from_fn(shape, |j, i| values[i * n_j + j]))
            }
            _ => Field::new(shape, values).ok_or_else(|| GribError::MalformedMessage(format!(
                "grid of shape {:?} does not hold {} points", shape, self.grid_definition.num_points
            ))),
        }
    }

    /// Point counts of sections 3, 5 and 6 must agree before any value is allocated.
    fn check_num_points(&self) -> Result<()> {
        let num_points = self.grid_definition.num_points;
        let num_packed = self.data_representation_definition.num_points;

        match self.bitmap.bitmap_indicator {
            BITMAP_ABSENT if num_packed != num_points => {
                return Err(GribError::MalformedMessage(format!(
                    "{} packed values for {} grid points", num_packed, num_points
                )));
            }
            BITMAP_PRESENT if self.bitmap.bitmap.len() * 8 < num_points => {
                return Err(GribError::MalformedMessage(format!(
                    "bitmap covers {} points, grid has {}", self.bitmap.bitmap.len() * 8, num_points
                )));
            }
            BITMAP_PRESENT if num_packed > num_points => {
                return Err(GribError::MalformedMessage(format!(
                    "{} packed values for {} grid points", num_packed, num_points
                )));
            }
            BITMAP_ABSENT | BITMAP_PRESENT => {}
            n => return Err(GribError::UnsupportedTemplate { section: 6, template: n.into() }),
        }

        if let Some(layout) = self.grid_definition.grid.layout().filter(|layout| !layout.is_reduced()) {
            let (n_j, n_i) = (layout.n_j as usize, layout.n_i as usize);
            if n_j.checked_mul(n_i) != Some(num_points) {
                return Err(GribError::MalformedMessage(format!(
                    "grid of shape {:?} does not hold {} points", (n_j, n_i), num_points
                )));
            }
        }

        Ok(())
    }

    /// `(Nj, Ni)` for regular grids; a single row of all points otherwise.
    pub fn shape(&self) -> (usize, usize) {
        match self.grid_definition.grid.layout() {
            Some(layout) if !layout.is_reduced() => (layout.n_j as usize, layout.n_i as usize),
            _ => (1, self.grid_definition.num_points),
        }
    }

    /// Serializes the message around `values`, regenerating sections 3 to 7 from them.
    ///
    /// Data is always written with simple packing; `default_num_bits` is used when the
    /// current packing carries no bits but `values` are not constant.
    pub fn to_bytes(&self, values: &Field, default_num_bits: usize) -> Result<(Vec<u8>, DataRepresentationDefinition, BitMap)> {
        let expected = self.shape();
        if values.shape() != expected {
            return Err(GribError::InvalidAttribute {
                key: String::from("values"),
                reason: format!("shape {:?} does not match grid shape {:?}", values.shape(), expected),
            });
        }
        if let Some(v) = values.as_slice().iter().find(|v| v.is_infinite()) {
            return Err(GribError::InvalidAttribute {
                key: String::from("values"),
                reason: format!("non-finite value {}", v),
            });
        }
        if let Product::Unknown(_) = self.product_definition.product {
            debug!("Writing product template {} verbatim", self.product_definition.template_number);
        }

        let mut grid_definition = self.grid_definition.clone();
        grid_definition.num_points = values.len();

        let ordered: Vec<f64> = match grid_definition.grid.layout() {
            Some(layout) if layout.j_consecutive() && !layout.is_reduced() => {
                let (n_j, n_i) = expected;
                (0..n_i).flat_map(|i| (0..n_j).map(move |j| (j, i)))
                    .map(|(j, i)| values.as_slice()[j * n_i + i])
                    .collect()
            }
            _ => values.as_slice().to_vec(),
        };

        let bitmap = if ordered.iter().any(|v| v.is_nan()) {
            BitMap::from_presence(ordered.iter().map(|v| !v.is_nan()))
        } else {
            BitMap::absent()
        };
        let packed: Vec<f64> = ordered.into_iter().filter(|v| !v.is_nan()).collect();

        let (num_bits, decimal_scale_factor) = match self.data_representation_definition.packing() {
            Some(packing) if packing.num_bits > 0 => (packing.num_bits, packing.decimal_scale_factor),
            Some(packing) => (default_num_bits, packing.decimal_scale_factor),
            None => (default_num_bits, 0),
        };
        let encoder = GridPointDataSimplePackingEncoder { num_bits, decimal_scale_factor };
        let (data0, data) = encoder.encode(&packed)?;

        let data_representation_definition = DataRepresentationDefinition {
            num_points: packed.len(),
            template_number: 0,
            data: Data::Data0(data0),
        };

        let mut body = Vec::new();
        body.extend(self.identification.write());
        if let Some(local_use) = &self.local_use {
            let mut sect2 = BufferWriter::new();
            sect2.write_bytes(local_use);
            body.extend(sect2.into_section(2));
        }
        body.extend(grid_definition.write());
        body.extend(self.product_definition.write());
        body.extend(data_representation_definition.write());
        body.extend(bitmap.write());
        let mut sect7 = BufferWriter::new();
        sect7.write_bytes(&data);
        body.extend(sect7.into_section(7));

        let total_length = (SECT0_IS_SIZE + body.len() + SECT8_ES_SIZE) as u64;
        let mut bytes = Vec::with_capacity(total_length as usize);
        bytes.extend_from_slice(SECT0_IS_MAGIC);
        bytes.extend_from_slice(&[0, 0]);
        bytes.push(self.indicator.discipline);
        bytes.push(2);
        bytes.extend_from_slice(&total_length.to_be_bytes());
        bytes.extend(body);
        bytes.extend_from_slice(SECT8_ES_MAGIC);

        debug!("Encoded message of {} octets ({} packed values on {} bits)", total_length, packed.len(), num_bits);

        Ok((bytes, data_representation_definition, bitmap))
    }
}

fn missing_section(number: u8) -> GribError {
    GribError::MalformedMessage(format!("missing section {}", number))
}

fn truncated(e: GribError) -> GribError {
    match e {
        GribError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            GribError::MalformedMessage(String::from("message truncated"))
        }
        e => e,
    }
}

/// Edition and total length read from the 16 octets starting a message.
///
/// Edition 1 stores a 3-octet length at octets 5-7, edition 2 an 8-octet length at 9-16.
pub(crate) fn peek_indicator(buf: &[u8; SECT0_IS_SIZE]) -> Result<(u8, u64)> {
    if &buf[0..SECT0_IS_MAGIC_SIZE] != SECT0_IS_MAGIC {
        return Err(GribError::MalformedMessage(String::from("missing GRIB magic")));
    }
    match buf[7] {
        1 => Ok((1, u64::from(buf[4]) << 16 | u64::from(buf[5]) << 8 | u64::from(buf[6]))),
        2 => Ok((2, read_as!(u64, buf, 8))),
        n => Err(GribError::UnsupportedEdition(n)),
    }
}

struct GribReader<R: Read> {
    reader: R,
}

impl<R: Read> Read for GribReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.reader.read_exact(buf)
    }
}


impl<R: Read> GribReader<R> {
    fn new(reader: R) -> Self {
        Self { reader }
    }

    fn read_sect0(&mut self) -> Result<(SectionHeader, Indicator)> {

        let mut buf = [0; SECT0_IS_SIZE];

        self.read_exact(&mut buf[..])?;

        let (edition, total_length) = peek_indicator(&buf)?;
        if edition != 2 {
            return Err(GribError::UnsupportedEdition(edition));
        }

        debug!("Read section {} : {}", 0, SECT0_IS_SIZE);

        Ok((SectionHeader {
            size: SECT0_IS_SIZE,
            number: 0
        }, Indicator
        {
            discipline: buf[6],
            edition,
            total_length,
        }))
    }

    fn read_header(&mut self) -> Result<SectionHeader> {
        let mut buf = [0; SECT_HEADER_SIZE];
        self.read_exact(&mut buf[..])?;

        let length = read_as!(u32, buf, 0);
        let number = buf[4];

        Ok(SectionHeader {
            size: length as usize,
            number,
        })
    }

    fn read_section(&mut self, max_size: u64) -> Result<(SectionHeader, Section)> {

        let header = self.read_header()?;

        if header.size < SECT_HEADER_SIZE || header.size as u64 > max_size {
            return Err(GribError::MalformedMessage(format!(
                "section {} declares {} octets, {} available", header.number, header.size, max_size
            )));
        }

        let body_size = header.size - SECT_HEADER_SIZE;
        debug!("Read section {} : {}(-{} : {})", header.number, header.size, SECT_HEADER_SIZE, body_size);
        let body = self.read_body(body_size)?;
        let body = match header.number {
            1 => Section::Section1(Identification::parse(body)?),
            2 => Section::Section2(body),
            3 => self.read_sect3_body(body)?,
            4 => self.read_sect4_body(body)?,
            5 => self.read_sect5_body(body)?,
            6 => self.read_sect6_body(body)?,
            7 => Section::Section7(body.into_boxed_slice()),
            n => { return Err(GribError::MalformedMessage(format!("unknown section {}", n))); },
        };

        Ok((header, body))
    }

    fn read_body(&mut self, body_size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; body_size];
        self.read_exact(&mut buf[..])?;
        Ok(buf)
    }

    fn read_sect3_body(&mut self, body: Vec<u8>) -> Result<Section> {
        if body.len() < 9 { // octet 6-14
            return Err(GribError::MalformedMessage(String::from("section 3 too short")));
        }

        let template_number = read_as!(u16, body, 7);
        let optional_num_list_size = body[5];
        let template_end = body.len().checked_sub(optional_num_list_size as usize)
            .filter(|end| *end >= 9)
            .ok_or_else(|| GribError::MalformedMessage(String::from("section 3 optional list overruns the section")))?;

        let grid = sections::sect3::Grid::from_template(template_number, body[9..template_end].to_vec())?;

        Ok(Section::Section3(GridDefinition {
            source: body[0],
            num_points: read_as!(u32, body, 1) as usize,
            optional_num_list_size,
            optional_num_list_interpretation: body[6],
            template_number,
            grid,
            optional_num_list: body[template_end..].to_vec(),
        }))
    }

    fn read_sect4_body(&mut self, body: Vec<u8>) -> Result<Section> {
        if body.len() < 4 { // octet 6-9
            return Err(GribError::MalformedMessage(String::from("section 4 too short")));
        }

        let num_coordinates = read_as!(u16, body, 0);
        let template_number = read_as!(u16, body, 2);
        let template_end = body.len().checked_sub(4 * num_coordinates as usize)
            .filter(|end| *end >= 4)
            .ok_or_else(|| GribError::MalformedMessage(String::from("section 4 coordinates overrun the section")))?;

        let product = Product::from_template(template_number, body[4..template_end].to_vec())?;

        Ok(Section::Section4(ProductDefinition {
            num_coordinates,
            template_number,
            product,
            coordinates: body[template_end..].to_vec(),
        }))
    }

    fn read_sect5_body(&mut self, body: Vec<u8>) -> Result<Section> {
        if body.len() < 6 { // octet 6-11
            return Err(GribError::MalformedMessage(String::from("section 5 too short")));
        }

        let template_number = read_as!(u16, body, 4);
        let data = Data::from_template(template_number, body[6..].to_vec())?;

        Ok(Section::Section5(DataRepresentationDefinition {
            num_points: read_as!(u32, body, 0) as usize,
            template_number,
            data
        }))
    }

    fn read_sect6_body(&mut self, body: Vec<u8>) -> Result<Section> {
        let (indicator, bitmap) = body.split_first()
            .ok_or_else(|| GribError::MalformedMessage(String::from("section 6 too short")))?;

        debug!("bitmap_size : {}", bitmap.len());

        Ok(Section::Section6(BitMap {
            bitmap_indicator: *indicator,
            bitmap: bitmap.to_vec(),
        }))
    }

    fn read_sect8_body(&mut self, body_size: usize) -> Result<Section> {
        let buf = self.read_body(body_size)?;

        if buf[..] != SECT8_ES_MAGIC[..] {
            return Err(GribError::MalformedMessage(String::from("end section is not 7777")));
        }

        Ok(Section::Section8)
    }
}
