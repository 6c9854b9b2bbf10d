//! In-memory message: typed attributes over the decoded sections, the value
//! array, and the raw bytes they were decoded from.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use crate::codec::MessageCodec;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::grib::Message;
use crate::grib::sections::sect3::{Grid, GridLayout, MISSING_U32};
use crate::grib::sections::sect4::{Product, Product0, Surface};
use crate::grib::sections::sect5::Data0;
use crate::grib::sections::sect7::simple::MAX_NUM_BITS;
use crate::grid;
use crate::stamp::{date_key, time_key, Stamp};
use crate::tables::level_type_name;

macro_rules! keys {
    ($($variant:ident => $name:literal,)*) => {
        /// Attribute names understood by [`MessageRecord::get`] and [`MessageRecord::set`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Key {
            $($variant,)*
        }

        impl Key {
            pub const ALL: &'static [Key] = &[$(Key::$variant,)*];

            pub fn name(&self) -> &'static str {
                match self {
                    $(Key::$variant => $name,)*
                }
            }
        }

        impl FromStr for Key {
            type Err = Error;

            fn from_str(s: &str) -> Result<Key> {
                match s {
                    $($name => Ok(Key::$variant),)*
                    _ => Err(Error::UnknownAttributeKey { key: s.to_string() }),
                }
            }
        }
    }
}

keys! {
    EditionNumber => "editionNumber",
    Discipline => "discipline",
    Centre => "centre",
    SubCentre => "subCentre",
    TablesVersion => "tablesVersion",
    LocalTablesVersion => "localTablesVersion",
    SignificanceOfReferenceTime => "significanceOfReferenceTime",
    DataDate => "dataDate",
    DataTime => "dataTime",
    ProductionStatusOfProcessedData => "productionStatusOfProcessedData",
    TypeOfProcessedData => "typeOfProcessedData",
    GridDefinitionTemplateNumber => "gridDefinitionTemplateNumber",
    NumberOfDataPoints => "numberOfDataPoints",
    TypeOfGrid => "typeOfGrid",
    Ni => "Ni",
    Nj => "Nj",
    N => "N",
    LatitudeOfFirstGridPointInDegrees => "latitudeOfFirstGridPointInDegrees",
    LongitudeOfFirstGridPointInDegrees => "longitudeOfFirstGridPointInDegrees",
    LatitudeOfLastGridPointInDegrees => "latitudeOfLastGridPointInDegrees",
    LongitudeOfLastGridPointInDegrees => "longitudeOfLastGridPointInDegrees",
    IDirectionIncrementInDegrees => "iDirectionIncrementInDegrees",
    JDirectionIncrementInDegrees => "jDirectionIncrementInDegrees",
    ScanningMode => "scanningMode",
    ProductDefinitionTemplateNumber => "productDefinitionTemplateNumber",
    ParameterCategory => "parameterCategory",
    ParameterNumber => "parameterNumber",
    TypeOfGeneratingProcess => "typeOfGeneratingProcess",
    IndicatorOfUnitOfTimeRange => "indicatorOfUnitOfTimeRange",
    ForecastTime => "forecastTime",
    TypeOfFirstFixedSurface => "typeOfFirstFixedSurface",
    ScaleFactorOfFirstFixedSurface => "scaleFactorOfFirstFixedSurface",
    ScaledValueOfFirstFixedSurface => "scaledValueOfFirstFixedSurface",
    Level => "level",
    TypeOfLevel => "typeOfLevel",
    Name => "name",
    ShortName => "shortName",
    Units => "units",
    StepType => "stepType",
    StepRange => "stepRange",
    StartStep => "startStep",
    EndStep => "endStep",
    ValidityDate => "validityDate",
    ValidityTime => "validityTime",
    DataRepresentationTemplateNumber => "dataRepresentationTemplateNumber",
    PackingType => "packingType",
    BitsPerValue => "bitsPerValue",
    DecimalScaleFactor => "decimalScaleFactor",
    BinaryScaleFactor => "binaryScaleFactor",
    ReferenceValue => "referenceValue",
    NumberOfValues => "numberOfValues",
    NumberOfMissing => "numberOfMissing",
    BitmapPresent => "bitmapPresent",
    Minimum => "minimum",
    Maximum => "maximum",
    Average => "average",
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
        }
    }
}

macro_rules! value_from_impl {
    ($variant:ident: $($ty:ty),*) => ($(
        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        }
    )*);
}

value_from_impl! { Int: i64, i32, u32, i16, u16, u8 }
value_from_impl! { Float: f64, f32 }
value_from_impl! { Text: String, &str }

/// One decoded message.
///
/// The raw bytes are kept until an attribute or the values change; [`MessageRecord::to_bytes`]
/// then regenerates them from the current state.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    index: usize,
    message: Message,
    values: Field,
    raw: Option<Vec<u8>>,
    codec: MessageCodec,
}

impl MessageRecord {
    pub(crate) fn new(index: usize, message: Message, values: Field, raw: Vec<u8>, codec: MessageCodec) -> Self {
        Self { index, message, values, raw: Some(raw), codec }
    }

    /// 1-based position in the source file.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn values(&self) -> &Field {
        &self.values
    }

    /// Replaces the values; their shape is checked against `Nj`/`Ni` when encoding.
    pub fn set_values(&mut self, values: Field) {
        self.values = values;
        self.raw = None;
    }

    pub fn values_mut(&mut self) -> &mut Field {
        self.raw = None;
        &mut self.values
    }

    /// `true` when the record changed since it was decoded or last encoded.
    pub fn is_dirty(&self) -> bool {
        self.raw.is_none()
    }

    pub(crate) fn cached_bytes(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    /// Encoded message reflecting the current attributes and values.
    pub fn to_bytes(&mut self) -> Result<&[u8]> {
        if self.raw.is_none() {
            let (bytes, data_representation_definition, bitmap) = self.codec.pack(self)?;
            debug!("Re-encoded message {} into {} octets", self.index, bytes.len());
            self.message.indicator.total_length = bytes.len() as u64;
            self.message.grid_definition.num_points = self.values.len();
            self.message.data_representation_definition = data_representation_definition;
            self.message.bitmap = bitmap;
            self.raw = Some(bytes);
        }
        Ok(self.raw.as_deref().unwrap_or_default())
    }

    pub fn latlons(&self) -> Result<(Field, Field)> {
        grid::latlons(&self.message.grid_definition)
    }

    pub fn get_by_name(&self, key: &str) -> Result<Value> {
        self.get(key.parse()?)
    }

    pub fn set_by_name(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.set(key.parse()?, value)
    }

    /// Every key applicable to this message with its current value.
    pub fn attributes(&self) -> Vec<(Key, Value)> {
        Key::ALL.iter()
            .filter_map(|key| self.get(*key).ok().map(|value| (*key, value)))
            .collect()
    }

    pub fn get(&self, key: Key) -> Result<Value> {
        let message = &self.message;
        let identification = &message.identification;
        let tables = self.codec.tables();

        let value: Value = match key {
            Key::EditionNumber => message.indicator.edition.into(),
            Key::Discipline => message.indicator.discipline.into(),
            Key::Centre => identification.centre_id.into(),
            Key::SubCentre => identification.subcentre_id.into(),
            Key::TablesVersion => identification.master_table_version.into(),
            Key::LocalTablesVersion => identification.local_table_version.into(),
            Key::SignificanceOfReferenceTime => identification.ref_time_significance.into(),
            Key::DataDate => date_key(&identification.ref_time).into(),
            Key::DataTime => time_key(&identification.ref_time).into(),
            Key::ProductionStatusOfProcessedData => identification.prod_status.into(),
            Key::TypeOfProcessedData => identification.data_type.into(),

            Key::GridDefinitionTemplateNumber => message.grid_definition.template_number.into(),
            Key::NumberOfDataPoints => (message.grid_definition.num_points as i64).into(),
            Key::TypeOfGrid => message.grid_definition.type_of_grid().into(),
            Key::Ni => {
                let layout = self.layout(key)?;
                if layout.is_reduced() {
                    return Err(self.missing(key));
                }
                layout.n_i.into()
            }
            Key::Nj => self.layout(key)?.n_j.into(),
            Key::N => match &message.grid_definition.grid {
                Grid::Grid40(grid) => grid.n.into(),
                _ => return Err(self.missing(key)),
            },
            Key::LatitudeOfFirstGridPointInDegrees => self.degrees(key, |l| l.la1)?,
            Key::LongitudeOfFirstGridPointInDegrees => self.degrees(key, |l| l.lo1)?,
            Key::LatitudeOfLastGridPointInDegrees => self.degrees(key, |l| l.la2)?,
            Key::LongitudeOfLastGridPointInDegrees => self.degrees(key, |l| l.lo2)?,
            Key::IDirectionIncrementInDegrees => {
                let layout = self.layout(key)?;
                if layout.d_i == MISSING_U32 {
                    return Err(self.missing(key));
                }
                layout.to_degrees(layout.d_i.into()).into()
            }
            Key::JDirectionIncrementInDegrees => match &message.grid_definition.grid {
                Grid::Grid0(grid) if grid.d_j != MISSING_U32 => grid.layout.to_degrees(grid.d_j.into()).into(),
                _ => return Err(self.missing(key)),
            },
            Key::ScanningMode => self.layout(key)?.scanning_mode.into(),

            Key::ProductDefinitionTemplateNumber => message.product_definition.template_number.into(),
            Key::ParameterCategory => self.product(key)?.parameter_category.into(),
            Key::ParameterNumber => self.product(key)?.parameter_number.into(),
            Key::TypeOfGeneratingProcess => self.product(key)?.process_type.into(),
            Key::IndicatorOfUnitOfTimeRange => self.product(key)?.time_unit.into(),
            Key::ForecastTime => self.product(key)?.forecast_time.into(),
            Key::TypeOfFirstFixedSurface => self.product(key)?.first_surface.surface_type.into(),
            Key::ScaleFactorOfFirstFixedSurface => i64::from(self.product(key)?.first_surface.scale()).into(),
            Key::ScaledValueOfFirstFixedSurface => self.product(key)?.first_surface.scaled_value.into(),
            Key::Level => level(&self.product(key)?.first_surface).into(),
            Key::TypeOfLevel => level_type_name(self.product(key)?.first_surface.surface_type).into(),

            Key::Name | Key::ShortName | Key::Units => {
                let product = self.product(key)?;
                let (discipline, category, number) =
                    (message.indicator.discipline, product.parameter_category, product.parameter_number);
                match key {
                    Key::Name => tables.name(discipline, category, number).into(),
                    Key::ShortName => tables.short_name(discipline, category, number).into(),
                    _ => tables.units(discipline, category, number).into(),
                }
            }

            Key::StepType => self.stamp(key)?.step_type.into(),
            Key::StepRange => self.stamp(key)?.step_range().into(),
            Key::StartStep => self.stamp(key)?.start_step().into(),
            Key::EndStep => self.stamp(key)?.end_step().into(),
            Key::ValidityDate | Key::ValidityTime => {
                let validity = self.stamp(key)?.validity_time().ok_or_else(|| self.missing(key))?;
                if key == Key::ValidityDate {
                    date_key(&validity).into()
                } else {
                    time_key(&validity).into()
                }
            }

            Key::DataRepresentationTemplateNumber => message.data_representation_definition.template_number.into(),
            Key::PackingType => message.data_representation_definition.packing_type().into(),
            Key::BitsPerValue => (self.packing(key)?.num_bits as i64).into(),
            Key::DecimalScaleFactor => self.packing(key)?.decimal_scale_factor.into(),
            Key::BinaryScaleFactor => self.packing(key)?.binary_scale_factor.into(),
            Key::ReferenceValue => self.packing(key)?.reference_value.into(),

            Key::NumberOfValues => ((self.values.len() - self.values.count_missing()) as i64).into(),
            Key::NumberOfMissing => (self.values.count_missing() as i64).into(),
            Key::BitmapPresent => {
                let present = message.bitmap.is_present() || self.values.count_missing() > 0;
                i64::from(present).into()
            }
            Key::Minimum => self.values.min().ok_or_else(|| self.missing(key))?.into(),
            Key::Maximum => self.values.max().ok_or_else(|| self.missing(key))?.into(),
            Key::Average => self.values.mean().ok_or_else(|| self.missing(key))?.into(),
        };

        Ok(value)
    }

    /// Updates one attribute and marks the raw bytes stale.
    ///
    /// Read-only keys, values of the wrong type and values out of the field's octet range fail
    /// with [`Error::InvalidAttribute`].
    pub fn set(&mut self, key: Key, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let index = self.index;
        let missing = || Error::MissingAttribute { key: key.name().to_string(), index };

        match key {
            Key::Discipline => self.message.indicator.discipline = int(key, &value)?,
            Key::Centre => self.message.identification.centre_id = int(key, &value)?,
            Key::SubCentre => self.message.identification.subcentre_id = int(key, &value)?,
            Key::TablesVersion => self.message.identification.master_table_version = int(key, &value)?,
            Key::LocalTablesVersion => self.message.identification.local_table_version = int(key, &value)?,
            Key::SignificanceOfReferenceTime => self.message.identification.ref_time_significance = int(key, &value)?,
            Key::DataDate | Key::DataTime => {
                let ref_time = &mut self.message.identification.ref_time;
                *ref_time = if key == Key::DataDate {
                    with_date(ref_time, int(key, &value)?)?
                } else {
                    with_time(ref_time, int(key, &value)?)?
                };
                self.sync_end_of_interval();
            }
            Key::ProductionStatusOfProcessedData => self.message.identification.prod_status = int(key, &value)?,
            Key::TypeOfProcessedData => self.message.identification.data_type = int(key, &value)?,

            Key::Ni => self.layout_mut(key)?.n_i = int(key, &value)?,
            Key::Nj => self.layout_mut(key)?.n_j = int(key, &value)?,
            Key::N => match &mut self.message.grid_definition.grid {
                Grid::Grid40(grid) => grid.n = int(key, &value)?,
                _ => return Err(missing()),
            },
            Key::LatitudeOfFirstGridPointInDegrees => self.set_degrees(key, &value, |l| &mut l.la1)?,
            Key::LongitudeOfFirstGridPointInDegrees => self.set_degrees(key, &value, |l| &mut l.lo1)?,
            Key::LatitudeOfLastGridPointInDegrees => self.set_degrees(key, &value, |l| &mut l.la2)?,
            Key::LongitudeOfLastGridPointInDegrees => self.set_degrees(key, &value, |l| &mut l.lo2)?,
            Key::IDirectionIncrementInDegrees => {
                let layout = self.layout_mut(key)?;
                let d_i = increment(key, &value, layout)?;
                layout.d_i = d_i;
            }
            Key::JDirectionIncrementInDegrees => match &mut self.message.grid_definition.grid {
                Grid::Grid0(grid) => grid.d_j = increment(key, &value, &grid.layout)?,
                _ => return Err(missing()),
            },
            Key::ScanningMode => self.layout_mut(key)?.scanning_mode = int(key, &value)?,

            Key::ParameterCategory => self.product_mut(key)?.parameter_category = int(key, &value)?,
            Key::ParameterNumber => self.product_mut(key)?.parameter_number = int(key, &value)?,
            Key::TypeOfGeneratingProcess => self.product_mut(key)?.process_type = int(key, &value)?,
            Key::IndicatorOfUnitOfTimeRange | Key::ForecastTime => {
                if key == Key::ForecastTime {
                    self.product_mut(key)?.forecast_time = int(key, &value)?;
                } else {
                    self.product_mut(key)?.time_unit = int(key, &value)?;
                }
                self.sync_end_of_interval();
            }
            Key::TypeOfFirstFixedSurface => self.product_mut(key)?.first_surface.surface_type = int(key, &value)?,
            Key::ScaleFactorOfFirstFixedSurface => {
                let scale: i8 = int(key, &value)?;
                if scale == i8::MIN {
                    return Err(Error::invalid(key, "out of range"));
                }
                self.product_mut(key)?.first_surface.set_scale(scale);
            }
            Key::ScaledValueOfFirstFixedSurface => self.product_mut(key)?.first_surface.scaled_value = int(key, &value)?,
            Key::Level => {
                let level: u32 = int(key, &value)?;
                let surface = &mut self.product_mut(key)?.first_surface;
                let scaled_value = if surface.surface_type == ISOBARIC_IN_HPA { level.checked_mul(100) } else { Some(level) };
                surface.scaled_value = scaled_value.ok_or_else(|| Error::invalid(key, "out of range"))?;
                surface.set_scale(0);
            }

            Key::BitsPerValue => {
                let num_bits: usize = int(key, &value)?;
                if num_bits > MAX_NUM_BITS {
                    return Err(Error::invalid(key, format!("at most {} bits are supported", MAX_NUM_BITS)));
                }
                self.packing_mut(key)?.num_bits = num_bits;
            }
            Key::DecimalScaleFactor => {
                let factor: i16 = int(key, &value)?;
                if factor == i16::MIN {
                    return Err(Error::invalid(key, "out of range"));
                }
                self.packing_mut(key)?.decimal_scale_factor = factor;
            }

            _ => return Err(Error::invalid(key, "read-only")),
        }

        debug!("Set {} = {} on message {}", key, value, self.index);
        self.raw = None;
        Ok(())
    }

    /// Template 4.8 stores the end of its interval explicitly; keep it in step with the forecast.
    fn sync_end_of_interval(&mut self) {
        let ref_time = self.message.identification.ref_time;
        let end = Stamp::from_product(ref_time, &self.message.product_definition.product)
            .and_then(|stamp| stamp.validity_time());
        if let (Product::Product8(product), Some(end)) = (&mut self.message.product_definition.product, end) {
            product.end_of_interval = end;
        }
    }

    fn missing(&self, key: Key) -> Error {
        Error::MissingAttribute { key: key.name().to_string(), index: self.index }
    }

    fn layout(&self, key: Key) -> Result<&GridLayout> {
        self.message.grid_definition.grid.layout().ok_or_else(|| self.missing(key))
    }

    fn layout_mut(&mut self, key: Key) -> Result<&mut GridLayout> {
        let missing = self.missing(key);
        self.message.grid_definition.grid.layout_mut().ok_or(missing)
    }

    fn product(&self, key: Key) -> Result<&Product0> {
        self.message.product_definition.product.horizontal().ok_or_else(|| self.missing(key))
    }

    fn product_mut(&mut self, key: Key) -> Result<&mut Product0> {
        let missing = self.missing(key);
        self.message.product_definition.product.horizontal_mut().ok_or(missing)
    }

    fn packing(&self, key: Key) -> Result<&Data0> {
        self.message.data_representation_definition.packing().ok_or_else(|| self.missing(key))
    }

    fn packing_mut(&mut self, key: Key) -> Result<&mut Data0> {
        let missing = self.missing(key);
        self.message.data_representation_definition.packing_mut().ok_or(missing)
    }

    fn stamp(&self, key: Key) -> Result<Stamp> {
        Stamp::from_product(self.message.identification.ref_time, &self.message.product_definition.product)
            .ok_or_else(|| self.missing(key))
    }

    fn degrees(&self, key: Key, field: impl Fn(&GridLayout) -> i32) -> Result<Value> {
        let layout = self.layout(key)?;
        Ok(layout.to_degrees(field(layout).into()).into())
    }

    fn set_degrees(&mut self, key: Key, value: &Value, field: impl Fn(&mut GridLayout) -> &mut i32) -> Result<()> {
        let degrees = float(key, value)?;
        let layout = self.layout_mut(key)?;
        let units = layout.from_degrees(degrees);
        // sign-magnitude leaves 31 bits for the magnitude
        if units.unsigned_abs() > i32::MAX as u64 {
            return Err(Error::invalid(key, "out of range"));
        }
        *field(layout) = units as i32;
        Ok(())
    }
}

const ISOBARIC_IN_HPA: u8 = 100;

/// Level in the surface's conventional unit: hPa for isobaric surfaces, SI otherwise.
fn level(surface: &Surface) -> i64 {
    let value = surface.value().unwrap_or(0.0);
    let value = if surface.surface_type == ISOBARIC_IN_HPA { value / 100.0 } else { value };
    value.round() as i64
}

fn int<T: TryFrom<i64>>(key: Key, value: &Value) -> Result<T> {
    let v = value.as_int().ok_or_else(|| Error::invalid(key, format!("expected an integer, got `{}`", value)))?;
    T::try_from(v).map_err(|_| Error::invalid(key, format!("{} is out of range", v)))
}

fn float(key: Key, value: &Value) -> Result<f64> {
    value.as_float()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::invalid(key, format!("expected a finite number, got `{}`", value)))
}

fn increment(key: Key, value: &Value, layout: &GridLayout) -> Result<u32> {
    let units = layout.from_degrees(float(key, value)?);
    u32::try_from(units)
        .ok()
        .filter(|units| *units != MISSING_U32)
        .ok_or_else(|| Error::invalid(key, "out of range"))
}

fn with_date(time: &DateTime<Utc>, date: i64) -> Result<DateTime<Utc>> {
    let (year, month, day) = (date / 10000, date / 100 % 100, date % 100);
    i32::try_from(year).ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month as u32, day as u32))
        .filter(|_| (0..=99_991_231).contains(&date) && year <= u16::MAX as i64)
        .map(|date| Utc.from_utc_datetime(&date.and_time(time.time())))
        .ok_or_else(|| Error::invalid(Key::DataDate, format!("{} is not a YYYYMMDD date", date)))
}

fn with_time(time: &DateTime<Utc>, hhmm: i64) -> Result<DateTime<Utc>> {
    NaiveTime::from_hms_opt((hhmm / 100) as u32, (hhmm % 100) as u32, 0)
        .filter(|_| (0..2400).contains(&hhmm))
        .map(|t| Utc.from_utc_datetime(&time.date_naive().and_time(t)))
        .ok_or_else(|| Error::invalid(Key::DataTime, format!("{} is not a HHMM time", hhmm)))
}

impl Display for MessageRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = |key: Key| self.get(key).map_or_else(|_| String::from("unknown"), |v| v.to_string());

        write!(f, "{}:{}:{} ({}):{}:{}:level {}:",
               self.index,
               text(Key::Name),
               text(Key::Units),
               text(Key::StepType),
               text(Key::TypeOfGrid),
               text(Key::TypeOfLevel),
               text(Key::Level))?;

        match self.stamp(Key::StepRange) {
            Ok(stamp) => write!(f, "{}", stamp),
            Err(_) => write!(f, "fcst time unknown:from {}", self.message.identification.ref_time.format("%Y%m%d%H%M")),
        }
    }
}
