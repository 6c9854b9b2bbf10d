use crate::grib::Result;
use crate::grib::utils::{Buffer, BufferWriter};

pub(crate) const MISSING_U32: u32 = u32::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridDefinition {
    pub source: u8,
    /// Number of data points
    pub num_points: usize,
    pub optional_num_list_size: u8,
    pub optional_num_list_interpretation: u8,
    /// Grid Definition Template Number
    pub template_number: u16,
    pub grid: Grid,
    /// Optional list of numbers (points per row for reduced grids), kept verbatim
    pub optional_num_list: Vec<u8>,
}

impl GridDefinition {
    pub(crate) fn write(&self) -> Vec<u8> {
        let mut out = BufferWriter::new();
        out.write(self.source)
            .write(self.num_points as u32)
            .write(self.optional_num_list_size)
            .write(self.optional_num_list_interpretation)
            .write(self.template_number);
        self.grid.write(&mut out);
        out.write_bytes(&self.optional_num_list);
        out.into_section(3)
    }

    /// Code table 3.1 short name, as used by the `typeOfGrid` key.
    pub fn type_of_grid(&self) -> &'static str {
        match (self.template_number, &self.grid) {
            (0, _) => "regular_ll",
            (1, _) => "rotated_ll",
            (10, _) => "mercator",
            (20, _) => "polar_stereographic",
            (30, _) => "lambert",
            (40, Grid::Grid40(grid)) if grid.layout.is_reduced() => "reduced_gg",
            (40, _) => "regular_gg",
            (90, _) => "space_view",
            _ => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Grid {
    Grid0(Grid0),
    Grid40(Grid40),
    Unknown(Vec<u8>),
}

impl Grid {
    pub(crate) fn from_template(template_number: u16, bytes: Vec<u8>) -> Result<Self> {

        match template_number {
            0 => {
                let mut buf = Buffer::new(bytes);
                let layout = GridLayout::parse(&mut buf)?;
                let d_j = buf.read()?;
                Ok(Grid::Grid0(Grid0 {
                    layout: layout.with_scanning_mode(buf.read()?),
                    d_j,
                }))
            },
            40 => {
                let mut buf = Buffer::new(bytes);
                let layout = GridLayout::parse(&mut buf)?;
                let n = buf.read()?;
                Ok(Grid::Grid40(Grid40 {
                    layout: layout.with_scanning_mode(buf.read()?),
                    n,
                }))
            },
            _ => {
                Ok(Grid::Unknown(bytes))
            }
        }
    }

    fn write(&self, out: &mut BufferWriter) {
        match self {
            Grid::Grid0(grid) => {
                grid.layout.write(out);
                out.write(grid.d_j).write(grid.layout.scanning_mode);
            }
            Grid::Grid40(grid) => {
                grid.layout.write(out);
                out.write(grid.n).write(grid.layout.scanning_mode);
            }
            Grid::Unknown(bytes) => {
                out.write_bytes(bytes);
            }
        }
    }

    pub fn layout(&self) -> Option<&GridLayout> {
        match self {
            Grid::Grid0(grid) => Some(&grid.layout),
            Grid::Grid40(grid) => Some(&grid.layout),
            Grid::Unknown(_) => None,
        }
    }

    pub(crate) fn layout_mut(&mut self) -> Option<&mut GridLayout> {
        match self {
            Grid::Grid0(grid) => Some(&mut grid.layout),
            Grid::Grid40(grid) => Some(&mut grid.layout),
            Grid::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScaledValue {
    pub scale: u8,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BasicAngle {
    pub basic_angle: u32,
    pub basic_angle_sub: u32,
}

impl BasicAngle {
    /// Size in degrees of one unit of the grid's angle fields.
    pub fn unit(&self) -> f64 {
        match (self.basic_angle, self.basic_angle_sub) {
            (0, _) | (MISSING_U32, _) | (_, 0) | (_, MISSING_U32) => 1e-6,
            (angle, sub) => angle as f64 / sub as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridHeader {
    pub earth_shape: u8,
    pub spherical_radius: ScaledValue,
    pub major_axis: ScaledValue,
    pub minor_axis: ScaledValue,
}

/// Octets 15-72 shared by templates 3.0 and 3.40; octets 68-71 differ
/// (`Dj` on 3.0, `N` on 3.40) and live on the template structs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridLayout {
    pub header: GridHeader,
    pub n_i: u32,
    pub n_j: u32,
    pub initial_prod_basic_angle: BasicAngle,
    pub la1: i32,
    pub lo1: i32,
    pub resolution_and_component_flags: u8,
    pub la2: i32,
    pub lo2: i32,
    pub d_i: u32,
    pub scanning_mode: u8,
}

impl GridLayout {
    fn parse(buf: &mut Buffer) -> Result<Self> {
        Ok(GridLayout {
            header: GridHeader {
                earth_shape: buf.read()?,
                spherical_radius: ScaledValue { scale: buf.read()?, value: buf.read()? },
                major_axis: ScaledValue { scale: buf.read()?, value: buf.read()? },
                minor_axis: ScaledValue { scale: buf.read()?, value: buf.read()? },
            },
            n_i: buf.read()?,
            n_j: buf.read()?,
            initial_prod_basic_angle: BasicAngle { basic_angle: buf.read()?, basic_angle_sub: buf.read()? },
            la1: buf.read_grib_int::<u32, i32>()?,
            lo1: buf.read_grib_int::<u32, i32>()?,
            resolution_and_component_flags: buf.read()?,
            la2: buf.read_grib_int::<u32, i32>()?,
            lo2: buf.read_grib_int::<u32, i32>()?,
            d_i: buf.read()?,
            scanning_mode: 0,
        })
    }

    fn with_scanning_mode(self, scanning_mode: u8) -> Self {
        Self { scanning_mode, ..self }
    }

    fn write(&self, out: &mut BufferWriter) {
        out.write(self.header.earth_shape)
            .write(self.header.spherical_radius.scale)
            .write(self.header.spherical_radius.value)
            .write(self.header.major_axis.scale)
            .write(self.header.major_axis.value)
            .write(self.header.minor_axis.scale)
            .write(self.header.minor_axis.value)
            .write(self.n_i)
            .write(self.n_j)
            .write(self.initial_prod_basic_angle.basic_angle)
            .write(self.initial_prod_basic_angle.basic_angle_sub)
            .write_grib_int::<i32, u32>(self.la1)
            .write_grib_int::<i32, u32>(self.lo1)
            .write(self.resolution_and_component_flags)
            .write_grib_int::<i32, u32>(self.la2)
            .write_grib_int::<i32, u32>(self.lo2)
            .write(self.d_i);
    }

    /// Reduced grids leave `Ni` missing and list the points per row instead.
    pub fn is_reduced(&self) -> bool {
        self.n_i == MISSING_U32
    }

    pub fn to_degrees(&self, value: i64) -> f64 {
        value as f64 * self.initial_prod_basic_angle.unit()
    }

    pub fn from_degrees(&self, degrees: f64) -> i64 {
        (degrees / self.initial_prod_basic_angle.unit()).round() as i64
    }

    /// Points of row `i` scan in the negative direction (flag bit 1).
    pub fn i_scans_negatively(&self) -> bool {
        self.scanning_mode & 0x80 != 0
    }

    /// Rows scan from south to north (flag bit 2).
    pub fn j_scans_positively(&self) -> bool {
        self.scanning_mode & 0x40 != 0
    }

    /// Adjacent points in `j` are consecutive (flag bit 3).
    pub fn j_consecutive(&self) -> bool {
        self.scanning_mode & 0x20 != 0
    }
}

///Grid Definition Template 3.0: Latitude/longitude (or equidistant cylindrical, or Plate Carree)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grid0 {
    pub layout: GridLayout,
    pub d_j: u32,
}

///Grid Definition Template 3.40: Gaussian latitude/longitude
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grid40 {
    pub layout: GridLayout,
    /// Number of parallels between a pole and the equator
    pub n: u32,
}
