use crate::grib::{GribError, Result};
use crate::grib::utils::BufferWriter;

pub(crate) const BITMAP_PRESENT: u8 = 0;
pub(crate) const BITMAP_ABSENT: u8 = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMap {
    /// Bit-map indicator (see Code Table 6.0)
    pub bitmap_indicator: u8,
    pub bitmap: Vec<u8>,
}

impl BitMap {
    pub(crate) fn absent() -> Self {
        Self { bitmap_indicator: BITMAP_ABSENT, bitmap: Vec::new() }
    }

    /// One bit per grid point, set where a value is present.
    pub(crate) fn from_presence(present: impl ExactSizeIterator<Item = bool>) -> Self {
        let mut bitmap = vec![0_u8; (present.len() + 7) / 8];
        for (i, is_present) in present.enumerate() {
            if is_present {
                bitmap[i / 8] |= 0x80 >> (i % 8);
            }
        }
        Self { bitmap_indicator: BITMAP_PRESENT, bitmap }
    }

    pub(crate) fn write(&self) -> Vec<u8> {
        let mut out = BufferWriter::new();
        out.write(self.bitmap_indicator).write_bytes(&self.bitmap);
        out.into_section(6)
    }

    pub fn is_present(&self) -> bool {
        self.bitmap_indicator == BITMAP_PRESENT
    }

    /// Spreads the packed values over `num_points` grid points, NaN where the bitmap is unset.
    pub(crate) fn apply(&self, packed: Vec<f64>, num_points: usize) -> Result<Vec<f64>> {
        match self.bitmap_indicator {
            BITMAP_ABSENT => {
                if packed.len() != num_points {
                    return Err(GribError::MalformedMessage(format!(
                        "{} packed values for {} grid points", packed.len(), num_points
                    )));
                }
                Ok(packed)
            }
            BITMAP_PRESENT => {
                if self.bitmap.len() * 8 < num_points {
                    return Err(GribError::MalformedMessage(format!(
                        "bitmap covers {} points, grid has {}", self.bitmap.len() * 8, num_points
                    )));
                }
                let mut packed = packed.into_iter();
                let mut values = Vec::with_capacity(num_points);
                for i in 0..num_points {
                    if self.bitmap[i / 8] & (0x80 >> (i % 8)) != 0 {
                        let value = packed.next().ok_or_else(|| GribError::MalformedMessage(
                            String::from("bitmap marks more points than were packed")
                        ))?;
                        values.push(value);
                    } else {
                        values.push(f64::NAN);
                    }
                }
                Ok(values)
            }
            n => Err(GribError::UnsupportedTemplate { section: 6, template: n.into() }),
        }
    }
}
