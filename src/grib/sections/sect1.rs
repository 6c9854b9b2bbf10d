use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use crate::grib::{GribError, Result};
use crate::grib::utils::{Buffer, BufferWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    /// Identification of originating/generating centre (see Common Code Table C-1)
    pub centre_id: u16,
    /// Identification of originating/generating sub-centre (allocated by originating/ generating centre)
    pub subcentre_id: u16,
    /// GRIB Master Tables Version Number (see Code Table 1.0)
    pub master_table_version: u8,
    /// GRIB Local Tables Version Number (see Code Table 1.1)
    pub local_table_version: u8,
    /// Significance of Reference Time (see Code Table 1.2)
    pub ref_time_significance: u8,
    /// Reference time of data
    pub ref_time: DateTime<Utc>,
    /// Production status of processed data in this GRIB message
    /// (see Code Table 1.3)
    pub prod_status: u8,
    /// Type of processed data in this GRIB message (see Code Table 1.4)
    pub data_type: u8,
    /// Octets after 21, kept verbatim
    pub reserved: Vec<u8>,
}

impl Identification {
    pub(crate) fn parse(body: Vec<u8>) -> Result<Self> {
        let mut buf = Buffer::new(body);

        let centre_id = buf.read()?;
        let subcentre_id = buf.read()?;
        let master_table_version = buf.read()?;
        let local_table_version = buf.read()?;
        let ref_time_significance = buf.read()?;
        let ref_time = read_date_time(&mut buf)?;
        let prod_status = buf.read()?;
        let data_type = buf.read()?;

        Ok(Identification {
            centre_id,
            subcentre_id,
            master_table_version,
            local_table_version,
            ref_time_significance,
            ref_time,
            prod_status,
            data_type,
            reserved: buf.remaining().to_vec(),
        })
    }

    pub(crate) fn write(&self) -> Vec<u8> {
        let mut out = BufferWriter::new();
        out.write(self.centre_id)
            .write(self.subcentre_id)
            .write(self.master_table_version)
            .write(self.local_table_version)
            .write(self.ref_time_significance);
        write_date_time(&mut out, &self.ref_time);
        out.write(self.prod_status)
            .write(self.data_type)
            .write_bytes(&self.reserved);
        out.into_section(1)
    }
}

/// Year (2 octets), month, day, hour, minute, second.
pub(crate) fn read_date_time(buf: &mut Buffer) -> Result<DateTime<Utc>> {
    let year: u16 = buf.read()?;
    let (month, day, hour, minute, second): (u8, u8, u8, u8, u8) =
        (buf.read()?, buf.read()?, buf.read()?, buf.read()?, buf.read()?);

    Utc.with_ymd_and_hms(year.into(), month.into(), day.into(), hour.into(), minute.into(), second.into())
        .single()
        .ok_or_else(|| GribError::MalformedMessage(format!(
            "invalid date {:04}-{:02}-{:02} {:02}:{:02}:{:02}", year, month, day, hour, minute, second
        )))
}

pub(crate) fn write_date_time(out: &mut BufferWriter, time: &DateTime<Utc>) {
    out.write(time.year() as u16)
        .write(time.month() as u8)
        .write(time.day() as u8)
        .write(time.hour() as u8)
        .write(time.minute() as u8)
        .write(time.second() as u8);
}
