use crate::errors::{MseedError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{DateTime, Datelike, Timelike, Utc};

/// Fixed section of the data header.
pub(crate) const HEADER_LEN: usize = 48;
/// Blockette 1000 and 1001 are eight bytes each including their headers.
pub(crate) const BLOCKETTE_LEN: usize = 8;
/// Data frames start at the next 64-byte boundary after the blockettes.
pub(crate) const DATA_OFFSET: usize =
    (HEADER_LEN + 2 * BLOCKETTE_LEN + 63) & !63;

/// SEED data encoding codes (blockette 1000, field 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleEncoding {
    Ascii = 0,
    Int16 = 1,
    Int32 = 3,
    Float32 = 4,
    Float64 = 5,
    Steim1 = 10,
    Steim2 = 11,
}

/// Channel identity and record geometry shared by all encoders.
#[derive(Clone, Debug)]
pub struct RecordFormat {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub sample_rate_factor: i16,
    pub sample_rate_multiplier: i16,
    pub record_size_exp: u8,
    pub big_endian: bool,
    pub encoding: SampleEncoding,
}

impl RecordFormat {
    /// Builds a format for the given channel codes and rational sample rate.
    ///
    /// The SEED header stores the rate as a factor/multiplier pair: integer
    /// rates as `(freqn / freqd, 1)`, integer periods as `(-freqd / freqn,
    /// 1)` and everything else as `(-freqd, freqn)`.
    pub fn new(
        network: &str,
        station: &str,
        location: &str,
        channel: &str,
        freqn: u32,
        freqd: u32,
    ) -> Self {
        let (factor, multiplier) = if freqn == 0 || freqd == 0 {
            (0, 0)
        } else if freqn % freqd == 0 {
            ((freqn / freqd) as i16, 1)
        } else if freqd % freqn == 0 {
            (-((freqd / freqn) as i16), 1)
        } else {
            (-(freqd as i16), freqn as i16)
        };

        Self {
            network: network.to_owned(),
            station: station.to_owned(),
            location: location.to_owned(),
            channel: channel.to_owned(),
            sample_rate_factor: factor,
            sample_rate_multiplier: multiplier,
            record_size_exp: 9,
            big_endian: true,
            encoding: SampleEncoding::Steim2,
        }
    }

    pub fn record_len(&self) -> usize {
        1 << self.record_size_exp
    }

    pub fn set_record_size_exp(&mut self, exp: u8) -> Result<()> {
        if !(7..=20).contains(&exp) {
            return Err(MseedError::InvalidRecordSize(exp));
        }
        self.record_size_exp = exp;
        Ok(())
    }

    /// Allocates a zeroed record and fills the fixed header, blockette 1000
    /// and, when a timing quality or a microsecond remainder is present,
    /// blockette 1001.
    ///
    /// Returns the buffer and the extent of its data region.
    pub(crate) fn new_record(
        &self,
        time: DateTime<Utc>,
        timing_quality: i32,
    ) -> (Vec<u8>, usize, usize) {
        let len = self.record_len();
        let mut buf = vec![0u8; len];

        let micros = time.timestamp_subsec_micros();
        let fract = (micros / 100) as u16;
        let micro_remainder = (micros % 100) as u8;

        buf[0..6].fill(b'0');
        buf[6] = b'D';
        buf[7] = b' ';
        fill_code(&mut buf[8..13], &self.station);
        fill_code(&mut buf[13..15], &self.location);
        fill_code(&mut buf[15..18], &self.channel);
        fill_code(&mut buf[18..20], &self.network);

        self.put_u16(&mut buf, 20, time.year() as u16);
        self.put_u16(&mut buf, 22, time.ordinal() as u16);
        buf[24] = time.hour() as u8;
        buf[25] = time.minute() as u8;
        buf[26] = time.second() as u8;
        buf[27] = 0;
        self.put_u16(&mut buf, 28, fract);
        self.put_u16(&mut buf, 30, 0); // sample count, patched on finish
        self.put_i16(&mut buf, 32, self.sample_rate_factor);
        self.put_i16(&mut buf, 34, self.sample_rate_multiplier);
        // activity, io and data quality flags stay zero
        buf[39] = 1; // blockette count
        self.put_i32(&mut buf, 40, 0); // time correction
        self.put_u16(&mut buf, 44, DATA_OFFSET as u16);
        self.put_u16(&mut buf, 46, HEADER_LEN as u16);

        // Blockette 1000
        let b1000 = HEADER_LEN;
        self.put_u16(&mut buf, b1000, 1000);
        self.put_u16(&mut buf, b1000 + 2, 0);
        buf[b1000 + 4] = self.encoding as u8;
        buf[b1000 + 5] = u8::from(self.big_endian);
        buf[b1000 + 6] = self.record_size_exp;
        buf[b1000 + 7] = 0;

        if timing_quality >= 0 || micro_remainder > 0 {
            let b1001 = b1000 + BLOCKETTE_LEN;
            self.put_u16(&mut buf, b1000 + 2, b1001 as u16);
            buf[39] = 2;

            self.put_u16(&mut buf, b1001, 1001);
            self.put_u16(&mut buf, b1001 + 2, 0);
            buf[b1001 + 4] = timing_quality.clamp(0, 100) as u8;
            buf[b1001 + 5] = micro_remainder;
            buf[b1001 + 6] = 0;
            buf[b1001 + 7] = 0; // frame count, patched on finish
        }

        (buf, DATA_OFFSET, len - DATA_OFFSET)
    }

    /// Patches the volatile header fields once a record is complete.
    pub(crate) fn finish_record(&self, buf: &mut [u8], samples: usize, frames: usize) {
        buf[0..6].fill(b'0');
        buf[6] = b'D';
        self.put_u16(buf, 30, samples as u16);

        let next = self.get_u16(buf, HEADER_LEN + 2) as usize;
        if next != 0 {
            buf[next + 7] = frames as u8;
        }
    }

    pub(crate) fn put_u16(&self, buf: &mut [u8], offset: usize, value: u16) {
        if self.big_endian {
            BigEndian::write_u16(&mut buf[offset..], value);
        } else {
            LittleEndian::write_u16(&mut buf[offset..], value);
        }
    }

    pub(crate) fn put_i16(&self, buf: &mut [u8], offset: usize, value: i16) {
        self.put_u16(buf, offset, value as u16);
    }

    pub(crate) fn put_u32(&self, buf: &mut [u8], offset: usize, value: u32) {
        if self.big_endian {
            BigEndian::write_u32(&mut buf[offset..], value);
        } else {
            LittleEndian::write_u32(&mut buf[offset..], value);
        }
    }

    pub(crate) fn put_i32(&self, buf: &mut [u8], offset: usize, value: i32) {
        self.put_u32(buf, offset, value as u32);
    }

    pub(crate) fn put_u64(&self, buf: &mut [u8], offset: usize, value: u64) {
        if self.big_endian {
            BigEndian::write_u64(&mut buf[offset..], value);
        } else {
            LittleEndian::write_u64(&mut buf[offset..], value);
        }
    }

    pub(crate) fn put_f32(&self, buf: &mut [u8], offset: usize, value: f32) {
        self.put_u32(buf, offset, value.to_bits());
    }

    pub(crate) fn put_f64(&self, buf: &mut [u8], offset: usize, value: f64) {
        self.put_u64(buf, offset, value.to_bits());
    }

    pub(crate) fn get_u16(&self, buf: &[u8], offset: usize) -> u16 {
        if self.big_endian {
            BigEndian::read_u16(&buf[offset..])
        } else {
            LittleEndian::read_u16(&buf[offset..])
        }
    }
}

fn fill_code(slot: &mut [u8], code: &str) {
    let bytes = code.as_bytes();
    let n = bytes.len().min(slot.len());
    slot[..n].copy_from_slice(&bytes[..n]);
    slot[n..].fill(b' ');
}

/// Continued-fraction approximation of a sampling rate as `num / den`.
///
/// Returns `None` when the value cannot be approximated within `epsilon`
/// without overflowing 32-bit terms.
pub fn rational_approximation(value: f64) -> Option<(u32, u32)> {
    rational_approximation_with(value, 1e-5, 100)
}

pub(crate) fn rational_approximation_with(
    value: f64,
    epsilon: f64,
    max_iterations: u32,
) -> Option<(u32, u32)> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    let overflow = i64::from(i32::MAX);
    let mut r0 = value;
    let mut a0 = r0 as i64;
    if a0.abs() > overflow {
        return None;
    }

    if (a0 as f64 - value).abs() < epsilon {
        return Some((a0 as u32, 1));
    }

    let mut p0: i64 = 1;
    let mut q0: i64 = 0;
    let mut p1 = a0;
    let mut q1: i64 = 1;
    let mut p2: i64;
    let mut q2: i64;

    let mut n = 0;
    loop {
        n += 1;
        let r1 = 1.0 / (r0 - a0 as f64);
        let a1 = r1 as i64;
        p2 = a1 * p1 + p0;
        q2 = a1 * q1 + q0;
        if p2.abs() > overflow || q2.abs() > overflow {
            return None;
        }

        let convergent = p2 as f64 / q2 as f64;
        if n < max_iterations && (convergent - value).abs() > epsilon && q2 < overflow {
            p0 = p1;
            p1 = p2;
            q0 = q1;
            q1 = q2;
            a0 = a1;
            r0 = r1;
        } else {
            break;
        }
    }

    if n >= max_iterations {
        return None;
    }

    if q2 < overflow {
        Some((p2 as u32, q2 as u32))
    } else {
        Some((p1 as u32, q1 as u32))
    }
}
