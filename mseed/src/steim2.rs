use crate::encoder::{EncoderCore, RecordCallback, RecordEncoder, SampleSlice};
use crate::format::{RecordFormat, SampleEncoding};
use crate::steim::{pack_bits, wrapped_sum, SteimPacket};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use log::warn;

/// Largest difference representable in a 30-bit Steim2 word.
const CLIP: i32 = 536_870_911;

/// Streaming Steim2 compressor.
///
/// Per sample word: four 8-bit differences (code `01`), one 30-bit, two
/// 15-bit or three 10-bit (code `10`, sub-coded by the top two bits inside
/// the word), or five 6-bit, six 5-bit, seven 4-bit (code `11`, sub-coded).
/// Differences beyond the 30-bit range are clipped with a warning.
pub struct Steim2 {
    core: EncoderCore,
    packet: Option<SteimPacket>,
    buf: [i32; 8],
    bp: usize,
    spw: usize,
    last_sample: i32,
}

impl Steim2 {
    pub fn new(mut format: RecordFormat, freqn: u32, freqd: u32) -> Self {
        format.encoding = SampleEncoding::Steim2;
        Self {
            core: EncoderCore::new(format, freqn, freqd),
            packet: None,
            buf: [0; 8],
            bp: 0,
            spw: 7,
            last_sample: 0,
        }
    }

    fn update_spw(&mut self, index: usize) {
        let d = &mut self.buf[index];
        if *d > CLIP {
            warn!("Steim2: difference {} clipped to {}", *d, CLIP);
            *d = CLIP;
        } else if *d < -CLIP {
            warn!("Steim2: difference {} clipped to {}", *d, -CLIP);
            *d = -CLIP;
        }

        let d = *d;
        let spw = if !(-16384..=16383).contains(&d) {
            1
        } else if !(-512..=511).contains(&d) {
            2
        } else if !(-128..=127).contains(&d) {
            3
        } else if !(-32..=31).contains(&d) {
            4
        } else if !(-16..=15).contains(&d) {
            5
        } else if !(-8..=7).contains(&d) {
            6
        } else {
            7
        };
        if spw < self.spw {
            self.spw = spw;
        }
    }

    fn pending_begin_sample(&self) -> i32 {
        self.last_sample.wrapping_sub(wrapped_sum(&self.buf[1..self.bp]))
    }

    fn pending_end_sample(&self) -> i32 {
        self.last_sample.wrapping_sub(wrapped_sum(&self.buf[..self.bp]))
    }

    fn store(&mut self) {
        if self.packet.is_none() {
            let begin = self.pending_begin_sample();
            self.packet = Some(SteimPacket::start(&mut self.core, self.bp, begin));
        }

        let (word, code, packed) = match self.spw {
            7 => ((2 << 30) | pack_bits(&self.buf[..7], 4), 3, 7),
            6 => ((1 << 30) | pack_bits(&self.buf[..6], 5), 3, 6),
            5 => (pack_bits(&self.buf[..5], 6), 3, 5),
            4 => (pack_bits(&self.buf[..4], 8), 1, 4),
            3 => ((3 << 30) | pack_bits(&self.buf[..3], 10), 2, 3),
            2 => ((2 << 30) | pack_bits(&self.buf[..2], 15), 2, 2),
            _ => ((1 << 30) | (self.buf[0] as u32 & 0x3fff_ffff), 2, 1),
        };

        let mut full = false;
        if let Some(packet) = self.packet.as_mut() {
            full = packet.store_word(&self.core.format, word, code, packed);
        }

        self.buf.copy_within(packed..self.bp, 0);
        self.bp -= packed;
        self.spw = 7;
        for i in 0..self.bp {
            self.update_spw(i);
        }

        if full {
            self.finish_packet();
        }
    }

    fn finish_packet(&mut self) {
        if let Some(packet) = self.packet.take() {
            let end = self.pending_end_sample();
            let record = packet.finish(&self.core.format, end);
            self.core.emit(record);
        }
    }
}

impl RecordEncoder for Steim2 {
    fn set_time(&mut self, time: DateTime<Utc>) {
        self.core.clock.set_time(time);
    }

    fn current_time(&self) -> DateTime<Utc> {
        self.core.clock.time_of(0)
    }

    fn contiguous(&self, delta: Duration) -> bool {
        self.core.clock.contiguous(delta)
    }

    fn set_timing_quality(&mut self, quality: i32) {
        self.core.timing_quality = quality;
    }

    fn push(&mut self, samples: SampleSlice<'_>) {
        for i in 0..samples.len() {
            let sample = samples.get_i32(i);
            self.buf[self.bp] = sample.wrapping_sub(self.last_sample);
            self.last_sample = sample;
            self.bp += 1;
            self.core.clock.tick();
            self.update_spw(self.bp - 1);

            while self.bp >= self.spw {
                self.store();
            }
        }
    }

    fn flush(&mut self) {
        while self.bp > 0 {
            if self.spw > self.bp {
                self.spw = self.bp;
            }
            self.store();
        }
        self.finish_packet();
    }

    fn pop(&mut self) -> Option<Bytes> {
        self.core.pop()
    }

    fn set_record_callback(&mut self, callback: RecordCallback) {
        self.core.set_callback(callback);
    }
}
