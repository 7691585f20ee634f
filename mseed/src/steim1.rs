use crate::encoder::{EncoderCore, RecordCallback, RecordEncoder, SampleSlice};
use crate::format::{RecordFormat, SampleEncoding};
use crate::steim::{wrapped_sum, SteimPacket};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};

/// Streaming Steim1 compressor.
///
/// Per sample word: four 8-bit, two 16-bit or one 32-bit difference. The
/// caller is responsible for choosing Steim1 only when the signal fits; the
/// 32-bit difference word cannot represent full-range deltas between extreme
/// samples.
pub struct Steim1 {
    core: EncoderCore,
    packet: Option<SteimPacket>,
    buf: [i32; 5],
    bp: usize,
    spw: usize,
    last_sample: i32,
}

impl Steim1 {
    pub fn new(mut format: RecordFormat, freqn: u32, freqd: u32) -> Self {
        format.encoding = SampleEncoding::Steim1;
        Self {
            core: EncoderCore::new(format, freqn, freqd),
            packet: None,
            buf: [0; 5],
            bp: 0,
            spw: 4,
            last_sample: 0,
        }
    }

    fn update_spw(&mut self, index: usize) {
        let d = self.buf[index];
        let spw = if !(-32768..=32767).contains(&d) {
            1
        } else if !(-128..=127).contains(&d) {
            2
        } else {
            4
        };
        if spw < self.spw {
            self.spw = spw;
        }
    }

    /// Value of the first buffered, not-yet-packed sample.
    fn pending_begin_sample(&self) -> i32 {
        self.last_sample.wrapping_sub(wrapped_sum(&self.buf[1..self.bp]))
    }

    /// Value of the last sample already packed into the current record.
    fn pending_end_sample(&self) -> i32 {
        self.last_sample.wrapping_sub(wrapped_sum(&self.buf[..self.bp]))
    }

    fn store(&mut self) {
        if self.packet.is_none() {
            let begin = self.pending_begin_sample();
            self.packet = Some(SteimPacket::start(&mut self.core, self.bp, begin));
        }

        let (word, code, packed) = match self.spw {
            4 => (
                (self.buf[0] as u32 & 0xff) << 24
                    | (self.buf[1] as u32 & 0xff) << 16
                    | (self.buf[2] as u32 & 0xff) << 8
                    | (self.buf[3] as u32 & 0xff),
                1,
                4,
            ),
            2 => (
                (self.buf[0] as u32 & 0xffff) << 16 | (self.buf[1] as u32 & 0xffff),
                2,
                2,
            ),
            _ => (self.buf[0] as u32, 3, 1),
        };

        let mut full = false;
        if let Some(packet) = self.packet.as_mut() {
            full = packet.store_word(&self.core.format, word, code, packed);
        }

        self.buf.copy_within(packed..self.bp, 0);
        self.bp -= packed;
        self.spw = 4;
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

impl RecordEncoder for Steim1 {
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
