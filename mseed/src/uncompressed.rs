use crate::encoder::{EncoderCore, RecordCallback, RecordEncoder, SampleSlice};
use crate::format::{RecordFormat, SampleEncoding};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};

/// Storage type of an uncompressed record's data region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleKind {
    Int16,
    Int32,
    Float32,
    Float64,
}

impl SampleKind {
    fn width(self) -> usize {
        match self {
            SampleKind::Int16 => 2,
            SampleKind::Int32 | SampleKind::Float32 => 4,
            SampleKind::Float64 => 8,
        }
    }

    fn encoding(self) -> SampleEncoding {
        match self {
            SampleKind::Int16 => SampleEncoding::Int16,
            SampleKind::Int32 => SampleEncoding::Int32,
            SampleKind::Float32 => SampleEncoding::Float32,
            SampleKind::Float64 => SampleEncoding::Float64,
        }
    }
}

/// Packs samples verbatim in the record's byte order; a record is finalized
/// when its data region fills up or on [flush](RecordEncoder::flush).
pub struct Uncompressed {
    core: EncoderCore,
    kind: SampleKind,
    current: Option<(Vec<u8>, usize, usize)>,
    sample_count: usize,
}

impl Uncompressed {
    pub fn new(mut format: RecordFormat, kind: SampleKind, freqn: u32, freqd: u32) -> Self {
        format.encoding = kind.encoding();
        Self {
            core: EncoderCore::new(format, freqn, freqd),
            kind,
            current: None,
            sample_count: 0,
        }
    }

    fn begin_record(&mut self) {
        let time = self.core.clock.time_of(0);
        self.current = Some(self.core.format.new_record(time, self.core.timing_quality));
        self.sample_count = 0;
    }

    fn finalize(&mut self) {
        if let Some((mut buf, _, _)) = self.current.take() {
            self.core.format.finish_record(&mut buf, self.sample_count, 1);
            self.core.emit(buf);
        }
        self.sample_count = 0;
    }
}

impl RecordEncoder for Uncompressed {
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
        let width = self.kind.width();

        for i in 0..samples.len() {
            let full = match &self.current {
                None => true,
                Some((_, _, data_len)) => self.sample_count * width >= *data_len,
            };
            if full {
                self.finalize();
                self.begin_record();
            }

            if let Some((buf, data_offset, _)) = &mut self.current {
                let offset = *data_offset + self.sample_count * width;
                match self.kind {
                    SampleKind::Int16 => {
                        self.core
                            .format
                            .put_i16(buf, offset, samples.get_i32(i) as i16)
                    }
                    SampleKind::Int32 => self.core.format.put_i32(buf, offset, samples.get_i32(i)),
                    SampleKind::Float32 => {
                        self.core
                            .format
                            .put_f32(buf, offset, samples.get_f64(i) as f32)
                    }
                    SampleKind::Float64 => self.core.format.put_f64(buf, offset, samples.get_f64(i)),
                }
            }

            self.sample_count += 1;
            self.core.clock.tick();
        }
    }

    fn flush(&mut self) {
        self.finalize();
    }

    fn pop(&mut self) -> Option<Bytes> {
        self.core.pop()
    }

    fn set_record_callback(&mut self, callback: RecordCallback) {
        self.core.set_callback(callback);
    }
}
