use crate::clock::TickClock;
use crate::format::RecordFormat;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Consumer hook for finished records. When unset, records accumulate in an
/// internal queue drained by [RecordEncoder::pop].
pub type RecordCallback = Box<dyn FnMut(Bytes) + Send>;

/// A borrowed block of typed input samples.
#[derive(Clone, Copy, Debug)]
pub enum SampleSlice<'a> {
    Int16(&'a [i16]),
    Int(&'a [i32]),
    Float(&'a [f32]),
    Double(&'a [f64]),
}

impl SampleSlice<'_> {
    pub fn len(&self) -> usize {
        match self {
            SampleSlice::Int16(s) => s.len(),
            SampleSlice::Int(s) => s.len(),
            SampleSlice::Float(s) => s.len(),
            SampleSlice::Double(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get_i32(&self, index: usize) -> i32 {
        match self {
            SampleSlice::Int16(s) => s[index].into(),
            SampleSlice::Int(s) => s[index],
            SampleSlice::Float(s) => s[index] as i32,
            SampleSlice::Double(s) => s[index] as i32,
        }
    }

    pub(crate) fn get_f64(&self, index: usize) -> f64 {
        match self {
            SampleSlice::Int16(s) => s[index].into(),
            SampleSlice::Int(s) => s[index].into(),
            SampleSlice::Float(s) => s[index].into(),
            SampleSlice::Double(s) => s[index],
        }
    }
}

/// One record encoder bound to a channel format and a tick clock.
pub trait RecordEncoder: Send {
    /// Re-anchors the clock; pending state is unaffected, so callers flush
    /// across real gaps first.
    fn set_time(&mut self, time: DateTime<Utc>);

    /// Timestamp of the next sample to arrive.
    fn current_time(&self) -> DateTime<Utc>;

    /// Whether a timestamp deviation stays within half a sample period.
    fn contiguous(&self, delta: Duration) -> bool;

    /// Timing quality (0..=100) stamped into blockette 1001; negative means
    /// unknown.
    fn set_timing_quality(&mut self, quality: i32);

    /// Consumes a block of samples, emitting records as they fill.
    fn push(&mut self, samples: SampleSlice<'_>);

    /// Drains buffered state and finalizes the partial record, if any.
    fn flush(&mut self);

    /// Pops the next finished record from the internal queue.
    fn pop(&mut self) -> Option<Bytes>;

    /// Routes finished records to `callback` instead of the internal queue.
    fn set_record_callback(&mut self, callback: RecordCallback);
}

/// Bookkeeping shared by all record encoders: format, clock, timing quality
/// and the emitted-record queue.
pub(crate) struct EncoderCore {
    pub format: RecordFormat,
    pub clock: TickClock,
    pub timing_quality: i32,
    queue: VecDeque<Bytes>,
    callback: Option<RecordCallback>,
}

impl EncoderCore {
    pub fn new(format: RecordFormat, freqn: u32, freqd: u32) -> Self {
        Self {
            format,
            clock: TickClock::new(freqn, freqd),
            timing_quality: -1,
            queue: VecDeque::new(),
            callback: None,
        }
    }

    pub fn emit(&mut self, record: Vec<u8>) {
        let record = Bytes::from(record);
        match &mut self.callback {
            Some(callback) => callback(record),
            None => self.queue.push_back(record),
        }
    }

    pub fn pop(&mut self) -> Option<Bytes> {
        self.queue.pop_front()
    }

    pub fn set_callback(&mut self, callback: RecordCallback) {
        self.callback = Some(callback);
    }
}
