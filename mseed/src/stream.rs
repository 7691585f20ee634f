use crate::encoder::{RecordEncoder, SampleSlice};
use crate::errors::{MseedError, Result};
use crate::format::{rational_approximation, RecordFormat};
use crate::steim1::Steim1;
use crate::steim2::Steim2;
use crate::uncompressed::{SampleKind, Uncompressed};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::VecDeque;

/// Compression applied to the data region of emitted records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    Identity,
    Steim1,
    #[default]
    Steim2,
}

/// Typed sample payload of one input block.
#[derive(Clone, Debug)]
pub enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl Samples {
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn as_slice(&self) -> SampleSlice<'_> {
        match self {
            Samples::Int(s) => SampleSlice::Int(s),
            Samples::Float(s) => SampleSlice::Float(s),
            Samples::Double(s) => SampleSlice::Double(s),
        }
    }

    fn kind(&self) -> DataKind {
        match self {
            Samples::Int(_) => DataKind::Int,
            Samples::Float(_) => DataKind::Float,
            Samples::Double(_) => DataKind::Double,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DataKind {
    Int,
    Float,
    Double,
}

/// One contiguous block of samples from the acquisition chain.
#[derive(Clone, Debug)]
pub struct SampleBlock {
    pub start_time: DateTime<Utc>,
    pub sampling_frequency: f64,
    /// Timing quality 0..=100; negative when unknown.
    pub timing_quality: i32,
    pub samples: Samples,
}

/// SEED channel identity of an encoded stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamId {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl StreamId {
    pub fn new(network: &str, station: &str, location: &str, channel: &str) -> Self {
        Self {
            network: network.to_owned(),
            station: station.to_owned(),
            location: location.to_owned(),
            channel: channel.to_owned(),
        }
    }
}

/// Gap-aware front-end over the record encoders.
///
/// Consumes [SampleBlock]s for one channel and emits finished records. A
/// change of sampling rate or data type restarts the encoder; a block whose
/// start time disagrees with the running clock by more than half a sample
/// period flushes the current record and re-anchors the clock.
pub struct StreamEncoder {
    id: StreamId,
    record_size_exp: u8,
    compression: Compression,
    allow_float_compression: bool,
    big_endian: bool,
    encoder: Option<Box<dyn RecordEncoder>>,
    sampling_frequency: f64,
    kind: Option<DataKind>,
    pending: VecDeque<Bytes>,
}

impl StreamEncoder {
    pub fn new(id: StreamId) -> Self {
        Self {
            id,
            record_size_exp: 9,
            compression: Compression::default(),
            allow_float_compression: false,
            big_endian: true,
            encoder: None,
            sampling_frequency: -1.0,
            kind: None,
            pending: VecDeque::new(),
        }
    }

    /// Record size as a power-of-two exponent; applies to encoders created by
    /// later [feed](Self::feed) calls.
    pub fn set_record_size_exp(&mut self, exp: u8) -> Result<()> {
        if !(7..=20).contains(&exp) {
            return Err(MseedError::InvalidRecordSize(exp));
        }
        self.record_size_exp = exp;
        Ok(())
    }

    pub fn set_compression(&mut self, compression: Compression) {
        self.compression = compression;
    }

    pub fn set_big_endian(&mut self, big_endian: bool) {
        self.big_endian = big_endian;
    }

    /// Permits Steim compression of float and double streams. Differences
    /// are truncated to integers; disabled by default, falling back to
    /// uncompressed packing.
    pub fn allow_float_compression(&mut self, allow: bool) {
        self.allow_float_compression = allow;
    }

    /// Consumes one sample block, emitting records into the pop queue.
    pub fn feed(&mut self, block: &SampleBlock) -> Result<()> {
        if block.samples.is_empty() {
            return Ok(());
        }

        if let Some(encoder) = self.encoder.as_mut() {
            if self.sampling_frequency != block.sampling_frequency
                || self.kind != Some(block.samples.kind())
            {
                encoder.flush();
                self.retire_encoder();
            } else {
                let current = encoder.current_time();
                if current != block.start_time && !encoder.contiguous(block.start_time - current)
                {
                    debug!(
                        "{}.{}.{}.{}: gap {} -> {}, starting a new record",
                        self.id.network,
                        self.id.station,
                        self.id.location,
                        self.id.channel,
                        current,
                        block.start_time
                    );
                    encoder.flush();
                    encoder.set_time(block.start_time);
                }
            }
        }

        if self.encoder.is_none() {
            let (freqn, freqd) = rational_approximation(block.sampling_frequency)
                .ok_or(MseedError::InvalidSamplingRate(block.sampling_frequency))?;

            let kind = block.samples.kind();
            let mut format = RecordFormat::new(
                &self.id.network,
                &self.id.station,
                &self.id.location,
                &self.id.channel,
                freqn,
                freqd,
            );
            format.record_size_exp = self.record_size_exp;
            format.big_endian = self.big_endian;

            let mut encoder = self.make_encoder(format, kind, freqn, freqd);
            encoder.set_time(block.start_time);

            self.sampling_frequency = block.sampling_frequency;
            self.kind = Some(kind);
            self.encoder = Some(encoder);
        }

        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };
        encoder.set_timing_quality(block.timing_quality);
        encoder.push(block.samples.as_slice());

        Ok(())
    }

    /// Finalizes the partial record of the active encoder, if any.
    pub fn flush(&mut self) {
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.flush();
        }
    }

    /// Pops the next finished record.
    pub fn pop(&mut self) -> Option<Bytes> {
        if let Some(record) = self.pending.pop_front() {
            return Some(record);
        }
        self.encoder.as_mut().and_then(|encoder| encoder.pop())
    }

    fn make_encoder(
        &self,
        format: RecordFormat,
        kind: DataKind,
        freqn: u32,
        freqd: u32,
    ) -> Box<dyn RecordEncoder> {
        let compression = match kind {
            DataKind::Int => self.compression,
            _ if self.allow_float_compression => self.compression,
            _ => Compression::Identity,
        };

        match compression {
            Compression::Steim1 => Box::new(Steim1::new(format, freqn, freqd)),
            Compression::Steim2 => Box::new(Steim2::new(format, freqn, freqd)),
            Compression::Identity => {
                let sample_kind = match kind {
                    DataKind::Int => SampleKind::Int32,
                    DataKind::Float => SampleKind::Float32,
                    DataKind::Double => SampleKind::Float64,
                };
                Box::new(Uncompressed::new(format, sample_kind, freqn, freqd))
            }
        }
    }

    /// Retires the active encoder, keeping its already finished records
    /// available through [pop](Self::pop).
    fn retire_encoder(&mut self) {
        if let Some(mut encoder) = self.encoder.take() {
            while let Some(record) = encoder.pop() {
                self.pending.push_back(record);
            }
        }
        self.sampling_frequency = -1.0;
        self.kind = None;
    }
}
