//! Streaming MiniSEED encoder.
//!
//! Turns a live stream of typed samples with a rational sample rate into
//! fixed-size SEED records: fixed header, blockette 1000, optional blockette
//! 1001, and Steim1/Steim2/uncompressed data frames. [StreamEncoder] is the
//! gap-aware front-end; the per-record encoders underneath can also be driven
//! directly when the caller manages timing itself.

mod clock;
mod encoder;
mod format;
mod steim;
mod steim1;
mod steim2;
mod stream;
mod uncompressed;

pub mod errors;

pub use clock::TickClock;
pub use encoder::{RecordCallback, RecordEncoder, SampleSlice};
pub use format::{rational_approximation, RecordFormat, SampleEncoding};
pub use steim1::Steim1;
pub use steim2::Steim2;
pub use stream::{Compression, SampleBlock, Samples, StreamEncoder, StreamId};
pub use uncompressed::{SampleKind, Uncompressed};
