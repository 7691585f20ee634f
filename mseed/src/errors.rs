use thiserror::Error;

pub type Result<T, E = MseedError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum MseedError {
    #[error("Sampling rate {0} has no usable rational approximation.")]
    InvalidSamplingRate(f64),

    #[error("Record size exponent {0} is outside the supported range [7, 20].")]
    InvalidRecordSize(u8),
}
