use thiserror::Error;

pub type Result<T, E = QueueError> = std::result::Result<T, E>;

/// Result codes surfaced by broker calls.
///
/// None of these bring the queue down; it keeps running even when individual
/// clients misbehave.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("Internal error")]
    InternalError,

    #[error("Client name is not unique")]
    ClientNameNotUnique,

    #[error("Client was not accepted")]
    ClientNotAccepted,

    #[error("Group name is not unique")]
    GroupNameNotUnique,

    #[error("Group does not exist")]
    GroupDoesNotExist,

    #[error("Already subscribed to group")]
    GroupAlreadySubscribed,

    #[error("Not subscribed to group")]
    GroupNotSubscribed,

    #[error("Message not accepted")]
    MessageNotAccepted,

    #[error("Message could not be decoded")]
    MessageDecodingFailed,

    #[error("Message could not be encoded")]
    MessageEncodingFailed,

    #[error("Not enough client heap")]
    NotEnoughClientHeap,
}
