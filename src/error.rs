use crate::channel_state::{ChannelStatus, MissingChannelField, StateIntent};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Incomplete channel: {0}")]
    Incomplete(#[from] MissingChannelField),
    #[error("A channel requires at least one allocation")]
    EmptyAllocations,
    #[error("The total value of the channel cannot be zero")]
    ZeroTotalValue,
    #[error("The total allocated value does not fit into the supported amount range")]
    AllocationOverflow,
    #[error("Allocation index {0} is out of range")]
    AllocationIndex(usize),
    #[error("There are not enough funds in the allocation to effect the transfer")]
    InsufficientFunds,
    #[error("The channel has been finalized and can no longer be updated")]
    ChannelFinalized,
    #[error("The snapshot's channel id does not match the id it was submitted under")]
    ChannelIdMismatch,
    #[error("The state version in the snapshot is incorrect. Expected {expected}, got {actual}")]
    VersionMismatch { expected: u64, actual: u64 },
    #[error("The first snapshot for a channel must be version 1 with INITIALIZE intent and ACTIVE status")]
    InvalidInitialState,
    #[error("The {0} of a channel cannot change after creation")]
    ImmutableFieldChanged(&'static str),
    #[error("The allocation total must be conserved. Expected {expected}, got {actual}")]
    AllocationSumMismatch { expected: String, actual: String },
    #[error("State intent {intent} does not permit status {status}")]
    IntentStatusMismatch { intent: StateIntent, status: ChannelStatus },
}
