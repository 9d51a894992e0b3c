use crate::allocation::{self, ChannelAllocation};
use crate::amount::TokenAmount;
use crate::channel_id::ChannelId;
use crate::error::LedgerError;
use chrono::Utc;
use log::*;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Dispute window applied when the opening parameters don't specify one, in seconds.
pub const DEFAULT_CHALLENGE_PERIOD: u64 = 3600;

/// Where the channel is in its lifecycle. `Active` is the only pre-settlement status;
/// `Final` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    /// The channel is open and its balance may be reallocated off-chain.
    Active,
    /// The channel has been settled on-chain and cannot be used anymore.
    Final,
}

impl ChannelStatus {
    pub const fn is_open(&self) -> bool {
        matches!(self, ChannelStatus::Active)
    }

    pub const fn is_final(&self) -> bool {
        matches!(self, ChannelStatus::Final)
    }
}

impl Display for ChannelStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelStatus::Active => write!(f, "ACTIVE"),
            ChannelStatus::Final => write!(f, "FINAL"),
        }
    }
}

/// Why a snapshot version was produced. Descriptive only; the legality of a transition is
/// judged by the ledger, not by this tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateIntent {
    /// The opening snapshot.
    Initialize,
    /// An off-chain transfer. The channel total is conserved.
    Operate,
    /// A funding change. The channel total may change.
    Resize,
    /// The closing snapshot.
    Finalize,
}

impl Display for StateIntent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StateIntent::Initialize => write!(f, "INITIALIZE"),
            StateIntent::Operate => write!(f, "OPERATE"),
            StateIntent::Resize => write!(f, "RESIZE"),
            StateIntent::Finalize => write!(f, "FINALIZE"),
        }
    }
}

/// A complete snapshot of one channel at one state version.
///
/// Snapshots are value objects: the transition constructors ([`transfer`](Self::transfer),
/// [`deposit`](Self::deposit), [`withdraw`](Self::withdraw), [`finalize`](Self::finalize))
/// return a fresh snapshot with the version bumped by one and never mutate in place.
/// `channel_id`, `chain_id`, `token`, `adjudicator` and `challenge_period` are fixed for the
/// life of the channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelState {
    pub channel_id: ChannelId,
    pub status: ChannelStatus,
    /// The settlement network this channel lives on
    pub chain_id: u64,
    /// The asset the channel is denominated in
    pub token: String,
    /// One entry per party. By convention index 0 is the initiating party, but the ledger
    /// attaches no meaning to the order.
    pub allocations: Vec<ChannelAllocation>,
    /// Logical clock for this channel. Starts at 1 and goes up by exactly 1 per update.
    pub state_version: u64,
    pub state_intent: StateIntent,
    /// The on-chain arbiter for disputes. Carried for reference, unused here.
    pub adjudicator: String,
    /// Dispute window in seconds. Carried for reference, unused here.
    pub challenge_period: u64,
    /// Unix timestamp (seconds), set once at creation
    pub created_at: i64,
    /// Unix timestamp (seconds), refreshed on every new version
    pub updated_at: i64,
}

impl ChannelState {
    /// The checked sum of all allocation amounts. `None` on overflow, which cannot happen for
    /// snapshots produced by [`ChannelBuilder`] and the transition constructors.
    pub fn total(&self) -> Option<TokenAmount> {
        allocation::total(&self.allocations)
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Produces the next snapshot with `amount` moved between two allocations. The channel
    /// total is conserved and the version goes up by one.
    pub fn transfer(&self, from: usize, to: usize, amount: TokenAmount) -> Result<ChannelState, LedgerError> {
        self.ensure_active()?;
        self.ensure_index(from)?;
        self.ensure_index(to)?;
        let allocations =
            allocation::transfer(&self.allocations, from, to, amount).ok_or(LedgerError::InsufficientFunds)?;
        debug!(
            "Channel {}: moving {amount} from allocation {from} to {to} at version {}",
            self.channel_id,
            self.state_version + 1
        );
        Ok(self.next_snapshot(allocations, StateIntent::Operate, ChannelStatus::Active))
    }

    /// Produces the next snapshot with `amount` added to one allocation. This is a funding
    /// change: the channel total grows.
    pub fn deposit(&self, index: usize, amount: TokenAmount) -> Result<ChannelState, LedgerError> {
        self.ensure_active()?;
        self.ensure_index(index)?;
        let mut allocations = self.allocations.clone();
        allocations[index].amount =
            allocations[index].amount.checked_add(amount).ok_or(LedgerError::AllocationOverflow)?;
        allocation::total(&allocations).ok_or(LedgerError::AllocationOverflow)?;
        debug!("Channel {}: resizing allocation {index} up by {amount}", self.channel_id);
        Ok(self.next_snapshot(allocations, StateIntent::Resize, ChannelStatus::Active))
    }

    /// Produces the next snapshot with `amount` removed from one allocation. This is a funding
    /// change: the channel total shrinks.
    pub fn withdraw(&self, index: usize, amount: TokenAmount) -> Result<ChannelState, LedgerError> {
        self.ensure_active()?;
        self.ensure_index(index)?;
        let mut allocations = self.allocations.clone();
        allocations[index].amount =
            allocations[index].amount.checked_sub(amount).ok_or(LedgerError::InsufficientFunds)?;
        debug!("Channel {}: resizing allocation {index} down by {amount}", self.channel_id);
        Ok(self.next_snapshot(allocations, StateIntent::Resize, ChannelStatus::Active))
    }

    /// Produces the closing snapshot: allocations unchanged, status `FINAL`, version bumped
    /// by one. There is no transition out of the resulting state.
    pub fn finalize(&self) -> Result<ChannelState, LedgerError> {
        self.ensure_active()?;
        info!("Channel {} finalizing at version {}", self.channel_id, self.state_version + 1);
        Ok(self.next_snapshot(self.allocations.clone(), StateIntent::Finalize, ChannelStatus::Final))
    }

    fn ensure_active(&self) -> Result<(), LedgerError> {
        if self.status.is_final() {
            return Err(LedgerError::ChannelFinalized);
        }
        Ok(())
    }

    fn ensure_index(&self, index: usize) -> Result<(), LedgerError> {
        if index >= self.allocations.len() {
            return Err(LedgerError::AllocationIndex(index));
        }
        Ok(())
    }

    fn next_snapshot(
        &self,
        allocations: Vec<ChannelAllocation>,
        intent: StateIntent,
        status: ChannelStatus,
    ) -> ChannelState {
        ChannelState {
            channel_id: self.channel_id,
            status,
            chain_id: self.chain_id,
            token: self.token.clone(),
            allocations,
            state_version: self.state_version + 1,
            state_intent: intent,
            adjudicator: self.adjudicator.clone(),
            challenge_period: self.challenge_period,
            created_at: self.created_at,
            updated_at: Utc::now().timestamp(),
        }
    }
}

/// The builder for a channel's opening snapshot.
///
/// `build` yields the version-1 `INITIALIZE` snapshot with status `ACTIVE` and both
/// timestamps set to the current time.
#[derive(Default)]
pub struct ChannelBuilder {
    channel_id: Option<ChannelId>,
    chain_id: Option<u64>,
    token: Option<String>,
    adjudicator: Option<String>,
    challenge_period: Option<u64>,
    allocations: Vec<ChannelAllocation>,
}

impl ChannelBuilder {
    pub fn new() -> Self {
        ChannelBuilder::default()
    }

    pub fn with_channel_id(mut self, channel_id: ChannelId) -> Self {
        self.channel_id = Some(channel_id);
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_adjudicator(mut self, adjudicator: impl Into<String>) -> Self {
        self.adjudicator = Some(adjudicator.into());
        self
    }

    pub fn with_challenge_period(mut self, seconds: u64) -> Self {
        self.challenge_period = Some(seconds);
        self
    }

    pub fn with_allocation(mut self, allocation: ChannelAllocation) -> Self {
        self.allocations.push(allocation);
        self
    }

    pub fn build(self) -> Result<ChannelState, LedgerError> {
        let channel_id = self.channel_id.ok_or(MissingChannelField::ChannelId)?;
        let chain_id = self.chain_id.ok_or(MissingChannelField::ChainId)?;
        let token = self.token.ok_or(MissingChannelField::Token)?;
        let adjudicator = self.adjudicator.ok_or(MissingChannelField::Adjudicator)?;
        if self.allocations.is_empty() {
            return Err(LedgerError::EmptyAllocations);
        }
        let total = allocation::total(&self.allocations).ok_or(LedgerError::AllocationOverflow)?;
        if total.is_zero() {
            return Err(LedgerError::ZeroTotalValue);
        }
        let now = Utc::now().timestamp();
        info!("Channel {channel_id} created on chain {chain_id} with {total} {token} locked");
        Ok(ChannelState {
            channel_id,
            status: ChannelStatus::Active,
            chain_id,
            token,
            allocations: self.allocations,
            state_version: 1,
            state_intent: StateIntent::Initialize,
            adjudicator,
            challenge_period: self.challenge_period.unwrap_or(DEFAULT_CHALLENGE_PERIOD),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MissingChannelField {
    #[error("Missing channel id")]
    ChannelId,
    #[error("Missing chain id")]
    ChainId,
    #[error("Missing token")]
    Token,
    #[error("Missing adjudicator")]
    Adjudicator,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::allocation::ChannelAllocation;
    use crate::amount::TokenAmount;

    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const ADJUDICATOR: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

    fn channel_id() -> ChannelId {
        ChannelId::from_bytes([0xAA; 32])
    }

    fn open_channel() -> ChannelState {
        ChannelBuilder::new()
            .with_channel_id(channel_id())
            .with_chain_id(137)
            .with_token(USDC)
            .with_adjudicator(ADJUDICATOR)
            .with_allocation(ChannelAllocation::new("0xsender", USDC, TokenAmount::from_raw(1_000)))
            .with_allocation(ChannelAllocation::new("0xrecipient", USDC, TokenAmount::ZERO))
            .build()
            .expect("Failed to build opening snapshot")
    }

    #[test]
    fn builder_produces_initial_snapshot() {
        env_logger::try_init().ok();
        let state = open_channel();
        assert_eq!(state.state_version, 1);
        assert_eq!(state.state_intent, StateIntent::Initialize);
        assert_eq!(state.status, ChannelStatus::Active);
        assert!(state.is_open());
        assert_eq!(state.chain_id, 137);
        assert_eq!(state.challenge_period, DEFAULT_CHALLENGE_PERIOD);
        assert_eq!(state.total(), Some(TokenAmount::from_raw(1_000)));
        assert_eq!(state.created_at, state.updated_at);
    }

    #[test]
    fn builder_rejects_missing_fields() {
        let result = ChannelBuilder::new()
            .with_chain_id(137)
            .with_token(USDC)
            .with_adjudicator(ADJUDICATOR)
            .with_allocation(ChannelAllocation::new("0xsender", USDC, TokenAmount::from_raw(1)))
            .build();
        assert_eq!(result.unwrap_err(), LedgerError::Incomplete(MissingChannelField::ChannelId));

        let result = ChannelBuilder::new()
            .with_channel_id(channel_id())
            .with_token(USDC)
            .with_adjudicator(ADJUDICATOR)
            .with_allocation(ChannelAllocation::new("0xsender", USDC, TokenAmount::from_raw(1)))
            .build();
        assert_eq!(result.unwrap_err(), LedgerError::Incomplete(MissingChannelField::ChainId));

        let result = ChannelBuilder::new()
            .with_channel_id(channel_id())
            .with_chain_id(137)
            .with_adjudicator(ADJUDICATOR)
            .with_allocation(ChannelAllocation::new("0xsender", USDC, TokenAmount::from_raw(1)))
            .build();
        assert_eq!(result.unwrap_err(), LedgerError::Incomplete(MissingChannelField::Token));

        let result = ChannelBuilder::new()
            .with_channel_id(channel_id())
            .with_chain_id(137)
            .with_token(USDC)
            .with_allocation(ChannelAllocation::new("0xsender", USDC, TokenAmount::from_raw(1)))
            .build();
        assert_eq!(result.unwrap_err(), LedgerError::Incomplete(MissingChannelField::Adjudicator));
    }

    #[test]
    fn builder_rejects_degenerate_allocations() {
        let result = ChannelBuilder::new()
            .with_channel_id(channel_id())
            .with_chain_id(137)
            .with_token(USDC)
            .with_adjudicator(ADJUDICATOR)
            .build();
        assert_eq!(result.unwrap_err(), LedgerError::EmptyAllocations);

        let result = ChannelBuilder::new()
            .with_channel_id(channel_id())
            .with_chain_id(137)
            .with_token(USDC)
            .with_adjudicator(ADJUDICATOR)
            .with_allocation(ChannelAllocation::new("0xsender", USDC, TokenAmount::ZERO))
            .with_allocation(ChannelAllocation::new("0xrecipient", USDC, TokenAmount::ZERO))
            .build();
        assert_eq!(result.unwrap_err(), LedgerError::ZeroTotalValue);
    }

    #[test]
    fn transfer_conserves_total_and_bumps_version() {
        let state = open_channel();
        let state = state.transfer(0, 1, TokenAmount::from_raw(100)).unwrap();
        assert_eq!(state.state_version, 2);
        assert_eq!(state.state_intent, StateIntent::Operate);
        assert_eq!(state.status, ChannelStatus::Active);
        assert_eq!(state.allocations[0].amount, TokenAmount::from_raw(900));
        assert_eq!(state.allocations[1].amount, TokenAmount::from_raw(100));
        assert_eq!(state.total(), Some(TokenAmount::from_raw(1_000)));
        assert!(state.updated_at >= state.created_at);
    }

    #[test]
    fn transfer_rejects_overdraft_and_bad_indices() {
        let state = open_channel();
        assert_eq!(state.transfer(1, 0, TokenAmount::from_raw(1)).unwrap_err(), LedgerError::InsufficientFunds);
        assert_eq!(
            state.transfer(0, 1, TokenAmount::from_raw(1_001)).unwrap_err(),
            LedgerError::InsufficientFunds
        );
        assert_eq!(state.transfer(0, 2, TokenAmount::from_raw(1)).unwrap_err(), LedgerError::AllocationIndex(2));
        assert_eq!(state.transfer(7, 1, TokenAmount::from_raw(1)).unwrap_err(), LedgerError::AllocationIndex(7));
    }

    #[test]
    fn resize_changes_total() {
        let state = open_channel();
        let state = state.deposit(1, TokenAmount::from_raw(500)).unwrap();
        assert_eq!(state.state_version, 2);
        assert_eq!(state.state_intent, StateIntent::Resize);
        assert_eq!(state.total(), Some(TokenAmount::from_raw(1_500)));

        let state = state.withdraw(0, TokenAmount::from_raw(250)).unwrap();
        assert_eq!(state.state_version, 3);
        assert_eq!(state.total(), Some(TokenAmount::from_raw(1_250)));

        assert_eq!(state.withdraw(1, TokenAmount::from_raw(501)).unwrap_err(), LedgerError::InsufficientFunds);
        assert_eq!(state.deposit(0, TokenAmount::from_raw(u128::MAX)).unwrap_err(), LedgerError::AllocationOverflow);
    }

    #[test]
    fn finalize_is_terminal() {
        let state = open_channel();
        let state = state.transfer(0, 1, TokenAmount::from_raw(350)).unwrap();
        let closed = state.finalize().unwrap();
        assert_eq!(closed.state_version, 3);
        assert_eq!(closed.status, ChannelStatus::Final);
        assert_eq!(closed.state_intent, StateIntent::Finalize);
        assert_eq!(closed.allocations, state.allocations);
        assert!(!closed.is_open());

        assert_eq!(closed.finalize().unwrap_err(), LedgerError::ChannelFinalized);
        assert_eq!(closed.transfer(0, 1, TokenAmount::from_raw(1)).unwrap_err(), LedgerError::ChannelFinalized);
        assert_eq!(closed.deposit(0, TokenAmount::from_raw(1)).unwrap_err(), LedgerError::ChannelFinalized);
        assert_eq!(closed.withdraw(0, TokenAmount::from_raw(1)).unwrap_err(), LedgerError::ChannelFinalized);
    }

    #[test]
    fn wire_format_uses_camel_case_and_tag_names() {
        let state = open_channel();
        let json: serde_json::Value = serde_json::to_value(&state).unwrap();
        assert_eq!(json["channelId"], serde_json::json!(state.channel_id.as_hex()));
        assert_eq!(json["status"], serde_json::json!("ACTIVE"));
        assert_eq!(json["stateIntent"], serde_json::json!("INITIALIZE"));
        assert_eq!(json["stateVersion"], serde_json::json!(1));
        assert_eq!(json["chainId"], serde_json::json!(137));
        assert_eq!(json["challengePeriod"], serde_json::json!(DEFAULT_CHALLENGE_PERIOD));
        assert_eq!(json["allocations"][0]["destination"], serde_json::json!("0xsender"));
        // Amounts go over the wire as decimal strings
        assert_eq!(json["allocations"][0]["amount"], serde_json::json!("1000"));

        let back: ChannelState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);

        let closed = state.finalize().unwrap();
        let json = serde_json::to_value(&closed).unwrap();
        assert_eq!(json["status"], serde_json::json!("FINAL"));
        assert_eq!(json["stateIntent"], serde_json::json!("FINALIZE"));
    }
}
