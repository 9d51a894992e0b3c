use crate::channel_id::ChannelId;
use crate::channel_state::{ChannelState, ChannelStatus, StateIntent};
use crate::error::LedgerError;
use crate::storage::traits::StateStore;
use log::*;
use std::collections::HashMap;

/// How much checking a [`ChannelLedger`] applies before storing a snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Every write must be a legal transition from the stored record. See [`validate_transition`].
    #[default]
    Strict,
    /// Writes are stored exactly as given, with no checks. This reproduces the behavior of
    /// callers that advance a channel's version themselves and only ever submit well-formed
    /// snapshots. It will happily store a version regression or a write to a finalized
    /// channel.
    Permissive,
}

/// An in-memory ledger of payment-channel states, keyed by channel id.
///
/// The ledger holds exactly one snapshot per channel: the latest. Writes overwrite in place
/// and entries are never deleted, so a settled channel's last state remains retrievable by id
/// indefinitely. All operations are synchronous; callers that share a ledger across threads
/// must serialize writers per channel id themselves, or the version sequence is not
/// well-defined.
#[derive(Clone, Debug, Default)]
pub struct ChannelLedger {
    channels: HashMap<ChannelId, ChannelState>,
    mode: ValidationMode,
}

impl ChannelLedger {
    /// A ledger that validates every write. This is the default.
    pub fn new() -> Self {
        ChannelLedger::default()
    }

    /// A ledger that stores whatever it is given.
    pub fn permissive() -> Self {
        ChannelLedger { channels: HashMap::new(), mode: ValidationMode::Permissive }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Stores (or overwrites) the full snapshot under `channel_id`.
    ///
    /// Snapshots are whole-record replacements; no field merging happens here. In strict mode
    /// an illegal transition is rejected and the stored record is left untouched.
    pub fn update_channel(&mut self, channel_id: &ChannelId, state: ChannelState) -> Result<(), LedgerError> {
        if self.mode == ValidationMode::Strict {
            if let Err(e) = validate_transition(channel_id, self.channels.get(channel_id), &state) {
                warn!("Rejecting snapshot v{} for channel {channel_id}: {e}", state.state_version);
                return Err(e);
            }
        }
        debug!("Storing snapshot v{} for channel {channel_id}", state.state_version);
        self.channels.insert(*channel_id, state);
        Ok(())
    }

    /// The latest stored snapshot for `channel_id`, exactly as it was written.
    pub fn get_channel(&self, channel_id: &ChannelId) -> Option<&ChannelState> {
        self.channels.get(channel_id)
    }

    /// An `ACTIVE` channel denominated in `token`, if any. Finalized channels never match.
    ///
    /// When several open channels share the asset, the most recently updated one wins; ties on
    /// the update time are broken by the higher state version, then by the greater channel id,
    /// so the result is deterministic.
    pub fn find_open_channel(&self, token: &str) -> Option<&ChannelState> {
        self.channels.values().filter(|state| state.is_open() && state.token == token).max_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then(a.state_version.cmp(&b.state_version))
                .then(a.channel_id.cmp(&b.channel_id))
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// All stored snapshots, in no particular order.
    pub fn channels(&self) -> impl Iterator<Item = &ChannelState> {
        self.channels.values()
    }

    /// Rebuilds a ledger from a [`StateStore`].
    ///
    /// Stored snapshots are each a channel's latest state, not a transition sequence, so they
    /// are loaded as-is; `mode` applies to subsequent writes.
    pub fn hydrate<S: StateStore>(store: &S, mode: ValidationMode) -> Result<Self, anyhow::Error> {
        let mut channels = HashMap::new();
        for state in store.load_all()? {
            channels.insert(state.channel_id, state);
        }
        info!("Hydrated ledger with {} channel(s)", channels.len());
        Ok(ChannelLedger { channels, mode })
    }
}

/// Checks that `next` is a legal successor to `prev` for the channel stored under
/// `channel_id`.
///
/// This is a free function so that callers running a permissive ledger can still apply the
/// strict rules themselves before writing. The rules:
/// - the snapshot's id must match the id it is submitted under;
/// - allocations must be non-empty and their total must fit the amount range;
/// - the first write must be version 1 with `INITIALIZE` intent, `ACTIVE` status and a
///   non-zero total;
/// - each later write must carry exactly the next version, and nothing may follow a `FINAL`
///   record;
/// - `chain_id`, `token`, `adjudicator` and `challenge_period` never change;
/// - a `FINALIZE` snapshot must be `FINAL` and every other intent `ACTIVE`;
/// - `OPERATE` and `FINALIZE` writes conserve the allocation total. `RESIZE` may change it.
pub fn validate_transition(
    channel_id: &ChannelId,
    prev: Option<&ChannelState>,
    next: &ChannelState,
) -> Result<(), LedgerError> {
    if next.channel_id != *channel_id {
        return Err(LedgerError::ChannelIdMismatch);
    }
    if next.allocations.is_empty() {
        return Err(LedgerError::EmptyAllocations);
    }
    let total = next.total().ok_or(LedgerError::AllocationOverflow)?;

    let prev = match prev {
        None => {
            let well_formed = next.state_version == 1
                && next.state_intent == StateIntent::Initialize
                && next.status == ChannelStatus::Active;
            if !well_formed {
                return Err(LedgerError::InvalidInitialState);
            }
            if total.is_zero() {
                return Err(LedgerError::ZeroTotalValue);
            }
            return Ok(());
        }
        Some(prev) => prev,
    };

    if prev.status.is_final() {
        return Err(LedgerError::ChannelFinalized);
    }
    let expected = prev.state_version + 1;
    if next.state_version != expected {
        return Err(LedgerError::VersionMismatch { expected, actual: next.state_version });
    }
    if next.chain_id != prev.chain_id {
        return Err(LedgerError::ImmutableFieldChanged("chain id"));
    }
    if next.token != prev.token {
        return Err(LedgerError::ImmutableFieldChanged("token"));
    }
    if next.adjudicator != prev.adjudicator {
        return Err(LedgerError::ImmutableFieldChanged("adjudicator"));
    }
    if next.challenge_period != prev.challenge_period {
        return Err(LedgerError::ImmutableFieldChanged("challenge period"));
    }
    let required_status = match next.state_intent {
        StateIntent::Finalize => ChannelStatus::Final,
        _ => ChannelStatus::Active,
    };
    if next.status != required_status {
        return Err(LedgerError::IntentStatusMismatch { intent: next.state_intent, status: next.status });
    }
    if matches!(next.state_intent, StateIntent::Operate | StateIntent::Finalize) {
        let prev_total = prev.total().ok_or(LedgerError::AllocationOverflow)?;
        if total != prev_total {
            return Err(LedgerError::AllocationSumMismatch {
                expected: prev_total.to_decimal(),
                actual: total.to_decimal(),
            });
        }
    }
    Ok(())
}
