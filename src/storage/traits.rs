use crate::channel_id::ChannelId;
use crate::channel_state::ChannelState;

pub trait StateStore {
    fn write_channel(&mut self, state: &ChannelState) -> Result<(), anyhow::Error>;
    fn load_channel(&self, channel_id: &ChannelId) -> Result<ChannelState, anyhow::Error>;
    fn load_all(&self) -> Result<Vec<ChannelState>, anyhow::Error>;
}
