use crate::channel_id::ChannelId;
use crate::channel_state::ChannelState;
use crate::storage::traits::StateStore;
use log::warn;
use ron::ser::PrettyConfig;
use std::fs;
use std::path::PathBuf;

/// A file-based store for channel snapshots.
///
/// Each channel is saved in a file named after its id, e.g.
/// `0xaaaa…aaaa.ron`. A write replaces the file wholesale, so the directory always holds one
/// snapshot per channel: the latest.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a new file store with the given path.
    ///
    /// # Arguments
    /// * `path` - The path to the directory where the channel files will be stored.
    pub fn new(path: PathBuf) -> Result<Self, std::io::Error> {
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }
        Ok(Self { path })
    }

    /// Returns the path to the directory where the channel files are stored.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn file_path(&self, channel_id: &ChannelId) -> PathBuf {
        self.path.join(format!("{}.ron", channel_id.as_hex()))
    }
}

impl StateStore for FileStore {
    fn write_channel(&mut self, state: &ChannelState) -> Result<(), anyhow::Error> {
        let file_path = self.file_path(&state.channel_id);
        let config = PrettyConfig::new().compact_arrays(true).compact_maps(true);
        let val = ron::ser::to_string_pretty(&state, config)?;
        fs::write(&file_path, &val)?;
        Ok(())
    }

    fn load_channel(&self, channel_id: &ChannelId) -> Result<ChannelState, anyhow::Error> {
        let file_path = self.file_path(channel_id);
        let val = fs::read_to_string(&file_path)?;
        let state: ChannelState = ron::de::from_str(&val)?;
        Ok(state)
    }

    fn load_all(&self) -> Result<Vec<ChannelState>, anyhow::Error> {
        let mut states = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("ron") {
                continue;
            }
            let val = fs::read_to_string(&path)?;
            match ron::de::from_str::<ChannelState>(&val) {
                Ok(state) => states.push(state),
                Err(e) => warn!("Skipping unreadable channel file {}: {e}", path.display()),
            }
        }
        Ok(states)
    }
}
