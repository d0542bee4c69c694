//! Per-channel defaults.
//!
//! Applied when playback (re)starts and when pattern playback mode
//! resets the channels.

/// Default control values for one channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelDefaults {
    /// Audio unit the channel plays initially.
    pub audio_unit: i32,
    /// Initial force in dB.
    pub force: f64,
}

impl Default for ChannelDefaults {
    fn default() -> Self {
        Self {
            audio_unit: 0,
            force: 0.0,
        }
    }
}
