//! Compas Player - the realtime mixing player
//!
//! The player couples symbolic time (beats, tempo slides, pattern jumps,
//! delays) to continuous audio time and renders a module to stereo PCM:
//!
//! - [`Player`] - the aggregate: configuration, playback, event I/O
//! - a bank of [`Cgiter`]s advances per-channel pattern cursors
//! - a [`VoicePool`] holds voice groups partitioned by owning channel
//! - per-instrument [`VoiceSignalPlan`]s and one [`MixedSignalPlan`]
//!   execute the connection graphs
//! - a worker pool renders voices on multiple threads when configured
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use compas_module::Module;
//! use compas_player::Player;
//!
//! let module = Arc::new(Module::new());
//! let mut player = Player::new(module, 48000, 4096, 0, 64).unwrap();
//! player.play(1024);
//! // An empty module stops immediately.
//! assert!(player.has_stopped());
//! assert_eq!(player.get_frames_available(), 0);
//! ```

pub mod cgiter;
pub mod channel;
pub mod device_states;
pub mod error;
pub mod event_buffer;
pub mod event_handler;
pub mod event_names;
pub mod expr;
pub mod jump;
pub mod master_params;
pub mod mixed_signal_plan;
pub mod player;
pub mod seq;
pub mod tuning_state;
pub mod voice;
pub mod voice_exec;
pub mod voice_pool;
pub mod voice_signal_plan;
pub mod workers;

pub use cgiter::Cgiter;
pub use channel::{Channel, ChannelEvent, ChannelEventKind};
pub use error::PlayerError;
pub use event_buffer::EventBuffer;
pub use event_names::{EventCategory, EventSpec};
pub use expr::EnvState;
pub use jump::{ActiveJumps, JumpContext};
pub use master_params::{MasterParams, PlaybackState};
pub use mixed_signal_plan::MixedSignalPlan;
pub use player::Player;
pub use tuning_state::TuningState;
pub use voice::Voice;
pub use voice_pool::{VoiceGroup, VoicePool};
pub use voice_signal_plan::VoiceSignalPlan;
