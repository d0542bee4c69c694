//! Engine-wide capacity limits.
//!
//! These bound every fixed-size structure in the engine. They are
//! deliberately generous; the player validates user input against them at
//! configuration time so the render path never has to.

/// Number of note channels.
pub const CHANNELS: usize = 64;

/// Maximum number of voices in the voice pool.
pub const VOICES_MAX: usize = 1024;

/// Maximum number of render worker threads.
pub const THREADS_MAX: usize = 32;

/// Maximum audio buffer size in frames.
pub const AUDIO_BUFFER_SIZE_MAX: usize = 1 << 20;

/// Number of interleaved output channels (stereo).
pub const OUT_CHANNELS: usize = 2;

/// Maximum number of tracks in the composition order.
pub const TRACKS_MAX: usize = 1024;

/// Maximum number of patterns.
pub const PATTERNS_MAX: usize = 1024;

/// Maximum number of instances of one pattern.
pub const PAT_INSTANCES_MAX: usize = 1024;

/// Note columns per pattern (excluding the global column).
pub const COLUMNS_MAX: usize = CHANNELS;

/// Maximum number of audio units in a module.
pub const AUDIO_UNITS_MAX: usize = 256;

/// Maximum number of processors inside one audio unit.
pub const PROCS_MAX: usize = 256;

/// Maximum number of ports on a device.
pub const DEVICE_PORTS_MAX: usize = 8;

/// Maximum length of an event name.
pub const EVENT_NAME_MAX: usize = 12;

/// Maximum length of a variable name in expressions.
pub const VAR_NAME_MAX: usize = 32;

/// Maximum number of armed jump contexts.
pub const JUMP_CONTEXTS_MAX: usize = 64;

/// Maximum number of pending intra-block events per channel.
pub const LOCAL_EVENTS_MAX: usize = 128;

/// Maximum per-voice DSP state size in bytes accepted by the voice pool.
pub const VOICE_STATE_SIZE_MAX: usize = 1 << 16;

/// Maximum per-voice work buffer size in frames.
pub const VOICE_WORK_BUFFER_SIZE_MAX: usize = 1 << 18;

/// Maximum number of tuning tables.
pub const TUNING_TABLES_MAX: usize = 16;

/// Maximum number of notes in a tuning table.
pub const TUNING_TABLE_NOTES_MAX: usize = 128;
