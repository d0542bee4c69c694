//! Compas Module - the composition data model consumed by the player
//!
//! A [`Module`] is the immutable description of a piece of music:
//!
//! - [`Pattern`]s of timestamped [`Trigger`]s organised into note columns
//!   plus a global column
//! - [`Song`]s: order lists of pattern instances, collected into tracks
//! - [`AudioUnit`]s: instruments and effects, each a small graph of
//!   [`Processor`]s with its own internal [`AuConnections`]
//! - module-level [`ModuleConnections`] routing audio units to the master
//!   output
//! - [`TuningTable`]s answering microtonal pitch queries
//! - a [`Bind`] table expanding events into further events
//! - per-channel defaults and environment variable declarations
//!
//! The player never mutates a module; everything runtime-variable lives in
//! player-side state types.

pub mod audio_unit;
pub mod bind;
pub mod ch_defaults;
pub mod connections;
pub mod env;
pub mod module;
pub mod order;
pub mod pattern;
pub mod processor;
pub mod procs;
pub mod tuning;

pub use audio_unit::{AuType, AudioUnit};
pub use bind::{Bind, BindEntry, BindTarget};
pub use ch_defaults::ChannelDefaults;
pub use connections::{AuConnections, DeviceEdge, DeviceNode, ModuleConnections, ProcEdge, ProcNode};
pub use env::EnvVars;
pub use module::{Module, ModuleError};
pub use order::Song;
pub use pattern::{Column, Pattern, Trigger};
pub use processor::{Processor, VoiceCommonState, VoiceProcState, VoiceRenderCtx};
pub use procs::{ForceProc, PitchProc, SineProc, VolumeProc};
pub use tuning::TuningTable;
