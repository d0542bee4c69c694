//! Compas Core - timing and signal primitives for the compas playback engine
//!
//! This crate provides the foundational building blocks shared by the
//! composition data model and the mixing player:
//!
//! # Core Abstractions
//!
//! ## Musical Time
//!
//! - [`Tstamp`] - musical time as `(beats, remainder)` with exact ordering
//!   and drift-free frame conversion
//! - [`Position`] - a location in the composition hierarchy
//! - [`PatInstRef`] - one concrete use of a shared pattern body
//!
//! ## Control Signals
//!
//! - [`Slider`] - linear ramp to a target over a musical duration,
//!   re-scaled on tempo and audio-rate changes
//! - [`Lfo`] - tempo-synced low-frequency oscillator for tremolo/vibrato
//! - [`ForceControls`] / [`PitchControls`] - carried per-channel controls
//!
//! ## Audio Scratch
//!
//! - [`WorkBuffer`] - audio-rate scratch with a validity flag and a
//!   constant-signal start hint
//! - [`WorkBuffers`] - an indexed set of work buffers
//!
//! ## Event Values
//!
//! - [`Value`] / [`ValueType`] - typed event arguments with the conversion
//!   lattice used by the event layer
//!
//! ## Utilities
//!
//! - [`Random`] - deterministic per-channel random state
//! - [`DcBlocker`] - one-pole DC-blocking highpass state
//! - Math helpers: [`db_to_scale`], [`cents_to_ratio`]
//!
//! # Design Principles
//!
//! - **Real-time safe**: no allocations in per-frame paths
//! - **Deterministic**: all timing math carries explicit residues so
//!   block subdivision never shifts results

pub mod controls;
pub mod dc_blocker;
pub mod lfo;
pub mod limits;
pub mod math;
pub mod position;
pub mod random;
pub mod slider;
pub mod tstamp;
pub mod value;
pub mod work_buffer;

// Re-export main types at crate root
pub use controls::{ForceControls, PitchControls};
pub use dc_blocker::DcBlocker;
pub use lfo::Lfo;
pub use limits::*;
pub use math::{cents_to_ratio, db_to_scale, scale_to_db};
pub use position::{PatInstRef, Position};
pub use random::Random;
pub use slider::Slider;
pub use tstamp::{BEAT_UNITS, Tstamp};
pub use value::{Value, ValueType};
pub use work_buffer::{WorkBuffer, WorkBuffers};
