//! Audio units: instruments and effects.
//!
//! An audio unit is a composite device: a table of processors wired by an
//! internal connection graph. Instruments are rendered per-voice through
//! a voice signal plan; effects are rendered once per block in the mixed
//! path.

use crate::connections::{AuConnections, ProcNode};
use crate::processor::Processor;
use crate::procs::{ForceProc, PitchProc, SineProc, VolumeProc};

/// Kind of audio unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuType {
    /// Voice-rendered instrument.
    Instrument,
    /// Block-rendered effect.
    Effect,
}

/// A composite processor with its own internal connection graph.
#[derive(Debug)]
pub struct AudioUnit {
    /// Instrument or effect.
    pub au_type: AuType,
    /// Display name.
    pub name: String,
    /// Processor table.
    pub procs: Vec<Box<dyn Processor>>,
    /// Internal routing.
    pub connections: AuConnections,
}

impl AudioUnit {
    /// Creates an empty audio unit.
    pub fn new(au_type: AuType, name: impl Into<String>) -> Self {
        Self {
            au_type,
            name: name.into(),
            procs: Vec::new(),
            connections: AuConnections::new(),
        }
    }

    /// Builds the standard sine instrument:
    /// pitch -> sine -> force -> output ports 0/1.
    pub fn sine_instrument(name: impl Into<String>) -> Self {
        let mut au = Self::new(AuType::Instrument, name);
        au.procs.push(Box::new(PitchProc));
        au.procs.push(Box::new(SineProc));
        au.procs.push(Box::new(ForceProc));

        let conns = &mut au.connections;
        conns.connect(ProcNode::Proc(0), 0, ProcNode::Proc(1), 0);
        conns.connect(ProcNode::Proc(1), 0, ProcNode::Proc(2), 0);
        conns.connect(ProcNode::Proc(2), 0, ProcNode::AuOutput, 0);
        conns.connect(ProcNode::Proc(2), 1, ProcNode::AuOutput, 1);

        au
    }

    /// Builds a stereo volume effect.
    pub fn volume_effect(name: impl Into<String>, volume_db: f64) -> Self {
        let mut au = Self::new(AuType::Effect, name);
        au.procs.push(Box::new(VolumeProc::new(volume_db)));

        let conns = &mut au.connections;
        conns.connect(ProcNode::AuInput, 0, ProcNode::Proc(0), 0);
        conns.connect(ProcNode::AuInput, 1, ProcNode::Proc(0), 1);
        conns.connect(ProcNode::Proc(0), 0, ProcNode::AuOutput, 0);
        conns.connect(ProcNode::Proc(0), 1, ProcNode::AuOutput, 1);

        au
    }

    /// Returns true if this unit is a voice-rendered instrument.
    pub fn is_instrument(&self) -> bool {
        self.au_type == AuType::Instrument
    }

    /// Number of voice scratch buffers a voice signal plan for this unit
    /// needs: one per processor send port.
    pub fn voice_work_buffer_count(&self) -> usize {
        self.procs.iter().map(|p| p.send_port_count()).sum()
    }

    /// Largest per-voice DSP state size over this unit's processors.
    pub fn max_voice_state_size(&self) -> usize {
        self.procs
            .iter()
            .map(|p| p.voice_state_size())
            .max()
            .unwrap_or(0)
    }

    /// Indices of voice processors, in table order.
    pub fn voice_proc_indices(&self) -> Vec<usize> {
        self.procs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.supports_voice())
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_instrument_shape() {
        let au = AudioUnit::sine_instrument("sin");
        assert!(au.is_instrument());
        assert_eq!(au.procs.len(), 3);
        assert_eq!(au.voice_proc_indices(), vec![0, 1, 2]);
        // pitch: 1 send, sine: 1 send, force: 2 sends
        assert_eq!(au.voice_work_buffer_count(), 4);
    }

    #[test]
    fn test_volume_effect_shape() {
        let au = AudioUnit::volume_effect("vol", -6.0);
        assert!(!au.is_instrument());
        assert!(au.voice_proc_indices().is_empty());
    }
}
