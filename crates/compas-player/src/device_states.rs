//! Device states and per-thread device state.
//!
//! Device id 0 is the master (the module itself); audio unit `i` is
//! device `i + 1`. Persistent per-device state carries timing; the
//! per-(device, thread) state carries the port buffers each thread
//! renders into. During threaded voice processing every thread writes
//! only its own copy; the copies are mixed into thread 0 before the mixed
//! signal plan runs.

use compas_core::limits::OUT_CHANNELS;
use compas_core::work_buffer::WorkBuffer;

/// Persistent per-device state.
#[derive(Debug, Clone)]
pub struct DeviceState {
    /// Current tempo as last propagated.
    pub tempo: f64,
    /// Current audio rate as last propagated.
    pub audio_rate: i32,
}

/// Port buffers of one device for one thread.
#[derive(Debug)]
pub struct DeviceThreadState {
    /// Receive port buffers.
    pub recv: Vec<WorkBuffer>,
    /// Send port buffers.
    pub send: Vec<WorkBuffer>,
}

impl DeviceThreadState {
    fn new(buffer_size: usize) -> Self {
        Self {
            recv: (0..OUT_CHANNELS).map(|_| WorkBuffer::new(buffer_size)).collect(),
            send: (0..OUT_CHANNELS).map(|_| WorkBuffer::new(buffer_size)).collect(),
        }
    }

    fn resize(&mut self, buffer_size: usize) {
        for wb in self.recv.iter_mut().chain(self.send.iter_mut()) {
            wb.resize(buffer_size);
        }
    }

    /// Invalidates all port buffers.
    pub fn invalidate(&mut self) {
        for wb in self.recv.iter_mut().chain(self.send.iter_mut()) {
            wb.invalidate();
        }
    }
}

/// All device states of the player.
#[derive(Debug)]
pub struct DeviceStates {
    devices: Vec<DeviceState>,
    /// `[thread][device]`
    thread_states: Vec<Vec<DeviceThreadState>>,
    buffer_size: usize,
}

impl DeviceStates {
    /// Creates states for `device_count` devices and one thread.
    pub fn new(device_count: usize, buffer_size: usize, tempo: f64, audio_rate: i32) -> Self {
        let mut states = Self {
            devices: vec![
                DeviceState {
                    tempo,
                    audio_rate
                };
                device_count
            ],
            thread_states: Vec::new(),
            buffer_size,
        };
        states.set_thread_count(1);
        states
    }

    /// Number of devices.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Re-sizes the per-thread state table.
    pub fn set_thread_count(&mut self, thread_count: usize) {
        let device_count = self.devices.len();
        let buffer_size = self.buffer_size;
        self.thread_states.truncate(thread_count);
        while self.thread_states.len() < thread_count {
            self.thread_states.push(
                (0..device_count)
                    .map(|_| DeviceThreadState::new(buffer_size))
                    .collect(),
            );
        }
    }

    /// Re-sizes every port buffer.
    pub fn set_audio_buffer_size(&mut self, buffer_size: usize) {
        self.buffer_size = buffer_size;
        for thread in &mut self.thread_states {
            for state in thread.iter_mut() {
                state.resize(buffer_size);
            }
        }
    }

    /// Propagates a tempo change to every device.
    pub fn set_tempo(&mut self, tempo: f64) {
        for device in &mut self.devices {
            device.tempo = tempo;
        }
    }

    /// Propagates an audio-rate change to every device.
    pub fn set_audio_rate(&mut self, audio_rate: i32) {
        for device in &mut self.devices {
            device.audio_rate = audio_rate;
        }
    }

    /// Invalidates the port buffers of every thread.
    pub fn invalidate_buffers(&mut self) {
        for thread in &mut self.thread_states {
            for state in thread.iter_mut() {
                state.invalidate();
            }
        }
    }

    /// Returns one thread's state table, moved out for a worker.
    pub fn take_thread_states(&mut self, thread_id: usize) -> Vec<DeviceThreadState> {
        std::mem::take(&mut self.thread_states[thread_id])
    }

    /// Restores a thread's state table.
    pub fn put_thread_states(&mut self, thread_id: usize, states: Vec<DeviceThreadState>) {
        debug_assert!(self.thread_states[thread_id].is_empty());
        self.thread_states[thread_id] = states;
    }

    /// Returns one device's thread state.
    pub fn thread_state(&self, thread_id: usize, device: usize) -> &DeviceThreadState {
        &self.thread_states[thread_id][device]
    }

    /// Returns one device's thread state mutably.
    pub fn thread_state_mut(&mut self, thread_id: usize, device: usize) -> &mut DeviceThreadState {
        &mut self.thread_states[thread_id][device]
    }

    /// Returns thread 0's whole state table mutably.
    pub fn thread_zero_mut(&mut self) -> &mut Vec<DeviceThreadState> {
        &mut self.thread_states[0]
    }

    /// Additively combines every thread's send buffers into thread 0.
    pub fn mix_thread_states(&mut self, frame_count: usize) {
        if self.thread_states.len() < 2 {
            return;
        }
        let (zero, rest) = self.thread_states.split_at_mut(1);
        for thread in rest {
            for (dst_state, src_state) in zero[0].iter_mut().zip(thread.iter_mut()) {
                for (dst, src) in dst_state.send.iter_mut().zip(src_state.send.iter()) {
                    dst.mix(src, 0, frame_count);
                }
            }
        }
    }
}
