//! Connection graphs: audio-unit-internal and module-level routing.
//!
//! Two graphs exist with the same edge shape but different node types:
//! processors (plus the audio unit boundary ports) inside one audio unit,
//! and audio units (plus the master output) at module level. Devices
//! reference each other by table index only; there are no back-pointers.
//!
//! Cycle rejection happens when the player builds its execution plans,
//! not here; feedback is only expressible through explicit feedback
//! ports, which the builtin processor set does not use.

/// A node inside an audio unit's internal graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcNode {
    /// The audio unit's own input ports (effects only).
    AuInput,
    /// A processor, by index into the audio unit's processor table.
    Proc(usize),
    /// The audio unit's own output ports.
    AuOutput,
}

/// One edge in an audio unit's internal graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcEdge {
    /// Source node.
    pub src: ProcNode,
    /// Source send port.
    pub src_port: usize,
    /// Destination node.
    pub dst: ProcNode,
    /// Destination receive port.
    pub dst_port: usize,
}

/// An audio unit's internal connection graph.
#[derive(Debug, Clone, Default)]
pub struct AuConnections {
    /// Edge list.
    pub edges: Vec<ProcEdge>,
}

impl AuConnections {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an edge.
    pub fn connect(&mut self, src: ProcNode, src_port: usize, dst: ProcNode, dst_port: usize) {
        self.edges.push(ProcEdge {
            src,
            src_port,
            dst,
            dst_port,
        });
    }

    /// Returns all edges into the given node.
    pub fn edges_into(&self, dst: ProcNode) -> impl Iterator<Item = &ProcEdge> {
        self.edges.iter().filter(move |e| e.dst == dst)
    }

    /// Returns all edges out of the given node.
    pub fn edges_out_of(&self, src: ProcNode) -> impl Iterator<Item = &ProcEdge> {
        self.edges.iter().filter(move |e| e.src == src)
    }
}

/// A node in the module-level graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceNode {
    /// The master output (the module itself).
    Master,
    /// An audio unit, by index into the module's audio unit table.
    Au(usize),
}

/// One edge in the module-level graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEdge {
    /// Source device.
    pub src: DeviceNode,
    /// Source send port.
    pub src_port: usize,
    /// Destination device.
    pub dst: DeviceNode,
    /// Destination receive port.
    pub dst_port: usize,
}

/// The module-level routing graph.
#[derive(Debug, Clone, Default)]
pub struct ModuleConnections {
    /// Edge list.
    pub edges: Vec<DeviceEdge>,
}

impl ModuleConnections {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an edge.
    pub fn connect(&mut self, src: DeviceNode, src_port: usize, dst: DeviceNode, dst_port: usize) {
        self.edges.push(DeviceEdge {
            src,
            src_port,
            dst,
            dst_port,
        });
    }

    /// Connects both stereo ports of `src` to the same ports of `dst`.
    pub fn connect_stereo(&mut self, src: DeviceNode, dst: DeviceNode) {
        self.connect(src, 0, dst, 0);
        self.connect(src, 1, dst, 1);
    }

    /// Returns all edges into the given device.
    pub fn edges_into(&self, dst: DeviceNode) -> impl Iterator<Item = &DeviceEdge> {
        self.edges.iter().filter(move |e| e.dst == dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_into() {
        let mut conns = ModuleConnections::new();
        conns.connect_stereo(DeviceNode::Au(0), DeviceNode::Master);
        conns.connect_stereo(DeviceNode::Au(1), DeviceNode::Master);

        assert_eq!(conns.edges_into(DeviceNode::Master).count(), 4);
        assert_eq!(conns.edges_into(DeviceNode::Au(0)).count(), 0);
    }
}
