//! Types for describing the structure of a circuit.
//!
//! This module notably includes:
//! - [`CircuitGraph`]: The main structure for a circuit
//! - [`GateNode`]: Nodes which represent gates
//! - [`Wire`]: Directed edges from an output pin to an input pin

use std::fmt::{self, Debug, Display};
use std::ops::Index;

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

use crate::error::ConnectionError;
use crate::func::{Component, ComponentFn, PortType};


new_key_type! {
    /// Key type for maps to gates.
    pub struct GateKey;
    /// Key type for maps to wires.
    pub struct WireKey;
}

/// A struct which identifies a pin (from its gate and port index).
///
/// `K` is the gate identifier, which is a [`GateKey`] everywhere
/// except in [`CircuitSnapshot`]s, which use dense indices.
///
/// [`CircuitSnapshot`]: crate::circuit::snapshot::CircuitSnapshot
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug, Serialize, Deserialize)]
pub struct PinRef<K = GateKey> {
    /// The gate which is associated with this pin.
    pub gate: K,
    /// The pin's port index on the gate.
    pub index: usize
}
impl<K> PinRef<K> {
    /// Creates a reference to port `index` of `gate`.
    pub fn new(gate: K, index: usize) -> Self {
        Self { gate, index }
    }
}
impl<K: Debug> Display for PinRef<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port {} of gate {:?}", self.index, self.gate)
    }
}

/// A directed connection from an output pin to an input pin.
///
/// A wire carries exactly its source's value.
#[derive(PartialEq, Eq, Clone, Copy, Hash, Debug)]
pub struct Wire {
    /// The output pin driving this wire.
    pub from: PinRef,
    /// The input pin this wire drives.
    pub to: PinRef
}

/// A node which represents a gate.
#[derive(Debug)]
pub struct GateNode {
    /// The actual function that is applied.
    pub(crate) func: ComponentFn,
    /// The direction of this gate's ports.
    pub(crate) port_props: Vec<PortType>,
    /// Wires attached to each port.
    ///
    /// Input ports hold at most one wire (their driver),
    /// output ports hold their fan-out in connection order.
    pub(crate) links: Vec<Vec<WireKey>>,
}
impl GateNode {
    /// Creates a new gate node with the specified component function type.
    pub fn new(func: ComponentFn) -> Self {
        let port_props = func.ports();
        let links = vec![vec![]; port_props.len()];

        Self { func, port_props, links }
    }

    /// The gate's function.
    pub fn func(&self) -> &ComponentFn {
        &self.func
    }
    /// The direction of each of the gate's ports.
    pub fn ports(&self) -> &[PortType] {
        &self.port_props
    }
    /// The indices of the gate's input ports.
    pub fn input_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.port_props.iter()
            .enumerate()
            .filter(|(_, ty)| ty.accepts_input())
            .map(|(i, _)| i)
    }
}

/// A circuit structure.
#[derive(Default, Debug)]
pub struct CircuitGraph {
    /// All gates of the circuit.
    pub(crate) gates: SlotMap<GateKey, GateNode>,
    /// All wires of the circuit.
    pub(crate) wires: SlotMap<WireKey, Wire>,
}
impl CircuitGraph {
    /// Adds a new gate to the graph (using the provided component function)
    /// and returns its key.
    pub fn add_gate(&mut self, func: ComponentFn) -> GateKey {
        self.gates.insert(GateNode::new(func))
    }

    /// Removes a gate and every wire attached to it,
    /// returning the removed wires.
    ///
    /// This returns `None` if the gate does not exist.
    pub fn remove_gate(&mut self, key: GateKey) -> Option<Vec<Wire>> {
        let attached: Vec<_> = self.gates.get(key)?
            .links.iter()
            .flatten()
            .copied()
            .collect();

        let removed = attached.into_iter()
            .filter_map(|w| self.remove_wire(w))
            .collect();
        self.gates.remove(key);

        Some(removed)
    }

    /// Checks that the pin exists and has the expected direction.
    fn check_pin(&self, pin: PinRef, ty: PortType) -> Result<(), ConnectionError> {
        let gate = self.gates.get(pin.gate).ok_or(ConnectionError::MissingGate(pin.gate))?;
        match gate.port_props.get(pin.index) {
            Some(&t) if t == ty => Ok(()),
            Some(PortType::Input) => Err(ConnectionError::NotAnOutput(pin)),
            Some(PortType::Output) => Err(ConnectionError::NotAnInput(pin)),
            None => Err(ConnectionError::NoSuchPort(pin)),
        }
    }

    /// Connects an output pin to an input pin.
    ///
    /// This fails if either pin is missing or has the wrong direction,
    /// or if the input pin already has a driver.
    /// Feedback (including a gate driving itself) is allowed here;
    /// whether it is legal is decided by validation.
    pub fn add_wire(&mut self, from: PinRef, to: PinRef) -> Result<WireKey, ConnectionError> {
        self.check_pin(from, PortType::Output)?;
        self.check_pin(to, PortType::Input)?;
        if let Some(driver) = self.driver_of(to) {
            return Err(ConnectionError::AlreadyDriven { pin: to, driver });
        }

        let key = self.wires.insert(Wire { from, to });
        self.gates[from.gate].links[from.index].push(key);
        self.gates[to.gate].links[to.index].push(key);
        Ok(key)
    }

    /// Removes a wire, returning it if it existed.
    pub fn remove_wire(&mut self, key: WireKey) -> Option<Wire> {
        let wire = self.wires.remove(key)?;
        for pin in [wire.from, wire.to] {
            if let Some(gate) = self.gates.get_mut(pin.gate) {
                gate.links[pin.index].retain(|&w| w != key);
            }
        }
        Some(wire)
    }

    /// The output pin which drives the given input pin (if any).
    pub fn driver_of(&self, pin: PinRef) -> Option<PinRef> {
        let gate = self.gates.get(pin.gate)?;
        if !gate.port_props.get(pin.index)?.accepts_input() {
            return None;
        }
        let &wire = gate.links[pin.index].first()?;
        Some(self.wires[wire].from)
    }

    /// The input pins driven by the given output pin.
    pub fn fanout_of(&self, pin: PinRef) -> impl Iterator<Item = PinRef> + '_ {
        self.gates.get(pin.gate)
            .filter(|g| g.port_props.get(pin.index).is_some_and(|ty| ty.accepts_output()))
            .map(|g| &g.links[pin.index])
            .into_iter()
            .flatten()
            .map(|&w| self.wires[w].to)
    }

    /// Gets a gate, if it exists.
    pub fn gate(&self, key: GateKey) -> Option<&GateNode> {
        self.gates.get(key)
    }
    /// Iterates over all gates.
    pub fn gates(&self) -> impl Iterator<Item = (GateKey, &GateNode)> {
        self.gates.iter()
    }
    /// Iterates over all wires.
    pub fn wires(&self) -> impl Iterator<Item = (WireKey, &Wire)> {
        self.wires.iter()
    }
    /// The number of gates in the graph.
    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }
}

impl Index<GateKey> for CircuitGraph {
    type Output = GateNode;

    fn index(&self, index: GateKey) -> &Self::Output {
        &self.gates[index]
    }
}
impl Index<WireKey> for CircuitGraph {
    type Output = Wire;

    fn index(&self, index: WireKey) -> &Self::Output {
        &self.wires[index]
    }
}
