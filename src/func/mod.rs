//! Logic gates and stateful elements for simulation.
//!
//! This module defines the gate kinds the engine can evaluate
//! (AND, OR, NOT, XOR, NAND, NOR, custom truth tables, inputs, outputs, muxes,
//! clocks, D flip-flops and SR latches) as well as the
//! traits and structures needed to represent and evaluate them.
//!
//! ## This module notably consists of:
//! - **[`Component`]**: An interface for all gates, defining methods for port configuration, initialization, and execution.
//! - **[`PortType`]**: The direction of each port of a gate.
//! - **[`PortUpdate`]**: A structure representing updates to port values during simulation.
//! - **[`ComponentFn`]**: The closed set of gate kinds.
use std::ops::RangeInclusive;

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use crate::circuit::state::InnerFunctionState;
use crate::error::{EvalIssue, ParameterOutOfRange};

pub use clock::*;
pub use custom::*;
pub use gates::*;
pub use memory::*;
pub use muxes::*;
pub use wiring::*;

mod clock;
mod custom;
mod gates;
mod memory;
mod muxes;
mod wiring;

/// The direction of a gate's port.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug, Serialize, Deserialize)]
pub enum PortType {
    /// A port which accepts incoming signals (driven by at most one wire).
    Input,
    /// A port which provides outgoing signals (may fan out to many wires).
    Output
}
impl PortType {
    /// Checks if the port type accepts input signals.
    pub fn accepts_input(self) -> bool {
        matches!(self, PortType::Input)
    }

    /// Checks if the port type provides outgoing signals.
    pub fn accepts_output(self) -> bool {
        matches!(self, PortType::Output)
    }
}

/// A struct representing an update to a port's value during simulation.
///
/// This struct should only be used to represent the update
/// of an [`Output`] port.
///
/// [`Output`]: PortType::Output
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PortUpdate {
    /// Index of the port being updated.
    ///
    /// For example, this is an index of 2 when referring
    /// to the output of a two-input AND gate.
    pub index: usize,
    /// The new value to be assigned to the port at the given index.
    pub value: bool
}

/// The interface defining how a gate operates.
#[enum_dispatch]
pub trait Component {
    /// Returns the direction of every port of the gate, inputs first.
    ///
    /// It is assumed that the result of this function will not change when called multiple times.
    fn ports(&self) -> Vec<PortType>;

    /// Initializes the port state of the gate.
    ///
    /// If not specified, by default, every port starts low.
    fn initialize_port_state(&self, _state: &mut [bool]) {}

    /// Initializes the internal state of the gate.
    ///
    /// If not specified, by default, the gate has no internal state.
    fn initialize_inner_state(&self) -> Option<InnerFunctionState> {
        None
    }

    /// Whether this gate keeps state across ticks and can therefore
    /// legally break a feedback loop.
    fn is_stateful(&self) -> bool {
        false
    }

    /// Lets the gate observe its settled ports once the circuit reaches a fixed point.
    ///
    /// This is called for every gate evaluated during a convergence.
    /// Edge-triggered gates compare their inputs against the previous fixed point here,
    /// so values which only appear mid-convergence (glitches) are never seen.
    /// `may_latch` is false if the gate already latched during this convergence.
    ///
    /// Returns whether the gate latched, in which case it is evaluated again.
    fn settle(&self, _ports: &[bool], _inner_state: Option<&mut InnerFunctionState>, _may_latch: bool) -> bool {
        false
    }

    /// "Runs" the gate's function on a set of inputs, outputting a vector of updated ports
    /// after the function is applied.
    ///
    /// This function is called whenever an input of the gate may have changed.
    /// When that occurs, this function is called with the previously seen state and updated state
    /// of this gate's ports.
    ///
    /// An `Err` means the gate could not produce a defined result,
    /// in which case the engine holds the gate's outputs and records the issue.
    fn run(&self, ctx: RunContext<'_>) -> Result<Vec<PortUpdate>, EvalIssue> {
        self.validate_ports(ctx.old_ports);
        self.validate_ports(ctx.new_ports);
        self.run_inner(ctx)
    }

    /// Inner run function that, given a set of inputs, applies its modifications to output a vector
    /// of updated ports. This function is wrapped by run to ensure input validation
    fn run_inner(&self, ctx: RunContext<'_>) -> Result<Vec<PortUpdate>, EvalIssue>;

    /// Validates that the port slice matches the gate's port list.
    fn validate_ports(&self, ports: &[bool]) {
        // Only run in debug mode
        if cfg!(debug_assertions) {
            debug_assert_eq!(ports.len(), self.ports().len(), "Expected correct number of ports");
        }
    }
}

/// An enum that represents all supported gate kinds.
#[enum_dispatch(Component)]
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ComponentFn {
    // Combinational
    And, Or, Xor, Nand, Nor, Not, Mux, Custom,
    // Wiring
    Input, Output,
    // Stateful
    Clock, DFlipFlop, SrLatch
}

/// The triggering conditions for components based on a signal change.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Sensitivity {
    /// Triggered on any change in a signal (rising or falling edge).
    Anyedge,
    /// Triggered on rising edge of a signal (low to high clock transition).
    #[default]
    Posedge,
    /// Triggered on falling edge of a signal (high to low clock transition).
    Negedge
}
impl Sensitivity {
    /// Checks whether the change between the old and new value
    /// would create a trigger based on this sensitivity.
    ///
    /// ```
    /// use gatesim::func::Sensitivity;
    ///
    /// assert!(Sensitivity::Posedge.activated(false, true));
    /// assert!(Sensitivity::Negedge.activated(true, false));
    /// assert!(!Sensitivity::Posedge.activated(true, true));
    /// ```
    pub fn activated(self, old: bool, new: bool) -> bool {
        match self {
            Sensitivity::Anyedge => old != new,
            Sensitivity::Posedge => !old && new,
            Sensitivity::Negedge => old && !new,
        }
    }
}

/// All properties available when running a component.
#[derive(Debug)]
pub struct RunContext<'a> {
    /// The value of the ports at the gate's previous evaluation.
    pub old_ports: &'a [bool],
    /// The value of the ports after an update.
    pub new_ports: &'a [bool],
    /// The inner state of the component.
    pub inner_state: Option<&'a mut InnerFunctionState>
}

/// Helper function to more easily define port lists (for [`Component::ports`]).
fn port_list(config: &[(PortType, usize)]) -> Vec<PortType> {
    config.iter()
        .flat_map(|&(ty, ct)| std::iter::repeat_n(ty, ct))
        .collect()
}

/// Checks a gate parameter read from a serialized gate.
fn checked_param<T>(name: &'static str, value: T, range: RangeInclusive<T>) -> Result<T, ParameterOutOfRange>
    where T: Copy + PartialOrd + Into<u64>
{
    match range.contains(&value) {
        true => Ok(value),
        false => Err(ParameterOutOfRange {
            name,
            value: value.into(),
            min: (*range.start()).into(),
            max: (*range.end()).into()
        })
    }
}

/// Reads a little-endian bit pattern (bit `i` is `bits[i]`).
fn pattern_of(bits: &[bool]) -> u64 {
    bits.iter()
        .enumerate()
        .fold(0, |acc, (i, &b)| acc | (u64::from(b) << i))
}

/// Test helper which runs a stateless gate with the given port values.
#[cfg(test)]
fn run_pure(gate: &impl Component, ports: &[bool]) -> Result<Vec<PortUpdate>, EvalIssue> {
    gate.run(RunContext { old_ports: ports, new_ports: ports, inner_state: None })
}
