use serde::{Deserialize, Serialize};

use crate::circuit::state::InnerFunctionState;
use crate::error::EvalIssue;
use crate::func::{Component, PortType, PortUpdate, RunContext, Sensitivity, port_list};

/// Output updates for a stored bit on ports `q` and `q + 1` (Q and Q̅).
fn stored_outputs(q: usize, bit: bool) -> Vec<PortUpdate> {
    vec![
        PortUpdate { index: q, value: bit },
        PortUpdate { index: q + 1, value: !bit },
    ]
}

/// The state of a [`DFlipFlop`].
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct FlopState {
    /// The latched bit.
    pub bit: bool,
    /// The clock input at the last fixed point.
    pub clock: bool
}

/// An edge-triggered D flip-flop.
///
/// Ports are `D`, `CLK`, `Q`, `Q̅`.
/// The outputs reflect the latched bit, never the live `D` input.
///
/// Edges are taken between settled clock values,
/// so a clock which only pulses mid-convergence is not an edge.
/// `D` is sampled as it settled before the edge reached the outputs.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct DFlipFlop {
    trigger: Sensitivity
}
impl DFlipFlop {
    /// Creates a new rising-edge D flip-flop.
    pub fn new() -> Self {
        Self { trigger: Sensitivity::Posedge }
    }

    /// Creates a new D flip-flop which latches on the specified clock edge.
    pub fn with_trigger(trigger: Sensitivity) -> Self {
        Self { trigger }
    }
}
impl Component for DFlipFlop {
    fn ports(&self) -> Vec<PortType> {
        port_list(&[
            // d, clock
            (PortType::Input, 2),
            // q, q'
            (PortType::Output, 2),
        ])
    }
    fn initialize_port_state(&self, state: &mut [bool]) {
        state[3] = true;
    }
    fn initialize_inner_state(&self) -> Option<InnerFunctionState> {
        Some(InnerFunctionState::Flop(FlopState::default()))
    }
    fn is_stateful(&self) -> bool {
        true
    }
    fn settle(&self, ports: &[bool], inner_state: Option<&mut InnerFunctionState>, may_latch: bool) -> bool {
        let Some(InnerFunctionState::Flop(state)) = inner_state else {
            unreachable!("D flip-flop's inner state was not a flip-flop state");
        };

        let latch = may_latch && self.trigger.activated(state.clock, ports[1]);
        state.clock = ports[1];
        if latch {
            state.bit = ports[0];
        }
        latch
    }
    fn run_inner(&self, ctx: RunContext<'_>) -> Result<Vec<PortUpdate>, EvalIssue> {
        let Some(&mut InnerFunctionState::Flop(state)) = ctx.inner_state else {
            unreachable!("D flip-flop's inner state was not a flip-flop state");
        };
        Ok(stored_outputs(2, state.bit))
    }
}

/// A set/reset latch.
///
/// Ports are `S`, `R`, `Q`, `Q̅`.
/// Setting both `S` and `R` is illegal: the latch holds its bit and reports an issue.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct SrLatch;
impl SrLatch {
    /// Creates a new SR latch.
    pub fn new() -> Self {
        Self
    }
}
impl Component for SrLatch {
    fn ports(&self) -> Vec<PortType> {
        port_list(&[
            // s, r
            (PortType::Input, 2),
            // q, q'
            (PortType::Output, 2),
        ])
    }
    fn initialize_port_state(&self, state: &mut [bool]) {
        state[3] = true;
    }
    fn initialize_inner_state(&self) -> Option<InnerFunctionState> {
        Some(InnerFunctionState::Bit(false))
    }
    fn is_stateful(&self) -> bool {
        true
    }
    fn run_inner(&self, ctx: RunContext<'_>) -> Result<Vec<PortUpdate>, EvalIssue> {
        let Some(InnerFunctionState::Bit(q)) = ctx.inner_state else {
            unreachable!("SR latch's inner state was not a bit");
        };

        match (ctx.new_ports[0], ctx.new_ports[1]) {
            (true, true) => return Err(EvalIssue::IllegalLatchState),
            (true, false) => *q = true,
            (false, true) => *q = false,
            (false, false) => {}
        }
        Ok(stored_outputs(2, *q))
    }
}
