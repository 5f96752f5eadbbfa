use serde::{Deserialize, Serialize};

use crate::circuit::state::InnerFunctionState;
use crate::error::EvalIssue;
use crate::func::{Component, PortType, PortUpdate, RunContext, port_list};

/// An input, toggled externally.
///
/// Its value is held in its inner state and only changes
/// through [`Circuit::set_input`].
///
/// [`Circuit::set_input`]: crate::circuit::Circuit::set_input
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct Input {
    initial: bool
}
impl Input {
    /// Creates a new input which starts at the given value.
    pub fn new(initial: bool) -> Self {
        Self { initial }
    }
}
impl Component for Input {
    fn ports(&self) -> Vec<PortType> {
        port_list(&[
            // output
            (PortType::Output, 1),
        ])
    }

    fn initialize_inner_state(&self) -> Option<InnerFunctionState> {
        Some(InnerFunctionState::Bit(self.initial))
    }

    fn run_inner(&self, ctx: RunContext<'_>) -> Result<Vec<PortUpdate>, EvalIssue> {
        let Some(&mut InnerFunctionState::Bit(value)) = ctx.inner_state else {
            unreachable!("Input's inner state was not a bit");
        };
        Ok(vec![PortUpdate { index: 0, value }])
    }
}

/// An output, observed externally.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct Output;
impl Output {
    /// Creates a new output.
    pub fn new() -> Self {
        Self
    }
}
impl Component for Output {
    fn ports(&self) -> Vec<PortType> {
        port_list(&[
            // observed value
            (PortType::Input, 1),
        ])
    }

    fn run_inner(&self, _ctx: RunContext<'_>) -> Result<Vec<PortUpdate>, EvalIssue> {
        Ok(vec![])
    }
}
