use serde::{Deserialize, Serialize};

use crate::error::{EvalIssue, ParameterOutOfRange};
use crate::func::{Component, PortType, PortUpdate, RunContext, checked_param, port_list};

/// Minimum number of inputs for multi-input logic gates.
pub const MIN_GATE_INPUTS: u8 = 2;
/// Maximum number of inputs for multi-input logic gates.
pub const MAX_GATE_INPUTS: u8 = 64;

/// Unchecked serialized form of a multi-input gate.
#[derive(Deserialize)]
struct GateDef {
    n_inputs: u8
}

macro_rules! gates {
    ($($(#[$m:meta])? $Id:ident: $f:expr, $invert:literal),*$(,)?) => {
        $(
            $(#[$m])?
            #[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
            #[serde(try_from = "GateDef")]
            pub struct $Id {
                n_inputs: u8
            }
            impl TryFrom<GateDef> for $Id {
                type Error = ParameterOutOfRange;

                fn try_from(def: GateDef) -> Result<Self, Self::Error> {
                    let n_inputs = checked_param("n_inputs", def.n_inputs, MIN_GATE_INPUTS..=MAX_GATE_INPUTS)?;
                    Ok(Self { n_inputs })
                }
            }
            impl $Id {
                /// Creates a new instance of the gate with the specified number of inputs.
                pub fn new(n_inputs: u8) -> Self {
                    Self {
                        n_inputs: n_inputs.clamp(MIN_GATE_INPUTS, MAX_GATE_INPUTS)
                    }
                }
            }
            impl Default for $Id {
                fn default() -> Self {
                    Self::new(MIN_GATE_INPUTS)
                }
            }
            impl Component for $Id {
                fn ports(&self) -> Vec<PortType> {
                    port_list(&[
                        // inputs
                        (PortType::Input, usize::from(self.n_inputs)),
                        // output
                        (PortType::Output, 1),
                    ])
                }
                fn run_inner(&self, ctx: RunContext<'_>) -> Result<Vec<PortUpdate>, EvalIssue> {
                    let n_inputs = usize::from(self.n_inputs);
                    let value = ctx.new_ports[..n_inputs].iter()
                        .copied()
                        .reduce($f)
                        .unwrap_or(false);

                    Ok(vec![PortUpdate {
                        index: n_inputs,
                        value: value ^ $invert
                    }])
                }
            }
        )*
    }
}

gates! {
    /// An AND gate.
    And:  |a, b| a & b, false,
    /// An OR gate.
    Or:   |a, b| a | b, false,
    /// An XOR gate (odd parity over all inputs).
    Xor:  |a, b| a ^ b, false,
    /// A NAND gate.
    Nand: |a, b| a & b, true,
    /// A NOR gate.
    Nor:  |a, b| a | b, true,
}

/// A NOT gate.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct Not;
impl Not {
    /// Creates a new instance of the NOT gate.
    pub fn new() -> Self {
        Self
    }
}
impl Component for Not {
    fn ports(&self) -> Vec<PortType> {
        port_list(&[
            // input
            (PortType::Input, 1),
            // output
            (PortType::Output, 1),
        ])
    }

    fn run_inner(&self, ctx: RunContext<'_>) -> Result<Vec<PortUpdate>, EvalIssue> {
        Ok(vec![PortUpdate { index: 1, value: !ctx.new_ports[0] }])
    }
}
