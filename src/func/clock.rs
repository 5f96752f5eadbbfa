use serde::{Deserialize, Serialize};

use crate::circuit::state::InnerFunctionState;
use crate::error::{EvalIssue, ParameterOutOfRange};
use crate::func::{Component, PortType, PortUpdate, RunContext, checked_param, port_list};

/// The schedule position of a [`Clock`].
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct ClockState {
    /// Ticks spent at the current level.
    pub phase: u32,
    /// The current output level.
    pub level: bool
}

/// A clock source.
///
/// A clock holds each level for `period` ticks (a full cycle is `2 * period` ticks),
/// starting low. Convergence never changes a clock's output;
/// only the time stepper advances it (see [`Clock::tick`]).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(try_from = "ClockDef")]
pub struct Clock {
    period: u32
}

#[derive(Deserialize)]
struct ClockDef {
    period: u32
}
impl TryFrom<ClockDef> for Clock {
    type Error = ParameterOutOfRange;

    fn try_from(def: ClockDef) -> Result<Self, Self::Error> {
        let period = checked_param("period", def.period, 1..=u32::MAX)?;
        Ok(Self { period })
    }
}
impl Clock {
    /// Creates a new clock which toggles every `period` ticks.
    pub fn new(period: u32) -> Self {
        Self { period: period.max(1) }
    }

    /// The number of ticks each level is held for.
    pub fn period(&self) -> u32 {
        self.period
    }

    /// Advances the schedule by one tick, returning whether the clock toggled.
    ///
    /// A phase already past the period toggles on the next tick.
    pub fn tick(&self, state: &mut ClockState) -> bool {
        state.phase = state.phase.saturating_add(1);
        if state.phase >= self.period {
            state.phase = 0;
            state.level = !state.level;
            true
        } else {
            false
        }
    }
}
impl Default for Clock {
    fn default() -> Self {
        Self::new(1)
    }
}
impl Component for Clock {
    fn ports(&self) -> Vec<PortType> {
        port_list(&[
            // output
            (PortType::Output, 1),
        ])
    }

    fn initialize_inner_state(&self) -> Option<InnerFunctionState> {
        Some(InnerFunctionState::Clock(ClockState::default()))
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn run_inner(&self, ctx: RunContext<'_>) -> Result<Vec<PortUpdate>, EvalIssue> {
        let Some(&mut InnerFunctionState::Clock(state)) = ctx.inner_state else {
            unreachable!("Clock's inner state was not a clock schedule");
        };
        Ok(vec![PortUpdate { index: 0, value: state.level }])
    }
}
