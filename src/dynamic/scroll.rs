use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One downward sweep: `step_count` scrolls of `step_size_px`, pausing
/// `step_delay_ms` after each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollPass {
    pub step_count: u32,
    pub step_size_px: u32,
    pub step_delay_ms: u64,
}

impl ScrollPass {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

impl Default for ScrollPass {
    fn default() -> Self {
        Self {
            step_count: 40,
            step_size_px: 500,
            step_delay_ms: 1000,
        }
    }
}

/// Timed settle/scroll sequence that coaxes lazy readers into loading every
/// page before the DOM is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollPlan {
    pub initial_settle_ms: u64,
    pub first_pass: ScrollPass,
    pub reset_settle_ms: u64,
    pub second_pass: ScrollPass,
    pub final_settle_ms: u64,
}

impl Default for ScrollPlan {
    fn default() -> Self {
        Self {
            initial_settle_ms: 8000,
            first_pass: ScrollPass::default(),
            reset_settle_ms: 2000,
            second_pass: ScrollPass {
                step_count: 25,
                step_size_px: 400,
                step_delay_ms: 500,
            },
            final_settle_ms: 2000,
        }
    }
}

impl ScrollPlan {
    /// Same steps as the default plan without any waiting.
    pub fn instant() -> Self {
        let plan = Self::default();
        Self {
            initial_settle_ms: 0,
            first_pass: ScrollPass {
                step_delay_ms: 0,
                ..plan.first_pass
            },
            reset_settle_ms: 0,
            second_pass: ScrollPass {
                step_delay_ms: 0,
                ..plan.second_pass
            },
            final_settle_ms: 0,
        }
    }

    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }

    pub fn final_settle(&self) -> Duration {
        Duration::from_millis(self.final_settle_ms)
    }

    /// Wall-clock time the plan spends waiting.
    pub fn total_wait(&self) -> Duration {
        let pass = |p: &ScrollPass| p.step_delay() * p.step_count;
        self.initial_settle()
            + pass(&self.first_pass)
            + self.reset_settle()
            + pass(&self.second_pass)
            + self.final_settle()
    }
}
