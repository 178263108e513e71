use crate::runtime::blueprint::NodeIndex;
use crate::runtime::clock::Clock;

/// What a continuation does when it is picked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Assign parameters and run the node from scratch.
    Dispatch,
    /// Call `run` again on a node that reported it is still running.
    Rerun,
    /// The node is done; pick its ending.
    Resolve,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wake {
    Immediate,
    /// Next tick. Held back while the clock is frozen unless real time drives the list.
    NextTick { hold_while_frozen: bool },
    At { deadline: f64, realtime: bool },
}

/// One pending piece of work for a branch of a running list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Continuation {
    pub node_index: NodeIndex,
    pub step: Step,
    /// Node whose ending produced this continuation. Used to capture resume points.
    pub from: Option<NodeIndex>,
    pub wake: Wake,
}

impl Continuation {
    pub fn now(node_index: NodeIndex, step: Step, from: Option<NodeIndex>) -> Self {
        Self { node_index, step, from, wake: Wake::Immediate }
    }

    pub fn deferred(node_index: NodeIndex, step: Step, from: Option<NodeIndex>, wake: Wake) -> Self {
        Self { node_index, step, from, wake }
    }

    pub fn is_immediate(&self) -> bool {
        self.wake == Wake::Immediate
    }

    pub fn is_due(&self, clock: &Clock) -> bool {
        match self.wake {
            Wake::Immediate => true,
            Wake::NextTick { hold_while_frozen } => !hold_while_frozen || !clock.is_frozen(),
            Wake::At { deadline, realtime } => {
                let now = if realtime { clock.real_time() } else { clock.scaled_time() };
                now >= deadline
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn realtime_deadlines_ignore_time_scale() {
        let mut clock = Clock::new();
        clock.set_time_scale(0.0);
        let scaled = Continuation::deferred(1, Step::Rerun, Some(1), Wake::At { deadline: 0.5, realtime: false });
        let real = Continuation::deferred(1, Step::Rerun, Some(1), Wake::At { deadline: 0.5, realtime: true });
        let held = Continuation::deferred(1, Step::Rerun, Some(1), Wake::NextTick { hold_while_frozen: true });

        clock.advance(Duration::from_millis(500));
        assert!(!scaled.is_due(&clock));
        assert!(real.is_due(&clock));
        assert!(!held.is_due(&clock));
    }
}
