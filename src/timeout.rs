//! Busy-wait budgets
//!
//! The driver never waits on a wall clock. Instead, each wait polls a
//! register condition at most a fixed number of times. Running out of
//! polls is a timeout, and the caller sees [`Error::Timeout`](crate::Error::Timeout).

use crate::Error;

/// A busy-wait budget, counted in polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    polls: Option<u32>,
}

impl Timeout {
    /// The budget for the EP0 transmitter to become ready before
    /// latching a new device address.
    pub const SET_ADDRESS: Timeout = Timeout::polls(3_000);

    /// The budget for each step of a control OUT read.
    pub const CONTROL_READ: Timeout = Timeout::polls(300_000);

    /// The default budget for PLL lock during initialization.
    pub const PLL_LOCK: Timeout = Timeout::polls(1_000_000);

    /// Give up after polling `polls` times
    ///
    /// A budget of zero polls always times out.
    pub const fn polls(polls: u32) -> Self {
        Timeout { polls: Some(polls) }
    }

    /// Never give up
    ///
    /// An unbounded wait will hang forever if the hardware never signals.
    pub const fn unbounded() -> Self {
        Timeout { polls: None }
    }

    /// Returns the poll budget, or `None` if the budget is unbounded
    pub const fn budget(&self) -> Option<u32> {
        self.polls
    }

    /// Poll `ready` until it returns `true`
    ///
    /// Returns [`Error::Timeout`] if the budget runs out first.
    pub fn wait(self, mut ready: impl FnMut() -> bool) -> Result<(), Error> {
        match self.polls {
            Some(polls) => {
                for _ in 0..polls {
                    if ready() {
                        return Ok(());
                    }
                }
                Err(Error::Timeout)
            }
            None => {
                while !ready() {}
                Ok(())
            }
        }
    }
}
