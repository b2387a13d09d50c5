//! Logging interface, contingent on the `defmt-03` feature
//!
//! Only enable `defmt-03` when debugging, and when you're certain that your
//! logger isn't using USB! The dispatcher logs from interrupt context.

macro_rules! trace {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt-03")]
        ::defmt::trace!($($args)*)
    };
}

macro_rules! debug {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt-03")]
        ::defmt::debug!($($args)*)
    };
}

macro_rules! warn {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt-03")]
        ::defmt::warn!($($args)*)
    };
}
