//! Low-level primitives shared across subsystems: interrupt masking and
//! the spin-lock types used wherever a subsystem needs mutual exclusion
//! without committing to a scheduler-aware lock.

pub(crate) mod irq;
pub(crate) mod sync;
