//! Priority, escalation, and queue estimators for the ticketing service.
//!
//! Everything in this crate is a pure recomputation over a snapshot of
//! input data: the priority calculator maps six weighted factor scores to a
//! ticket priority, the escalation stepper advances an SLA record's level
//! against its deadline, and the queue estimator ranks a candidate ticket
//! among the unresolved backlog and derives an expected wait. None of the
//! estimators keep state of their own; recomputing on unchanged input
//! yields identical output.

pub mod escalation;
pub mod priority;
pub mod queue;

#[cfg(test)]
mod tests;
