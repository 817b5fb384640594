//! Background tasks owned by the policy.

pub(crate) mod processor;
