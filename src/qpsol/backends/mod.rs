//! Built-in QP backends.

pub(crate) mod splitqp;
