pub mod lock;
pub mod naming;
