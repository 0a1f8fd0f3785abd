pub mod harness;
pub mod socket_guard;
