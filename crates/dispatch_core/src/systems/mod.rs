pub mod client_tick;
pub mod driver_tick;
pub mod housekeeping;
