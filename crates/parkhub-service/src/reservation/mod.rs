//! Booking and the reservation state machine.

pub mod allocator;
pub mod cost;
pub mod lifecycle;

pub use allocator::SpotAllocator;
pub use cost::compute_cost;
pub use lifecycle::ReservationLifecycle;
