//! Spot allocation limits.

use serde::{Deserialize, Serialize};

/// Allocation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// How many times a booking retries after losing a spot claim race.
    #[serde(default = "default_max_claim_retries")]
    pub max_claim_retries: u32,
    /// Upper bound on spots requested in a single booking.
    #[serde(default = "default_max_spots_per_booking")]
    pub max_spots_per_booking: u32,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_claim_retries: default_max_claim_retries(),
            max_spots_per_booking: default_max_spots_per_booking(),
        }
    }
}

fn default_max_claim_retries() -> u32 {
    3
}

fn default_max_spots_per_booking() -> u32 {
    50
}
