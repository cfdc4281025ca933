//! Static federation membership a test harness or ambassador binding hands to a
//! [`TimeManagement`](crate::TimeManagement) engine at startup.
//!
//! The engine itself takes no configuration beyond its constructor arguments (lookahead, time
//! factory); this type exists only to carry the handshake identity and peer set an embedder
//! already knows before wiring the engine up, mirroring the teacher's own `Config`.

use hla_time_core::FederateHandle;

use crate::protocol::{FedIds, NeighborStructure};

/// A federate's static join configuration: its identity and its upstream/downstream peers in the
/// deadlock-detection neighbor structure.
#[derive(Debug, Clone)]
pub struct RtiConfig {
    pub fed_ids: FedIds,
    pub neighbors: NeighborStructure,
}

impl RtiConfig {
    pub fn new(federate: FederateHandle, federation_id: impl Into<String>, neighbors: NeighborStructure) -> Self {
        Self {
            fed_ids: FedIds {
                federate_handle: federate,
                federation_id: federation_id.into(),
            },
            neighbors,
        }
    }

    pub fn federate(&self) -> FederateHandle {
        self.fed_ids.federate_handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_fills_in_fed_ids_from_parts() {
        let config = RtiConfig::new(FederateHandle::from(3usize), "federation-a", NeighborStructure::default());
        assert_eq!(config.federate(), FederateHandle::from(3usize));
        assert_eq!(config.fed_ids.federation_id, "federation-a");
    }
}
