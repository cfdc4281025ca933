//! Handle types used to identify federates and object instances across a federation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

hla_time_keys::key_type!(
    /// Identifies a joined federate within a federation.
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub FederateHandle
);

hla_time_keys::key_type!(
    /// Identifies a registered object instance.
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub ObjectInstanceHandle
);
