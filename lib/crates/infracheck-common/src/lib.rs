//! Value types shared between the infracheck engine and its adapters.
//!
//! Variables flowing into the provisioning tool and outputs flowing back out
//! are both modelled as tagged values so assertion code cannot silently
//! compare a map against a string.

pub mod outputs;
pub mod vars;

pub use outputs::{OutputError, OutputSet, OutputValue};
pub use vars::VarValue;
