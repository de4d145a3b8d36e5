//! Strong-typed UUID identifiers for domain entities.

use crate::define_id;

define_id!(JobId, "Strong typed identifier for a validation job");
