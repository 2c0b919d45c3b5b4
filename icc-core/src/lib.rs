//! Core domain logic for the intelligent controller: the registry store
//! adapter, resource-manager adapter, I/O-set admission controller and
//! malleability coordinator. Transport-agnostic; `icc-server` wires these
//! onto HTTP handlers.

pub mod ioset;
pub mod malleability;
pub mod model;
pub mod resource_manager;
pub mod store;
