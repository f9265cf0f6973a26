// Domain layer: records, schema and the ports adapters plug into.

pub mod model;
pub mod ports;
