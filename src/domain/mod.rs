// Domain layer: twin web models, ports (interfaces) and pure relation logic.

pub mod model;
pub mod ports;
pub mod relations;
