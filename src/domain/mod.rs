// Domain layer: observation / outcome models and the ports (model handles, storage, pipeline).

pub mod model;
pub mod ports;
