// Model agents: declarative specs, the shared validate→preprocess→infer→decode pipeline,
// JSON artifacts and the read-only registry/router.

pub mod agent;
pub mod artifacts;
pub mod registry;
pub mod spec;

pub use agent::{ModelAgent, ValidationFailure};
pub use registry::{AgentInfo, AgentRegistry, AgentRegistryBuilder, RouteDecision};
pub use spec::{AgentSpec, AgentVariant};
