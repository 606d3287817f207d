mod build_plan;
mod lifetime;
mod mapping;

pub use build_plan::BuildPlanStrategy;
pub use lifetime::LifetimeStrategy;
pub use mapping::{BuildKeyMappingPolicy, BuildKeyMappingStrategy};
