#[allow(dead_code)]
#[path = "../support/mocks.rs"]
mod mocks;
mod steps;
mod world;

pub use world::EngineWorld;
