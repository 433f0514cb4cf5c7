pub mod app_state_builder;
pub mod factories;
pub mod mocks;
