pub mod constants;
pub mod frame;
pub mod live_config;
pub mod model_resolver;
