pub mod schema;

pub use schema::{
    Config, ExchangeConfig, ReliabilityConfig, ScenariosConfig, ToolsConfig,
    validate_max_iterations,
};
