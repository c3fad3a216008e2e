pub mod builtin;
pub mod dispatcher;
pub mod factory;
pub mod registry;
pub mod traits;
pub mod types;

pub use dispatcher::{ToolDispatcher, validate_args};
pub use factory::{build_registry, default_tools};
pub use registry::{ToolRegistration, ToolRegistry};
pub use traits::{FnTool, Tool, ToolFuture};
pub use types::{ParamType, ParameterSchema, ParameterSpec, ToolDescriptor, ToolResult};
