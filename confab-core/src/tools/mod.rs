pub mod builtin;
pub mod dispatcher;
pub mod types;

#[cfg(test)]
mod tests;

pub use confab_macros::tool;
pub use builtin::{builtin_tools, AddTool, CurrentDateTool, MultiplyTool};
pub use dispatcher::ToolDispatcher;
pub use types::{AnyTool, Tool, ToolEmptyParams, ToolError, ToolExecution, ToolResult};
