//! Tool reference parsing
//!
//! A tool reference is the string an agent configuration uses to ask for
//! a tool. It is parsed once into a [`ToolReference`] and matched on from
//! then on.
//!
//! ```text
//! reference       := local-ref | remote-ref
//! local-ref       := tool-name                       ; "WebSearchTool"
//! remote-ref      := "mcp:" provider [ "[" caps "]" ] ; "mcp:github[create_issue]"
//!                  | "mcp:" provider ":" caps        ; catalog key form
//! caps            := capability ("," capability)*
//! ```

mod parser;

pub use parser::{
    ReferenceError, ReferenceResult, ToolKind, ToolReference, REMOTE_PREFIX,
    capability_key, server_key,
};
