//! Tool catalog and resolution
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  ToolRegistry                               │
//! │                                             │
//! │  catalog      name -> ToolEntry             │
//! │  locals       name -> constructor           │
//! │  cache        CacheKey -> McpToolset        │
//! └─────────────────────────────────────────────┘
//!        │ resolve / resolve_many
//!        ▼
//! ┌──────────────────────┐   ┌──────────────────┐
//! │ ToolRuntime::Local   │   │ ToolRuntime::    │
//! │ (fresh instance)     │   │ Remote (shared)  │
//! └──────────────────────┘   └──────────────────┘
//! ```

mod cache;
mod entry;
mod local;
mod registry;
mod runtime;

pub use cache::CacheKey;
pub use entry::{DiscoveryStatus, ToolEntry};
pub use local::{local_constructor, FnTool, LocalConstructor, LocalFactoryTable, LocalTool};
pub use registry::{RegistryError, RegistryResult, ToolRegistry};
pub use runtime::ToolRuntime;
