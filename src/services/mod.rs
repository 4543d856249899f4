//! 服务层模块
//!
//! 包含核心业务逻辑

pub mod coordinator;
pub mod fetch;
pub mod stack;

#[cfg(test)]
pub(crate) mod test_support;

pub use coordinator::{UpdateCoordinator, UpdateError};
pub use fetch::{ArchiveFetcher, FetchError};
pub use stack::{ComposeCommand, ComposeStackController, StackController, StackError};
