pub mod args;
pub mod task;

// Re-export core models for easy access
pub use args::{ConnectionRef, TaskArgs};
pub use task::{NewTask, SearchCursor, Task, TaskFilter, TaskState};
