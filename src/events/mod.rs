pub mod notifier;

pub use notifier::{EventNotifier, TaskEvent};
