pub mod observer;
pub mod selector;

pub use observer::NoopResponseObserver;
pub use selector::ResponseSelector;
