pub mod chrome_session;
pub mod js_executor;
pub mod session;

#[cfg(test)]
pub mod scripted;

pub use chrome_session::{ChromeMode, ChromeSession, ChromeSessionFactory};
pub use js_executor::JsExecutor;
pub use session::{DocumentScope, ElementState, Selector, Session, SessionFactory};
