pub mod session;

pub use session::{ScopedSession, SessionError, SessionFactory};
