//! Client-side session lifecycle: the session controller and its persisted
//! token storage. Consumed by the capture/analysis and consultation UIs,
//! which only read `Session` snapshots and call `logout()`.

pub mod session;
pub mod storage;

pub use session::{Session, SessionController, SessionError, SessionPhase};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
