//! Session bookkeeping for transient client connections.
//!
//! A session is created detached and bound to a single job. When a transport
//! (an outbound channel drained by a socket writer) is attached it becomes
//! live; it stays live until the transport closes or the session is explicitly
//! disconnected. Disconnecting never removes the binding, so the job behind a
//! session keeps running and a later reconnect can pick up its notifications.
//!
//! Each attached transport carries a [`ConnectionId`]. Attaching again replaces
//! the transport, and cleanup through [`SessionManager::release`] only acts on
//! the transport it names, so a socket that was replaced cannot detach its
//! successor.
//!
//! [`SessionManager::notify`] is the only way to deliver to a session. It never
//! fails loudly: a closed or stalled transport marks the session disconnected
//! and the call reports `false`.

pub mod errors;
pub mod manager;
pub mod state;
pub mod types;

pub use errors::SessionError;
pub use manager::{SessionManager, SessionStats, DEFAULT_DELIVERY_TIMEOUT};
pub use state::SessionState;
pub use types::{ConnectionId, SessionId};
