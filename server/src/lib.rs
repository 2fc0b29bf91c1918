//! Build Server Protocol server for Xcode projects.
//!
//! [`serve`] reads framed JSON-RPC messages, resolves each through the
//! [`MethodRegistry`] and answers it on its own task against a shared [`ServerContext`].

mod context;
mod dispatch;
mod emitter;
mod handlers;
mod registry;
mod watch;

pub use context::{ServerContext, ServerOptions};
pub use dispatch::serve;
pub use emitter::{DID_CHANGE_BUILD_TARGET, PendingNotificationsEmitter, SOURCE_KIT_OPTIONS_CHANGED};
pub use handlers::{HandlerError, exit_code};
pub use registry::{MethodKind, MethodRegistry, NotificationMethod, RegistryError, RequestMethod};
pub use watch::{WATCHED_GLOBS, WatchFilter};
