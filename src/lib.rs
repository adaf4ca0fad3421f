pub mod frame;
pub mod lookup;
pub mod session;
pub mod store;
pub mod supervisor;
pub mod tap;

pub use frame::{ControlFrame, ControlKind, Frame, FrameError};
pub use lookup::client::LookupClient;
pub use lookup::server::serve_lookup;
pub use lookup::LookupError;
pub use session::{FramestreamError, FramestreamSession};
pub use store::{Store, StoreError};
pub use supervisor::{Config, Supervisor, SupervisorError};
pub use tap::{TapError, TapObservation};

/// Error returned by most functions.
///
/// When writing a real application, one might want to consider a specialized
/// error handling crate or defining an error type as an `enum` of causes.
/// Here, each module already carries its own `thiserror` enum for the
/// failures a caller might want to branch on; this boxed form is only used
/// at the seam where the supervisor collapses all of them into a process
/// exit code.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for bindrev operations.
pub type Result<T> = std::result::Result<T, Error>;
