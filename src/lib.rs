pub mod credential;
pub mod emit;
pub mod engine;
pub mod error;
pub mod export;
pub mod io;
pub mod kerberos;
pub mod report;
pub mod rows;
pub mod session;

pub mod prelude {
    pub use crate::credential::Credential;
    pub use crate::emit::Results;
    pub use crate::error::{ErrorDetail, PackageError};
    pub use crate::report::{Destination, OutputMode};
    pub use crate::session::{ExtractionResult, LogonSession};
}
