pub mod constants;
pub mod error;
pub mod types;
pub mod account;
pub mod candidate;
pub mod protocol;
pub mod transaction;

pub use constants::*;
pub use error::TallyError;
pub use types::*;
pub use account::*;
pub use candidate::*;
pub use protocol::*;
pub use transaction::*;
