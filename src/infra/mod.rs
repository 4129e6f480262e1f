//! Infrastructure layer for the refund desk
//!
//! Contains the error taxonomy and the trait seams for:
//! - The read-only and signer-bound ledger contract handles
//! - The FHE client (encryption, decryption with proof)

mod error;
mod traits;

pub use error::*;
pub use traits::*;
