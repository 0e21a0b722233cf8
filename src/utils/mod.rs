pub mod hashing;
pub use hashing::{sha256_bytes, sha256_file};
