//! Persistence seam — trait-based storage for questionnaires, sessions, and
//! answers.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::Store;
