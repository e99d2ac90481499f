pub mod domain;
pub mod error;
pub mod field;
pub mod payload;
pub mod resolver;
pub mod storage;
pub mod view;

// Re-export commonly used types
pub use domain::*;
pub use error::*;
pub use field::{AddressField, AddressInput};
pub use payload::{AddressPayload, EntityRef};
pub use resolver::{AddressResolver, ResolveOptions, ResolvedChain};
pub use storage::{run_atomic, InMemoryStorage, Storage};
pub use view::AddressView;

// Re-export external dependencies that consumers will need
pub use chrono;
pub use serde;
pub use serde_json;
pub use uuid;
