//! External service integrations.

pub mod identity_client {
    pub use crate::identity_client::*;
}
