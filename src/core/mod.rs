// Lead pipeline modules and shared errors/models
pub mod validation {
    pub use crate::validation::*;
}

pub mod dedup {
    pub use crate::dedup::*;
}

pub mod search {
    pub use crate::search::*;
}

pub mod quality {
    pub use crate::quality::*;
}

pub mod import_export {
    pub use crate::import_export::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod services {
    pub use crate::services::*;
}

pub mod errors {
    pub use crate::errors::*;
}
