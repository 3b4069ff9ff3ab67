// Domain-layer modules and shared errors/models
pub mod enrichment {
    pub use crate::enrichment::*;
}

pub mod checkout {
    pub use crate::checkout::*;
}

pub mod payment_builder {
    pub use crate::payment_builder::*;
}

pub mod poller {
    pub use crate::poller::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
