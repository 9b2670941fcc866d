pub mod chain;
pub mod jobs;
pub mod state;
pub mod validation;

pub use chain::*;
pub use jobs::*;
pub use state::*;
pub use validation::*;
