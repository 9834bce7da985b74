pub mod display;
pub mod models;
pub mod poller;
pub mod smoother;

pub use models::{JobStatus, ProgressReading, ProgressSnapshot};
pub use poller::{PollConfig, PollOutcome, ProgressPoller, ProgressSource};
pub use smoother::ProgressSmoother;
