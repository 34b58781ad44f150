pub mod adjudicator;
pub mod convergence_loop;
pub mod extraction;
pub mod fleet;
pub mod normalizer;
pub mod prompts;
pub mod supervisor;

pub use adjudicator::VerificationAdjudicator;
pub use convergence_loop::ConvergenceLoop;
pub use fleet::{AttemptLauncher, FleetCoordinator, WorkerLauncher};
pub use prompts::PromptSet;
pub use supervisor::AttemptSupervisor;
