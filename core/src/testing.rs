pub mod capture;
pub mod checker;
pub mod executor;
pub mod orchestrator;
pub mod store;
pub mod testcase;

pub use checker::*;
pub use executor::*;
pub use orchestrator::*;
pub use store::*;
pub use testcase::*;
