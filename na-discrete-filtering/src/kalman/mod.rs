
pub use self::srkf::{analyse, forecast, Estimate, FilterRun, SquareRootFilter};

pub mod srkf;
