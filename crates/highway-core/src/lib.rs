pub mod chart;
pub mod clock;
pub mod constants;
pub mod driver;
pub mod error;
pub mod sched;
pub mod transport;
pub mod window;

pub use chart::*;
pub use clock::*;
pub use constants::*;
pub use driver::*;
pub use error::*;
pub use sched::*;
pub use transport::*;
pub use window::*;
