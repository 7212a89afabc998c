pub mod review;
pub mod streams;

pub use review::ReviewService;
pub use streams::StreamCountService;
