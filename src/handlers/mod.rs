pub mod hss;
pub mod seaf;
pub mod ue;

pub use hss::HssHandler;
pub use seaf::SeafHandler;
pub use ue::attach;
