pub mod user;
pub mod department;
pub mod booking;
pub mod announcement;

pub use user::*;
pub use department::*;
pub use booking::*;
pub use announcement::*;
