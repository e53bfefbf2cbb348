pub mod course;
pub mod name;
pub mod tenant;
pub mod user;
