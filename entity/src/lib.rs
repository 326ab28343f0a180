pub mod users;
pub mod vendors;
