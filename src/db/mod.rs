pub mod albums;
pub mod general;
pub mod images;
pub mod tags;
pub mod users;
