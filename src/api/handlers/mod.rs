pub mod assets;
pub mod health;
pub mod media;
pub mod users;
