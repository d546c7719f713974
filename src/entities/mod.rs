pub mod prelude;

pub mod asset_media;
pub mod assets;
pub mod media;
pub mod users;
