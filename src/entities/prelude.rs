pub use super::asset_media::Entity as AssetMedia;
pub use super::assets::Entity as Assets;
pub use super::media::Entity as Media;
pub use super::users::Entity as Users;
