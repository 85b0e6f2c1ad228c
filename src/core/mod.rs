pub mod assets;
pub mod gfx;
pub mod images;
pub mod space;
pub mod transport;
