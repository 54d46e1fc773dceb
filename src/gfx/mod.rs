pub mod blit;
pub mod context;
pub mod light;
pub mod texture;

pub use context::GpuContext;
pub use light::{PointLight, PointLightRaw};
pub use texture::Texture;
