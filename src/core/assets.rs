// src/core/assets.rs
use crate::core::gfx::{Backend, Texture};
use image::RgbaImage;
use log::warn;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::error::Error;
use std::sync::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TexMeta { pub w: u32, pub h: u32 }

static TEX_META: Lazy<RwLock<HashMap<String, TexMeta>>> = Lazy::new(|| RwLock::new(HashMap::new()));

pub fn register_texture_dims(key: &str, w: u32, h: u32) {
    let mut m = TEX_META.write().unwrap_or_else(|p| p.into_inner());
    m.insert(key.to_string(), TexMeta { w, h });
}

pub fn texture_dims(key: &str) -> Option<TexMeta> {
    TEX_META.read().unwrap_or_else(|p| p.into_inner()).get(key).copied()
}

/// Pixel size as floats, the shape layout code wants.
pub fn texture_size(key: &str) -> Option<(f32, f32)> {
    texture_dims(key).map(|m| (m.w as f32, m.h as f32))
}

/// GPU textures keyed by image url.
#[derive(Default)]
pub struct TextureStore {
    pub textures: HashMap<String, Texture>,
}

impl TextureStore {
    pub fn new() -> Self { Self::default() }

    /// Uploads `image` under `key` and records its size.
    pub fn insert(&mut self, backend: &mut Backend, key: &str, image: &RgbaImage) -> Result<(), Box<dyn Error>> {
        if self.textures.contains_key(key) {
            warn!("Texture '{}' already uploaded; keeping the first.", key);
            return Ok(());
        }
        let texture = backend.create_texture(image)?;
        register_texture_dims(key, image.width(), image.height());
        self.textures.insert(key.to_string(), texture);
        Ok(())
    }

    pub fn len(&self) -> usize { self.textures.len() }

    pub fn is_empty(&self) -> bool { self.textures.is_empty() }
}
