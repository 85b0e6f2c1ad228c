// src/ui/actors.rs

/// A sprite can be sourced from either a texture or a solid color.
/// For `Solid`, the final color is `tint` (no sampling).
#[derive(Clone, Debug, PartialEq)]
pub enum SpriteSource {
    /// Texture registry key; item images use their url.
    Texture(String),
    Solid,
}

#[derive(Clone, Debug)]
pub enum Actor {
    Sprite {
        offset: [f32; 2], // parent top-left space
        size: [f32; 2],
        source: SpriteSource,
        tint: [f32; 4],
        z: i16,
        visible: bool,
    },

    /// Positions children relative to its own top-left. With `clip`, children
    /// are cut to the frame's rectangle.
    Frame {
        offset: [f32; 2],
        size: [f32; 2],
        children: Vec<Actor>,
        background: Option<[f32; 4]>,
        z: i16,
        clip: bool,
    },
}

impl Actor {
    #[inline(always)]
    pub fn z(&self) -> i16 {
        match self {
            Actor::Sprite { z, .. } | Actor::Frame { z, .. } => *z,
        }
    }
}

/// Textured sprite, white-tinted at `alpha`.
#[inline(always)]
pub fn image(key: &str, x: f32, y: f32, w: f32, h: f32, alpha: f32, z: i16) -> Actor {
    Actor::Sprite {
        offset: [x, y],
        size: [w, h],
        source: SpriteSource::Texture(key.to_string()),
        tint: [1.0, 1.0, 1.0, alpha],
        z,
        visible: alpha > 0.0,
    }
}

#[inline(always)]
pub fn quad(x: f32, y: f32, w: f32, h: f32, color: [f32; 4], z: i16) -> Actor {
    Actor::Sprite {
        offset: [x, y],
        size: [w, h],
        source: SpriteSource::Solid,
        tint: color,
        z,
        visible: color[3] > 0.0,
    }
}

/// Clipped frame.
#[inline(always)]
pub fn surface(x: f32, y: f32, w: f32, h: f32, background: [f32; 4], children: Vec<Actor>) -> Actor {
    Actor::Frame {
        offset: [x, y],
        size: [w, h],
        children,
        background: Some(background),
        z: 0,
        clip: true,
    }
}
