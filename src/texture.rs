//! Texture descriptors.
//!
//! The host engine owns the actual GPU images; this crate only needs to
//! describe them (size, kind, sampling) and to hand identical descriptors
//! around when binding the same map to several state sets. A [`Texture`] is
//! therefore a cheaply clonable handle with pointer identity.

use std::sync::Arc;

/// Dimensionality of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    /// Plain 2D image.
    D2,
    /// Six-faced cube map.
    Cube,
}

/// Texel filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Coordinate wrapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wrap {
    ClampToEdge,
    ClampToBorder,
    Repeat,
}

#[derive(Debug)]
struct Descriptor {
    kind: TextureKind,
    size: [u32; 2],
    filter: Filter,
    wrap: Wrap,
    border_color: [f32; 4],
    render_target: bool,
}

/// Shared handle to a texture description.
///
/// Two handles compare equal only when they refer to the same underlying
/// texture, which is what state binding cares about.
#[derive(Clone, Debug)]
pub struct Texture {
    inner: Arc<Descriptor>,
}

impl PartialEq for Texture {
    fn eq(&self, other: &Texture) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Texture {
    /// A sampled 2D image.
    pub fn new_d2(size: [u32; 2]) -> Self {
        Texture {
            inner: Arc::new(Descriptor {
                kind: TextureKind::D2,
                size,
                filter: Filter::Linear,
                wrap: Wrap::Repeat,
                border_color: [0.0; 4],
                render_target: false,
            }),
        }
    }

    /// A sampled cube map.
    pub fn new_cube(size: u32) -> Self {
        Texture {
            inner: Arc::new(Descriptor {
                kind: TextureKind::Cube,
                size: [size, size],
                filter: Filter::Linear,
                wrap: Wrap::ClampToEdge,
                border_color: [0.0; 4],
                render_target: false,
            }),
        }
    }

    /// An offscreen 2D color target, used for shadow maps. Clamps to a
    /// border color of all ones so lookups outside the atlas read as
    /// fully lit.
    pub fn render_target(size: [u32; 2], filter: Filter) -> Self {
        Texture {
            inner: Arc::new(Descriptor {
                kind: TextureKind::D2,
                size,
                filter,
                wrap: Wrap::ClampToBorder,
                border_color: [1.0; 4],
                render_target: true,
            }),
        }
    }

    pub fn kind(&self) -> TextureKind {
        self.inner.kind
    }

    pub fn is_cube(&self) -> bool {
        self.inner.kind == TextureKind::Cube
    }

    pub fn size(&self) -> [u32; 2] {
        self.inner.size
    }

    pub fn filter(&self) -> Filter {
        self.inner.filter
    }

    pub fn wrap(&self) -> Wrap {
        self.inner.wrap
    }

    pub fn border_color(&self) -> [f32; 4] {
        self.inner.border_color
    }

    pub fn is_render_target(&self) -> bool {
        self.inner.render_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_not_structure() {
        let a = Texture::new_d2([64, 64]);
        let b = Texture::new_d2([64, 64]);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn render_target_clamps_to_white_border() {
        let t = Texture::render_target([2048, 2048], Filter::Nearest);
        assert_eq!(t.wrap(), Wrap::ClampToBorder);
        assert_eq!(t.border_color(), [1.0; 4]);
        assert!(t.is_render_target());
    }
}
