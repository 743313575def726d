use glam::Vec3;

/// Converts a 0xRRGGBB colour to linear-ish RGB in 0..1.
pub fn color_from_hex(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32,
        ((hex >> 8) & 0xff) as f32,
        (hex & 0xff) as f32,
    ) / 255.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    Front,
    /// Only back faces are drawn. Used for outline shells.
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: Vec3,
    pub emissive: Vec3,
    pub metalness: f32,
    pub roughness: f32,
    pub side: Side,
    pub unlit: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self::standard(Vec3::ONE)
    }
}

impl Material {
    pub fn standard(color: Vec3) -> Self {
        Self {
            color,
            emissive: Vec3::ZERO,
            metalness: 0.0,
            roughness: 1.0,
            side: Side::Front,
            unlit: false,
        }
    }

    /// Ignores lighting entirely.
    pub fn basic(color: Vec3) -> Self {
        Self {
            unlit: true,
            ..Self::standard(color)
        }
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    pub fn with_pbr(mut self, metalness: f32, roughness: f32) -> Self {
        self.metalness = metalness.clamp(0.0, 1.0);
        self.roughness = roughness.clamp(0.04, 1.0);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    /// Sky colour from above, ground colour from below. Ambient lights use the same colour twice.
    Hemisphere {
        sky: Vec3,
        ground: Vec3,
        intensity: f32,
    },
    /// Shines from `position` towards the origin.
    Directional {
        position: Vec3,
        color: Vec3,
        intensity: f32,
    },
    Point {
        position: Vec3,
        color: Vec3,
        intensity: f32,
    },
}

impl Light {
    pub fn ambient(color: Vec3, intensity: f32) -> Self {
        Light::Hemisphere {
            sky: color,
            ground: color,
            intensity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors() {
        assert_eq!(color_from_hex(0xffffff), Vec3::ONE);
        assert_eq!(color_from_hex(0x000000), Vec3::ZERO);
        assert!(color_from_hex(0xff0000).abs_diff_eq(Vec3::X, 1e-6));
        assert!(color_from_hex(0x00e1ff).abs_diff_eq(Vec3::new(0.0, 225.0 / 255.0, 1.0), 1e-6));
    }

    #[test]
    fn basic_material_is_unlit() {
        let material = Material::basic(Vec3::ONE).with_side(Side::Back);
        assert!(material.unlit);
        assert_eq!(material.side, Side::Back);
    }
}
