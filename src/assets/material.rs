//! Flat, GPU-uploadable material representation.
//!
//! Grounded in `original_source/.../assets/ImportedData.hpp`'s
//! `ImportedMaterial`/`ImportedTextureSlot`: the importer's rich struct is
//! flattened here into the POD layout the asset database stores and the
//! render batcher classifies against (spec §3/§4.8).

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// glTF alpha mode, spec §3 C3.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    Opaque = 0,
    Mask = 1,
    Blend = 2,
}

impl AlphaMode {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => AlphaMode::Mask,
            2 => AlphaMode::Blend,
            _ => AlphaMode::Opaque,
        }
    }
}

/// Address mode for a material's texture slot. Mirrors `wgpu::AddressMode`'s
/// three variants so the field can be widened to the real enum at the RHI
/// boundary without a lossy conversion.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerAddressMode {
    Repeat = 0,
    ClampToEdge = 1,
    MirrorRepeat = 2,
}

/// One material texture binding: which texture, how it's sampled, which UV
/// channel, and a `(offset.xy, scale.xy)` UV transform.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TextureSlot {
    /// Index into [`crate::assets::database::AssetDatabase::textures`], or
    /// `-1` when unbound (spec §4.3 texture list convention).
    pub texture_index: i32,
    pub address_mode: u32,
    pub uv_channel: u32,
    pub transform: Vec4,
}

impl Default for TextureSlot {
    fn default() -> Self {
        Self {
            texture_index: -1,
            address_mode: SamplerAddressMode::Repeat as u32,
            uv_channel: 0,
            transform: Vec4::new(0.0, 0.0, 1.0, 1.0),
        }
    }
}

/// Flat PBR material record, one per entry of
/// [`crate::assets::database::AssetDatabase::materials`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialData {
    pub base_color_factor: Vec4,
    pub emissive_factor: Vec3,
    pub emissive_strength: f32,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub alpha_cutoff: f32,
    pub alpha_mode: u32,
    pub normal_scale: f32,
    pub occlusion_strength: f32,
    pub ior: f32,
    pub transmission_factor: f32,
    pub clearcoat_factor: f32,
    pub clearcoat_roughness_factor: f32,
    pub specular_factor: f32,
    pub specular_color_factor: Vec3,
    pub sheen_color_factor: Vec3,
    pub sheen_roughness_factor: f32,
    pub anisotropy_factor: f32,
    pub anisotropy_rotation: f32,
    pub iridescence_factor: f32,
    pub iridescence_ior: f32,
    pub volume_thickness_factor: f32,
    pub volume_attenuation_color: Vec3,
    pub double_sided: u32,

    pub base_color: TextureSlot,
    pub normal: TextureSlot,
    pub metallic_roughness: TextureSlot,
    pub occlusion: TextureSlot,
    pub emissive: TextureSlot,
    pub clearcoat: TextureSlot,
    pub clearcoat_roughness: TextureSlot,
    pub clearcoat_normal: TextureSlot,
    pub specular: TextureSlot,
    pub specular_color: TextureSlot,
    pub transmission: TextureSlot,
    pub sheen_color: TextureSlot,
    pub sheen_roughness: TextureSlot,
    pub anisotropy: TextureSlot,
    pub iridescence: TextureSlot,
    pub iridescence_thickness: TextureSlot,
    pub volume_thickness: TextureSlot,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            base_color_factor: Vec4::ONE,
            emissive_factor: Vec3::ZERO,
            emissive_strength: 1.0,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            alpha_cutoff: 0.5,
            alpha_mode: AlphaMode::Opaque as u32,
            normal_scale: 1.0,
            occlusion_strength: 1.0,
            ior: 1.5,
            transmission_factor: 0.0,
            clearcoat_factor: 0.0,
            clearcoat_roughness_factor: 0.0,
            specular_factor: 1.0,
            specular_color_factor: Vec3::ONE,
            sheen_color_factor: Vec3::ZERO,
            sheen_roughness_factor: 0.0,
            anisotropy_factor: 0.0,
            anisotropy_rotation: 0.0,
            iridescence_factor: 0.0,
            iridescence_ior: 1.3,
            volume_thickness_factor: 0.0,
            volume_attenuation_color: Vec3::ONE,
            double_sided: 0,
            base_color: TextureSlot::default(),
            normal: TextureSlot::default(),
            metallic_roughness: TextureSlot::default(),
            occlusion: TextureSlot::default(),
            emissive: TextureSlot::default(),
            clearcoat: TextureSlot::default(),
            clearcoat_roughness: TextureSlot::default(),
            clearcoat_normal: TextureSlot::default(),
            specular: TextureSlot::default(),
            specular_color: TextureSlot::default(),
            transmission: TextureSlot::default(),
            sheen_color: TextureSlot::default(),
            sheen_roughness: TextureSlot::default(),
            anisotropy: TextureSlot::default(),
            iridescence: TextureSlot::default(),
            iridescence_thickness: TextureSlot::default(),
            volume_thickness: TextureSlot::default(),
        }
    }
}

impl MaterialData {
    pub fn alpha_mode(&self) -> AlphaMode {
        AlphaMode::from_u32(self.alpha_mode)
    }

    pub fn is_double_sided(&self) -> bool {
        self.double_sided != 0
    }

    /// `true` when this material participates in light transport through the
    /// volume (spec §4.8 classification: affects `volumetricMaterial`, never
    /// the bucket itself).
    pub fn is_volumetric(&self) -> bool {
        self.volume_thickness_factor > 0.0 || (self.ior - 1.0).abs() > f32::EPSILON
    }
}
