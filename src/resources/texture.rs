//! Texture loading and the name-keyed texture cache

use std::collections::HashMap;
use std::path::Path;

use image::{DynamicImage, GenericImageView};

use crate::backend::*;

/// Decoded RGBA8 pixel data
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Load texture from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = image::open(path).map_err(|e| e.to_string())?;
        Ok(Self::from_image(img, &name))
    }

    /// Load texture from encoded bytes
    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self, String> {
        let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
        Ok(Self::from_image(img, name))
    }

    fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        let data = img.to_rgba8().into_raw();

        Self {
            width,
            height,
            format: TextureFormat::Rgba8Unorm,
            data,
            name: name.to_string(),
        }
    }

    /// Transparent black pixels, for textures filled in later by an external producer
    pub fn blank(width: u32, height: u32, name: &str) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgba8Unorm,
            data: vec![0; rgba_len(width, height)],
            name: name.to_string(),
        }
    }

    /// Create a texture and upload the pixels
    pub fn upload<B: GraphicsBackend + ?Sized>(&self, backend: &mut B) -> BackendResult<TextureHandle> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(self.name.clone()),
            width: self.width,
            height: self.height,
            format: self.format,
            filter: FilterMode::Linear,
            address_mode: AddressMode::Repeat,
        })?;
        backend.write_texture(handle, &self.data);
        Ok(handle)
    }
}

/// Byte length of an RGBA8 image
fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// A texture living on the GPU
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuTexture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// Textures keyed by name, shared by every factory function.
///
/// A name is uploaded at most once; later lookups reuse the handle.
#[derive(Debug, Default)]
pub struct TextureCache {
    textures: HashMap<String, GpuTexture>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached texture for `path` or decode and upload it.
    ///
    /// Decode or upload failures are logged and yield `None`; nothing is
    /// cached so a later call may retry.
    pub fn load_or_reuse<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        path: &str,
    ) -> Option<GpuTexture> {
        if let Some(texture) = self.textures.get(path) {
            return Some(*texture);
        }

        let data = match TextureData::from_file(path) {
            Ok(data) => data,
            Err(err) => {
                log::warn!("Failed to load texture '{}': {}", path, err);
                return None;
            }
        };
        self.insert(backend, path, &data)
    }

    /// Return the cached texture for `name` or create a blank one of the given size
    pub fn get_or_create_blank<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        name: &str,
        width: u32,
        height: u32,
    ) -> Option<GpuTexture> {
        if let Some(texture) = self.textures.get(name) {
            return Some(*texture);
        }
        self.insert(backend, name, &TextureData::blank(width, height, name))
    }

    /// Upload already-decoded pixels under `name`, reusing an existing entry
    pub fn insert<B: GraphicsBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        name: &str,
        data: &TextureData,
    ) -> Option<GpuTexture> {
        if let Some(texture) = self.textures.get(name) {
            return Some(*texture);
        }
        match data.upload(backend) {
            Ok(handle) => {
                let texture = GpuTexture {
                    handle,
                    width: data.width,
                    height: data.height,
                };
                self.textures.insert(name.to_string(), texture);
                log::debug!("Cached texture '{}' ({}x{})", name, data.width, data.height);
                Some(texture)
            }
            Err(err) => {
                log::warn!("Failed to upload texture '{}': {}", name, err);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<GpuTexture> {
        self.textures.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn release_all<B: GraphicsBackend + ?Sized>(&mut self, backend: &mut B) {
        for (_, texture) in self.textures.drain() {
            backend.destroy_texture(texture.handle);
        }
    }
}

#[cfg(all(test, feature = "recording"))]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;

    #[test]
    fn test_blank_size_does_not_wrap() {
        assert_eq!(TextureData::blank(4, 2, "small").data.len(), 32);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(rgba_len(65536, 16384), 1usize << 32);
    }

    #[test]
    fn test_blank_texture_reused_by_name() {
        let mut backend = RecordingBackend::new();
        let mut cache = TextureCache::new();

        let first = cache.get_or_create_blank(&mut backend, "screen", 320, 200).unwrap();
        let second = cache.get_or_create_blank(&mut backend, "screen", 640, 480).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.width, 320);
        assert_eq!(backend.texture_creations(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_missing_file_is_not_cached() {
        let mut backend = RecordingBackend::new();
        let mut cache = TextureCache::new();

        assert!(cache.load_or_reuse(&mut backend, "does/not/exist.png").is_none());
        assert!(cache.is_empty());
        assert_eq!(backend.texture_creations(), 0);
    }

    #[test]
    fn test_decoded_png_is_uploaded_once() {
        let mut png = Vec::new();
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();
        let data = TextureData::from_bytes(&png, "red").unwrap();
        assert_eq!(data.data.len(), 16);

        let mut backend = RecordingBackend::new();
        let mut cache = TextureCache::new();
        let a = cache.insert(&mut backend, "red", &data).unwrap();
        let b = cache.insert(&mut backend, "red", &data).unwrap();

        assert_eq!(a.handle, b.handle);
        assert_eq!(backend.texture_creations(), 1);
    }

    #[test]
    fn test_release_all() {
        let mut backend = RecordingBackend::new();
        let mut cache = TextureCache::new();
        cache.get_or_create_blank(&mut backend, "a", 4, 4);
        cache.get_or_create_blank(&mut backend, "b", 4, 4);

        cache.release_all(&mut backend);

        assert!(cache.is_empty());
        assert_eq!(backend.live_texture_count(), 0);
    }
}
