use std::io::Cursor;

use bytes::Bytes;
use engine_logging::{engine_debug, RunLogger};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};
use url::Url;

use crate::{FailureKind, FetchError};

/// Host that renders preview images on the fly with a star-count band at the bottom.
pub const OG_IMAGE_HOST: &str = "opengraph.githubassets.com";

/// Rendered previews are 600 units tall; the bottom 150 carry the overlay.
pub const OG_IMAGE_HEIGHT: u32 = 600 - 150;

#[derive(Debug, Clone)]
pub struct NormalizeSettings {
    /// Images served from this host are cropped; all others are only re-encoded.
    pub preview_host: String,
    pub crop_height: u32,
    pub jpeg_quality: u8,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            preview_host: OG_IMAGE_HOST.to_string(),
            crop_height: OG_IMAGE_HEIGHT,
            jpeg_quality: 90,
        }
    }
}

/// Re-encodes preview images to JPEG, cropping auto-generated ones.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    settings: NormalizeSettings,
    logger: RunLogger,
}

impl ImageNormalizer {
    pub fn new(settings: NormalizeSettings, logger: RunLogger) -> Self {
        Self { settings, logger }
    }

    pub fn settings(&self) -> &NormalizeSettings {
        &self.settings
    }

    pub fn should_crop(&self, source_url: &Url) -> bool {
        source_url
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.settings.preview_host))
    }

    /// Decode any supported raster format, crop when `source_url` is on the
    /// preview host, and encode as JPEG.
    ///
    /// Cropping keeps the full width and the top `crop_height` rows. The
    /// crop happens on the decoded raster so the output is encoded once.
    pub fn normalize(&self, image_bytes: &[u8], source_url: &Url) -> Result<Bytes, FetchError> {
        let decoded = image::load_from_memory(image_bytes)
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
        // JPEG has no alpha channel.
        let mut raster = decoded.to_rgb8();

        if self.should_crop(source_url) {
            engine_debug!(self.logger, "Cropping OG image {}", source_url);
            raster = self.crop_top(&raster)?;
        }

        self.encode_jpeg(&raster)
    }

    /// Runs [`ImageNormalizer::normalize`] on the blocking pool.
    pub async fn normalize_offloaded(
        &self,
        image_bytes: Vec<u8>,
        source_url: Url,
    ) -> Result<Bytes, FetchError> {
        let normalizer = self.clone();
        tokio::task::spawn_blocking(move || normalizer.normalize(&image_bytes, &source_url))
            .await
            .map_err(|err| FetchError::new(FailureKind::TaskFailed, err.to_string()))?
    }

    fn crop_top(&self, raster: &RgbImage) -> Result<RgbImage, FetchError> {
        let (width, height) = raster.dimensions();
        let target = self.settings.crop_height;
        if target == 0 || height < target {
            return Err(FetchError::new(
                FailureKind::Transform,
                format!("cannot crop {width}x{height} image to height {target}"),
            ));
        }
        Ok(imageops::crop_imm(raster, 0, 0, width, target).to_image())
    }

    fn encode_jpeg(&self, raster: &RgbImage) -> Result<Bytes, FetchError> {
        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, self.settings.jpeg_quality)
            .encode_image(raster)
            .map_err(|err| FetchError::new(FailureKind::Encode, err.to_string()))?;
        Ok(Bytes::from(out.into_inner()))
    }
}
