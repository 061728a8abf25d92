//! Image cropping.
//!
//! A crop session lives only while the canvas is in cropping mode. The crop
//! rectangle is kept in screen space (logical canvas × zoom), matching what
//! the user drags, and is clamped inside the image's rendered box.
//! Confirming rasterizes the visible sub-region of the source image into a
//! PNG data URI and computes the container's new logical geometry.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use deck_core::id::ElementId;
use image::{DynamicImage, GenericImageView, ImageFormat};
use kurbo::{Point, Rect};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CropError {
    #[error("Could not load image. CORS restriction?")]
    Fetch(String),
    #[error("Failed to process image.")]
    Decode(String),
    #[error("Crop area too small")]
    TooSmall,
}

/// Loads image bytes for sources that are not inline data URIs.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CropError>;
}

/// Fetcher for hosts that cannot reach the network: every remote source fails
/// like a cross-origin denial.
pub struct NoFetch;

impl ImageFetcher for NoFetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CropError> {
        Err(CropError::Fetch(url.to_string()))
    }
}

/// New logical geometry for the cropped container, in px.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropGeometry {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CropOutcome {
    pub data_url: String,
    pub geometry: CropGeometry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CropSession {
    /// The container whose geometry is rewritten.
    pub element: ElementId,
    /// The `<img>` whose source is replaced.
    pub image: ElementId,
    /// Rendered image box, screen space.
    pub image_rect: Rect,
    /// Rendered container box, screen space.
    pub element_rect: Rect,
    /// Container position inside its offset parent, logical px.
    pub element_offset: Point,
    pub zoom: f64,
    crop: Rect,
}

impl CropSession {
    /// Start a session from logical bounds. The crop rect starts as the whole
    /// rendered image.
    pub fn new(
        element: ElementId,
        image: ElementId,
        element_bounds: Rect,
        image_bounds: Rect,
        element_offset: Point,
        zoom: f64,
    ) -> Self {
        let zoom = if zoom > 0.0 { zoom } else { 1.0 };
        let image_rect = scale(image_bounds, zoom);
        Self {
            element,
            image,
            image_rect,
            element_rect: scale(element_bounds, zoom),
            element_offset,
            zoom,
            crop: image_rect,
        }
    }

    pub fn crop(&self) -> Rect {
        self.crop
    }

    /// Move or resize the crop rect; it never leaves the image box.
    pub fn set_crop(&mut self, rect: Rect) {
        let rect = rect.abs().intersect(self.image_rect);
        self.crop = if rect.width() < 0.0 || rect.height() < 0.0 {
            Rect::from_origin_size(rect.origin(), (0.0, 0.0))
        } else {
            rect
        };
    }

    /// Source-pixel region for an image of the given natural size, as
    /// `(x, y, width, height)`. Errors when it rounds below `min_px`.
    pub fn source_region(
        &self,
        natural_width: u32,
        natural_height: u32,
        min_px: f64,
    ) -> Result<(u32, u32, u32, u32), CropError> {
        if natural_width == 0 || natural_height == 0 {
            return Err(CropError::Decode("image has no pixels".into()));
        }
        if self.image_rect.width() <= 0.0 || self.image_rect.height() <= 0.0 {
            return Err(CropError::TooSmall);
        }
        let scale_x = f64::from(natural_width) / self.image_rect.width();
        let scale_y = f64::from(natural_height) / self.image_rect.height();
        let sx = (self.crop.x0 - self.image_rect.x0) * scale_x;
        let sy = (self.crop.y0 - self.image_rect.y0) * scale_y;
        let sw = self.crop.width() * scale_x;
        let sh = self.crop.height() * scale_y;
        if sw < min_px || sh < min_px {
            return Err(CropError::TooSmall);
        }
        let x = (sx.round() as u32).min(natural_width.saturating_sub(1));
        let y = (sy.round() as u32).min(natural_height.saturating_sub(1));
        let w = (sw as u32).clamp(1, natural_width - x);
        let h = (sh as u32).clamp(1, natural_height - y);
        Ok((x, y, w, h))
    }

    /// Container geometry after the crop, divided back to logical px.
    pub fn geometry(&self) -> CropGeometry {
        CropGeometry {
            left: self.element_offset.x + (self.crop.x0 - self.element_rect.x0) / self.zoom,
            top: self.element_offset.y + (self.crop.y0 - self.element_rect.y0) / self.zoom,
            width: self.crop.width() / self.zoom,
            height: self.crop.height() / self.zoom,
        }
    }

    /// Rasterize the crop of `src`.
    pub fn confirm(
        &self,
        src: &str,
        fetcher: &dyn ImageFetcher,
        min_px: f64,
    ) -> Result<CropOutcome, CropError> {
        let bytes = match decode_data_url(src) {
            Some(bytes) => bytes?,
            None => fetcher.fetch(src)?,
        };
        let img = image::load_from_memory(&bytes).map_err(|e| CropError::Decode(e.to_string()))?;
        let (natural_width, natural_height) = img.dimensions();
        let (x, y, w, h) = self.source_region(natural_width, natural_height, min_px)?;
        let cropped = img.crop_imm(x, y, w, h);
        Ok(CropOutcome {
            data_url: encode_png_data_url(&cropped)?,
            geometry: self.geometry(),
        })
    }
}

fn scale(rect: Rect, zoom: f64) -> Rect {
    Rect::new(rect.x0 * zoom, rect.y0 * zoom, rect.x1 * zoom, rect.y1 * zoom)
}

/// `None` when `src` is not a data URI.
fn decode_data_url(src: &str) -> Option<Result<Vec<u8>, CropError>> {
    let rest = src.strip_prefix("data:")?;
    let Some((header, payload)) = rest.split_once(',') else {
        return Some(Err(CropError::Decode("data URI without payload".into())));
    };
    if !header.ends_with(";base64") {
        return Some(Err(CropError::Decode(format!(
            "unsupported data URI encoding: {header}"
        ))));
    }
    Some(
        STANDARD
            .decode(payload.trim())
            .map_err(|e| CropError::Decode(e.to_string())),
    )
}

pub fn encode_png_data_url(img: &DynamicImage) -> Result<String, CropError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| CropError::Decode(e.to_string()))?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&buf)))
}
