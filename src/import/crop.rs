//! Real crops for images that the exporter "cropped" with CSS.
//!
//! A cropped image is exported at full size inside a smaller
//! `overflow: hidden` span, shifted with negative margins:
//!
//! ```html
//! <p><span style="overflow: hidden; width: 396px; height: 322px">
//!   <img src="…" style="width: 602px; height: 428px; margin-left: -110px; margin-top: -48px">
//! </span></p>
//! ```
//!
//! The editor would drop the span and show the whole image, so the crop is
//! applied to the pixels instead and the span replaced by the result.

use std::io::Cursor;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures_util::future::join_all;

use super::{ImportStage, StageContext};
use crate::dom::style::{Declaration, parse_inline_style, px_value, style_value};
use crate::dom::{Document, NodeId, Selector};
use crate::error::{Error, Result};
use crate::upload::{ImageFetcher, ImageUploader};

static CROP_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p > span").expect("static selector"));

/// The visible part of an image, as fractions of its displayed size.
#[derive(Debug, Clone, PartialEq)]
pub struct CropDescriptor {
    pub source_url: String,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CropDescriptor {
    /// Derive the crop from a wrapping span's style and its image's style.
    /// Returns `None` for unsized images and for crops that show the whole
    /// image.
    pub fn from_styles(source_url: &str, span_style: &str, img_style: &str) -> Option<Self> {
        let span = parse_inline_style(span_style);
        let img = parse_inline_style(img_style);
        let (img_width, img_height) = (px(&img, "width"), px(&img, "height"));
        if img_width == 0.0 || img_height == 0.0 {
            return None;
        }

        let crop = CropDescriptor {
            source_url: source_url.to_string(),
            left: (-px(&img, "margin-left")).max(0.0) / img_width,
            top: (-px(&img, "margin-top")).max(0.0) / img_height,
            width: px(&span, "width").round() / img_width,
            height: px(&span, "height").round() / img_height,
        };
        if crop.left == 0.0 && crop.top == 0.0 && crop.width == 1.0 && crop.height == 1.0 {
            return None;
        }
        Some(crop)
    }

    /// The crop box in pixels of an image of the given size, clamped to
    /// the image.
    pub fn pixel_box(&self, image_width: u32, image_height: u32) -> (u32, u32, u32, u32) {
        let (w, h) = (f64::from(image_width), f64::from(image_height));
        let left = ((self.left * w).round() as u32).min(image_width);
        let top = ((self.top * h).round() as u32).min(image_height);
        let width = ((self.width * w).round() as u32).min(image_width - left);
        let height = ((self.height * h).round() as u32).min(image_height - top);
        (left, top, width, height)
    }
}

fn px(decls: &[Declaration], property: &str) -> f64 {
    style_value(decls, property).and_then(px_value).unwrap_or(0.0)
}

/// A successfully cropped and uploaded image.
#[derive(Debug, Clone, PartialEq)]
pub struct CroppedImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Outcome of one crop pass.
#[derive(Debug, Default)]
pub struct CropReport {
    /// Source URLs of the images that were replaced.
    pub cropped: Vec<String>,
    /// Source URL and reason for every image left uncropped.
    pub failed: Vec<(String, String)>,
}

/// Replaces CSS crops with cropped, re-uploaded images.
pub struct CropImages {
    fetcher: Arc<dyn ImageFetcher>,
    uploader: Arc<dyn ImageUploader>,
}

struct Candidate {
    span: NodeId,
    img: NodeId,
    crop: CropDescriptor,
}

impl CropImages {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, uploader: Arc<dyn ImageUploader>) -> Self {
        Self { fetcher, uploader }
    }

    /// Crop every candidate image concurrently and apply the successes.
    pub async fn crop(&self, mut doc: Document) -> (Document, CropReport) {
        let candidates = find_candidates(&doc);
        let mut report = CropReport::default();
        if candidates.is_empty() {
            return (doc, report);
        }

        let results = join_all(candidates.iter().map(|c| self.crop_one(&c.crop))).await;
        for (candidate, result) in candidates.iter().zip(results) {
            let source = candidate.crop.source_url.clone();
            match result {
                Ok(image) => {
                    doc.set_attr(candidate.img, "src", image.url);
                    doc.set_attr(
                        candidate.img,
                        "style",
                        format!("width: {}px; height: {}px;", image.width, image.height),
                    );
                    doc.detach(candidate.img);
                    doc.replace_with(candidate.span, candidate.img);
                    report.cropped.push(source);
                }
                Err(e) => report.failed.push((source, e.to_string())),
            }
        }
        (doc, report)
    }

    async fn crop_one(&self, crop: &CropDescriptor) -> Result<CroppedImage> {
        let bytes = self.fetcher.fetch(&crop.source_url).await?;
        let crop = crop.clone();
        let (cropped, width, height) = tokio::task::spawn_blocking(move || crop_bytes(&bytes, &crop))
            .await
            .map_err(std::io::Error::from)??;
        let url = self.uploader.upload_image(cropped).await?;
        Ok(CroppedImage { url, width, height })
    }
}

fn find_candidates(doc: &Document) -> Vec<Candidate> {
    doc.select(&CROP_SPAN)
        .into_iter()
        .filter_map(|span| {
            let img = doc.element_children(span).find(|&c| doc.is_tag(c, "img"))?;
            let crop = CropDescriptor::from_styles(
                doc.get_attr(img, "src")?,
                doc.get_attr(span, "style")?,
                doc.get_attr(img, "style")?,
            )?;
            Some(Candidate { span, img, crop })
        })
        .collect()
}

/// Decode, crop and re-encode an image in its original format.
fn crop_bytes(bytes: &[u8], crop: &CropDescriptor) -> Result<(Vec<u8>, u32, u32)> {
    let format = image::guess_format(bytes)?;
    let image = image::load_from_memory_with_format(bytes, format)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::Upload("image has no pixels".to_string()));
    }

    let (left, top, width, height) = crop.pixel_box(image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(Error::Upload("crop is empty".to_string()));
    }
    let cropped = image.crop_imm(left, top, width, height);

    let mut out = Cursor::new(Vec::new());
    cropped.write_to(&mut out, format)?;
    Ok((out.into_inner(), width, height))
}

#[async_trait]
impl ImportStage for CropImages {
    fn name(&self) -> &'static str {
        "crop-images"
    }

    async fn apply(&self, doc: Document, ctx: &StageContext) -> Result<Document> {
        let (doc, report) = self.crop(doc).await;
        for (src, reason) in &report.failed {
            tracing::warn!(document = %ctx.document_id, src = %src, reason = %reason, "image left uncropped");
        }
        if !report.cropped.is_empty() {
            tracing::debug!(count = report.cropped.len(), "cropped images");
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPAN: &str = "overflow: hidden; display: inline-block; width: 396.00px; height: 322.40px;";
    const IMG: &str = "width: 602.00px; height: 427.97px; margin-left: -110.00px; margin-top: -48.60px;";

    #[test]
    fn test_descriptor_from_styles() {
        let crop = CropDescriptor::from_styles("a.png", SPAN, IMG).unwrap();
        assert!((crop.left - 110.0 / 602.0).abs() < 1e-9);
        assert!((crop.top - 48.6 / 427.97).abs() < 1e-9);
        assert!((crop.width - 396.0 / 602.0).abs() < 1e-9);
        assert!((crop.height - 322.0 / 427.97).abs() < 1e-9);
    }

    #[test]
    fn test_identity_crop_skipped() {
        let img = "width: 100px; height: 50px;";
        assert_eq!(CropDescriptor::from_styles("a.png", "width: 100px; height: 50px", img), None);
    }

    #[test]
    fn test_unsized_image_skipped() {
        assert_eq!(CropDescriptor::from_styles("a.png", SPAN, "margin-left: -3px"), None);
    }

    #[test]
    fn test_pixel_box_clamped() {
        let crop = CropDescriptor {
            source_url: String::new(),
            left: 0.5,
            top: 0.0,
            width: 0.8,
            height: 1.0,
        };
        assert_eq!(crop.pixel_box(200, 100), (100, 0, 100, 100));
    }

    #[test]
    fn test_candidates_need_paragraph_parent() {
        let html = format!(
            r#"<p><span style="{SPAN}"><img src="a.png" style="{IMG}"></span></p><div><span style="{SPAN}"><img src="b.png" style="{IMG}"></span></div>"#
        );
        let doc = Document::parse(&html);
        let found = find_candidates(&doc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].crop.source_url, "a.png");
    }
}
