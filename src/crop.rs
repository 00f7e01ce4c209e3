use image::RgbaImage;
use image::imageops;
use tracing::debug;

use crate::capture::{CaptureFrame, encode_png};
use crate::error::SnipError;
use crate::geometry::{DeviceRect, MIN_DEVICE_PIXELS, Rect};

/// Device-pixel image cut out of a capture frame. Its own origin is (0, 0).
#[derive(Debug, Clone)]
pub struct CroppedRegion {
    image: RgbaImage,
    source: (u32, u32),
}

impl CroppedRegion {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Offset of the region inside the frame it was sampled from.
    pub fn source_offset(&self) -> (u32, u32) {
        self.source
    }

    /// The size the vision service accepts, measured after clamping.
    pub fn meets_device_minimum(&self) -> bool {
        let min = MIN_DEVICE_PIXELS as u32;
        self.width() >= min && self.height() >= min
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>, SnipError> {
        encode_png(&self.image)
    }
}

/// Sample `rect` (CSS px) scaled by `dpr` out of `frame`.
///
/// Boxes running past the frame edges are clamped to the available pixels;
/// a box with no overlap at all is an error.
pub fn crop(frame: &CaptureFrame, rect: Rect, dpr: f64) -> Result<CroppedRegion, SnipError> {
    let device: DeviceRect = rect.to_device(dpr);
    let (x, y, width, height) = device
        .clamp_to(frame.width(), frame.height())
        .ok_or_else(|| {
            SnipError::Image(format!(
                "selection {}x{}+{}+{} lies outside the {}x{} capture",
                device.width,
                device.height,
                device.x,
                device.y,
                frame.width(),
                frame.height()
            ))
        })?;
    if (width as i64, height as i64) != (device.width, device.height) {
        debug!(
            requested_width = device.width,
            requested_height = device.height,
            width,
            height,
            "selection clamped to capture bounds"
        );
    }
    let image = imageops::crop_imm(frame.image(), x, y, width, height).to_image();
    Ok(CroppedRegion {
        image,
        source: (x, y),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient_frame(width: u32, height: u32) -> CaptureFrame {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        });
        CaptureFrame::new(image)
    }

    #[test]
    fn crop_scales_rect_by_device_pixel_ratio() {
        let frame = gradient_frame(400, 300);
        let region = crop(&frame, Rect::new(10.0, 10.0, 100.0, 50.0), 2.0).unwrap();
        assert_eq!((region.width(), region.height()), (200, 100));
        assert_eq!(region.source_offset(), (20, 20));
        assert_eq!(region.image().get_pixel(0, 0), frame.image().get_pixel(20, 20));
        assert_eq!(
            region.image().get_pixel(199, 99),
            frame.image().get_pixel(219, 119)
        );
    }

    #[test]
    fn crop_clamps_selection_dragged_off_the_viewport() {
        let frame = gradient_frame(100, 80);
        let region = crop(&frame, Rect::new(60.0, 50.0, 100.0, 100.0), 1.0).unwrap();
        assert_eq!((region.width(), region.height()), (40, 30));
        assert_eq!(region.image().get_pixel(0, 0), frame.image().get_pixel(60, 50));
    }

    #[test]
    fn clamped_region_can_fall_under_the_device_minimum() {
        let frame = gradient_frame(400, 300);
        let inside = crop(&frame, Rect::new(10.0, 10.0, 60.0, 60.0), 1.0).unwrap();
        assert!(inside.meets_device_minimum());
        let edge = crop(&frame, Rect::new(380.0, 10.0, 60.0, 60.0), 1.0).unwrap();
        assert_eq!((edge.width(), edge.height()), (20, 60));
        assert!(!edge.meets_device_minimum());
    }

    #[test]
    fn huge_selection_is_clamped_without_overflow() {
        let frame = gradient_frame(400, 300);
        let region = crop(&frame, Rect::new(10.0, 10.0, 1e300, 60.0), 1.0).unwrap();
        assert_eq!((region.width(), region.height()), (390, 60));
        let region = crop(&frame, Rect::new(10.0, 10.0, f64::INFINITY, 60.0), 1.0).unwrap();
        assert_eq!(region.source_offset(), (10, 10));
    }

    #[test]
    fn crop_rejects_selection_without_overlap() {
        let frame = gradient_frame(100, 80);
        let err = crop(&frame, Rect::new(150.0, 10.0, 20.0, 20.0), 1.0).unwrap_err();
        assert!(matches!(err, SnipError::Image(_)));
    }

    #[test]
    fn cropped_region_encodes_as_png() {
        let frame = gradient_frame(64, 64);
        let region = crop(&frame, Rect::new(0.0, 0.0, 60.0, 60.0), 1.0).unwrap();
        let bytes = region.to_png_bytes().unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
