use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use fast_image_resize as fr;
use image::{ImageEncoder, RgbImage};
use log::trace;

use crate::camera_model::{CameraModel, PinholeCamera};
use crate::error::SampleError;

/// Passthrough camera driver.
pub trait CameraSource {
    type Intrinsics: CameraModel + Clone;

    fn is_ready(&self) -> bool;
    fn latest_frame(&self) -> Option<&RgbImage>;
    /// Intrinsics and pose matching `latest_frame`.
    fn intrinsics(&self) -> Self::Intrinsics;
}

/// A frame ready to be sent to the detector.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub image_base64: String,
    pub encoded_size: (u32, u32),
    pub source_size: (u32, u32),
}

/// Resizes the latest camera frame to the encoded size, PNG-encodes it and
/// base64s the result. The resize target, PNG buffer and base64 string are
/// reused across cycles.
pub struct FrameSampler {
    target: (u32, u32),
    resizer: fr::Resizer,
    options: fr::ResizeOptions,
    scratch: fr::images::Image<'static>,
    png: Vec<u8>,
    spare_base64: String,
}

impl FrameSampler {
    pub fn new(target: (u32, u32)) -> FrameSampler {
        FrameSampler {
            target,
            resizer: fr::Resizer::new(),
            options: fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
            scratch: fr::images::Image::new(target.0, target.1, fr::PixelType::U8x3),
            png: Vec::new(),
            spare_base64: String::new(),
        }
    }

    pub fn target(&self) -> (u32, u32) {
        self.target
    }

    /// Samples the camera. `Ok(None)` when the camera is not ready or has no
    /// frame yet.
    pub fn sample<C: CameraSource + ?Sized>(
        &mut self,
        camera: &C,
    ) -> Result<Option<EncodedFrame>, SampleError> {
        if !camera.is_ready() {
            trace!("camera not ready");
            return Ok(None);
        }
        let Some(frame) = camera.latest_frame() else {
            trace!("no camera frame yet");
            return Ok(None);
        };
        self.encode(frame).map(Some)
    }

    pub fn encode(&mut self, frame: &RgbImage) -> Result<EncodedFrame, SampleError> {
        let (w, h) = frame.dimensions();
        if w == 0 || h == 0 {
            return Err(SampleError::EmptyFrame);
        }
        let src = fr::images::ImageRef::new(w, h, frame.as_raw(), fr::PixelType::U8x3)?;
        self.resizer
            .resize(&src, &mut self.scratch, &self.options)?;

        self.png.clear();
        image::codecs::png::PngEncoder::new(&mut self.png).write_image(
            self.scratch.buffer(),
            self.target.0,
            self.target.1,
            image::ExtendedColorType::Rgb8,
        )?;

        let mut image_base64 = std::mem::take(&mut self.spare_base64);
        image_base64.clear();
        STANDARD.encode_string(&self.png, &mut image_base64);
        trace!(
            "encoded {}x{} frame to {} png bytes",
            w,
            h,
            self.png.len()
        );
        Ok(EncodedFrame {
            image_base64,
            encoded_size: self.target,
            source_size: (w, h),
        })
    }

    /// Hands a finished payload back so its allocation is reused.
    pub fn recycle(&mut self, image_base64: String) {
        if image_base64.capacity() > self.spare_base64.capacity() {
            self.spare_base64 = image_base64;
        }
    }

    pub fn last_png(&self) -> &[u8] {
        &self.png
    }
}

/// Camera source backed by one still image, for replay and offline probing.
#[derive(Debug, Clone)]
pub struct StillImageSource {
    pub image: RgbImage,
    pub camera: PinholeCamera,
    pub ready: bool,
}

impl StillImageSource {
    pub fn new(image: RgbImage, camera: PinholeCamera) -> StillImageSource {
        StillImageSource {
            image,
            camera,
            ready: true,
        }
    }

    /// Uniform gray frame matching the camera resolution.
    pub fn blank(camera: PinholeCamera) -> StillImageSource {
        let image = RgbImage::from_pixel(camera.width, camera.height, image::Rgb([128, 128, 128]));
        Self::new(image, camera)
    }
}

impl CameraSource for StillImageSource {
    type Intrinsics = PinholeCamera;

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn latest_frame(&self) -> Option<&RgbImage> {
        Some(&self.image)
    }

    fn intrinsics(&self) -> PinholeCamera {
        self.camera.clone()
    }
}
