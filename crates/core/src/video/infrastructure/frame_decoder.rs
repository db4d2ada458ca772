use crate::shared::frame::Frame;

/// Decodes encoded images (PNG, JPEG, ...) received over the wire into RGB
/// frames.
///
/// Undecodable payloads yield `None`; the engine treats that as a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    pub fn decode(&self, bytes: &[u8], index: usize) -> Option<Frame> {
        let img = match image::load_from_memory(bytes) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                log::debug!("Dropping undecodable frame ({} bytes): {e}", bytes.len());
                return None;
            }
        };
        let (width, height) = img.dimensions();
        Some(Frame::new(img.into_raw(), width, height, 3, index))
    }
}

/// Encodes a frame as PNG. Used by clients and tests to produce wire payloads.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or("frame buffer does not match its dimensions")?;
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}
