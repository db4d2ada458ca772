use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::frame_source::FrameSource;

/// Adapts a directory of still images to the [`FrameSource`] interface.
///
/// Files are ordered by name, so zero-padded sequences (`frame_0001.png`)
/// play back in capture order. Image files carry no timing, so the frame
/// rate is supplied by the caller.
pub struct ImageSequenceReader {
    fps: f64,
    paths: Vec<PathBuf>,
    opened: bool,
}

impl ImageSequenceReader {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            paths: Vec::new(),
            opened: false,
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn load_rgb(path: &Path, index: usize) -> Result<Frame, Box<dyn std::error::Error>> {
    let img = image::open(path)?.to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, 3, index))
}

impl FrameSource for ImageSequenceReader {
    fn open(&mut self, path: &Path) -> Result<StreamMetadata, Box<dyn std::error::Error>> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        paths.sort();

        let first = paths
            .first()
            .ok_or_else(|| format!("No images found in {}", path.display()))?;
        let (width, height) = image::image_dimensions(first)?;

        log::debug!("Opened {} frame(s) from {}", paths.len(), path.display());

        let metadata = StreamMetadata {
            width,
            height,
            fps: self.fps,
            total_frames: paths.len(),
            source_path: Some(path.to_path_buf()),
        };
        self.paths = paths;
        self.opened = true;
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        if !self.opened {
            return Box::new(std::iter::once(Err("ImageSequenceReader: not opened".into())));
        }
        Box::new(
            self.paths
                .iter()
                .enumerate()
                .map(|(index, path)| load_rgb(path, index)),
        )
    }

    fn close(&mut self) {
        self.paths.clear();
        self.opened = false;
    }
}
