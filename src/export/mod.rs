// export - Per-job PNG output directory

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::buffer::ImageBuffer;
use crate::error::Result;

pub struct JobWriter {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl JobWriter {
    /// Create (or reuse) `dir`
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf(), written: Vec::new() })
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn written(&self) -> &[PathBuf] { &self.written }

    /// Write `<name>.png`
    pub fn save(&mut self, name: &str, buf: &ImageBuffer) -> Result<()> {
        let path = self.dir.join(format!("{name}.png"));
        buf.save_png(&path)?;
        debug!(path = %path.display(), dims = %buf.dims(), "wrote image");
        self.written.push(path);
        Ok(())
    }
}

/// File stem used to name outputs, e.g. `door` for `bg/door.jpg`
pub fn stem(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.split('.').next().unwrap_or(n).to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{ColorSpace, Quantity};

    #[test]
    fn stem_drops_every_extension() {
        assert_eq!(stem(Path::new("../fg/lotus-3192656.png")), "lotus-3192656");
        assert_eq!(stem(Path::new("scan.final.jpg")), "scan");
        assert_eq!(stem(Path::new("/")), "image");
    }

    #[test]
    fn writes_png_into_job_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = JobWriter::create(&tmp.path().join("job")).unwrap();
        let buf = ImageBuffer::filled(3, 4, Quantity::Color, ColorSpace::Gamma, 0.5);
        writer.save("door", &buf).unwrap();

        let path = tmp.path().join("job").join("door.png");
        assert_eq!(writer.written(), &[path.clone()]);
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
    }
}
