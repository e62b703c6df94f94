use image::ImageReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::view::Bitmap;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Decode the raster image at `path` into a [`Bitmap`].
///
/// The format is guessed from the file contents, not the extension. When
/// `max_dimension` is set (and non-zero) an image larger than it on either
/// axis is scaled down to fit, keeping its aspect ratio.
///
/// # Errors
/// If the file cannot be read or its contents are not a decodable image.
pub fn load_bitmap(
    path: &Path,
    max_dimension: Option<u32>,
) -> Result<Bitmap, DecodeError> {
    let io_error = |source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let image = ImageReader::open(path)
        .map_err(io_error)?
        .with_guessed_format()
        .map_err(io_error)?
        .decode()
        .map_err(|source| DecodeError::Image {
            path: path.to_path_buf(),
            source,
        })?;

    let image = match max_dimension {
        Some(max)
            if max > 0 && (image.width() > max || image.height() > max) =>
        {
            image.thumbnail(max, max)
        }
        _ => image,
    };

    Ok(Bitmap::new(image.into_rgba8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn checkerboard(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn test_decodes_png_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        let source = checkerboard(8, 4);
        source.save(&path).unwrap();

        let bitmap = load_bitmap(&path, None).unwrap();

        assert_eq!(bitmap.width(), 8);
        assert_eq!(bitmap.height(), 4);
        assert_eq!(bitmap.image().as_raw(), source.as_raw());
    }

    #[test]
    fn test_format_is_guessed_from_contents() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("map.png");
        checkerboard(3, 3).save(&png).unwrap();
        let renamed = dir.path().join("map.cache");
        std::fs::rename(&png, &renamed).unwrap();

        let bitmap = load_bitmap(&renamed, None).unwrap();

        assert_eq!((bitmap.width(), bitmap.height()), (3, 3));
    }

    #[test]
    fn test_downscales_to_max_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        checkerboard(400, 100).save(&path).unwrap();

        let bitmap = load_bitmap(&path, Some(200)).unwrap();

        assert_eq!(bitmap.width(), 200);
        assert_eq!(bitmap.height(), 50);
    }

    #[test]
    fn test_small_images_are_not_upscaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        checkerboard(10, 20).save(&path).unwrap();

        let bitmap = load_bitmap(&path, Some(200)).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (10, 20));

        let bitmap = load_bitmap(&path, Some(0)).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (10, 20));
    }

    #[test]
    fn test_corrupt_bytes_fail_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let result = load_bitmap(&path, None);

        assert!(matches!(result, Err(DecodeError::Image { .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = load_bitmap(&dir.path().join("missing.png"), None);

        assert!(matches!(result, Err(DecodeError::Io { .. })));
    }
}
