use chrono::Utc;
use image::ImageFormat;
use map_widget::{
    Bitmap, HostError, RenderedView, ViewAction, WIDGET_IMAGE, WidgetHost,
    WidgetInstanceId,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io::{Cursor, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};
use tracing::{debug, warn};

/// What the host records for one submitted view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewManifest {
    pub widget_id: WidgetInstanceId,
    pub layout: String,
    /// Image bound by this view.
    pub image: Option<ImageManifest>,
    /// Image on screen: this view's, or the one kept from an earlier view.
    pub displayed_image: Option<ImageManifest>,
    pub text: BTreeMap<String, String>,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageManifest {
    pub file: String,
    pub width: u32,
    pub height: u32,
}

/// Widget host that renders submitted views into a directory.
///
/// Every view becomes `widget-<id>.json`. A bound image is written first
/// under a name unique to that update and only becomes visible once the
/// manifest naming it has been renamed into place, so a reader sees either
/// the old view or the new one. A view without an image keeps showing the
/// previous image, the same way an on-screen widget keeps its content.
#[derive(Debug)]
pub struct FileSystemHost {
    output_dir: PathBuf,
    closed: AtomicBool,
    #[cfg(test)]
    fail_manifest_commit: AtomicBool,
}

impl FileSystemHost {
    /// # Errors
    /// If the output directory cannot be created.
    pub fn new(output_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(output_dir)?;

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            closed: AtomicBool::new(false),
            #[cfg(test)]
            fail_manifest_commit: AtomicBool::new(false),
        })
    }

    /// Refuse every later submission.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn manifest_path(&self, id: WidgetInstanceId) -> PathBuf {
        self.output_dir.join(format!("widget-{id}.json"))
    }

    pub fn image_path(&self, image: &ImageManifest) -> PathBuf {
        self.output_dir.join(&image.file)
    }

    /// The committed manifest for `id`, if any.
    pub fn manifest(&self, id: WidgetInstanceId) -> Option<ViewManifest> {
        let bytes = std::fs::read(self.manifest_path(id)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn write_image(
        &self,
        id: WidgetInstanceId,
        bitmap: &Bitmap,
    ) -> Result<ImageManifest, String> {
        let mut png = Vec::new();
        bitmap
            .image()
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| e.to_string())?;

        let mut file = tempfile::Builder::new()
            .prefix(&format!("widget-{id}-"))
            .suffix(".png")
            .tempfile_in(&self.output_dir)
            .map_err(|e| e.to_string())?;
        file.write_all(&png).map_err(|e| e.to_string())?;
        file.as_file().sync_all().map_err(|e| e.to_string())?;
        let (_, path) = file.keep().map_err(|e| e.error.to_string())?;

        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| format!("unnamed image file {}", path.display()))?;

        Ok(ImageManifest {
            file,
            width: bitmap.width(),
            height: bitmap.height(),
        })
    }

    fn commit_manifest(&self, manifest: &ViewManifest) -> std::io::Result<()> {
        #[cfg(test)]
        if self.fail_manifest_commit.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("manifest commit refused"));
        }

        let bytes = serde_json::to_vec_pretty(manifest)?;
        let mut file = tempfile::NamedTempFile::new_in(&self.output_dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(self.manifest_path(manifest.widget_id))
            .map_err(|e| e.error)?;
        Ok(())
    }

    fn remove_image(&self, image: &ImageManifest) {
        if let Err(e) = std::fs::remove_file(self.image_path(image)) {
            warn!("Failed to remove image {}: {}", image.file, e);
        }
    }
}

impl WidgetHost for FileSystemHost {
    fn update_widget(
        &self,
        id: WidgetInstanceId,
        view: RenderedView,
    ) -> Result<(), HostError> {
        if self.is_closed() {
            return Err(HostError::Closed);
        }

        let submit_error = |message: String| HostError::Submit { id, message };

        let previous = self
            .manifest(id)
            .and_then(|manifest| manifest.displayed_image);

        let image = view
            .image_binding(WIDGET_IMAGE)
            .map(|bitmap| self.write_image(id, bitmap))
            .transpose()
            .map_err(submit_error)?;

        let text = view
            .actions()
            .iter()
            .filter_map(|action| match action {
                ViewAction::SetText { slot, text } => {
                    Some(((*slot).to_string(), text.clone()))
                }
                ViewAction::SetImageBitmap { .. } => None,
            })
            .collect();

        let manifest = ViewManifest {
            widget_id: id,
            layout: view.layout().to_string(),
            displayed_image: image.clone().or_else(|| previous.clone()),
            image,
            text,
            updated_at: Utc::now().to_rfc3339(),
        };

        if let Err(e) = self.commit_manifest(&manifest) {
            if let Some(image) = &manifest.image {
                self.remove_image(image);
            }
            return Err(submit_error(e.to_string()));
        }

        if let Some(previous) = previous
            && manifest.displayed_image.as_ref() != Some(&previous)
        {
            self.remove_image(&previous);
        }

        debug!("Wrote view for widget {}", id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use map_widget::{WIDGET_LAYOUT, WIDGET_STATUS};

    fn image_view(value: u8) -> RenderedView {
        let mut view = RenderedView::new(WIDGET_LAYOUT);
        view.set_image_bitmap(
            WIDGET_IMAGE,
            Bitmap::new(RgbaImage::from_pixel(2, 2, Rgba([value; 4]))),
        );
        view
    }

    fn png_files(dir: &Path) -> Vec<String> {
        let mut files: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".png"))
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_writes_image_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let host = FileSystemHost::new(&dir.path().join("out")).unwrap();
        let source = RgbaImage::from_pixel(6, 3, Rgba([1, 2, 3, 255]));
        let mut view = RenderedView::new(WIDGET_LAYOUT);
        view.set_image_bitmap(WIDGET_IMAGE, Bitmap::new(source.clone()));

        host.update_widget(WidgetInstanceId(3), view).unwrap();

        let manifest = host.manifest(WidgetInstanceId(3)).unwrap();
        assert_eq!(manifest.layout, WIDGET_LAYOUT);
        let image = manifest.image.unwrap();
        assert!(image.file.starts_with("widget-3-"));
        assert!(image.file.ends_with(".png"));
        assert_eq!((image.width, image.height), (6, 3));
        assert_eq!(manifest.displayed_image, Some(image.clone()));
        let written = image::open(host.image_path(&image)).unwrap().into_rgba8();
        assert_eq!(written.as_raw(), source.as_raw());
    }

    #[test]
    fn test_view_without_image_keeps_previous_png() {
        let dir = tempfile::tempdir().unwrap();
        let host = FileSystemHost::new(dir.path()).unwrap();
        host.update_widget(WidgetInstanceId(1), image_view(9)).unwrap();
        let shown = host.manifest(WidgetInstanceId(1)).unwrap().image.unwrap();

        let mut placeholder = RenderedView::new(WIDGET_LAYOUT);
        placeholder.set_text(WIDGET_STATUS, "Map unavailable");
        host.update_widget(WidgetInstanceId(1), placeholder).unwrap();

        let manifest = host.manifest(WidgetInstanceId(1)).unwrap();
        assert_eq!(manifest.image, None);
        assert_eq!(manifest.displayed_image, Some(shown.clone()));
        assert_eq!(
            manifest.text.get(WIDGET_STATUS).map(String::as_str),
            Some("Map unavailable")
        );
        assert!(host.image_path(&shown).exists());
    }

    #[test]
    fn test_new_image_replaces_previous_png() {
        let dir = tempfile::tempdir().unwrap();
        let host = FileSystemHost::new(dir.path()).unwrap();
        host.update_widget(WidgetInstanceId(1), image_view(1)).unwrap();
        host.update_widget(WidgetInstanceId(1), image_view(2)).unwrap();

        let manifest = host.manifest(WidgetInstanceId(1)).unwrap();
        let image = manifest.image.unwrap();
        assert_eq!(png_files(dir.path()), vec![image.file.clone()]);
        let written = image::open(host.image_path(&image)).unwrap().into_rgba8();
        assert_eq!(written.get_pixel(0, 0), &Rgba([2; 4]));
    }

    #[test]
    fn test_failed_manifest_commit_keeps_previous_view() {
        let dir = tempfile::tempdir().unwrap();
        let host = FileSystemHost::new(dir.path()).unwrap();
        host.update_widget(WidgetInstanceId(4), image_view(1)).unwrap();
        let before = host.manifest(WidgetInstanceId(4)).unwrap();
        let shown = before.image.clone().unwrap();
        let png_before = std::fs::read(host.image_path(&shown)).unwrap();

        host.fail_manifest_commit.store(true, Ordering::SeqCst);
        let result = host.update_widget(WidgetInstanceId(4), image_view(2));

        assert!(matches!(result, Err(HostError::Submit { .. })));
        assert_eq!(host.manifest(WidgetInstanceId(4)), Some(before));
        assert_eq!(std::fs::read(host.image_path(&shown)).unwrap(), png_before);
        assert_eq!(png_files(dir.path()), vec![shown.file]);
    }

    #[test]
    fn test_closed_host_rejects_views() {
        let dir = tempfile::tempdir().unwrap();
        let host = FileSystemHost::new(dir.path()).unwrap();
        host.close();

        let result = host
            .update_widget(WidgetInstanceId(1), RenderedView::new(WIDGET_LAYOUT));

        assert!(matches!(result, Err(HostError::Closed)));
        assert!(!host.manifest_path(WidgetInstanceId(1)).exists());
    }
}
