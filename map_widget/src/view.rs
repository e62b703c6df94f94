use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Layout every map widget view is built from.
pub const WIDGET_LAYOUT: &str = "widget_layout";

/// Slot the map bitmap is bound into.
pub const WIDGET_IMAGE: &str = "widget_image";

/// Text slot used for the decode failure placeholder.
pub const WIDGET_STATUS: &str = "widget_status";

/// Platform-assigned identifier of one placed widget.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct WidgetInstanceId(pub i32);

impl std::fmt::Display for WidgetInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded RGBA8 raster. Clones share the pixel buffer.
#[derive(Debug, Clone)]
pub struct Bitmap(Arc<RgbaImage>);

impl Bitmap {
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.0
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.dimensions() == other.0.dimensions()
                && self.0.as_raw() == other.0.as_raw())
    }
}

impl Eq for Bitmap {}

/// One mutation applied by the host when it renders a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    SetImageBitmap { slot: &'static str, bitmap: Bitmap },
    SetText { slot: &'static str, text: String },
}

/// Remote view descriptor handed to the widget host.
///
/// Built fresh for every update and submitted whole, so the host never sees a
/// half-populated view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    layout: &'static str,
    actions: Vec<ViewAction>,
}

impl RenderedView {
    #[must_use]
    pub const fn new(layout: &'static str) -> Self {
        Self {
            layout,
            actions: Vec::new(),
        }
    }

    pub fn set_image_bitmap(&mut self, slot: &'static str, bitmap: Bitmap) {
        self.actions.push(ViewAction::SetImageBitmap { slot, bitmap });
    }

    pub fn set_text(&mut self, slot: &'static str, text: impl Into<String>) {
        self.actions.push(ViewAction::SetText {
            slot,
            text: text.into(),
        });
    }

    #[must_use]
    pub const fn layout(&self) -> &'static str {
        self.layout
    }

    #[must_use]
    pub fn actions(&self) -> &[ViewAction] {
        &self.actions
    }

    /// The bitmap bound to `slot`. Later bindings win, as they do on the host.
    #[must_use]
    pub fn image_binding(&self, slot: &str) -> Option<&Bitmap> {
        self.actions.iter().rev().find_map(|action| match action {
            ViewAction::SetImageBitmap { slot: s, bitmap } if *s == slot => {
                Some(bitmap)
            }
            _ => None,
        })
    }

    #[must_use]
    pub fn text_binding(&self, slot: &str) -> Option<&str> {
        self.actions.iter().rev().find_map(|action| match action {
            ViewAction::SetText { slot: s, text } if *s == slot => {
                Some(text.as_str())
            }
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, value: u8) -> Bitmap {
        Bitmap::new(RgbaImage::from_pixel(width, height, Rgba([value; 4])))
    }

    #[test]
    fn test_bitmap_equality_is_by_content() {
        assert_eq!(solid(2, 2, 7), solid(2, 2, 7));
        assert_ne!(solid(2, 2, 7), solid(2, 2, 8));
        assert_ne!(solid(2, 2, 7), solid(4, 1, 7));
    }

    #[test]
    fn test_last_binding_wins() {
        let mut view = RenderedView::new(WIDGET_LAYOUT);
        view.set_image_bitmap(WIDGET_IMAGE, solid(1, 1, 1));
        view.set_image_bitmap(WIDGET_IMAGE, solid(1, 1, 2));
        view.set_text(WIDGET_STATUS, "first");
        view.set_text(WIDGET_STATUS, "second");

        assert_eq!(view.actions().len(), 4);
        assert_eq!(view.image_binding(WIDGET_IMAGE), Some(&solid(1, 1, 2)));
        assert_eq!(view.text_binding(WIDGET_STATUS), Some("second"));
        assert_eq!(view.image_binding(WIDGET_STATUS), None);
    }

    #[test]
    fn test_new_view_is_empty() {
        let view = RenderedView::new(WIDGET_LAYOUT);
        assert_eq!(view.layout(), WIDGET_LAYOUT);
        assert!(view.actions().is_empty());
        assert_eq!(view.image_binding(WIDGET_IMAGE), None);
    }
}
