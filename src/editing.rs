//! Editing session around the current upload
//!
//! Holds the image the user is about to upload together with the seed picker.
//! A successful removal swaps the image for the PNG cutout and renames it to
//! `<stem>-nobg.png`; a failed one leaves everything as it was and records a
//! message for display.

use crate::compositor::output_file_name;
use crate::error::Result;
use crate::loader::ImageSource;
use crate::processor::{BackgroundRemover, SeedRequest};
use crate::region::SeedPoint;
use crate::seed::{DisplayPoint, DisplaySize, SeedPicker};
use crate::types::CutoutResult;

/// The working image and its interactive seed state
#[derive(Debug, Clone)]
pub struct EditingSession {
    image: Vec<u8>,
    name: Option<String>,
    picker: SeedPicker,
    display: Option<DisplaySize>,
    last_error: Option<String>,
}

impl EditingSession {
    /// Start editing encoded image bytes, optionally with their file name
    #[must_use]
    pub fn new(image: Vec<u8>, name: Option<String>) -> Self {
        Self {
            image,
            name,
            picker: SeedPicker::new(),
            display: None,
            last_error: None,
        }
    }

    /// Encoded bytes of the current working image
    #[must_use]
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn picker(&self) -> &SeedPicker {
        &self.picker
    }

    /// Message from the last failed removal, cleared by the next attempt
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// A different file was chosen; any pending seed is dropped
    pub fn replace_image(&mut self, image: Vec<u8>, name: Option<String>) {
        self.image = image;
        self.name = name;
        self.picker.reset_for_new_image();
        self.last_error = None;
    }

    /// Size of the image as currently displayed, used to map presses
    pub fn set_display_size(&mut self, display: DisplaySize) {
        self.display = Some(display);
    }

    pub fn begin_picking(&mut self) {
        self.picker.begin_picking();
    }

    /// Forward a press to the picker; returns whether it placed a seed
    pub fn pointer_down(&mut self, point: DisplayPoint) -> bool {
        self.picker.pointer_down(point)
    }

    pub fn clear_seed(&mut self) {
        self.picker.clear();
    }

    pub fn cancel_picking(&mut self) {
        self.picker.cancel();
    }

    fn seed_request(&self) -> Option<SeedRequest> {
        let point = self.picker.seed()?;
        Some(match self.display {
            Some(display) => SeedRequest::Display { point, display },
            None => SeedRequest::Working(SeedPoint::new(
                point.x.round() as i64,
                point.y.round() as i64,
            )),
        })
    }

    /// Remove the background of the working image using the pending seed
    ///
    /// # Errors
    /// - Any pipeline error; the image, name and seed are left untouched and
    ///   `last_error` holds the user-facing message
    pub async fn apply(&mut self, remover: &BackgroundRemover) -> Result<CutoutResult> {
        self.last_error = None;
        let source = ImageSource::Bytes(self.image.clone());

        match remover.remove_background(&source, self.seed_request()).await {
            Ok(result) => {
                self.image.clone_from(&result.png);
                self.name = Some(output_file_name(self.name.as_deref()));
                self.picker.take_for_apply();
                Ok(result)
            },
            Err(e) => {
                let message = e.user_message();
                tracing::warn!(error = %e, "{message}");
                self.last_error = Some(message);
                Err(e)
            },
        }
    }
}
