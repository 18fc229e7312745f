//! The upload & analyze controller.
//!
//! Owns the upload session, the preview registry and the cancel token of the
//! in-flight request, and writes every visible effect to the [`Page`] it is
//! handed. Flow: `Empty -> FileSelected -> Analyzing -> Succeeded`, with a
//! failed analysis falling back to `FileSelected`.

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::analyze::{AnalyzeBackend, AnalyzeError, AnalyzeOutcome};
use crate::cancel::CancelToken;
use crate::page::{DetectionRow, Page, Preview, ResultMedia};
use crate::upload::{
    AnalyzeBlocked, MediaKind, PreviewStore, SelectedFile, SessionState, UploadSession, data_url,
};

pub const NO_FILE_MESSAGE: &str = "Please select an image or video first.";
pub const INVALID_FILE_MESSAGE: &str = "Please select a valid image or video file.";
pub const NO_DETECTIONS_MESSAGE: &str = "No cells were detected.";
pub const VIDEO_ROWS_MESSAGE: &str = "Detections are drawn on the processed video.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragEvent {
    Enter,
    Over,
    Leave,
    Drop,
}

/// Why `analyze` produced no outcome. The page has already been updated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubmitError {
    #[error(transparent)]
    Blocked(#[from] AnalyzeBlocked),
    #[error(transparent)]
    Failed(#[from] AnalyzeError),
}

pub struct UploadController {
    backend: Box<dyn AnalyzeBackend>,
    session: UploadSession,
    previews: PreviewStore,
    /// Object URL currently shown as the preview, if the selection is a video.
    object_url: Option<String>,
    cancel: CancelToken,
}

impl UploadController {
    pub fn new(backend: Box<dyn AnalyzeBackend>) -> Self {
        Self {
            backend,
            session: UploadSession::default(),
            previews: PreviewStore::new(),
            object_url: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn selected(&self) -> Option<&SelectedFile> {
        self.session.file()
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    /// Token that aborts the in-flight request when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn on_drag(&mut self, event: DragEvent, page: &mut Page) {
        page.upload.drop_active = matches!(event, DragEvent::Enter | DragEvent::Over);
    }

    /// A drop clears the highlight, then behaves like a picker selection.
    pub fn drop_files(&mut self, files: Vec<SelectedFile>, page: &mut Page) {
        self.on_drag(DragEvent::Drop, page);
        self.select_files(files, page);
    }

    /// Take the first file as the new selection. An empty list is ignored.
    pub fn select_files(&mut self, files: Vec<SelectedFile>, page: &mut Page) {
        let Some(file) = files.into_iter().next() else {
            return;
        };

        self.release_preview();
        page.results.hide();

        match self.session.select(file.clone()) {
            Ok(kind) => {
                let src = match kind {
                    MediaKind::Image => data_url(&file.media_type, &file.bytes),
                    MediaKind::Video => {
                        let url = self.previews.create(&file);
                        self.object_url = Some(url.clone());
                        url
                    }
                };
                info!(name = %file.name, %kind, bytes = file.bytes.len(), "file selected");
                page.upload.file_name = Some(file.name);
                page.upload.preview = Some(Preview { kind, src });
                page.upload.analyze_enabled = true;
            }
            Err(err) => {
                warn!(error = %err, "selection rejected");
                page.upload.file_name = None;
                page.upload.preview = None;
                page.upload.analyze_enabled = false;
                page.alert(INVALID_FILE_MESSAGE);
            }
        }
    }

    /// Submit the selected file and render the outcome.
    pub fn analyze(&mut self, page: &mut Page) -> Result<AnalyzeOutcome, SubmitError> {
        let file = match self.session.begin_analysis() {
            Ok(file) => file,
            Err(AnalyzeBlocked::NoFile) => {
                page.alert(NO_FILE_MESSAGE);
                return Err(AnalyzeBlocked::NoFile.into());
            }
            Err(AnalyzeBlocked::InFlight) => {
                warn!("analysis already in progress, ignoring");
                return Err(AnalyzeBlocked::InFlight.into());
            }
        };
        let kind = file.kind().unwrap_or(MediaKind::Image);
        info!(name = %file.name, backend = %self.backend.describe(), "analysis started");

        page.upload.analyze_enabled = false;
        let result = {
            let _loading = page.loading.show(kind.loading_text());
            self.backend.analyze(&file, &self.cancel)
        };
        page.upload.analyze_enabled = true;
        self.cancel.reset();
        self.session.finish_analysis(result.is_ok());

        match result {
            Ok(outcome) => {
                render_outcome(&outcome, page);
                info!(name = %file.name, "analysis finished");
                Ok(outcome)
            }
            Err(err) => {
                error!(name = %file.name, error = %err, "analysis failed");
                page.alert(failure_message(kind, &err));
                Err(err.into())
            }
        }
    }

    fn release_preview(&mut self) {
        if let Some(url) = self.object_url.take() {
            self.previews.revoke(&url);
        }
    }
}

impl Drop for UploadController {
    fn drop(&mut self) {
        self.release_preview();
    }
}

fn failure_message(kind: MediaKind, err: &AnalyzeError) -> String {
    match err {
        AnalyzeError::Rejected(Some(message)) => format!("Error analyzing {kind}: {message}"),
        AnalyzeError::TimedOut(_) => {
            format!("Analyzing the {kind} took too long. Please try again.")
        }
        AnalyzeError::Cancelled => "Analysis cancelled.".to_string(),
        _ => format!("An error occurred while processing the {kind}."),
    }
}

fn render_outcome(outcome: &AnalyzeOutcome, page: &mut Page) {
    let results = &mut page.results;
    match outcome {
        AnalyzeOutcome::Image {
            annotated,
            detections,
            total,
        } => {
            results.media = Some(ResultMedia::Image {
                src: annotated.clone(),
            });
            results.rows = if detections.is_empty() {
                vec![DetectionRow::Info {
                    message: NO_DETECTIONS_MESSAGE.to_string(),
                }]
            } else {
                detections
                    .iter()
                    .map(|d| DetectionRow::Detection {
                        id: d.id.clone(),
                        class: d.class_name.clone(),
                        confidence: d.confidence_text(),
                        bbox: d.bbox_text(),
                    })
                    .collect()
            };
            results.count = total.to_string();
            results.count_label = "Detections".to_string();
        }
        AnalyzeOutcome::Video {
            url,
            frames_processed,
        } => {
            results.media = Some(ResultMedia::Video { src: url.clone() });
            results.rows = vec![DetectionRow::Info {
                message: VIDEO_ROWS_MESSAGE.to_string(),
            }];
            results.count = frames_processed.to_string();
            results.count_label = "Frames processed".to_string();
        }
    }
    results.visible = true;
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::analyze::Detection;

    struct Scripted {
        reply: Result<AnalyzeOutcome, AnalyzeError>,
        calls: Rc<Cell<usize>>,
    }

    impl AnalyzeBackend for Scripted {
        fn describe(&self) -> String {
            "scripted".into()
        }

        fn analyze(
            &self,
            _: &SelectedFile,
            _: &CancelToken,
        ) -> Result<AnalyzeOutcome, AnalyzeError> {
            self.calls.set(self.calls.get() + 1);
            self.reply.clone()
        }
    }

    fn controller(
        reply: Result<AnalyzeOutcome, AnalyzeError>,
    ) -> (UploadController, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let backend = Scripted {
            reply,
            calls: Rc::clone(&calls),
        };
        (UploadController::new(Box::new(backend)), calls)
    }

    fn image() -> SelectedFile {
        SelectedFile::new("cells.png", "image/png", vec![1u8, 2, 3])
    }

    fn video() -> SelectedFile {
        SelectedFile::new("run.mp4", "video/mp4", vec![0u8; 8])
    }

    fn outcome(detections: Vec<Detection>) -> AnalyzeOutcome {
        let total = detections.len() as u64;
        AnalyzeOutcome::Image {
            annotated: "data:image/jpeg;base64,AAAA".into(),
            detections,
            total,
        }
    }

    #[test]
    fn drag_events_toggle_highlight() {
        let (mut ctl, _) = controller(Ok(outcome(vec![])));
        let mut page = Page::default();
        ctl.on_drag(DragEvent::Enter, &mut page);
        assert!(page.upload.drop_active);
        ctl.on_drag(DragEvent::Over, &mut page);
        assert!(page.upload.drop_active);
        ctl.on_drag(DragEvent::Leave, &mut page);
        assert!(!page.upload.drop_active);
        ctl.on_drag(DragEvent::Enter, &mut page);
        ctl.drop_files(vec![image()], &mut page);
        assert!(!page.upload.drop_active);
        assert_eq!(ctl.state(), SessionState::FileSelected);
    }

    #[test]
    fn image_selection_previews_as_data_url() {
        let (mut ctl, _) = controller(Ok(outcome(vec![])));
        let mut page = Page::default();
        ctl.select_files(vec![image()], &mut page);
        let preview = page.upload.preview.as_ref().unwrap();
        assert_eq!(preview.kind, MediaKind::Image);
        assert_eq!(preview.src, "data:image/png;base64,AQID");
        assert!(page.upload.analyze_enabled);
        assert_eq!(ctl.previews().live_count(), 0);
    }

    #[test]
    fn empty_selection_is_ignored() {
        let (mut ctl, _) = controller(Ok(outcome(vec![])));
        let mut page = Page::default();
        ctl.select_files(vec![image()], &mut page);
        ctl.select_files(vec![], &mut page);
        assert_eq!(ctl.state(), SessionState::FileSelected);
        assert_eq!(page.upload.file_name.as_deref(), Some("cells.png"));
    }

    #[test]
    fn invalid_file_resets_and_revokes_preview() {
        let (mut ctl, _) = controller(Ok(outcome(vec![])));
        let mut page = Page::default();
        ctl.select_files(vec![video()], &mut page);
        assert_eq!(ctl.previews().live_count(), 1);

        let pdf = SelectedFile::new("doc.pdf", "application/pdf", vec![0u8]);
        ctl.select_files(vec![pdf], &mut page);
        assert_eq!(ctl.state(), SessionState::Empty);
        assert!(!page.upload.analyze_enabled);
        assert!(page.upload.preview.is_none());
        assert_eq!(ctl.previews().live_count(), 0);
        let notices = page.take_notices();
        assert_eq!(notices[0].message, INVALID_FILE_MESSAGE);
    }

    #[test]
    fn analyze_without_file_only_notifies() {
        let (mut ctl, calls) = controller(Ok(outcome(vec![])));
        let mut page = Page::default();
        let err = ctl.analyze(&mut page).unwrap_err();
        assert_eq!(err, SubmitError::Blocked(AnalyzeBlocked::NoFile));
        assert_eq!(calls.get(), 0);
        assert_eq!(ctl.state(), SessionState::Empty);
        assert_eq!(page.take_notices()[0].message, NO_FILE_MESSAGE);
        assert!(!page.results.visible);
    }

    #[test]
    fn failure_keeps_file_and_reenables_trigger() {
        let (mut ctl, _) = controller(Err(AnalyzeError::Transport("connection refused".into())));
        let mut page = Page::default();
        ctl.select_files(vec![image()], &mut page);
        assert!(ctl.analyze(&mut page).is_err());
        assert_eq!(ctl.state(), SessionState::FileSelected);
        assert!(page.upload.analyze_enabled);
        assert!(!page.loading.visible);
        assert_eq!(
            page.take_notices()[0].message,
            "An error occurred while processing the image."
        );
    }

    #[test]
    fn failure_messages_by_kind() {
        let rejected = AnalyzeError::Rejected(Some("bad image".into()));
        assert_eq!(
            failure_message(MediaKind::Image, &rejected),
            "Error analyzing image: bad image"
        );
        let generic = AnalyzeError::Rejected(None);
        assert_eq!(
            failure_message(MediaKind::Video, &generic),
            "An error occurred while processing the video."
        );
    }
}
