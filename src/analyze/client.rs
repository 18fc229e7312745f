use std::io::Read;
use std::time::Duration;

use crate::cancel::{CancelToken, Interrupted, run_cancellable};
use crate::config::schema::ServiceConfig;
use crate::upload::SelectedFile;

use super::{AnalyzeBackend, AnalyzeError, AnalyzeOutcome, MultipartForm, decode_response};

/// Bodies larger than this are not read (annotated images are base64 in JSON).
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// `POST` of a multipart upload to the detection service.
#[derive(Debug, Clone)]
pub struct HttpAnalyzeClient {
    service: ServiceConfig,
    agent: ureq::Agent,
}

impl HttpAnalyzeClient {
    pub fn new(service: ServiceConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(service.timeout()).build();
        Self { service, agent }
    }

    pub fn timeout(&self) -> Duration {
        self.service.timeout()
    }
}

impl AnalyzeBackend for HttpAnalyzeClient {
    fn describe(&self) -> String {
        self.service.analyze_url()
    }

    fn analyze(
        &self,
        file: &SelectedFile,
        cancel: &CancelToken,
    ) -> Result<AnalyzeOutcome, AnalyzeError> {
        let form = MultipartForm::new();
        let content_type = form.content_type();
        let body = form
            .file(&self.service.upload_field, &file.name, &file.media_type, &file.bytes)
            .finish();

        let agent = self.agent.clone();
        let url = self.service.analyze_url();
        tracing::debug!(
            url = %url,
            file = %file.name,
            bytes = body.len(),
            "submitting for analysis"
        );

        let outcome = run_cancellable(cancel, self.timeout(), move || {
            let response = match agent
                .post(&url)
                .set("Content-Type", &content_type)
                .set("Accept", "application/json")
                .send_bytes(&body)
            {
                Ok(resp) => resp,
                Err(ureq::Error::Status(_, resp)) => resp,
                Err(ureq::Error::Transport(t)) => {
                    return Err(AnalyzeError::Transport(t.to_string()));
                }
            };
            let status = response.status();
            let mut text = String::new();
            response
                .into_reader()
                .take(MAX_BODY_BYTES)
                .read_to_string(&mut text)
                .map_err(|e| AnalyzeError::Transport(format!("failed to read body: {e}")))?;
            Ok((status, text))
        });

        let (status, text) = match outcome {
            Ok(result) => result?,
            Err(Interrupted::TimedOut(after)) => return Err(AnalyzeError::TimedOut(after)),
            Err(Interrupted::Cancelled) => return Err(AnalyzeError::Cancelled),
            Err(Interrupted::Failed) => {
                return Err(AnalyzeError::Transport("request worker failed".to_string()));
            }
        };
        tracing::debug!(status, "analysis response received");
        decode_response(status, &text, |u| self.service.resolve(u))
    }
}
