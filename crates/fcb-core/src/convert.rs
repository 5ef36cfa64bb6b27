//! The per-request conversion pipeline.
//!
//! One `run()` call walks a single upload through download → submit → poll →
//! fetch → deliver, strictly sequentially, reporting progress by editing one
//! status message in place. Every failure ends the request with a single
//! user-facing status edit; nothing propagates to other chats.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    domain::{ChatId, JobId},
    errors::Error,
    formats::output_file_name,
    messaging::port::MessagingPort,
    ports::{ConversionPort, PollOutcome},
    session::PendingFile,
    Result,
};

/// Status-poll retry policy. The 30 × 2s default gives a job roughly a minute
/// to finish before the request is abandoned.
#[derive(Clone, Copy, Debug)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(2),
        }
    }
}

/// One conversion request: the uploaded file plus the chosen output format
/// (already normalized by the caller).
#[derive(Clone, Debug)]
pub struct ConvertRequest {
    pub chat_id: ChatId,
    pub file: PendingFile,
    pub output_format: String,
}

/// How the waiting phase of a successful job went.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSummary {
    /// Status calls made, including the one that returned `Finished`.
    pub attempts: u32,
    /// How many of those attempts were retries after a failed status request
    /// rather than a genuine in-progress answer.
    pub transient_retries: u32,
}

#[derive(Clone, Debug)]
pub struct Delivery {
    pub file_name: String,
    pub poll: PollSummary,
}

pub struct ConvertService {
    provider: Arc<dyn ConversionPort>,
    policy: PollPolicy,
}

impl ConvertService {
    pub fn new(provider: Arc<dyn ConversionPort>, policy: PollPolicy) -> Self {
        Self { provider, policy }
    }

    /// Run one conversion end to end.
    ///
    /// The returned error is also reported to the user via the status message,
    /// so callers only need it for logging.
    pub async fn run(
        &self,
        messenger: &dyn MessagingPort,
        req: ConvertRequest,
    ) -> Result<Delivery> {
        let status = messenger.send_text(req.chat_id, "Downloading file...").await?;

        let result = self.execute(messenger, &req, status).await;
        match &result {
            Ok(delivery) => {
                let _ = messenger
                    .edit_text(status, "Conversion completed successfully!")
                    .await;
                info!(
                    file = %req.file.file_name,
                    output = %delivery.file_name,
                    attempts = delivery.poll.attempts,
                    transient_retries = delivery.poll.transient_retries,
                    "conversion delivered"
                );
            }
            Err(e) => {
                let _ = messenger.edit_text(status, user_message(e)).await;
                warn!(file = %req.file.file_name, format = %req.output_format, error = %e, "conversion aborted");
            }
        }
        result
    }

    async fn execute(
        &self,
        messenger: &dyn MessagingPort,
        req: &ConvertRequest,
        status: crate::domain::MessageRef,
    ) -> Result<Delivery> {
        let bytes = messenger.download_file(&req.file.file).await?;
        messenger.edit_text(status, "Starting conversion...").await?;

        let job = self
            .provider
            .submit(&bytes, &req.file.file_name, &req.output_format)
            .await?;
        info!(job = %job.0, file = %req.file.file_name, format = %req.output_format, "conversion job submitted");
        messenger
            .edit_text(status, "Converting... Please wait.")
            .await?;

        let poll = self.poll_until_done(&job).await?;
        messenger
            .edit_text(status, "Conversion completed. Downloading result...")
            .await?;

        let result = self.provider.fetch_result(&job).await?;
        messenger.edit_text(status, "Sending file...").await?;

        let file_name = output_file_name(&req.file.file_name, &req.output_format);
        messenger
            .send_document(req.chat_id, &file_name, result)
            .await?;

        Ok(Delivery { file_name, poll })
    }

    /// Poll until the job reaches a terminal state or the attempt ceiling.
    ///
    /// `InProgress` and `TransientError` both consume an attempt; the
    /// distinction only matters for logs and the returned summary.
    async fn poll_until_done(&self, job: &JobId) -> Result<PollSummary> {
        let mut transient_retries = 0u32;

        for attempt in 1..=self.policy.max_attempts {
            match self.provider.poll_status(job).await? {
                PollOutcome::Finished { url } => {
                    debug!(job = %job.0, attempt, url = url.as_deref().unwrap_or(""), "job finished");
                    return Ok(PollSummary {
                        attempts: attempt,
                        transient_retries,
                    });
                }
                PollOutcome::Failed => {
                    return Err(Error::ProviderFailed(format!(
                        "provider reported job {} as failed",
                        job.0
                    )));
                }
                PollOutcome::InProgress => {
                    debug!(job = %job.0, attempt, "job still in progress");
                }
                PollOutcome::TransientError => {
                    transient_retries += 1;
                    warn!(job = %job.0, attempt, "status check failed, treating as still running");
                }
            }

            if attempt < self.policy.max_attempts {
                sleep(self.policy.interval).await;
            }
        }

        Err(Error::Timeout {
            attempts: self.policy.max_attempts,
        })
    }
}

/// Map a pipeline error to the single status line the user sees.
fn user_message(e: &Error) -> &'static str {
    match e {
        Error::Submit(_) => "Failed to start conversion. Please try again.",
        Error::ProviderFailed(_) => "Conversion failed. Please try again.",
        Error::Timeout { .. } => "Conversion timed out. Please try again later.",
        Error::Fetch(_) => "Failed to download converted file. Please try again.",
        _ => "An error occurred. Please try again.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FileRef, MessageId, MessageRef};
    use crate::messaging::types::InlineKeyboard;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted provider: pops one poll outcome per status call.
    #[derive(Default)]
    struct FakeProvider {
        submit_result: Mutex<Option<Result<JobId>>>,
        poll_script: Mutex<Vec<PollOutcome>>,
        fetch_result: Mutex<Option<Result<Vec<u8>>>>,
        submits: AtomicU32,
        polls: AtomicU32,
        fetches: AtomicU32,
    }

    impl FakeProvider {
        fn scripted(poll: Vec<PollOutcome>, fetch: Result<Vec<u8>>) -> Self {
            Self {
                submit_result: Mutex::new(Some(Ok(JobId("J1".to_string())))),
                poll_script: Mutex::new(poll),
                fetch_result: Mutex::new(Some(fetch)),
                ..Default::default()
            }
        }

        fn poll_calls(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }

        fn fetch_calls(&self) -> u32 {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConversionPort for FakeProvider {
        async fn submit(&self, _file: &[u8], _name: &str, _format: &str) -> Result<JobId> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            self.submit_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(Error::Submit("unscripted submit".to_string())))
        }

        async fn poll_status(&self, _job: &JobId) -> Result<PollOutcome> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.poll_script.lock().unwrap();
            if script.is_empty() {
                return Ok(PollOutcome::InProgress);
            }
            Ok(script.remove(0))
        }

        async fn fetch_result(&self, _job: &JobId) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.fetch_result
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(Error::Fetch("unscripted fetch".to_string())))
        }
    }

    #[derive(Default)]
    struct FakeMessenger {
        sends: Mutex<Vec<String>>,
        edits: Mutex<Vec<(MessageRef, String)>>,
        documents: Mutex<Vec<(ChatId, String, Vec<u8>)>>,
        download: Mutex<Option<Result<Vec<u8>>>>,
        fail_delivery: bool,
    }

    impl FakeMessenger {
        fn with_file(bytes: &[u8]) -> Self {
            Self {
                download: Mutex::new(Some(Ok(bytes.to_vec()))),
                ..Default::default()
            }
        }

        fn edit_texts(&self) -> Vec<String> {
            self.edits.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }

        fn delivered(&self) -> Vec<(ChatId, String, Vec<u8>)> {
            self.documents.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            let mut sends = self.sends.lock().unwrap();
            sends.push(text.to_string());
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(sends.len() as i32),
            })
        }

        async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
            self.edits.lock().unwrap().push((msg, text.to_string()));
            Ok(())
        }

        async fn send_inline_keyboard(
            &self,
            chat_id: ChatId,
            _text: &str,
            _keyboard: InlineKeyboard,
        ) -> Result<MessageRef> {
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(0),
            })
        }

        async fn answer_callback_query(&self, _id: &str, _text: Option<&str>) -> Result<()> {
            Ok(())
        }

        async fn download_file(&self, _file: &FileRef) -> Result<Vec<u8>> {
            self.download
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(Error::Transport("no file scripted".to_string())))
        }

        async fn send_document(
            &self,
            chat_id: ChatId,
            file_name: &str,
            bytes: Vec<u8>,
        ) -> Result<MessageRef> {
            if self.fail_delivery {
                return Err(Error::Transport("payload rejected".to_string()));
            }
            self.documents
                .lock()
                .unwrap()
                .push((chat_id, file_name.to_string(), bytes));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(99),
            })
        }
    }

    fn service(provider: Arc<FakeProvider>) -> ConvertService {
        // Zero delay keeps tests instant while preserving attempt counting.
        ConvertService::new(
            provider,
            PollPolicy {
                max_attempts: 30,
                interval: Duration::ZERO,
            },
        )
    }

    fn request(file_name: &str, format: &str) -> ConvertRequest {
        ConvertRequest {
            chat_id: ChatId(7),
            file: PendingFile {
                file: FileRef("tg-file-1".to_string()),
                file_name: file_name.to_string(),
            },
            output_format: format.to_string(),
        }
    }

    #[tokio::test]
    async fn happy_path_delivers_renamed_file() {
        let provider = Arc::new(FakeProvider::scripted(
            vec![
                PollOutcome::InProgress,
                PollOutcome::InProgress,
                PollOutcome::Finished {
                    url: Some("https://example.com/out".to_string()),
                },
            ],
            Ok(b"converted-bytes".to_vec()),
        ));
        let messenger = FakeMessenger::with_file(b"original-bytes");

        let delivery = service(provider.clone())
            .run(&messenger, request("report.docx", "pdf"))
            .await
            .unwrap();

        assert_eq!(delivery.file_name, "report.pdf");
        assert_eq!(delivery.poll, PollSummary { attempts: 3, transient_retries: 0 });
        assert_eq!(provider.poll_calls(), 3);

        let docs = messenger.delivered();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0, ChatId(7));
        assert_eq!(docs[0].1, "report.pdf");
        assert_eq!(docs[0].2, b"converted-bytes");

        // One status message, edited in place through the whole progression.
        assert_eq!(messenger.sends.lock().unwrap().len(), 1);
        assert_eq!(
            messenger.edit_texts(),
            vec![
                "Starting conversion...",
                "Converting... Please wait.",
                "Conversion completed. Downloading result...",
                "Sending file...",
                "Conversion completed successfully!",
            ]
        );
    }

    #[tokio::test]
    async fn provider_failure_stops_polling_and_skips_fetch() {
        let provider = Arc::new(FakeProvider::scripted(
            vec![PollOutcome::InProgress, PollOutcome::Failed],
            Ok(vec![]),
        ));
        let messenger = FakeMessenger::with_file(b"x");

        let err = service(provider.clone())
            .run(&messenger, request("a.docx", "pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ProviderFailed(_)));
        assert_eq!(provider.poll_calls(), 2);
        assert_eq!(provider.fetch_calls(), 0);
        assert!(messenger.delivered().is_empty());
        assert_eq!(
            messenger.edit_texts().last().map(String::as_str),
            Some("Conversion failed. Please try again.")
        );
    }

    #[tokio::test]
    async fn timeout_makes_exactly_max_attempts_calls() {
        let provider = Arc::new(FakeProvider::scripted(vec![], Ok(vec![])));
        let messenger = FakeMessenger::with_file(b"x");

        let err = service(provider.clone())
            .run(&messenger, request("a.docx", "pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { attempts: 30 }));
        assert_eq!(provider.poll_calls(), 30);
        assert_eq!(provider.fetch_calls(), 0);
        // Timeout wording differs from the provider-failure message.
        assert_eq!(
            messenger.edit_texts().last().map(String::as_str),
            Some("Conversion timed out. Please try again later.")
        );
    }

    #[tokio::test]
    async fn transient_errors_are_retried_and_counted() {
        let provider = Arc::new(FakeProvider::scripted(
            vec![
                PollOutcome::TransientError,
                PollOutcome::InProgress,
                PollOutcome::TransientError,
                PollOutcome::Finished { url: None },
            ],
            Ok(b"ok".to_vec()),
        ));
        let messenger = FakeMessenger::with_file(b"x");

        let delivery = service(provider.clone())
            .run(&messenger, request("photo.heic", "png"))
            .await
            .unwrap();

        assert_eq!(delivery.poll, PollSummary { attempts: 4, transient_retries: 2 });
        assert_eq!(delivery.file_name, "photo.png");
    }

    #[tokio::test]
    async fn submit_failure_is_terminal_without_polling() {
        let provider = Arc::new(FakeProvider {
            submit_result: Mutex::new(Some(Err(Error::Submit("rejected".to_string())))),
            ..Default::default()
        });
        let messenger = FakeMessenger::with_file(b"x");

        let err = service(provider.clone())
            .run(&messenger, request("a.docx", "pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Submit(_)));
        assert_eq!(provider.poll_calls(), 0);
        assert_eq!(
            messenger.edit_texts().last().map(String::as_str),
            Some("Failed to start conversion. Please try again.")
        );
    }

    #[tokio::test]
    async fn download_failure_is_terminal_before_submit() {
        let provider = Arc::new(FakeProvider::scripted(vec![], Ok(vec![])));
        let messenger = FakeMessenger::default(); // no file scripted

        let err = service(provider.clone())
            .run(&messenger, request("a.docx", "pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(provider.submits.load(Ordering::SeqCst), 0);
        assert_eq!(
            messenger.edit_texts().last().map(String::as_str),
            Some("An error occurred. Please try again.")
        );
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_not_retried() {
        let provider = Arc::new(FakeProvider::scripted(
            vec![PollOutcome::Finished { url: None }],
            Ok(b"ok".to_vec()),
        ));
        let messenger = FakeMessenger {
            fail_delivery: true,
            download: Mutex::new(Some(Ok(b"x".to_vec()))),
            ..Default::default()
        };

        let err = service(provider.clone())
            .run(&messenger, request("a.docx", "pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(provider.fetch_calls(), 1);
        assert!(messenger.delivered().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_after_finish_is_terminal() {
        let provider = Arc::new(FakeProvider::scripted(
            vec![PollOutcome::Finished { url: None }],
            Err(Error::Fetch("both paths exhausted".to_string())),
        ));
        let messenger = FakeMessenger::with_file(b"x");

        let err = service(provider.clone())
            .run(&messenger, request("a.docx", "pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Fetch(_)));
        assert!(messenger.delivered().is_empty());
        assert_eq!(
            messenger.edit_texts().last().map(String::as_str),
            Some("Failed to download converted file. Please try again.")
        );
    }
}
