//! End-to-end flows through [`Engine`] against the in-memory backend.
//!
//! Each test scripts the backend, drives the engine the way a front end
//! would (user action, then pump the event subscription), and checks the
//! resulting state.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use assist_harness::backend::{AssistantConfig, ModelEntry};
use assist_harness::config::Config;
use assist_harness::engine::Engine;
use assist_harness::error::EngineError;
use assist_harness::memory_backend::{InMemoryBackend, UploadScript};
use assist_harness::progress::{NoProgress, UploadProgressEvent, UploadProgressReporter};
use assist_harness_core::events::BackendEvent;
use assist_harness_core::models::{FeedbackKind, FileStatus, Message, Sender, Session};
use chrono::Utc;
use tempfile::TempDir;

// ─── Helpers ────────────────────────────────────────────────────────

fn engine_with(backend: &Arc<InMemoryBackend>) -> Engine {
    let mut engine = Engine::new(backend.clone(), &Config::minimal(), Box::new(NoProgress)).unwrap();
    engine.attach();
    engine
}

#[derive(Clone, Default)]
struct RecordingProgress {
    events: Arc<Mutex<Vec<UploadProgressEvent>>>,
}

impl UploadProgressReporter for RecordingProgress {
    fn report(&self, event: UploadProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl RecordingProgress {
    fn percents(&self) -> Vec<u8> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                UploadProgressEvent::File { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }
}

fn session_with(sid: u32, name: &str, texts: &[(Sender, &str)]) -> Session {
    let mut session = Session::new(sid, Utc::now());
    session.name = name.to_string();
    for (i, (sender, text)) in texts.iter().enumerate() {
        let mut message = Message::user(*text, i as i64 + 1);
        message.sender = *sender;
        session.messages.push(message);
    }
    session
}

fn docs_dir(names: &[&str]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for name in names {
        fs::write(tmp.path().join(name), format!("contents of {name}")).unwrap();
    }
    tmp
}

fn status_of(engine: &Engine, name: &str) -> FileStatus {
    engine
        .ingest()
        .catalog()
        .files()
        .iter()
        .find(|f| f.name == name)
        .unwrap()
        .status
}

// ─── Chat ───────────────────────────────────────────────────────────

#[tokio::test]
async fn send_appends_user_then_placeholder_and_finalizes() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = engine_with(&backend);

    engine.chat_mut().composer_mut().set_prompt("Hello");
    let sid = engine.chat_mut().send().await.unwrap();
    assert_eq!(sid, 0);

    {
        let session = engine.chat().sessions().get(sid).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].sender, Sender::User);
        assert_eq!(session.messages[0].text, "Hello");
        assert_eq!(session.messages[1].sender, Sender::Assistant);
        assert_eq!(session.messages[1].text, "");
        assert!(session.messages[0].timestamp < session.messages[1].timestamp);
    }
    assert!(engine.chat().thinking());
    assert_eq!(engine.chat().composer().prompt(), "");

    assert_eq!(engine.pump(), 3);
    let session = engine.chat().sessions().get(sid).unwrap();
    assert_eq!(session.messages[1].text, "Echo: Hello");
    assert!(session.messages[0].timestamp < session.messages[1].timestamp);
    assert!(!engine.chat().thinking());

    let request = backend.last_chat().unwrap();
    assert_eq!(request.name, "default");
    assert_eq!(request.sid, 0);
    assert!(request.history.is_empty());
    assert_eq!(request.attached_files, None);
}

#[tokio::test]
async fn follow_up_carries_prior_turns() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = engine_with(&backend);

    engine.chat_mut().composer_mut().set_prompt("First");
    engine.send_and_wait().await.unwrap();
    engine.chat_mut().composer_mut().set_prompt("Second");
    engine.send_and_wait().await.unwrap();

    let request = backend.last_chat().unwrap();
    let turns: Vec<(&str, &str)> = request
        .history
        .iter()
        .map(|t| (t.role.as_str(), t.content.as_str()))
        .collect();
    assert_eq!(turns, vec![("user", "First"), ("assistant", "Echo: First")]);
    assert_eq!(engine.chat().sessions().get(0).unwrap().messages.len(), 4);
}

#[tokio::test]
async fn staged_attachments_travel_with_the_prompt_and_are_consumed() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = engine_with(&backend);

    let composer = engine.chat_mut().composer_mut();
    composer.set_prompt("What does it say?");
    composer.stage_attachments(["/docs/a.pdf"], "summarize");
    engine.send_and_wait().await.unwrap();

    let request = backend.last_chat().unwrap();
    assert_eq!(request.query_type.as_deref(), Some("summarize"));
    assert_eq!(request.attached_files.as_deref(), Some(r#"["/docs/a.pdf"]"#));

    let user = &engine.chat().sessions().get(0).unwrap().messages[0];
    assert_eq!(user.attached_files, vec!["/docs/a.pdf".to_string()]);
    assert!(engine.chat().composer().attachments().is_empty());
    assert_eq!(engine.chat().composer().query_type(), None);
}

#[tokio::test]
async fn empty_prompt_is_rejected_without_side_effects() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = engine_with(&backend);

    engine.chat_mut().composer_mut().set_prompt("   ");
    let err = engine.chat_mut().send().await.unwrap_err();
    assert!(matches!(err, EngineError::EmptyPrompt));
    assert!(engine.chat().sessions().sessions().is_empty());
    assert!(!backend.calls().contains(&"send_chat"));
}

#[tokio::test]
async fn second_send_while_streaming_is_busy() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.hold_streams(true);
    let mut engine = engine_with(&backend);

    engine.chat_mut().composer_mut().set_prompt("Hello");
    engine.chat_mut().send().await.unwrap();
    engine.pump();
    assert!(engine.chat().stream().has_output());
    assert_eq!(engine.chat().message_text(0, 1), Some("Echo: Hello"));
    assert_eq!(engine.chat().sessions().get(0).unwrap().messages[1].text, "");

    engine.chat_mut().composer_mut().set_prompt("Again");
    let err = engine.chat_mut().send().await.unwrap_err();
    assert!(matches!(err, EngineError::Busy(_)));
    assert_eq!(engine.chat().sessions().get(0).unwrap().messages.len(), 2);
}

#[tokio::test]
async fn stop_finalizes_with_partial_text() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.hold_streams(true);
    backend.reply_with(["Partial ", "answer"]);
    let mut engine = engine_with(&backend);

    engine.chat_mut().composer_mut().set_prompt("Explain");
    engine.chat_mut().send().await.unwrap();
    engine.pump();
    assert!(engine.chat().thinking());

    engine.chat_mut().stop().await.unwrap();
    engine.pump();
    assert!(!engine.chat().thinking());
    assert!(backend.calls().contains(&"stop_chat"));
    let session = engine.chat().sessions().get(0).unwrap();
    assert_eq!(session.messages[1].text, "Partial answer");
}

#[tokio::test]
async fn long_reply_arrives_whole() {
    let deltas: Vec<String> = (0..1500).map(|i| ((b'a' + (i % 26) as u8) as char).to_string()).collect();
    let expected: String = deltas.concat();
    let backend = Arc::new(InMemoryBackend::new());
    backend.reply_with(deltas);
    let mut engine = engine_with(&backend);

    engine.chat_mut().composer_mut().set_prompt("Write a lot");
    engine.send_and_wait().await.unwrap();

    assert!(!engine.chat().thinking());
    let reply = &engine.chat().sessions().get(0).unwrap().messages[1].text;
    assert_eq!(reply.len(), 1500);
    assert_eq!(reply, &expected);
}

#[tokio::test]
async fn failed_send_clears_thinking_and_keeps_the_draft() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.fail_next("send_chat");
    let mut engine = engine_with(&backend);

    engine.chat_mut().composer_mut().set_prompt("Hello");
    let err = engine.chat_mut().send().await.unwrap_err();
    assert!(matches!(err, EngineError::Transport { op: "send_chat", .. }));
    assert!(!engine.chat().thinking());
    assert!(!engine.chat().stream().is_streaming());
    assert_eq!(engine.chat().composer().prompt(), "Hello");

    let session = engine.chat().sessions().get(0).unwrap();
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[1].text, "");

    // The next attempt goes through.
    engine.send_and_wait().await.unwrap();
    let session = engine.chat().sessions().get(0).unwrap();
    assert_eq!(session.messages[3].text, "Echo: Hello");
}

#[tokio::test]
async fn duplicate_completion_is_ignored() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = engine_with(&backend);

    engine.chat_mut().composer_mut().set_prompt("Hello");
    engine.send_and_wait().await.unwrap();
    let before = engine.chat().sessions().get(0).unwrap().clone();

    backend.emit(BackendEvent::StreamCompleted);
    backend.emit(BackendEvent::NewMessage("stray".into()));
    engine.pump();
    assert_eq!(engine.chat().sessions().get(0).unwrap(), &before);
    assert!(!engine.chat().thinking());
}

#[tokio::test]
async fn reply_lands_in_the_session_it_was_sent_from() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.hold_streams(true);
    let mut engine = engine_with(&backend);

    engine.chat_mut().composer_mut().set_prompt("Hello");
    engine.chat_mut().send().await.unwrap();
    let other = engine.chat_mut().create_session();
    assert_eq!(other, 1);
    assert_eq!(engine.chat().sessions().selected(), Some(1));

    engine.chat_mut().stop().await.unwrap();
    engine.pump();
    assert_eq!(
        engine.chat().sessions().get(0).unwrap().messages[1].text,
        "Echo: Hello"
    );
    assert!(engine.chat().sessions().get(1).unwrap().messages.is_empty());
}

#[tokio::test]
async fn rename_waits_for_confirmation() {
    let backend = Arc::new(InMemoryBackend::new().with_history(vec![session_with(0, "Old", &[])]));
    let mut engine = engine_with(&backend);
    engine.refresh().await.unwrap();

    backend.refuse("rename_session");
    assert!(!engine.chat_mut().rename_session(0, "New").await.unwrap());
    assert_eq!(engine.chat().sessions().get(0).unwrap().name, "Old");

    backend.accept("rename_session");
    assert!(engine.chat_mut().rename_session(0, "New").await.unwrap());
    assert_eq!(engine.chat().sessions().get(0).unwrap().name, "New");

    backend.fail_next("rename_session");
    let err = engine.chat_mut().rename_session(0, "Newer").await.unwrap_err();
    assert!(matches!(err, EngineError::Transport { .. }));
    assert_eq!(engine.chat().sessions().get(0).unwrap().name, "New");
}

#[tokio::test]
async fn removed_session_id_is_reused() {
    let backend = Arc::new(InMemoryBackend::new().with_history(vec![
        session_with(0, "zero", &[]),
        session_with(1, "one", &[]),
    ]));
    let mut engine = engine_with(&backend);
    engine.refresh().await.unwrap();
    engine.chat_mut().select_session(Some(0)).unwrap();

    backend.refuse("remove_session");
    let err = engine.chat_mut().remove_session(0).await.unwrap_err();
    assert!(matches!(err, EngineError::Rejected { .. }));
    assert!(engine.chat().sessions().get(0).is_some());

    backend.accept("remove_session");
    engine.chat_mut().remove_session(0).await.unwrap();
    assert!(engine.chat().sessions().get(0).is_none());
    assert_eq!(engine.chat().sessions().selected(), None);

    assert_eq!(engine.chat_mut().create_session(), 0);
}

#[tokio::test]
async fn selecting_an_unknown_session_fails() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = engine_with(&backend);
    let err = engine.chat_mut().select_session(Some(7)).unwrap_err();
    assert!(matches!(err, EngineError::UnknownSession(7)));
    engine.chat_mut().select_session(None).unwrap();
}

#[tokio::test]
async fn history_refresh_is_deferred_while_streaming() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.hold_streams(true);
    let mut engine = engine_with(&backend);

    engine.chat_mut().composer_mut().set_prompt("Hello");
    engine.chat_mut().send().await.unwrap();
    let summary = engine.refresh().await.unwrap();
    assert!(!summary.history_reloaded);
    assert_eq!(engine.chat().sessions().get(0).unwrap().messages.len(), 2);
}

// ─── Subscription ───────────────────────────────────────────────────

#[tokio::test]
async fn reattaching_does_not_duplicate_events() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = engine_with(&backend);
    engine.attach();
    engine.attach();
    assert_eq!(backend.subscriber_count(), 1);

    engine.chat_mut().composer_mut().set_prompt("Hello");
    engine.chat_mut().send().await.unwrap();
    engine.pump();
    assert_eq!(
        engine.chat().sessions().get(0).unwrap().messages[1].text,
        "Echo: Hello"
    );
}

#[tokio::test]
async fn detached_engine_ignores_events() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = engine_with(&backend);
    engine.detach();
    assert!(!engine.is_attached());
    assert_eq!(backend.subscriber_count(), 0);

    backend.emit(BackendEvent::NewMessage("lost".into()));
    assert_eq!(engine.pump(), 0);
    assert!(!engine.next_event().await);
}

#[tokio::test]
async fn connect_stores_status_and_assistant_config() {
    let backend = Arc::new(InMemoryBackend::new().with_config(AssistantConfig {
        models: vec![ModelEntry {
            full_name: "llama-3-8b".to_string(),
            model_type: "chat".to_string(),
        }],
        download_endpoint: None,
    }));
    let mut engine = engine_with(&backend);

    assert_eq!(engine.connect().await.unwrap(), "Connected");
    assert_eq!(engine.status(), Some("Connected"));
    assert_eq!(engine.assistant_config().unwrap().models.len(), 1);

    backend.fail_next("connect");
    let err = engine.connect().await.unwrap_err();
    assert!(matches!(err, EngineError::Transport { op: "connect", .. }));
}

// ─── Ingestion ──────────────────────────────────────────────────────

#[tokio::test]
async fn duplicates_from_files_and_directories_are_admitted_once() {
    let tmp = docs_dir(&["a.pdf", "b.md", "c.exe"]);
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = engine_with(&backend);

    let first = engine.ingest_mut().add_paths(&[tmp.path().join("a.pdf")]);
    assert_eq!(first.len(), 1);
    let second = engine.ingest_mut().add_paths(&[tmp.path().to_path_buf()]);
    assert_eq!(second.len(), 1);

    let names: Vec<&str> = engine
        .ingest()
        .catalog()
        .files()
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, vec!["a.pdf", "b.md"]);
}

#[tokio::test]
async fn upload_round_marks_files_uploaded() {
    let tmp = docs_dir(&["a.pdf", "b.md"]);
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = engine_with(&backend);

    engine.ingest_mut().add_paths(&[tmp.path()]);
    assert_eq!(engine.upload().await.unwrap(), 2);

    assert!(!engine.ingest().is_uploading());
    for file in engine.ingest().catalog().files() {
        assert_eq!(file.status, FileStatus::Uploaded);
        assert_eq!(file.progress, 100);
    }
    let root = fs::canonicalize(tmp.path()).unwrap();
    let mut uploaded = backend.last_upload();
    uploaded.sort();
    assert_eq!(uploaded, vec![root.join("a.pdf"), root.join("b.md")]);
}

#[tokio::test]
async fn differently_spelled_paths_are_admitted_once() {
    let tmp = docs_dir(&["a.pdf", "b.md"]);
    fs::create_dir(tmp.path().join("sub")).unwrap();
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = engine_with(&backend);

    let roundabout = tmp.path().join("sub").join("..").join("a.pdf");
    assert_eq!(engine.ingest_mut().add_paths(&[roundabout]).len(), 1);
    let second = engine.ingest_mut().add_paths(&[tmp.path().join(".")]);
    assert_eq!(second.len(), 1);
    assert_eq!(engine.ingest().catalog().files().len(), 2);
}

#[tokio::test]
async fn refresh_during_upload_keeps_the_round() {
    let tmp = docs_dir(&["a.pdf"]);
    let listed = fs::canonicalize(tmp.path()).unwrap().join("a.pdf");
    let backend = Arc::new(InMemoryBackend::new().with_files(vec![listed]));
    backend.script_upload(UploadScript {
        progress: Vec::new(),
        completion: None,
    });
    let mut engine = engine_with(&backend);

    engine.ingest_mut().add_paths(&[tmp.path()]);
    engine.ingest_mut().start_upload().await.unwrap();
    engine.refresh().await.unwrap();

    assert_eq!(status_of(&engine, "a.pdf"), FileStatus::Uploading);
    assert_eq!(engine.ingest().catalog().files().len(), 1);
    assert!(engine.ingest().is_uploading());
}

#[tokio::test]
async fn nothing_pending_means_no_request() {
    let backend = Arc::new(InMemoryBackend::new());
    let mut engine = engine_with(&backend);
    assert_eq!(engine.ingest_mut().start_upload().await.unwrap(), 0);
    assert!(!backend.calls().contains(&"upload_files"));
}

#[tokio::test]
async fn out_of_order_progress_is_rejected() {
    let tmp = docs_dir(&["a.pdf"]);
    let path = tmp.path().join("a.pdf").display().to_string();
    let backend = Arc::new(InMemoryBackend::new());
    backend.script_upload(UploadScript {
        progress: vec![
            (path.clone(), "10".into()),
            (path.clone(), "5".into()),
            (path.clone(), "40".into()),
            (path, "n/a".into()),
        ],
        completion: None,
    });
    let progress = RecordingProgress::default();
    let mut engine =
        Engine::new(backend.clone(), &Config::minimal(), Box::new(progress.clone())).unwrap();
    engine.attach();

    engine.ingest_mut().add_paths(&[tmp.path()]);
    engine.ingest_mut().start_upload().await.unwrap();
    engine.pump();

    assert_eq!(progress.percents(), vec![10, 40]);
    assert_eq!(engine.ingest().catalog().files()[0].progress, 40);
    assert!(engine.ingest().is_uploading());
}

#[tokio::test]
async fn second_upload_while_running_is_busy() {
    let tmp = docs_dir(&["a.pdf", "b.pdf"]);
    let backend = Arc::new(InMemoryBackend::new());
    backend.script_upload(UploadScript {
        progress: Vec::new(),
        completion: None,
    });
    let mut engine = engine_with(&backend);

    engine.ingest_mut().add_paths(&[tmp.path().join("a.pdf")]);
    engine.ingest_mut().start_upload().await.unwrap();
    engine.ingest_mut().add_paths(&[tmp.path().join("b.pdf")]);
    let err = engine.ingest_mut().start_upload().await.unwrap_err();
    assert!(matches!(err, EngineError::Busy(_)));
}

#[tokio::test]
async fn failed_upload_request_fails_the_batch() {
    let tmp = docs_dir(&["a.pdf"]);
    let backend = Arc::new(InMemoryBackend::new());
    backend.fail_next("upload_files");
    let mut engine = engine_with(&backend);

    engine.ingest_mut().add_paths(&[tmp.path()]);
    let err = engine.ingest_mut().start_upload().await.unwrap_err();
    assert!(matches!(err, EngineError::Transport { op: "upload_files", .. }));
    assert!(!engine.ingest().is_uploading());
    assert_eq!(status_of(&engine, "a.pdf"), FileStatus::Failed);
}

#[tokio::test]
async fn error_completion_fails_the_batch() {
    let tmp = docs_dir(&["a.pdf"]);
    let backend = Arc::new(InMemoryBackend::new());
    backend.script_upload(UploadScript {
        progress: Vec::new(),
        completion: Some("ERROR: disk full".into()),
    });
    let mut engine = engine_with(&backend);

    engine.ingest_mut().add_paths(&[tmp.path()]);
    engine.upload().await.unwrap();
    assert_eq!(status_of(&engine, "a.pdf"), FileStatus::Failed);
    assert!(!engine.ingest().is_uploading());
}

#[tokio::test]
async fn empty_completion_means_already_uploaded() {
    let tmp = docs_dir(&["a.pdf"]);
    let backend = Arc::new(InMemoryBackend::new());
    backend.script_upload(UploadScript {
        progress: Vec::new(),
        completion: Some("[]".into()),
    });
    let mut engine = engine_with(&backend);

    engine.ingest_mut().add_paths(&[tmp.path()]);
    engine.upload().await.unwrap();
    assert_eq!(status_of(&engine, "a.pdf"), FileStatus::Uploaded);
}

#[tokio::test]
async fn cancel_keeps_only_uploaded_files() {
    let tmp = docs_dir(&["A.pdf", "B.pdf", "C.pdf"]);
    let backend =
        Arc::new(InMemoryBackend::new().with_files(vec![tmp.path().join("A.pdf")]));
    backend.script_upload(UploadScript {
        progress: Vec::new(),
        completion: None,
    });
    let mut engine = engine_with(&backend);

    engine.refresh().await.unwrap();
    assert_eq!(status_of(&engine, "A.pdf"), FileStatus::Uploaded);

    let admitted = engine
        .ingest_mut()
        .add_paths(&[tmp.path().join("B.pdf"), tmp.path().join("C.pdf")]);
    assert_eq!(admitted.len(), 2);
    engine.ingest_mut().start_upload().await.unwrap();
    assert!(engine.ingest().is_uploading());

    assert_eq!(engine.ingest_mut().cancel().await.unwrap(), 2);
    assert!(backend.calls().contains(&"stop_upload"));
    assert!(!engine.ingest().is_uploading());
    let names: Vec<&str> = engine
        .ingest()
        .catalog()
        .files()
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, vec!["A.pdf"]);
}

#[tokio::test]
async fn file_removal_waits_for_confirmation() {
    let listed = vec![PathBuf::from("/kb/a.pdf"), PathBuf::from("/kb/b.pdf")];
    let backend = Arc::new(InMemoryBackend::new().with_files(listed));
    let mut engine = engine_with(&backend);
    engine.refresh().await.unwrap();

    let err = engine.ingest_mut().remove_selected().await.unwrap_err();
    assert!(matches!(err, EngineError::NothingSelected));

    let a = engine.ingest().catalog().files()[0].id;
    engine.ingest_mut().select(&[a]);

    backend.refuse("remove_files");
    let err = engine.ingest_mut().remove_selected().await.unwrap_err();
    assert!(matches!(err, EngineError::Rejected { op: "remove_files" }));
    assert_eq!(status_of(&engine, "a.pdf"), FileStatus::Uploaded);

    backend.fail_next("remove_files");
    let err = engine.ingest_mut().remove_selected().await.unwrap_err();
    assert!(matches!(err, EngineError::Transport { .. }));
    assert_eq!(status_of(&engine, "a.pdf"), FileStatus::Uploaded);

    backend.accept("remove_files");
    assert_eq!(engine.ingest_mut().remove_selected().await.unwrap(), 1);
    assert_eq!(backend.last_removed(), vec![PathBuf::from("/kb/a.pdf")]);
    let names: Vec<&str> = engine
        .ingest()
        .catalog()
        .files()
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, vec!["b.pdf"]);
}

// ─── Feedback ───────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_attaches_feedback_from_listed_documents() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("feedback_docs");
    fs::create_dir_all(&docs).unwrap();
    let feedback = docs.join("feedback_1.txt");
    fs::write(
        &feedback,
        "Summarize this Here is the summary\nPositive feedback: great",
    )
    .unwrap();
    let unrelated = tmp.path().join("notes.txt");
    fs::write(&unrelated, "Summarize this Here is the summary\nPositive").unwrap();

    let history = vec![session_with(
        0,
        "Summary",
        &[
            (Sender::User, "Summarize this"),
            (Sender::Assistant, "Here is the summary"),
        ],
    )];
    let backend = Arc::new(
        InMemoryBackend::new()
            .with_history(history)
            .with_files(vec![feedback.clone(), unrelated]),
    );
    let mut engine = engine_with(&backend);

    let summary = engine.refresh().await.unwrap();
    assert!(summary.history_reloaded);
    assert_eq!(summary.feedback_documents, 1);
    assert_eq!(summary.attached.len(), 1);
    assert_eq!(summary.attached[0].message_index, 1);

    let record = engine.chat().sessions().get(0).unwrap().messages[1]
        .feedback
        .clone()
        .unwrap();
    assert_eq!(record.kind, FeedbackKind::Positive);
    assert_eq!(record.text, "Positive feedback: great");
    assert_eq!(record.rag_file.name, "feedback_1.txt");
    assert_eq!(record.rag_file.path, docs.display().to_string());
    assert!(record.added);

    assert_eq!(engine.ingest().catalog().files().len(), 2);
}
