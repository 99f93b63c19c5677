use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use jules_observability::{new_request_id, request_span};
use jules_session::{
    ChatSession, Message, Rejection, SessionEvent, StatusBanner, SubmitOutcome, UploadFile,
    UploadOutcome,
};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, warn, Instrument};

/// What the main loop should do after a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    Quit,
}

pub struct App {
    pub session: ChatSession,
    pub origin: String,
    pub input: String,
    /// Highlighted transcript row; `None` follows the tail
    pub selected: Option<usize>,
    /// Local one-line feedback shown in the status bar
    pub notice: Option<String>,
    notice_tx: mpsc::UnboundedSender<String>,
    notice_rx: mpsc::UnboundedReceiver<String>,
}

impl App {
    pub fn new(session: ChatSession, origin: impl Into<String>) -> Self {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        Self {
            session,
            origin: origin.into(),
            input: String::new(),
            selected: None,
            notice: None,
            notice_tx,
            notice_rx,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => return KeyAction::Quit,
            KeyCode::Char('b') if ctrl => self.branch_from_selection(),
            KeyCode::Char('u') if ctrl => self.upload_input(),
            KeyCode::Enter => self.submit_input(),
            KeyCode::Esc => self.cancel_branch(),
            KeyCode::Up => self.select_previous(),
            KeyCode::Down => self.select_next(),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) if !ctrl => self.input.push(c),
            _ => {}
        }
        KeyAction::Continue
    }

    /// Apply a session event to local view state
    pub fn on_session_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Truncated { len } => {
                if self.selected.is_some_and(|i| i >= *len) {
                    self.selected = None;
                }
            }
            SessionEvent::RequestStarted => self.notice = None,
            _ => {}
        }
    }

    /// Pick up feedback from spawned tasks
    pub fn drain_notices(&mut self) -> bool {
        let mut changed = false;
        while let Ok(notice) = self.notice_rx.try_recv() {
            self.notice = Some(notice);
            changed = true;
        }
        changed
    }

    pub fn messages(&self) -> Vec<Message> {
        self.session.messages()
    }

    pub fn banner(&self) -> Option<StatusBanner> {
        self.session.upload_status()
    }

    fn submit_input(&mut self) {
        if self.input.trim().is_empty() {
            return;
        }
        if let Some(rejection) = self.busy() {
            self.notice = Some(describe_rejection(rejection).to_string());
            return;
        }

        self.session.set_draft(std::mem::take(&mut self.input));
        self.selected = None;

        let session = self.session.clone();
        let notices = self.notice_tx.clone();
        let span = request_span(&new_request_id());
        let submit = async move {
            match session.submit_draft().await {
                SubmitOutcome::Completed { model, .. } => debug!(%model, "Reply complete"),
                SubmitOutcome::Failed(e) => {
                    let _ = notices.send(format!("Request failed: {}", e));
                }
                SubmitOutcome::Rejected(rejection) => {
                    let _ = notices.send(describe_rejection(rejection).to_string());
                }
            }
        };
        tokio::spawn(submit.instrument(span));
    }

    fn branch_from_selection(&mut self) {
        let Some(index) = self.selected else {
            self.notice = Some("Select a message first".to_string());
            return;
        };

        match self.session.begin_branch_at(index) {
            Ok(id) => {
                self.input = self.session.draft();
                self.notice = Some(format!("Branching from {}", id));
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    fn cancel_branch(&mut self) {
        if self.session.is_branching() {
            self.session.cancel_branch();
            self.input.clear();
            self.notice = None;
        }
    }

    fn upload_input(&mut self) {
        let path = self.input.trim();
        if path.is_empty() {
            self.notice = Some("Type a file path, then Ctrl-U".to_string());
            return;
        }
        if let Some(rejection) = self.busy() {
            self.notice = Some(describe_rejection(rejection).to_string());
            return;
        }

        let path = PathBuf::from(path);
        self.input.clear();

        let session = self.session.clone();
        let notices = self.notice_tx.clone();
        tokio::spawn(async move {
            let file = match UploadFile::from_path(&path).await {
                Ok(file) => file,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot read upload");
                    let _ = notices.send(format!("Cannot read {}: {}", path.display(), e));
                    return;
                }
            };
            if let UploadOutcome::Rejected(rejection) = session.upload(file).await {
                let _ = notices.send(describe_rejection(rejection).to_string());
            }
        });
    }

    fn busy(&self) -> Option<Rejection> {
        if self.session.is_request_in_flight() {
            Some(Rejection::RequestInFlight)
        } else if self.session.is_upload_in_flight() {
            Some(Rejection::UploadInFlight)
        } else {
            None
        }
    }

    fn select_previous(&mut self) {
        let len = self.session.message_count();
        if len == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) => i.saturating_sub(1).min(len - 1),
            None => len - 1,
        });
    }

    fn select_next(&mut self) {
        let len = self.session.message_count();
        self.selected = match self.selected {
            Some(i) if i + 1 < len => Some(i + 1),
            _ => None,
        };
    }
}

fn describe_rejection(rejection: Rejection) -> &'static str {
    match rejection {
        Rejection::EmptyPrompt => "Nothing to send",
        Rejection::RequestInFlight => "Wait for the current reply",
        Rejection::UploadInFlight => "Wait for the upload to finish",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jules_session::{
        BackendError, ChatBackend, ChatReply, ChatRequest, ReplyFrame, SessionOptions,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Streams back `__IDS__` frames numbered per exchange, then the prompt
    struct NumberedBackend {
        exchanges: AtomicUsize,
    }

    #[async_trait]
    impl ChatBackend for NumberedBackend {
        async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
            let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
            let frames = vec![
                Ok(ReplyFrame::identity(format!("u{}", n), format!("m{}", n))),
                Ok(ReplyFrame::text(format!("re: {}", request.prompt))),
            ];
            Ok(ChatReply::Streamed(Box::pin(futures::stream::iter(frames))))
        }

        async fn upload(&self, _file: &UploadFile) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn app() -> App {
        let backend = Arc::new(NumberedBackend {
            exchanges: AtomicUsize::new(0),
        });
        App::new(
            ChatSession::new(backend, SessionOptions::default()),
            "http://127.0.0.1:8000",
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    /// Wait for the spawned submit to land `len` messages and finish
    async fn settle(app: &App, len: usize) {
        for _ in 0..200 {
            if app.session.message_count() == len && !app.session.is_busy() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session did not settle at {} messages", len);
    }

    #[tokio::test]
    async fn test_ctrl_c_quits() {
        let mut app = app();
        assert_eq!(app.handle_key(ctrl('c')), KeyAction::Quit);
        assert_eq!(app.handle_key(key(KeyCode::Char('c'))), KeyAction::Continue);
        assert_eq!(app.input, "c");
    }

    #[tokio::test]
    async fn test_enter_submits_input() {
        let mut app = app();
        type_text(&mut app, "Bonjour");
        app.handle_key(key(KeyCode::Enter));
        assert!(app.input.is_empty());

        settle(&app, 2).await;
        let messages = app.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].parts, "Bonjour");
        assert_eq!(messages[1].parts, "re: Bonjour");
        assert_eq!(messages[1].id.as_str(), "m1");
    }

    #[tokio::test]
    async fn test_blank_input_is_not_submitted() {
        let mut app = app();
        type_text(&mut app, "   ");
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.input, "   ");
        assert!(!app.session.is_busy());
        assert_eq!(app.session.message_count(), 0);
    }

    #[tokio::test]
    async fn test_selection_moves_and_releases() {
        let mut app = app();
        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.selected, None);

        type_text(&mut app, "un");
        app.handle_key(key(KeyCode::Enter));
        settle(&app, 2).await;

        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.selected, Some(1));
        app.handle_key(key(KeyCode::Up));
        app.handle_key(key(KeyCode::Up));
        assert_eq!(app.selected, Some(0));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected, Some(1));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected, None);
    }

    #[tokio::test]
    async fn test_branch_prefills_input_and_truncates_on_submit() {
        let mut app = app();
        type_text(&mut app, "un");
        app.handle_key(key(KeyCode::Enter));
        settle(&app, 2).await;
        type_text(&mut app, "deux");
        app.handle_key(key(KeyCode::Enter));
        settle(&app, 4).await;
        assert_eq!(app.session.message_count(), 4);

        app.selected = Some(0);
        app.handle_key(ctrl('b'));
        assert_eq!(app.input, "un");
        assert!(app.session.is_branching());

        type_text(&mut app, " bis");
        app.handle_key(key(KeyCode::Enter));
        settle(&app, 3).await;

        let messages = app.messages();
        let parts: Vec<&str> = messages.iter().map(|m| m.parts.as_str()).collect();
        assert_eq!(parts, vec!["un", "un bis", "re: un bis"]);
        assert_eq!(messages[2].id.as_str(), "m3");
        assert!(!app.session.is_branching());
    }

    #[tokio::test]
    async fn test_branch_without_selection_is_refused() {
        let mut app = app();
        app.handle_key(ctrl('b'));
        assert!(app.notice.is_some());
        assert!(!app.session.is_branching());
    }

    #[tokio::test]
    async fn test_esc_cancels_branch() {
        let mut app = app();
        type_text(&mut app, "un");
        app.handle_key(key(KeyCode::Enter));
        settle(&app, 2).await;

        app.selected = Some(0);
        app.handle_key(ctrl('b'));
        app.handle_key(key(KeyCode::Esc));
        assert!(!app.session.is_branching());
        assert!(app.input.is_empty());
        assert!(app.session.draft().is_empty());
    }

    #[tokio::test]
    async fn test_upload_missing_file_reports_notice() {
        let mut app = app();
        type_text(&mut app, "/nonexistent/notes.txt");
        app.handle_key(ctrl('u'));
        assert!(app.input.is_empty());

        for _ in 0..200 {
            if app.drain_notices() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let notice = app.notice.clone().unwrap_or_default();
        assert!(notice.starts_with("Cannot read"), "{}", notice);
    }

    #[tokio::test]
    async fn test_truncation_releases_stale_selection() {
        let mut app = app();
        app.selected = Some(3);
        app.on_session_event(&SessionEvent::Truncated { len: 2 });
        assert_eq!(app.selected, None);
    }
}
