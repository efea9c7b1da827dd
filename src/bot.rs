//! Admin bot: routes commands and button presses from the admin chat.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use lessonbell_core::error::Result;
use lessonbell_core::traits::Channel;
use lessonbell_core::types::{IncomingKind, IncomingMessage, OutgoingMessage};
use lessonbell_scheduler::{AckHandler, AckOutcome, AckRejection, LessonTracker, Messages, is_ack_data};
use rand::seq::SliceRandom;
use tracing::{debug, error, info, warn};

/// Commands understood by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TimerOn,
    TimerOff,
}

/// Parse `/timer`-style commands. A `@botname` suffix is ignored.
pub fn parse_command(text: &str) -> Option<Command> {
    let word = text.split_whitespace().next()?;
    let word = word.split('@').next()?.to_lowercase();
    match word.as_str() {
        "/timer" | "/notify" | "/t" | "/n" | "/timeron" => Some(Command::TimerOn),
        "/timeroff" | "/notifyoff" | "/toff" | "/noff" => Some(Command::TimerOff),
        _ => None,
    }
}

pub struct Bot {
    admin_chat_id: String,
    channel: Arc<dyn Channel>,
    tracker: LessonTracker,
    acks: AckHandler,
    messages: Messages,
}

impl Bot {
    pub fn new(
        admin_chat_id: i64,
        channel: Arc<dyn Channel>,
        tracker: LessonTracker,
        acks: AckHandler,
    ) -> Self {
        let messages = tracker.messages();
        Self {
            admin_chat_id: admin_chat_id.to_string(),
            channel,
            tracker,
            acks,
            messages,
        }
    }

    /// Handle updates until the stream ends.
    pub async fn run(&self, mut updates: impl Stream<Item = IncomingMessage> + Unpin) {
        info!("🤖 Bot listening for admin {}", self.admin_chat_id);
        while let Some(incoming) = updates.next().await {
            if let Err(e) = self.handle(incoming).await {
                error!("Failed to handle update: {e}");
            }
        }
    }

    /// Handle one update from the channel.
    pub async fn handle(&self, incoming: IncomingMessage) -> Result<()> {
        if incoming.thread_id != self.admin_chat_id {
            warn!(
                "🚫 Ignoring update from non-admin chat {} ({})",
                incoming.thread_id,
                incoming.sender_name.as_deref().unwrap_or("unknown")
            );
            return Ok(());
        }

        match &incoming.kind {
            IncomingKind::Text => match parse_command(&incoming.content) {
                Some(command) => self.handle_command(command).await,
                None => {
                    debug!("Ignoring text '{}'", incoming.content);
                    Ok(())
                }
            },
            IncomingKind::Callback {
                query_id,
                message_id,
            } => {
                if is_ack_data(&incoming.content) {
                    self.handle_ack(&incoming.content, query_id, *message_id)
                        .await
                } else {
                    debug!("Unknown callback data '{}'", incoming.content);
                    self.answer(query_id, None).await;
                    Ok(())
                }
            }
        }
    }

    async fn handle_command(&self, command: Command) -> Result<()> {
        let reply = match command {
            Command::TimerOn if !self.tracker.is_running() => {
                self.tracker.start().await;
                info!("⏰ Notifications enabled by admin");
                self.messages.timer_enabled().to_string()
            }
            Command::TimerOn => self.tracker.status(),
            Command::TimerOff => {
                if self.tracker.stop().await {
                    info!("⏹️ Notifications disabled by admin");
                    self.messages.timer_disabled().to_string()
                } else {
                    self.messages.timer_already_disabled().to_string()
                }
            }
        };
        self.reply(reply).await
    }

    async fn handle_ack(&self, data: &str, query_id: &str, message_id: Option<i64>) -> Result<()> {
        let outcome = match self.acks.handle(data).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Acknowledgment failed: {e}");
                self.answer(query_id, None).await;
                return self.reply(self.messages.something_wrong()).await;
            }
        };

        let popup = match outcome {
            AckOutcome::Confirmed(_) => pick(self.messages.praise()),
            AckOutcome::Denied => pick(self.messages.remarks()),
            AckOutcome::AlreadyRecorded(_) => self.messages.already_recorded(),
            AckOutcome::Rejected(AckRejection::UnknownLesson(_)) => self.messages.unknown_lesson(),
            AckOutcome::Rejected(AckRejection::InvalidToken(_)) => {
                self.answer(query_id, None).await;
                return self.reply(self.messages.something_wrong()).await;
            }
        };
        self.answer(query_id, Some(popup)).await;
        if let Some(message_id) = message_id
            && let Err(e) = self.channel.clear_buttons(&self.admin_chat_id, message_id).await
        {
            warn!("Could not clear buttons of message {message_id}: {e}");
        }
        Ok(())
    }

    async fn answer(&self, query_id: &str, text: Option<&str>) {
        if let Err(e) = self.channel.answer_callback(query_id, text).await {
            warn!("Could not answer callback {query_id}: {e}");
        }
    }

    async fn reply(&self, text: impl Into<String>) -> Result<()> {
        self.channel
            .send(OutgoingMessage::text(self.admin_chat_id.clone(), text))
            .await
    }
}

fn pick(options: &'static [&'static str]) -> &'static str {
    options
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use lessonbell_core::config::Locale;
    use lessonbell_core::traits::ScheduleStore;
    use lessonbell_core::types::{LessonId, Period, TimeTable};
    use lessonbell_scheduler::{AnchoredClock, TrackerSettings};
    use lessonbell_security::CorrelationSigner;
    use lessonbell_store::MemoryStore;
    use std::sync::Mutex;

    const ADMIN: i64 = 42;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<String>>,
        answers: Mutex<Vec<Option<String>>>,
        cleared: Mutex<Vec<i64>>,
    }

    impl RecordingChannel {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, message: OutgoingMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message.content);
            Ok(())
        }

        async fn answer_callback(&self, _query_id: &str, text: Option<&str>) -> Result<()> {
            self.answers.lock().unwrap().push(text.map(str::to_string));
            Ok(())
        }

        async fn clear_buttons(&self, _thread_id: &str, message_id: i64) -> Result<()> {
            self.cleared.lock().unwrap().push(message_id);
            Ok(())
        }
    }

    struct Fixture {
        bot: Bot,
        channel: Arc<RecordingChannel>,
        store: Arc<MemoryStore>,
        tracker: LessonTracker,
        signer: CorrelationSigner,
        math: LessonId,
    }

    fn fixture() -> Fixture {
        let day = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let store = Arc::new(MemoryStore::new());
        store.set_timetable(TimeTable::standard(day)).unwrap();
        let math = store
            .add_lesson(day, Period::new(1).unwrap(), "Math", None)
            .unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let signer = CorrelationSigner::new(b"bot-test").unwrap();
        let settings = TrackerSettings {
            locale: Locale::En,
            admin_thread: ADMIN.to_string(),
            ..TrackerSettings::default()
        };
        let tracker = LessonTracker::new(
            store.clone(),
            channel.clone(),
            signer.clone(),
            Arc::new(AnchoredClock::new(day.and_hms_opt(8, 25, 0).unwrap())),
            settings,
        );
        let bot = Bot::new(
            ADMIN,
            channel.clone(),
            tracker.clone(),
            AckHandler::new(store.clone(), signer.clone()),
        );
        Fixture {
            bot,
            channel,
            store,
            tracker,
            signer,
            math,
        }
    }

    fn text(chat: i64, content: &str) -> IncomingMessage {
        IncomingMessage {
            channel: "test".into(),
            thread_id: chat.to_string(),
            sender_id: chat.to_string(),
            sender_name: None,
            content: content.into(),
            kind: IncomingKind::Text,
            timestamp: chrono::Utc::now(),
        }
    }

    fn press(data: &str) -> IncomingMessage {
        IncomingMessage {
            kind: IncomingKind::Callback {
                query_id: "q".into(),
                message_id: Some(7),
            },
            ..text(ADMIN, data)
        }
    }

    #[test]
    fn test_parse_command_aliases() {
        for on in ["/timer", "/notify", "/t", "/n", "/timeron", "/TIMER", "/timer@lessonbell_bot"] {
            assert_eq!(parse_command(on), Some(Command::TimerOn), "{on}");
        }
        for off in ["/timeroff", "/notifyoff", "/toff", "/noff"] {
            assert_eq!(parse_command(off), Some(Command::TimerOff), "{off}");
        }
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command(""), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_admin_is_ignored() {
        let f = fixture();
        f.bot.handle(text(7, "/timer")).await.unwrap();
        assert!(!f.tracker.is_running());
        assert!(f.channel.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_on_status_and_off() {
        let f = fixture();
        f.bot.handle(text(ADMIN, "/timer")).await.unwrap();
        assert!(f.tracker.is_running());
        assert_eq!(f.channel.sent(), vec!["Lesson notifications are on."]);

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        f.bot.handle(text(ADMIN, "/t")).await.unwrap();
        assert!(f.channel.sent()[1].contains("until the 1st period (*Math*) starts"));

        f.bot.handle(text(ADMIN, "/timeroff")).await.unwrap();
        f.bot.handle(text(ADMIN, "/noff")).await.unwrap();
        assert!(!f.tracker.is_running());
        let sent = f.channel.sent();
        assert_eq!(sent[2], "Lesson notifications are off.");
        assert_eq!(sent[3], "Lesson notifications are already off.");
    }

    #[tokio::test]
    async fn test_confirm_press_marks_attended() {
        let f = fixture();
        f.bot.handle(press(&f.signer.sign(f.math))).await.unwrap();

        assert!(f.store.lesson_by_id(f.math).await.unwrap().unwrap().attended);
        let answers = f.channel.answers.lock().unwrap().clone();
        let praise = answers[0].as_deref().unwrap();
        assert!(f.bot.messages.praise().contains(&praise));
        assert_eq!(*f.channel.cleared.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_deny_press_changes_nothing() {
        let f = fixture();
        f.bot.handle(press("notvisited")).await.unwrap();

        assert!(!f.store.lesson_by_id(f.math).await.unwrap().unwrap().attended);
        let answers = f.channel.answers.lock().unwrap().clone();
        assert!(f.bot.messages.remarks().contains(&answers[0].as_deref().unwrap()));
        assert_eq!(f.channel.cleared.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_forged_press_reports_error() {
        let f = fixture();
        f.bot.handle(press("visit:1:00000000000000000000000000000000")).await.unwrap();

        assert!(!f.store.lesson_by_id(f.math).await.unwrap().unwrap().attended);
        assert_eq!(f.channel.sent(), vec!["Something went wrong."]);
        assert!(f.channel.cleared.lock().unwrap().is_empty());
    }
}
