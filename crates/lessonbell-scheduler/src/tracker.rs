//! Lesson tracker. Walks today's lessons and announces each lifecycle point.
//!
//! One run task per started tracker. The task owns the pending-ack slot; the
//! current lesson is published through a watch channel so status queries never
//! touch the task. `stop()` cancels the run token and joins the task, so at most
//! one loop is ever alive and nothing is sent after `stop()` returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use lessonbell_core::config::{LessonBellConfig, Locale};
use lessonbell_core::error::LessonBellError;
use lessonbell_core::traits::{Channel, ScheduleStore};
use lessonbell_core::types::{InlineButton, Lesson, OutgoingMessage};
use lessonbell_security::{CorrelationSigner, DENY_SENTINEL};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::lifecycle;
use crate::notify::{Messages, Notification, NotificationKind, NotifyHistory};

/// Tracker timing and addressing.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// Lead time of the first "starts in" alert.
    pub first_alert: Duration,
    /// Lead time of the second, emphasised alert.
    pub second_alert: Duration,
    /// Idle re-poll interval; also the longest single sleep of any wait.
    pub poll_interval: Duration,
    /// Upper bound for one channel send.
    pub send_timeout: Duration,
    pub locale: Locale,
    /// Thread (chat) notifications are sent to.
    pub admin_thread: String,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            first_alert: Duration::from_secs(600),
            second_alert: Duration::from_secs(120),
            poll_interval: Duration::from_secs(10),
            send_timeout: Duration::from_secs(10),
            locale: Locale::En,
            admin_thread: "admin".into(),
        }
    }
}

impl TrackerSettings {
    pub fn from_config(config: &LessonBellConfig) -> Self {
        Self {
            first_alert: Duration::from_secs(config.timer.first_alert_secs),
            second_alert: Duration::from_secs(config.timer.second_alert_secs),
            poll_interval: Duration::from_secs(config.timer.poll_interval_secs.max(1)),
            send_timeout: Duration::from_secs(config.timer.send_timeout_secs.max(1)),
            locale: config.locale,
            admin_thread: config.telegram.admin_chat_id.to_string(),
        }
    }
}

struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Shared {
    store: Arc<dyn ScheduleStore>,
    channel: Arc<dyn Channel>,
    signer: CorrelationSigner,
    clock: Arc<dyn Clock>,
    settings: TrackerSettings,
    messages: Messages,
    running: AtomicBool,
    current: watch::Sender<Option<Lesson>>,
    history: Mutex<NotifyHistory>,
    run: tokio::sync::Mutex<Option<RunHandle>>,
}

impl Shared {
    fn set_current(&self, lesson: Option<Lesson>) {
        self.current.send_replace(lesson);
    }

    fn history(&self) -> MutexGuard<'_, NotifyHistory> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to the lesson tracker. Clones share one tracker.
#[derive(Clone)]
pub struct LessonTracker {
    shared: Arc<Shared>,
}

impl LessonTracker {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        channel: Arc<dyn Channel>,
        signer: CorrelationSigner,
        clock: Arc<dyn Clock>,
        settings: TrackerSettings,
    ) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                store,
                channel,
                signer,
                clock,
                messages: Messages::new(settings.locale),
                settings,
                running: AtomicBool::new(false),
                current,
                history: Mutex::new(NotifyHistory::new()),
                run: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Start the tracking loop. Returns `false` if it was already running.
    pub async fn start(&self) -> bool {
        let mut slot = self.shared.run.lock().await;
        if self.shared.running.load(Ordering::SeqCst) {
            debug!("Lesson tracker already running");
            return false;
        }
        let cancel = CancellationToken::new();
        self.shared.running.store(true, Ordering::SeqCst);
        let run = Run {
            shared: Arc::clone(&self.shared),
            cancel: cancel.clone(),
            pending_ack: None,
        };
        let task = tokio::spawn(run.execute());
        *slot = Some(RunHandle { cancel, task });
        true
    }

    /// Stop the loop and wait for it to exit. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let mut slot = self.shared.run.lock().await;
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        if let Some(run) = slot.take() {
            run.cancel.cancel();
            if let Err(e) = run.task.await {
                error!("Lesson tracker task failed: {e}");
            }
        }
        self.shared.set_current(None);
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// The lesson being tracked right now, if any.
    pub fn current_lesson(&self) -> Option<Lesson> {
        self.shared.current.borrow().clone()
    }

    /// Watch current-lesson changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Lesson>> {
        self.shared.current.subscribe()
    }

    pub fn time_until_start(&self) -> Option<TimeDelta> {
        let now = self.shared.clock.now();
        self.current_lesson().map(|l| l.start - now)
    }

    pub fn time_until_end(&self) -> Option<TimeDelta> {
        let now = self.shared.clock.now();
        self.current_lesson().map(|l| l.end - now)
    }

    /// Status line about the current lesson.
    pub fn status(&self) -> String {
        let messages = &self.shared.messages;
        let Some(lesson) = self.current_lesson() else {
            return messages.no_lessons().to_string();
        };
        let now = self.shared.clock.now();
        if now < lesson.start {
            messages.until_start(&lesson, lesson.start - now)
        } else {
            messages.until_end(&lesson, lesson.end - now)
        }
    }

    /// Latest notifications, oldest first.
    pub fn history(&self) -> Vec<Notification> {
        self.shared.history().entries()
    }

    pub fn messages(&self) -> Messages {
        self.shared.messages
    }
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Elapsed,
    Stopped,
    /// The lesson was edited or removed while waiting.
    Vanished,
}

enum Cycle {
    Idle,
    Repoll,
}

/// State owned by one run of the loop.
struct Run {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    /// Lesson whose end was reached and whose ended notice is not sent yet.
    pending_ack: Option<Lesson>,
}

impl Run {
    async fn execute(mut self) {
        info!(
            "⏰ Lesson tracker started ({} store → {} channel)",
            self.shared.store.name(),
            self.shared.channel.name()
        );
        while !self.cancel.is_cancelled() {
            if let Cycle::Idle = self.cycle().await {
                let poll = self.shared.settings.poll_interval;
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(poll) => {}
                }
            }
        }
        self.pending_ack = None;
        self.shared.set_current(None);
        info!("⏹️ Lesson tracker stopped");
    }

    fn now(&self) -> NaiveDateTime {
        self.shared.clock.now()
    }

    async fn cycle(&mut self) -> Cycle {
        let now = self.now();
        let lessons = match self.shared.store.lessons_for_date(now.date()).await {
            Ok(lessons) => lessons,
            Err(e) => {
                warn!("⚠️ {}", LessonBellError::ScheduleUnavailable(e.to_string()));
                return Cycle::Idle;
            }
        };
        let queue = lifecycle::upcoming(lessons, now);
        if !queue.is_empty() {
            debug!("📚 {} upcoming lesson(s) on {}", queue.len(), now.date());
        }

        for lesson in queue {
            self.flush_completed().await;
            if self.cancel.is_cancelled() {
                return Cycle::Idle;
            }
            self.shared.set_current(Some(lesson.clone()));
            match self.track(&lesson).await {
                Wait::Elapsed => {
                    if self.still_scheduled(&lesson).await {
                        self.pending_ack = Some(lesson);
                    }
                }
                Wait::Stopped => return Cycle::Idle,
                Wait::Vanished => {
                    info!(
                        "🔄 Lesson #{} '{}' changed or was removed, re-reading schedule",
                        lesson.id, lesson.name
                    );
                    self.shared.set_current(None);
                    return Cycle::Repoll;
                }
            }
        }

        self.flush_completed().await;
        self.shared.set_current(None);
        Cycle::Idle
    }

    /// Announce one lesson from its first alert until its end.
    async fn track(&self, lesson: &Lesson) -> Wait {
        if !self.still_scheduled(lesson).await {
            return Wait::Vanished;
        }
        let settings = &self.shared.settings;
        let first = before(lesson.start, settings.first_alert);
        let second = before(lesson.start, settings.second_alert);
        debug!(
            "Tracking lesson #{} '{}' ({} - {})",
            lesson.id,
            lesson.name,
            lesson.start.time(),
            lesson.end.time()
        );

        for (at, kind) in [
            (first, NotificationKind::FirstAlert),
            (second, NotificationKind::SecondAlert),
        ] {
            if at > self.now() {
                match self.wait_until(at, lesson).await {
                    Wait::Elapsed => self.announce(kind, lesson).await,
                    other => return other,
                }
            }
        }

        if lesson.start > self.now() {
            match self.wait_until(lesson.start, lesson).await {
                Wait::Elapsed => {}
                other => return other,
            }
        }
        if lesson.end > self.now() {
            self.announce(NotificationKind::Started, lesson).await;
            return self.wait_until(lesson.end, lesson).await;
        }
        Wait::Elapsed
    }

    /// Sleep until `target` in ticks of at most the poll interval, checking the
    /// stop signal and re-validating the lesson between ticks.
    async fn wait_until(&self, target: NaiveDateTime, lesson: &Lesson) -> Wait {
        let poll = self.shared.settings.poll_interval;
        loop {
            let Ok(remaining) = (target - self.now()).to_std() else {
                return Wait::Elapsed;
            };
            if remaining.is_zero() {
                return Wait::Elapsed;
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Wait::Stopped,
                _ = tokio::time::sleep(remaining.min(poll)) => {}
            }
            if !self.still_scheduled(lesson).await {
                return Wait::Vanished;
            }
        }
    }

    async fn still_scheduled(&self, lesson: &Lesson) -> bool {
        match self.shared.store.lessons_for_date(lesson.date).await {
            Ok(day) => lifecycle::still_scheduled(lesson, &day),
            Err(e) => {
                warn!(
                    "⚠️ {}; keeping lesson #{}",
                    LessonBellError::ScheduleUnavailable(e.to_string()),
                    lesson.id
                );
                true
            }
        }
    }

    async fn announce(&self, kind: NotificationKind, lesson: &Lesson) {
        let now = self.now();
        let messages = &self.shared.messages;
        let text = match kind {
            NotificationKind::FirstAlert => messages.starts_in(lesson, lesson.start - now, false),
            NotificationKind::SecondAlert => messages.starts_in(lesson, lesson.start - now, true),
            NotificationKind::Started => messages.started(lesson, lesson.end - now),
            NotificationKind::Ended => messages.ended(lesson),
        };
        let message = OutgoingMessage::text(self.shared.settings.admin_thread.clone(), text);
        self.emit(kind, lesson, message).await;
    }

    /// Send the ended notice of the last completed lesson with its
    /// confirm/deny prompt, then clear the slot.
    async fn flush_completed(&mut self) {
        let Some(lesson) = self.pending_ack.take() else {
            return;
        };
        match self.shared.store.lesson_id(lesson.date, &lesson.name).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!("Lesson #{} is gone, skipping its ended notice", lesson.id);
                return;
            }
            Err(e) => warn!("⚠️ Lesson lookup failed before ended notice: {e}"),
        }

        let messages = &self.shared.messages;
        let (confirm, deny) = messages.ack_labels();
        let message = OutgoingMessage::text(
            self.shared.settings.admin_thread.clone(),
            messages.ended(&lesson),
        )
        .with_buttons(vec![
            InlineButton {
                label: confirm.into(),
                data: self.shared.signer.sign(lesson.id),
            },
            InlineButton {
                label: deny.into(),
                data: DENY_SENTINEL.into(),
            },
        ]);
        self.emit(NotificationKind::Ended, &lesson, message).await;
    }

    /// Deliver one message, bounded by the send timeout. Failures are logged
    /// and recorded; the loop carries on either way.
    async fn emit(&self, kind: NotificationKind, lesson: &Lesson, message: OutgoingMessage) {
        if self.cancel.is_cancelled() {
            return;
        }
        let text = message.content.clone();
        let timeout = self.shared.settings.send_timeout;
        let send = tokio::time::timeout(timeout, self.shared.channel.send(message));
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("Tracker stopped while sending {kind:?} for lesson #{}", lesson.id);
                return;
            }
            result = send => result,
        };

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timed out after {timeout:?}")),
        };
        match &failure {
            None => info!("📣 {kind:?} sent for lesson #{} '{}'", lesson.id, lesson.name),
            Some(reason) => warn!(
                "⚠️ {} ({kind:?}, lesson #{})",
                LessonBellError::NotificationDeliveryFailed(reason.clone()),
                lesson.id
            ),
        }

        self.shared.history().record(Notification {
            kind,
            lesson_id: lesson.id,
            lesson_name: lesson.name.clone(),
            text,
            delivered: failure.is_none(),
            timestamp: self.now(),
        });
    }
}

/// `at - lead`; an out-of-range lead lands at the earliest representable time.
fn before(at: NaiveDateTime, lead: Duration) -> NaiveDateTime {
    TimeDelta::from_std(lead)
        .ok()
        .and_then(|lead| at.checked_sub_signed(lead))
        .unwrap_or(NaiveDateTime::MIN)
}
