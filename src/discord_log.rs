//! Copies this crate's log events into a Discord channel.
//!
//! WARN and ERROR lines are posted as they happen. INFO lines are collected
//! and posted together on a timer or once enough have piled up. A batch that
//! exceeds the message limit is split across several posts rather than cut.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::all::{ChannelId, Http};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::bot::chunk::{send_chunked, Reply};

const FLUSH_EVERY: Duration = Duration::from_secs(5);
const BATCH_LINES: usize = 50;

struct LogLine {
    level: Level,
    text: String,
}

/// Posts into one channel through the REST API.
struct ChannelSink {
    http: Arc<Http>,
    channel: ChannelId,
}

#[async_trait]
impl Reply for ChannelSink {
    async fn send(&self, text: &str) -> Result<(), String> {
        self.channel
            .say(&self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// tracing layer feeding [`forward`] through an unbounded queue.
pub struct DiscordLogLayer {
    queue: mpsc::UnboundedSender<LogLine>,
}

impl DiscordLogLayer {
    /// Spawns the forwarding task, so this needs a running tokio runtime.
    pub fn new(http: Arc<Http>, channel: ChannelId) -> Self {
        let (queue, lines) = mpsc::unbounded_channel();
        tokio::spawn(forward(ChannelSink { http, channel }, lines));
        Self { queue }
    }
}

/// Drain `lines` into `sink` until every sender is gone.
async fn forward<R: Reply>(sink: R, mut lines: mpsc::UnboundedReceiver<LogLine>) {
    let mut pending: Vec<String> = Vec::new();
    let mut ticker = tokio::time::interval(FLUSH_EVERY);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick would otherwise fire at once
    ticker.reset();

    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = ticker.tick() => {
                flush(&sink, &mut pending).await;
                continue;
            }
        };
        let Some(line) = line else {
            flush(&sink, &mut pending).await;
            return;
        };

        if line.level <= Level::WARN {
            // Keep channel order matching event order
            flush(&sink, &mut pending).await;
            post(&sink, &format!("**{}** {}", line.level, line.text)).await;
        } else {
            pending.push(line.text);
            if pending.len() >= BATCH_LINES {
                flush(&sink, &mut pending).await;
            }
        }
    }
}

async fn flush<R: Reply>(sink: &R, pending: &mut Vec<String>) {
    if pending.is_empty() {
        return;
    }
    let text = pending.join("\n");
    pending.clear();
    post(sink, &text).await;
}

async fn post<R: Reply>(sink: &R, text: &str) {
    // Not routed through tracing: that would feed back into this layer
    if let Err(e) = send_chunked(sink, text).await {
        eprintln!("Discord log post failed: {e}");
    }
}

/// Renders the `message` field first, then any others as `key=value`.
#[derive(Default)]
struct LineBuilder {
    message: String,
    extra: String,
}

impl LineBuilder {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.extra.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.extra,
            (false, false) => format!("{} {}", self.message, self.extra),
        }
    }
}

impl Visit for LineBuilder {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.record_debug(field, &value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            if !self.extra.is_empty() {
                self.extra.push(' ');
            }
            let _ = write!(self.extra, "{}={value:?}", field.name());
        }
    }
}

impl<S: Subscriber> Layer<S> for DiscordLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        // serenity and reqwest log while we post, so only mirror our own events
        if *meta.level() > Level::INFO || !meta.target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }

        let mut builder = LineBuilder::default();
        event.record(&mut builder);
        let line = LogLine { level: *meta.level(), text: builder.finish() };

        if self.queue.send(line).is_err() {
            eprintln!("Discord log forwarder has stopped");
        }
    }
}
