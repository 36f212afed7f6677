use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub level: Level,
    pub message: String,
}

pub trait LogSink: Send + Sync {
    fn event(&self, event: LogEvent);

    fn info(&self, message: String) {
        self.event(LogEvent {
            level: Level::Info,
            message,
        });
    }

    fn warn(&self, message: String) {
        self.event(LogEvent {
            level: Level::Warn,
            message,
        });
    }

    fn error(&self, message: String) {
        self.event(LogEvent {
            level: Level::Error,
            message,
        });
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn event(&self, event: LogEvent) {
        match event.level {
            Level::Info => tracing::info!("{}", event.message),
            Level::Warn => tracing::warn!("{}", event.message),
            Level::Error => tracing::error!("{}", event.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, level: Level) -> usize {
        self.events()
            .iter()
            .filter(|event| event.level == level)
            .count()
    }

    pub fn failures(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| event.level >= Level::Warn)
            .count()
    }
}

impl LogSink for MemorySink {
    fn event(&self, event: LogEvent) {
        TracingSink.event(event.clone());
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_counts_by_level() {
        let sink = MemorySink::new();
        sink.info("indexing".to_string());
        sink.warn("cannot read a.msd".to_string());
        sink.error("no data".to_string());

        assert_eq!(sink.events().len(), 3);
        assert_eq!(sink.count(Level::Warn), 1);
        assert_eq!(sink.failures(), 2);
    }
}
