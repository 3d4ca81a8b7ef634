//! Immutable session policy derived from config at startup.

use std::time::Duration;

use crate::config::Config;
use crate::events::EventKind;

/// Timeout and wear parameters for the idle/timeout supervisor.
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    pub fish_timeout: Duration,
    /// Enforced offline time after an idle request.
    pub idle_threshold: Duration,
    pub wear_increment_on_timeout: f64,
    pub wear_decrement_on_catch: f64,
    /// Wear at or above this on a timeout ends the process. Infinite when wear is disabled.
    pub wear_ceiling: f64,
}

/// Chat-driven idle request settings.
#[derive(Debug, Clone)]
pub struct IdleTrigger {
    pub phrase: String,
    pub announcement: String,
}

/// Everything a [`Session`](super::Session) needs besides the transport.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub timeout: TimeoutPolicy,
    /// Sound id of the primary-success event for the configured version.
    pub primary_event_id: i32,
    pub greet_message: Option<String>,
    pub idle: Option<IdleTrigger>,
    pub print_catches: bool,
    pub login_timeout: Duration,
}

impl SessionPolicy {
    pub fn from_config(config: &Config, primary_event_id: i32) -> Self {
        let wear = &config.wear;
        let timeout = TimeoutPolicy {
            fish_timeout: Duration::from_secs_f64(config.options.fish_timeout_secs),
            idle_threshold: Duration::from_secs_f64(config.idle.offline_secs.max(0.0)),
            wear_increment_on_timeout: if wear.enabled { wear.increment_on_timeout } else { 0.0 },
            wear_decrement_on_catch: if wear.enabled { wear.decrement_on_catch } else { 0.0 },
            wear_ceiling: if wear.enabled { wear.ceiling } else { f64::INFINITY },
        };

        let greet = config.options.greet_message.trim();
        Self {
            timeout,
            primary_event_id,
            greet_message: (!greet.is_empty()).then(|| config.options.greet_message.clone()),
            idle: config.idle.enabled.then(|| IdleTrigger {
                phrase: config.idle.trigger_phrase.clone(),
                announcement: config.idle.announcement.clone(),
            }),
            print_catches: config.options.print_catches,
            login_timeout: Duration::from_secs(config.options.login_timeout_secs),
        }
    }

    /// Event kinds the session listens to. Chat only matters for idle requests.
    pub fn subscriptions(&self) -> Vec<EventKind> {
        let mut kinds = vec![
            EventKind::JoinGame,
            EventKind::SoundEffect,
            EventKind::Disconnect,
        ];
        if self.idle.is_some() {
            kinds.push(EventKind::ChatMessage);
        }
        kinds
    }
}
