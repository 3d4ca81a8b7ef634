//! Outer control loop: resolve, run one session, repeat.
//!
//! The loop reconnects indefinitely after disconnect notices and link faults,
//! waiting the retry delay before each new attempt. It ends on a stop request
//! or the wear ceiling (`Ok`), or on a fatal condition (`Err`): the host
//! definitively not found, or a connection refused outright. Transient lookup
//! failures and other connect failures wait the same delay and try again.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::auth::Credentials;
use crate::control::Control;
use crate::error::{ConnectError, FatalError, ResolveError};
use crate::offline::OfflineWindow;
use crate::report::SessionReport;
use crate::resolve::{HostTarget, Resolve};
use crate::session::policy::SessionPolicy;
use crate::session::{Session, SessionEnd, StopCause};
use crate::transport::Transport;

pub struct Reconnector<R, T> {
    resolver: R,
    transport: T,
    policy: SessionPolicy,
    credentials: Credentials,
    retry_delay: Duration,
    /// Carried from one attempt to the next.
    wear_score: f64,
}

impl<R: Resolve, T: Transport> Reconnector<R, T> {
    pub fn new(
        resolver: R,
        transport: T,
        policy: SessionPolicy,
        credentials: Credentials,
        retry_delay: Duration,
    ) -> Self {
        Self {
            resolver,
            transport,
            policy,
            credentials,
            retry_delay,
            wear_score: 0.0,
        }
    }

    pub fn wear_score(&self) -> f64 {
        self.wear_score
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run sessions until stopped. Returns why the process is stopping.
    pub async fn run(
        &mut self,
        report: &mut SessionReport,
        control: &mut Control,
    ) -> Result<StopCause, FatalError> {
        let mut resumed_at: Option<Instant> = None;
        let mut attempt: u64 = 0;

        loop {
            if control.is_stopped() {
                return Ok(StopCause::Interrupted);
            }
            let Some(target) = self.resolve(control).await? else {
                return Ok(StopCause::Interrupted);
            };

            attempt += 1;
            info!("Reconnect: attempt {attempt}");
            let mut session = match resumed_at.take() {
                Some(at) => Session::resumed(&self.policy, self.wear_score, at),
                None => Session::new(&self.policy, self.wear_score),
            };
            let end = session
                .run(
                    &mut self.transport,
                    &target,
                    &self.credentials,
                    report,
                    control,
                )
                .await;
            self.wear_score = session.state().wear_score;

            match end {
                SessionEnd::Stopped(cause) => return Ok(cause),
                SessionEnd::IdleRequested { by } => {
                    info!("Reconnect: going offline at the request of {by}");
                    let mut window =
                        OfflineWindow::start(self.policy.timeout.idle_threshold, Instant::now());
                    match window.wait(control).await {
                        Some(at) => resumed_at = Some(at),
                        None => return Ok(StopCause::Interrupted),
                    }
                }
                SessionEnd::Disconnected { reason } => {
                    info!(
                        "Reconnect: disconnected ({reason}), reconnecting in {}s",
                        self.retry_delay.as_secs_f64()
                    );
                    if !self.pause(control).await {
                        return Ok(StopCause::Interrupted);
                    }
                }
                SessionEnd::Faulted(e) => {
                    warn!(
                        "Reconnect: link lost ({e}), reconnecting in {}s",
                        self.retry_delay.as_secs_f64()
                    );
                    if !self.pause(control).await {
                        return Ok(StopCause::Interrupted);
                    }
                }
                SessionEnd::ConnectFailed(ConnectError::Refused(target)) => {
                    error!("Reconnect: connection refused by {target}, giving up");
                    return Err(FatalError::Connect(ConnectError::Refused(target)));
                }
                SessionEnd::ConnectFailed(e) => {
                    warn!(
                        "Reconnect: {e}; retrying in {}s",
                        self.retry_delay.as_secs_f64()
                    );
                    if !self.pause(control).await {
                        return Ok(StopCause::Interrupted);
                    }
                }
            }
        }
    }

    /// Resolve the host, retrying transient failures. `Ok(None)` means stopped.
    async fn resolve(&self, control: &Control) -> Result<Option<HostTarget>, FatalError> {
        loop {
            let res = tokio::select! {
                biased;
                () = control.shutdown.cancelled() => return Ok(None),
                res = self.resolver.resolve() => res,
            };
            match res {
                Ok(target) => return Ok(Some(target)),
                Err(ResolveError::NotFound(msg)) => {
                    error!("Resolve: {msg}");
                    return Err(FatalError::Resolve(ResolveError::NotFound(msg)));
                }
                Err(ResolveError::Transient(msg)) => {
                    warn!(
                        "Resolve: {msg}; retrying in {}s",
                        self.retry_delay.as_secs_f64()
                    );
                    if !self.pause(control).await {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Fixed delay before a retry or reconnect. `false` if a stop arrived first.
    async fn pause(&self, control: &Control) -> bool {
        tokio::select! {
            biased;
            () = control.shutdown.cancelled() => false,
            () = tokio::time::sleep(self.retry_delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use super::*;
    use crate::config::Config;
    use crate::control::{self, ControlHandle};
    use crate::error::TransportError;
    use crate::events::{ChatPosition, Inbound, Phase};
    use crate::transport::scripted::{Script, ScriptedTransport};

    /// Replays queued results, then resolves to localhost forever.
    struct ScriptedResolver {
        results: RefCell<VecDeque<Result<HostTarget, ResolveError>>>,
        calls: Cell<usize>,
    }

    impl ScriptedResolver {
        fn new(results: Vec<Result<HostTarget, ResolveError>>) -> Self {
            Self {
                results: RefCell::new(results.into()),
                calls: Cell::new(0),
            }
        }
    }

    impl Resolve for ScriptedResolver {
        async fn resolve(&self) -> Result<HostTarget, ResolveError> {
            self.calls.set(self.calls.get() + 1);
            self.results
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(target()))
        }
    }

    fn target() -> HostTarget {
        HostTarget {
            address: "localhost".to_string(),
            port: 25565,
        }
    }

    fn policy(fish_timeout_secs: f64) -> SessionPolicy {
        let mut config = Config::default();
        config.options.fish_timeout_secs = fish_timeout_secs;
        config.options.greet_message = String::new();
        config.idle.announcement = String::new();
        config.idle.offline_secs = 10.0;
        config.wear.ceiling = 100.0;
        SessionPolicy::from_config(&config, 184)
    }

    fn reconnector(
        resolver: ScriptedResolver,
        scripts: Vec<Script>,
        fish_timeout_secs: f64,
    ) -> Reconnector<ScriptedResolver, ScriptedTransport> {
        Reconnector::new(
            resolver,
            ScriptedTransport::new(scripts),
            policy(fish_timeout_secs),
            Credentials::offline("tester"),
            Duration::from_secs(5),
        )
    }

    fn stop_after(handle: ControlHandle, secs: f64) {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
            handle.stop();
        });
    }

    fn sleep_chat() -> Inbound {
        Inbound::ChatMessage {
            position: ChatPosition::Chat,
            json_data: r#"{"with":[{"insertion":"Alex"},"sleep"]}"#.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_request_waits_before_reconnecting() {
        let mut r = reconnector(
            ScriptedResolver::new(vec![]),
            vec![
                Script::connected()
                    .event(0.0, Inbound::JoinGame)
                    .event(0.5, sleep_chat()),
                Script::connected().event(0.0, Inbound::JoinGame),
            ],
            1.0,
        );
        let (handle, mut control) = control::channel();
        stop_after(handle, 10.2);
        let mut report = SessionReport::start();

        let cause = r.run(&mut report, &mut control).await;

        assert!(matches!(cause, Ok(StopCause::Interrupted)));
        // Still inside the 10s offline window.
        assert_eq!(r.transport().connect_count(), 1);
        assert!(report.timeouts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_timeout_right_after_idle_pause() {
        let mut r = reconnector(
            ScriptedResolver::new(vec![]),
            vec![
                Script::connected()
                    .event(0.0, Inbound::JoinGame)
                    .event(0.5, sleep_chat()),
                Script::connected().event(0.0, Inbound::JoinGame),
            ],
            1.0,
        );
        let (handle, mut control) = control::channel();
        stop_after(handle, 11.3);
        let mut report = SessionReport::start();

        r.run(&mut report, &mut control).await.unwrap();

        assert_eq!(r.transport().connect_count(), 2);
        assert!(report.timeouts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_fatal_without_retry() {
        let resolver =
            ScriptedResolver::new(vec![Err(ResolveError::NotFound("no realm 'x'".to_string()))]);
        let mut r = reconnector(resolver, vec![Script::connected()], 1.0);
        let (_handle, mut control) = control::channel();
        let mut report = SessionReport::start();

        let res = r.run(&mut report, &mut control).await;

        assert!(matches!(
            res,
            Err(FatalError::Resolve(ResolveError::NotFound(_)))
        ));
        assert_eq!(r.resolver.calls.get(), 1);
        assert_eq!(r.transport().connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_resolution_is_retried() {
        let resolver = ScriptedResolver::new(vec![
            Err(ResolveError::Transient("503".to_string())),
            Err(ResolveError::Transient("503".to_string())),
        ]);
        let mut r = reconnector(
            resolver,
            vec![Script::connected().event(0.0, Inbound::JoinGame)],
            60.0,
        );
        let (handle, mut control) = control::channel();
        stop_after(handle, 10.5);
        let mut report = SessionReport::start();

        let res = r.run(&mut report, &mut control).await;

        assert!(matches!(res, Ok(StopCause::Interrupted)));
        assert_eq!(r.resolver.calls.get(), 3);
        assert_eq!(r.transport().connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_resolve_retry() {
        let resolver = ScriptedResolver::new(vec![Err(ResolveError::Transient(
            "timeout".to_string(),
        ))]);
        let mut r = reconnector(resolver, vec![Script::connected()], 1.0);
        let (handle, mut control) = control::channel();
        stop_after(handle, 2.0);
        let mut report = SessionReport::start();
        let start = Instant::now();

        let res = r.run(&mut report, &mut control).await;

        assert!(matches!(res, Ok(StopCause::Interrupted)));
        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(r.transport().connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connection_is_fatal() {
        let mut r = reconnector(
            ScriptedResolver::new(vec![]),
            vec![
                Script::failing(ConnectError::Refused("localhost:25565".to_string())),
                Script::connected(),
            ],
            1.0,
        );
        let (_handle, mut control) = control::channel();
        let mut report = SessionReport::start();

        let res = r.run(&mut report, &mut control).await;

        assert!(matches!(
            res,
            Err(FatalError::Connect(ConnectError::Refused(_)))
        ));
        assert_eq!(r.transport().connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_connect_failure_is_retried() {
        let mut r = reconnector(
            ScriptedResolver::new(vec![]),
            vec![
                Script::failing(ConnectError::Failed("handshake".to_string())),
                Script::connected().event(0.0, Inbound::JoinGame),
            ],
            60.0,
        );
        let (handle, mut control) = control::channel();
        stop_after(handle, 6.0);
        let mut report = SessionReport::start();

        r.run(&mut report, &mut control).await.unwrap();

        assert_eq!(r.transport().connect_count(), 2);
    }

    fn login_kick() -> Inbound {
        Inbound::Disconnect {
            phase: Phase::Login,
            reason: "You are not whitelisted on this server!".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_notice_waits_before_reconnecting() {
        let mut r = reconnector(
            ScriptedResolver::new(vec![]),
            vec![
                Script::connected().event(0.0, Inbound::JoinGame).event(
                    1.0,
                    Inbound::Disconnect {
                        phase: Phase::Play,
                        reason: "Server closed".to_string(),
                    },
                ),
                Script::connected().event(0.0, Inbound::JoinGame),
            ],
            60.0,
        );
        let (handle, mut control) = control::channel();
        stop_after(handle, 5.5);
        let mut report = SessionReport::start();

        r.run(&mut report, &mut control).await.unwrap();

        // Kicked at 1s, next attempt not before 6s.
        assert_eq!(r.transport().connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_notice_reconnects_after_delay() {
        let mut r = reconnector(
            ScriptedResolver::new(vec![]),
            vec![
                Script::connected().event(0.0, Inbound::JoinGame).event(
                    1.0,
                    Inbound::Disconnect {
                        phase: Phase::Play,
                        reason: "Server closed".to_string(),
                    },
                ),
                Script::connected().event(0.0, Inbound::JoinGame),
            ],
            60.0,
        );
        let (handle, mut control) = control::channel();
        stop_after(handle, 6.5);
        let mut report = SessionReport::start();

        r.run(&mut report, &mut control).await.unwrap();

        assert_eq!(r.transport().connect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_login_kicks_are_spaced_out() {
        let scripts = (0..500)
            .map(|_| Script::connected().event(0.0, login_kick()))
            .collect();
        let mut r = reconnector(ScriptedResolver::new(vec![]), scripts, 60.0);
        let (handle, mut control) = control::channel();
        stop_after(handle, 12.0);
        let mut report = SessionReport::start();
        let start = Instant::now();

        let res = r.run(&mut report, &mut control).await;

        assert!(matches!(res, Ok(StopCause::Interrupted)));
        // Attempts at 0s, 5s and 10s.
        assert_eq!(r.transport().connect_count(), 3);
        assert!(start.elapsed() < Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_reconnect_delay() {
        let mut r = reconnector(
            ScriptedResolver::new(vec![]),
            vec![
                Script::connected().fault(0.5, TransportError::Fault("reset".to_string())),
                Script::connected(),
            ],
            60.0,
        );
        let (handle, mut control) = control::channel();
        stop_after(handle, 2.0);
        let mut report = SessionReport::start();
        let start = Instant::now();

        let res = r.run(&mut report, &mut control).await;

        assert!(matches!(res, Ok(StopCause::Interrupted)));
        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(r.transport().connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wear_carries_across_attempts() {
        let mut r = reconnector(
            ScriptedResolver::new(vec![]),
            vec![
                Script::connected()
                    .event(0.0, Inbound::JoinGame)
                    .fault(2.5, TransportError::Fault("reset".to_string())),
                Script::connected().event(0.0, Inbound::JoinGame),
            ],
            1.0,
        );
        let (handle, mut control) = control::channel();
        // Fault at 2.5s, reconnect at 7.5s.
        stop_after(handle, 8.0);
        let mut report = SessionReport::start();

        r.run(&mut report, &mut control).await.unwrap();

        assert_eq!(r.transport().connect_count(), 2);
        assert_eq!(report.timeouts().len(), 2);
        assert!((r.wear_score() - 5.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wear_ceiling_ends_loop() {
        let mut config = Config::default();
        config.options.fish_timeout_secs = 1.0;
        config.wear.ceiling = 2.5;
        let mut r = Reconnector::new(
            ScriptedResolver::new(vec![]),
            ScriptedTransport::new(vec![
                Script::connected().event(0.0, Inbound::JoinGame),
                Script::connected().event(0.0, Inbound::JoinGame),
            ]),
            SessionPolicy::from_config(&config, 184),
            Credentials::offline("tester"),
            Duration::from_secs(5),
        );
        let (_handle, mut control) = control::channel();
        let mut report = SessionReport::start();

        let res = r.run(&mut report, &mut control).await;

        assert!(matches!(res, Ok(StopCause::WearCeiling)));
        assert_eq!(r.transport().connect_count(), 1);
        assert_eq!(report.timeouts().len(), 2);
    }
}
