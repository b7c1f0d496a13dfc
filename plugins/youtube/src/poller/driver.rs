//! Runs a [`Poller`] against real time, a status endpoint, and a display.

use crate::clock::Clock;
use crate::poller::machine::{Effect, Event, InitialView, State};
use crate::poller::{Command, Poller, StatusRequest};
use crate::status::{StatusData, parse_status};
use eyre::Context;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

/// Where status checks go.
pub trait StatusSource: Send + Sync + 'static {
    fn check(
        &self,
        current_video_id: Option<String>,
    ) -> impl Future<Output = eyre::Result<StatusData>> + Send;
}

/// Where display effects go.
///
/// Only display effects reach the view; scheduling and status checks are handled by the driver.
pub trait WidgetView: Send {
    fn apply(&mut self, effect: &Effect);
}

/// Posts status checks to the widget server's `/ylvp/status` endpoint.
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    client: reqwest::Client,
    url: String,
    nonce: String,
}

impl HttpStatusSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            nonce: nonce.into(),
        }
    }
}

impl StatusSource for HttpStatusSource {
    async fn check(&self, current_video_id: Option<String>) -> eyre::Result<StatusData> {
        let mut form = vec![("nonce", self.nonce.as_str())];
        if let Some(id) = current_video_id.as_deref() {
            form.push(("current_video_id", id));
        }
        let body = self
            .client
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .context("send status check")?
            .error_for_status()
            .context("status check rejected")?
            .bytes()
            .await
            .context("read status response")?;
        match parse_status(&body)? {
            Ok(data) => Ok(data),
            Err(message) => eyre::bail!("status check failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wakeup {
    Tick,
    Poll,
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Drives `poller` from the initial render until it stops, returning the final state.
///
/// There is a single timer: every scheduled tick or poll replaces whatever was pending. Status
/// checks run on their own tasks and come back as events, so a slow request never delays the
/// countdown. `visibility` is sampled whenever a poll comes due; a hidden widget stops polling
/// for good.
pub async fn run<S, V>(
    mut poller: Poller,
    initial: InitialView,
    source: Arc<S>,
    mut view: V,
    visibility: watch::Receiver<bool>,
    clock: Arc<dyn Clock>,
) -> State
where
    S: StatusSource,
    V: WidgetView,
{
    let (tx, mut rx) = mpsc::channel::<(u64, Option<StatusData>)>(8);
    let mut timer: Option<(Instant, Wakeup)> = None;
    let mut commands = poller.handle(Event::Rendered(initial), clock.now());

    loop {
        for command in commands.drain(..) {
            match command {
                Command::Apply(Effect::ScheduleTick(after)) => {
                    timer = Some((Instant::now() + after, Wakeup::Tick));
                }
                Command::Apply(Effect::SchedulePoll(after)) => {
                    timer = Some((Instant::now() + after, Wakeup::Poll));
                }
                Command::Apply(Effect::StopPolling) => timer = None,
                Command::Apply(effect) => view.apply(&effect),
                Command::Send(StatusRequest {
                    seq,
                    current_video_id,
                }) => {
                    let source = Arc::clone(&source);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let outcome = match source.check(current_video_id).await {
                            Ok(data) => Some(data),
                            Err(e) => {
                                tracing::warn!(seq, error = %e, "status check failed");
                                None
                            }
                        };
                        // the driver may have stopped in the meantime
                        let _ = tx.send((seq, outcome)).await;
                    });
                }
            }
        }

        if *poller.state() == State::Stopped {
            tracing::debug!("poller stopped");
            return State::Stopped;
        }

        tokio::select! {
            () = sleep_until(timer.map(|(at, _)| at)) => {
                let Some((_, wakeup)) = timer.take() else {
                    continue;
                };
                let event = match wakeup {
                    Wakeup::Tick => Event::Tick,
                    Wakeup::Poll if *visibility.borrow() => Event::PollDue,
                    Wakeup::Poll => Event::Hidden,
                };
                commands = poller.handle(event, clock.now());
            }
            Some((seq, outcome)) = rx.recv() => {
                commands = poller.deliver(seq, outcome, clock.now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::machine::STARTING;
    use crate::record::VideoStatus;
    use crate::render::CountdownParts;
    use jiff::{SignedDuration, Timestamp};
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Wall-clock time that follows tokio's (paused) clock.
    struct TokioClock {
        origin: Timestamp,
        start: Instant,
    }

    impl Clock for TokioClock {
        fn now(&self) -> Timestamp {
            let elapsed = SignedDuration::try_from(self.start.elapsed()).unwrap();
            self.origin + elapsed
        }
    }

    #[derive(Default)]
    struct Scripted {
        responses: Mutex<VecDeque<StatusData>>,
        requests: Mutex<Vec<Option<String>>>,
    }

    impl StatusSource for Scripted {
        async fn check(&self, current_video_id: Option<String>) -> eyre::Result<StatusData> {
            self.requests.lock().unwrap().push(current_video_id);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| eyre::eyre!("no scripted response left"))
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Effect>>>);

    impl WidgetView for Recorder {
        fn apply(&mut self, effect: &Effect) {
            self.0.lock().unwrap().push(effect.clone());
        }
    }

    fn data(status: VideoStatus, video_id: &str, start: Option<Timestamp>) -> StatusData {
        StatusData {
            status,
            video_id: video_id.into(),
            is_live: status == VideoStatus::Live,
            is_upcoming: status == VideoStatus::Upcoming,
            scheduled_start_time: start,
            html: format!("<{video_id}>"),
            video_changed: true,
        }
    }

    fn seconds(seconds: i64) -> CountdownParts {
        CountdownParts {
            seconds,
            ..CountdownParts::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn live_stream_hands_over_to_the_next_countdown_and_back() {
        let origin: Timestamp = "2024-06-02T12:00:00Z".parse().unwrap();
        let clock = Arc::new(TokioClock {
            origin,
            start: Instant::now(),
        });
        // The first poll lands ten minutes in; the next broadcast starts three seconds later.
        let target = origin + SignedDuration::from_secs(603);
        let source = Arc::new(Scripted::default());
        source.responses.lock().unwrap().extend([
            data(VideoStatus::Upcoming, "next1", Some(target)),
            data(VideoStatus::Live, "next1", None),
        ]);
        let view = Recorder::default();
        let (visible, visibility) = watch::channel(true);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(700)).await;
            let _ = visible.send(false);
        });

        let initial = InitialView {
            status: VideoStatus::Live,
            video_id: "live1".into(),
            scheduled_start_time: None,
        };
        let state = run(
            Poller::default(),
            initial,
            Arc::clone(&source),
            view.clone(),
            visibility,
            clock,
        )
        .await;

        assert_eq!(state, State::Stopped);
        assert_eq!(
            *source.requests.lock().unwrap(),
            vec![Some("live1".to_string()), Some("next1".to_string())]
        );
        assert_eq!(
            *view.0.lock().unwrap(),
            vec![
                Effect::SwapContent {
                    html: "<next1>".into(),
                    status: VideoStatus::Upcoming
                },
                Effect::StartCountdown { target },
                Effect::UpdateCountdown(seconds(3)),
                Effect::UpdateCountdown(seconds(2)),
                Effect::UpdateCountdown(seconds(1)),
                Effect::UpdateCountdown(seconds(0)),
                Effect::ShowMessage(STARTING),
                Effect::SwapContent {
                    html: "<next1>".into(),
                    status: VideoStatus::Live
                },
                Effect::StartPlayer {
                    video_id: "next1".into()
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_check_retries_on_the_regular_interval() {
        let origin: Timestamp = "2024-06-02T12:00:00Z".parse().unwrap();
        let clock = Arc::new(TokioClock {
            origin,
            start: Instant::now(),
        });
        // Nothing scripted: every check fails. The countdown is already over, so the first check
        // goes out right away.
        let source = Arc::new(Scripted::default());
        let (visible, visibility) = watch::channel(true);
        tokio::spawn(async move {
            // Between the retries at 120s and 180s.
            tokio::time::sleep(Duration::from_secs(150)).await;
            let _ = visible.send(false);
        });

        let initial = InitialView {
            status: VideoStatus::Upcoming,
            video_id: "v".into(),
            scheduled_start_time: Some(origin),
        };
        let state = run(
            Poller::default(),
            initial,
            Arc::clone(&source),
            Recorder::default(),
            visibility,
            clock,
        )
        .await;

        assert_eq!(state, State::Stopped);
        // The immediate check, then one retry a minute while visible.
        assert_eq!(source.requests.lock().unwrap().len(), 3);
    }
}
