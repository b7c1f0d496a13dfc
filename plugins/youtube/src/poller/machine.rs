//! The poller's transition function.
//!
//! [`step`] is pure: it takes the current state, an event, and the current time, and returns the
//! next state plus the effects to perform. Timers, network calls, and DOM work all happen in the
//! driver, which feeds their outcomes back in as events.

use crate::record::VideoStatus;
use crate::render::CountdownParts;
use crate::status::StatusData;
use jiff::Timestamp;
use std::time::Duration;

pub const TICK: Duration = Duration::from_secs(1);
/// Re-check interval once a countdown has run out but the stream is not live yet.
pub const CHECK_AGAIN: Duration = Duration::from_secs(60);
pub const LIVE_POLL: Duration = Duration::from_secs(10 * 60);
pub const REPLAY_POLL: Duration = Duration::from_secs(30 * 60);
/// Each half of a content cross-fade.
pub const FADE: Duration = Duration::from_millis(300);

pub const STARTING: &str = "Stream is starting!";
pub const CHECKING_AGAIN: &str = "Stream starting soon... checking again";

/// What the page showed when the poller attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialView {
    pub status: VideoStatus,
    pub video_id: String,
    pub scheduled_start_time: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Counting down locally, no network.
    Ticking,
    /// Target reached; waiting for the stream to show up as live.
    Checking,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Initial,
    Countdown {
        video_id: String,
        target: Timestamp,
        phase: Phase,
    },
    LiveMonitoring {
        video_id: String,
    },
    ReplayMonitoring {
        video_id: String,
    },
    /// Nothing further is scheduled.
    Stopped,
}

impl State {
    /// The video the widget is showing, as sent with status checks.
    pub fn video_id(&self) -> Option<&str> {
        match self {
            State::Countdown { video_id, .. }
            | State::LiveMonitoring { video_id }
            | State::ReplayMonitoring { video_id } => Some(video_id),
            State::Initial | State::Stopped => None,
        }
    }

    /// How long until the next regular poll in this state.
    fn poll_interval(&self) -> Option<Duration> {
        match self {
            State::Countdown {
                phase: Phase::Checking,
                ..
            } => Some(CHECK_AGAIN),
            State::LiveMonitoring { .. } => Some(LIVE_POLL),
            State::ReplayMonitoring { .. } => Some(REPLAY_POLL),
            State::Countdown {
                phase: Phase::Ticking,
                ..
            }
            | State::Initial
            | State::Stopped => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Rendered(InitialView),
    Tick,
    PollDue,
    Response(StatusData),
    PollFailed,
    /// The container left the viewport.
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartCountdown { target: Timestamp },
    UpdateCountdown(CountdownParts),
    ShowMessage(&'static str),
    ScheduleTick(Duration),
    SchedulePoll(Duration),
    CheckStatus { current_video_id: Option<String> },
    /// Fade the current content out, replace it, fade back in.
    SwapContent { html: String, status: VideoStatus },
    StartPlayer { video_id: String },
    StopPolling,
}

fn check(video_id: &str) -> Effect {
    Effect::CheckStatus {
        current_video_id: Some(video_id.to_string()),
    }
}

/// Enters the countdown for `video_id`, or goes straight to checking if `target` has passed.
fn countdown(
    video_id: String,
    target: Timestamp,
    now: Timestamp,
    mut effects: Vec<Effect>,
) -> (State, Vec<Effect>) {
    if target > now {
        effects.extend([
            Effect::StartCountdown { target },
            Effect::UpdateCountdown(CountdownParts::until(target, now)),
            Effect::ScheduleTick(TICK),
        ]);
        let state = State::Countdown {
            video_id,
            target,
            phase: Phase::Ticking,
        };
        return (state, effects);
    }

    effects.extend([Effect::ShowMessage(STARTING), check(&video_id)]);
    let state = State::Countdown {
        video_id,
        target,
        phase: Phase::Checking,
    };
    (state, effects)
}

fn swap(data: &StatusData) -> Effect {
    Effect::SwapContent {
        html: data.html.clone(),
        status: data.status,
    }
}

/// Switches to a new upcoming broadcast.
fn new_countdown(data: StatusData, now: Timestamp) -> (State, Vec<Effect>) {
    let target = data.scheduled_start_time.unwrap_or(now);
    let effects = vec![swap(&data)];
    countdown(data.video_id, target, now, effects)
}

fn start_player(data: &StatusData) -> [Effect; 2] {
    [
        swap(data),
        Effect::StartPlayer {
            video_id: data.video_id.clone(),
        },
    ]
}

pub fn step(state: State, event: Event, now: Timestamp) -> (State, Vec<Effect>) {
    match (state, event) {
        (State::Stopped, _) => (State::Stopped, Vec::new()),
        (_, Event::Hidden) => (State::Stopped, vec![Effect::StopPolling]),

        (State::Initial, Event::Rendered(view)) => match (view.status, view.scheduled_start_time) {
            (VideoStatus::Upcoming, Some(target)) => {
                countdown(view.video_id, target, now, Vec::new())
            }
            (VideoStatus::Live, _) => (
                State::LiveMonitoring {
                    video_id: view.video_id,
                },
                vec![Effect::SchedulePoll(LIVE_POLL)],
            ),
            _ => (
                State::ReplayMonitoring {
                    video_id: view.video_id,
                },
                vec![Effect::SchedulePoll(REPLAY_POLL)],
            ),
        },

        (
            State::Countdown {
                video_id,
                target,
                phase: Phase::Ticking,
            },
            Event::Tick,
        ) => {
            let parts = CountdownParts::until(target, now);
            if target > now {
                let effects = vec![Effect::UpdateCountdown(parts), Effect::ScheduleTick(TICK)];
                let state = State::Countdown {
                    video_id,
                    target,
                    phase: Phase::Ticking,
                };
                return (state, effects);
            }
            let effects = vec![
                Effect::UpdateCountdown(parts),
                Effect::ShowMessage(STARTING),
                check(&video_id),
            ];
            let state = State::Countdown {
                video_id,
                target,
                phase: Phase::Checking,
            };
            (state, effects)
        }

        (
            State::Countdown {
                video_id,
                target,
                phase: Phase::Checking,
            },
            Event::Response(data),
        ) => match data.status {
            VideoStatus::Live => {
                let mut effects = start_player(&data).to_vec();
                effects.push(Effect::SchedulePoll(LIVE_POLL));
                let state = State::LiveMonitoring {
                    video_id: data.video_id,
                };
                (state, effects)
            }
            VideoStatus::Completed => {
                let mut effects = start_player(&data).to_vec();
                effects.push(Effect::StopPolling);
                (State::Stopped, effects)
            }
            VideoStatus::Upcoming
                if data.video_id != video_id
                    && data.scheduled_start_time.is_some_and(|start| start > now) =>
            {
                // Rescheduled as a different broadcast.
                new_countdown(data, now)
            }
            VideoStatus::Upcoming => {
                let effects = vec![
                    Effect::ShowMessage(CHECKING_AGAIN),
                    Effect::SchedulePoll(CHECK_AGAIN),
                ];
                let state = State::Countdown {
                    video_id,
                    target,
                    phase: Phase::Checking,
                };
                (state, effects)
            }
        },

        (State::LiveMonitoring { video_id }, Event::Response(data)) => match data.status {
            VideoStatus::Completed => {
                let mut effects = start_player(&data).to_vec();
                effects.push(Effect::SchedulePoll(REPLAY_POLL));
                let state = State::ReplayMonitoring {
                    video_id: data.video_id,
                };
                (state, effects)
            }
            VideoStatus::Upcoming if data.video_changed => new_countdown(data, now),
            _ => (
                State::LiveMonitoring { video_id },
                vec![Effect::SchedulePoll(LIVE_POLL)],
            ),
        },

        (State::ReplayMonitoring { video_id }, Event::Response(data)) => match data.status {
            VideoStatus::Upcoming if data.video_changed => new_countdown(data, now),
            _ => (
                State::ReplayMonitoring { video_id },
                vec![Effect::SchedulePoll(REPLAY_POLL)],
            ),
        },

        (
            state @ (State::Countdown {
                phase: Phase::Checking,
                ..
            }
            | State::LiveMonitoring { .. }
            | State::ReplayMonitoring { .. }),
            Event::PollDue,
        ) => {
            let effects = vec![Effect::CheckStatus {
                current_video_id: state.video_id().map(str::to_string),
            }];
            (state, effects)
        }

        (state, Event::PollFailed) => {
            let effects = state
                .poll_interval()
                .map(Effect::SchedulePoll)
                .into_iter()
                .collect();
            (state, effects)
        }

        // Anything else (a response while ticking, a tick after checking began, a second
        // render) does not apply to the current state.
        (state, _) => (state, Vec::new()),
    }
}
