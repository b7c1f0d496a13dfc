//! Client-side status poller.
//!
//! Keeps an already rendered widget in step with the channel: counts down to a scheduled
//! broadcast, notices when it goes live, swaps to the replay when it ends, and picks up the
//! next scheduled broadcast.
//!
//! The transition logic lives in [`machine::step`]. [`Poller`] adds request bookkeeping on top,
//! and [`driver::run`] turns the resulting effects into timers, HTTP calls, and view updates.

use crate::status::StatusData;
use jiff::Timestamp;

pub mod driver;
pub mod machine;

pub use driver::{HttpStatusSource, StatusSource, WidgetView, run};
pub use machine::{Effect, Event, InitialView, Phase, State};

/// What to do with a status response that arrives after a newer check was already sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseOrdering {
    /// Drop it; only the newest outstanding check may change the state.
    #[default]
    SequenceGuarded,
    /// Apply responses in arrival order, whichever request they answer.
    LastWriteWins,
}

/// A status check to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    pub seq: u64,
    pub current_video_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Apply(Effect),
    Send(StatusRequest),
}

#[derive(Debug)]
pub struct Poller {
    state: State,
    ordering: ResponseOrdering,
    issued: u64,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(ResponseOrdering::default())
    }
}

impl Poller {
    pub fn new(ordering: ResponseOrdering) -> Self {
        Self {
            state: State::Initial,
            ordering,
            issued: 0,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Feeds a timer, render, or visibility event through the state machine.
    pub fn handle(&mut self, event: Event, now: Timestamp) -> Vec<Command> {
        let (next, effects) = machine::step(self.state.clone(), event, now);
        if next != self.state {
            tracing::debug!(state = ?next, "poller transition");
        }
        self.state = next;

        effects
            .into_iter()
            .map(|effect| match effect {
                Effect::CheckStatus { current_video_id } => {
                    self.issued += 1;
                    Command::Send(StatusRequest {
                        seq: self.issued,
                        current_video_id,
                    })
                }
                effect => Command::Apply(effect),
            })
            .collect()
    }

    /// Feeds the answer to request `seq` through the state machine; `None` means it failed.
    pub fn deliver(
        &mut self,
        seq: u64,
        outcome: Option<StatusData>,
        now: Timestamp,
    ) -> Vec<Command> {
        if self.ordering == ResponseOrdering::SequenceGuarded && seq < self.issued {
            tracing::debug!(seq, latest = self.issued, "discarding superseded status response");
            return Vec::new();
        }
        let event = match outcome {
            Some(data) => Event::Response(data),
            None => Event::PollFailed,
        };
        self.handle(event, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::VideoStatus;
    use jiff::SignedDuration;
    use pretty_assertions::assert_eq;

    fn now() -> Timestamp {
        "2024-06-02T12:00:00Z".parse().unwrap()
    }

    fn status(status: VideoStatus, video_id: &str, start: Option<Timestamp>) -> StatusData {
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

    /// A poller checking on countdown `v` with two checks outstanding.
    fn with_two_checks(ordering: ResponseOrdering) -> Poller {
        let mut poller = Poller::new(ordering);
        let view = InitialView {
            status: VideoStatus::Upcoming,
            video_id: "v".into(),
            scheduled_start_time: Some(now()),
        };
        let commands = poller.handle(Event::Rendered(view), now());
        assert!(commands.contains(&Command::Send(StatusRequest {
            seq: 1,
            current_video_id: Some("v".into())
        })));
        let commands = poller.handle(Event::PollDue, now());
        assert_eq!(
            commands,
            vec![Command::Send(StatusRequest {
                seq: 2,
                current_video_id: Some("v".into())
            })]
        );
        poller
    }

    #[test]
    fn sequence_guard_drops_superseded_responses() {
        let mut poller = with_two_checks(ResponseOrdering::SequenceGuarded);

        poller.deliver(2, Some(status(VideoStatus::Live, "v", None)), now());
        assert_eq!(poller.state(), &State::LiveMonitoring { video_id: "v".into() });

        // The older check still thought a different broadcast was next.
        let late = status(VideoStatus::Upcoming, "x", Some(now() + SignedDuration::from_hours(1)));
        let commands = poller.deliver(1, Some(late), now());
        assert!(commands.is_empty());
        assert_eq!(poller.state(), &State::LiveMonitoring { video_id: "v".into() });
    }

    #[test]
    fn last_write_wins_applies_late_responses() {
        let mut poller = with_two_checks(ResponseOrdering::LastWriteWins);

        poller.deliver(2, Some(status(VideoStatus::Live, "v", None)), now());
        let late = status(VideoStatus::Upcoming, "x", Some(now() + SignedDuration::from_hours(1)));
        let commands = poller.deliver(1, Some(late), now());

        assert!(!commands.is_empty());
        assert!(matches!(
            poller.state(),
            State::Countdown { video_id, phase: Phase::Ticking, .. } if video_id == "x"
        ));
    }

    #[test]
    fn failed_checks_fall_back_to_the_regular_interval() {
        let mut poller = with_two_checks(ResponseOrdering::SequenceGuarded);
        let commands = poller.deliver(2, None, now());
        assert_eq!(
            commands,
            vec![Command::Apply(Effect::SchedulePoll(machine::CHECK_AGAIN))]
        );
    }
}
