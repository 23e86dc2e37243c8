use crate::shared::{ConfirmationToken, UserId};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationChoice {
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationState {
    Pending,
    Confirmed,
    Canceled,
    Expired,
}

impl ConfirmationState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for ConfirmationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Canceled => write!(f, "canceled"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfirmationResponse<T> {
    pub actor: UserId,
    pub choice: ConfirmationChoice,
    pub payload: T,
}

#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    requester: UserId,
    deadline: Option<Instant>,
    state: ConfirmationState,
}

impl PendingConfirmation {
    pub fn new(requester: UserId, now: Instant, timeout: Duration) -> Self {
        Self {
            requester,
            deadline: now.checked_add(timeout),
            state: ConfirmationState::Pending,
        }
    }

    pub fn state(&self) -> ConfirmationState {
        self.state
    }

    pub fn requester(&self) -> &UserId {
        &self.requester
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline
            .map_or(Duration::MAX, |deadline| deadline.saturating_duration_since(now))
    }

    pub fn tick(&mut self, now: Instant) -> ConfirmationState {
        if self.state == ConfirmationState::Pending
            && self.deadline.is_some_and(|deadline| now >= deadline)
        {
            self.state = ConfirmationState::Expired;
        }
        self.state
    }

    pub fn expire(&mut self) -> ConfirmationState {
        if self.state == ConfirmationState::Pending {
            self.state = ConfirmationState::Expired;
        }
        self.state
    }

    pub fn offer(
        &mut self,
        actor: &UserId,
        choice: ConfirmationChoice,
        now: Instant,
    ) -> ConfirmationState {
        if self.tick(now).is_terminal() || actor != &self.requester {
            return self.state;
        }
        self.state = match choice {
            ConfirmationChoice::Confirm => ConfirmationState::Confirmed,
            ConfirmationChoice::Cancel => ConfirmationState::Canceled,
        };
        self.state
    }
}

#[derive(Debug)]
pub struct ConfirmationOutcome<T> {
    pub state: ConfirmationState,
    pub response: Option<T>,
}

pub fn await_decision<T>(
    pending: &mut PendingConfirmation,
    responses: &Receiver<ConfirmationResponse<T>>,
) -> ConfirmationOutcome<T> {
    loop {
        let now = Instant::now();
        if pending.tick(now).is_terminal() {
            return ConfirmationOutcome {
                state: pending.state(),
                response: None,
            };
        }
        match responses.recv_timeout(pending.remaining(now)) {
            Ok(response) => {
                let from_requester = &response.actor == pending.requester();
                let state = pending.offer(&response.actor, response.choice, Instant::now());
                if from_requester && state.is_terminal() {
                    return ConfirmationOutcome {
                        state,
                        response: Some(response.payload),
                    };
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return ConfirmationOutcome {
                    state: pending.expire(),
                    response: None,
                };
            }
        }
    }
}

#[derive(Debug)]
pub enum Delivery<T> {
    Delivered,
    NotRequester(ConfirmationResponse<T>),
    NoWaiter(ConfirmationResponse<T>),
}

#[derive(Debug)]
struct Waiter<T> {
    requester: UserId,
    tx: Sender<ConfirmationResponse<T>>,
}

#[derive(Debug)]
pub struct ConfirmationRouter<T> {
    waiting: Mutex<HashMap<ConfirmationToken, Waiter<T>>>,
}

impl<T> Default for ConfirmationRouter<T> {
    fn default() -> Self {
        Self {
            waiting: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> ConfirmationRouter<T> {
    pub fn register(
        &self,
        token: ConfirmationToken,
        requester: UserId,
    ) -> Receiver<ConfirmationResponse<T>> {
        let (tx, rx) = mpsc::channel();
        self.lock().insert(token, Waiter { requester, tx });
        rx
    }

    pub fn deliver(
        &self,
        token: &ConfirmationToken,
        response: ConfirmationResponse<T>,
    ) -> Delivery<T> {
        let waiting = self.lock();
        let Some(waiter) = waiting.get(token) else {
            return Delivery::NoWaiter(response);
        };
        if waiter.requester != response.actor {
            return Delivery::NotRequester(response);
        }
        match waiter.tx.send(response) {
            Ok(()) => Delivery::Delivered,
            Err(err) => Delivery::NoWaiter(err.0),
        }
    }

    pub fn release(&self, token: &ConfirmationToken) {
        self.lock().remove(token);
    }

    pub fn is_waiting(&self, token: &ConfirmationToken) -> bool {
        self.lock().contains_key(token)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConfirmationToken, Waiter<T>>> {
        self.waiting
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
