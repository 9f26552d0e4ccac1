use std::collections::{HashMap, HashSet};

use crate::error::ClientError;
use crate::event::Event;
use crate::state::AggregateState;

type Handler<S> = Box<dyn Fn(S, &Event) -> S + Send + Sync>;

/// Deterministically folds an ordered event history into a typed state value.
///
/// Handlers are registered per event type in an explicit table, constructed
/// once per client configuration and never mutated afterwards. The initial
/// state value comes from [`Default`], so a fold is safe to run repeatedly:
/// both when replaying history loaded from the store and when building state
/// from in-memory commands in tests.
///
/// By default an event whose type has no registered handler fails the fold
/// with [`ClientError::MissingHandler`]. Individual types can be skipped with
/// [`Folder::ignore`], or the policy relaxed entirely with
/// [`Folder::skip_missing_handlers`].
pub struct Folder<S> {
    handlers: HashMap<String, Handler<S>>,
    ignored: HashSet<String>,
    fail_on_missing_handler: bool,
}

impl<S> Default for Folder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Folder<S> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            ignored: HashSet::new(),
            fail_on_missing_handler: true,
        }
    }

    /// Registers the fold handler for an event type, replacing any previous
    /// handler registered for the same type.
    pub fn handler<F>(mut self, event_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(S, &Event) -> S + Send + Sync + 'static,
    {
        self.handlers.insert(event_type.into(), Box::new(handler));
        self
    }

    /// Events of this type are skipped while folding.
    pub fn ignore(mut self, event_type: impl Into<String>) -> Self {
        self.ignored.insert(event_type.into());
        self
    }

    /// Skip any event without a registered handler instead of failing the fold.
    pub fn skip_missing_handlers(mut self) -> Self {
        self.fail_on_missing_handler = false;
        self
    }

    /// Applies a single event to an already-folded state value.
    pub(crate) fn apply_one(&self, state: S, event: &Event) -> Result<S, ClientError> {
        match self.handlers.get(event.event_type()) {
            Some(handler) => Ok(handler(state, event)),
            None if self.ignored.contains(event.event_type()) => Ok(state),
            None if !self.fail_on_missing_handler => Ok(state),
            None => Err(ClientError::MissingHandler {
                event_type: event.event_type().to_string(),
            }),
        }
    }
}

impl<S: Default> Folder<S> {
    /// Folds `events` left-to-right into a fresh default state.
    ///
    /// The returned [`AggregateState`] carries the count of events accepted by
    /// the aggregate, which includes ignored and skipped events: they are part
    /// of the history even when this process has nothing to apply for them.
    pub fn fold(&self, events: &[Event]) -> Result<AggregateState<S>, ClientError> {
        let mut inner = S::default();

        for event in events {
            inner = self.apply_one(inner, event)?;
        }

        Ok(AggregateState::new(events.len() as i64, inner))
    }

    /// Builds an aggregate from scratch by running `decide` for each command
    /// against the state rehydrated from all previously produced events.
    ///
    /// Entirely in-memory: this is what makes business decisions testable
    /// without any transport. Returns the final rehydrated state together with
    /// every event the commands produced, in production order.
    pub fn from_commands<C, F>(
        &self,
        commands: &[C],
        decide: F,
    ) -> Result<(AggregateState<S>, Vec<Event>), ClientError>
    where
        F: Fn(&S, &C) -> Vec<Event>,
    {
        let mut produced: Vec<Event> = Vec::new();

        for command in commands {
            let state = self.fold(&produced)?;
            let events = decide(state.inner(), command);
            produced.extend(events);
        }

        Ok((self.fold(&produced)?, produced))
    }
}
