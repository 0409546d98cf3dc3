//! Transition table and enter/exit hooks.
//!
//! A [`StateTable`] is the complete, immutable behaviour of a state machine:
//! an ordered list of [`Transition`] rows plus at most one enter hook and one
//! exit hook per state. When several rows match the same (state, event) pair
//! the first one listed wins; this is the documented precedence rule and is
//! not reported as an error.

use std::fmt;
use std::sync::Arc;

use crate::action::{Action, ActionResult, Context};
use crate::error::TableError;
use crate::symbol::Symbol;

/// A directed edge `from --event--> to`, optionally carrying an action.
pub struct Transition<S, E, D> {
    pub from: S,
    pub event: E,
    pub action: Option<Action<S, E, D>>,
    pub to: S,
}

impl<S, E, D> Transition<S, E, D> {
    pub fn is_self_transition(&self) -> bool
    where
        S: PartialEq,
    {
        self.from == self.to
    }
}

impl<S: Clone, E: Clone, D> Clone for Transition<S, E, D> {
    fn clone(&self) -> Self {
        Self {
            from: self.from.clone(),
            event: self.event.clone(),
            action: self.action.clone(),
            to: self.to.clone(),
        }
    }
}

impl<S: fmt::Debug, E: fmt::Debug, D> fmt::Debug for Transition<S, E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("event", &self.event)
            .field("action", &self.action.is_some())
            .field("to", &self.to)
            .finish()
    }
}

/// Immutable transition table with enter/exit hooks.
pub struct StateTable<S, E, D = ()> {
    initial: S,
    rows: Vec<Transition<S, E, D>>,
    on_enter: Vec<(S, Action<S, E, D>)>,
    on_exit: Vec<(S, Action<S, E, D>)>,
}

impl<S: Symbol, E: Symbol, D> StateTable<S, E, D> {
    pub fn builder(initial: S) -> StateTableBuilder<S, E, D> {
        StateTableBuilder::new(initial)
    }

    /// The state a freshly built machine starts in.
    pub fn initial(&self) -> S {
        self.initial
    }

    /// All rows, in precedence order.
    pub fn rows(&self) -> &[Transition<S, E, D>] {
        &self.rows
    }

    /// First row matching `(state, event)`, if any.
    pub fn find(&self, state: S, event: E) -> Option<&Transition<S, E, D>> {
        self.rows
            .iter()
            .find(|row| row.from == state && row.event == event)
    }

    /// Whether `event` would be handled in `state`.
    pub fn handles(&self, state: S, event: E) -> bool {
        self.find(state, event).is_some()
    }

    pub fn enter_hook(&self, state: S) -> Option<&Action<S, E, D>> {
        lookup_hook(&self.on_enter, state)
    }

    pub fn exit_hook(&self, state: S) -> Option<&Action<S, E, D>> {
        lookup_hook(&self.on_exit, state)
    }
}

impl<S: fmt::Debug, E: fmt::Debug, D> fmt::Debug for StateTable<S, E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enter: Vec<&S> = self.on_enter.iter().map(|(state, _)| state).collect();
        let exit: Vec<&S> = self.on_exit.iter().map(|(state, _)| state).collect();
        f.debug_struct("StateTable")
            .field("initial", &self.initial)
            .field("rows", &self.rows)
            .field("on_enter", &enter)
            .field("on_exit", &exit)
            .finish()
    }
}

fn lookup_hook<S: PartialEq, A>(hooks: &[(S, A)], state: S) -> Option<&A> {
    hooks
        .iter()
        .find(|(hooked, _)| *hooked == state)
        .map(|(_, action)| action)
}

/// Builder collecting rows and hooks before freezing them into a table.
pub struct StateTableBuilder<S, E, D> {
    initial: S,
    rows: Vec<Transition<S, E, D>>,
    on_enter: Vec<(S, Action<S, E, D>)>,
    on_exit: Vec<(S, Action<S, E, D>)>,
}

impl<S: Symbol, E: Symbol, D> StateTableBuilder<S, E, D> {
    pub fn new(initial: S) -> Self {
        Self {
            initial,
            rows: Vec::new(),
            on_enter: Vec::new(),
            on_exit: Vec::new(),
        }
    }

    /// Adds a row without an action.
    pub fn transition(mut self, from: S, event: E, to: S) -> Self {
        self.rows.push(Transition {
            from,
            event,
            action: None,
            to,
        });
        self
    }

    /// Adds a row that runs `action` before changing state.
    pub fn transition_with<F>(mut self, from: S, event: E, action: F, to: S) -> Self
    where
        F: Fn(&mut Context<'_, S, E, D>) -> ActionResult + Send + Sync + 'static,
    {
        let action: Action<S, E, D> = Arc::new(action);
        self.rows.push(Transition {
            from,
            event,
            action: Some(action),
            to,
        });
        self
    }

    /// Sets the hook run right after `state` becomes current.
    pub fn on_enter<F>(mut self, state: S, action: F) -> Self
    where
        F: Fn(&mut Context<'_, S, E, D>) -> ActionResult + Send + Sync + 'static,
    {
        let action: Action<S, E, D> = Arc::new(action);
        self.on_enter.push((state, action));
        self
    }

    /// Sets the hook run right before `state` stops being current.
    pub fn on_exit<F>(mut self, state: S, action: F) -> Self
    where
        F: Fn(&mut Context<'_, S, E, D>) -> ActionResult + Send + Sync + 'static,
    {
        let action: Action<S, E, D> = Arc::new(action);
        self.on_exit.push((state, action));
        self
    }

    /// Installs the same enter hook on every state in `states`.
    pub fn on_enter_all<F>(mut self, states: &[S], action: F) -> Self
    where
        F: Fn(&mut Context<'_, S, E, D>) -> ActionResult + Send + Sync + 'static,
    {
        let action: Action<S, E, D> = Arc::new(action);
        for &state in states {
            self.on_enter.push((state, Arc::clone(&action)));
        }
        self
    }

    /// Installs the same exit hook on every state in `states`.
    pub fn on_exit_all<F>(mut self, states: &[S], action: F) -> Self
    where
        F: Fn(&mut Context<'_, S, E, D>) -> ActionResult + Send + Sync + 'static,
    {
        let action: Action<S, E, D> = Arc::new(action);
        for &state in states {
            self.on_exit.push((state, Arc::clone(&action)));
        }
        self
    }

    /// Freezes the table.
    ///
    /// Fails if any state received two enter hooks or two exit hooks.
    /// Overlapping transition rows are accepted.
    pub fn build(self) -> Result<StateTable<S, E, D>, TableError> {
        if let Some(state) = first_duplicate(&self.on_enter) {
            return Err(TableError::DuplicateEnterHook {
                state: state.name(),
            });
        }
        if let Some(state) = first_duplicate(&self.on_exit) {
            return Err(TableError::DuplicateExitHook {
                state: state.name(),
            });
        }

        Ok(StateTable {
            initial: self.initial,
            rows: self.rows,
            on_enter: self.on_enter,
            on_exit: self.on_exit,
        })
    }
}

fn first_duplicate<S: Symbol, A>(hooks: &[(S, A)]) -> Option<S> {
    hooks.iter().enumerate().find_map(|(index, (state, _))| {
        hooks[..index]
            .iter()
            .any(|(earlier, _)| earlier == state)
            .then_some(*state)
    })
}
