//! Door alarm controller.
//!
//! Enabling the alarm arms it after a short delay. Opening the door while
//! armed starts a grace period; if the alarm is not disabled before the grace
//! period ends, it triggers. Disabling is possible from every active state.
//!
//! ```text
//! Disabled --EnableAlarm--> Arming --AlarmEnabled--> Armed
//! Armed --DoorOpen--> GracePeriod --GracePeriodTimeout--> Triggered
//! Armed | GracePeriod | Triggered --DisableAlarm--> Disabled
//! ```

use std::time::Duration;

use tsm::{symbols, ActionResult, Context, StateMachine, StateMachineBuilder, StateTable, TableError};

symbols! {
    /// Operating mode of the alarm.
    pub enum State {
        Disabled,
        Arming,
        Armed,
        GracePeriod,
        Triggered,
    }
}

symbols! {
    /// Inputs the alarm reacts to.
    pub enum Event {
        EnableAlarm,
        DisableAlarm,
        /// Fired by the arming timer.
        AlarmEnabled,
        DoorOpen,
        /// Fired by the grace period timer.
        GracePeriodTimeout,
    }
}

/// Delays used by the alarm's own timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmTimings {
    /// Time between enabling and being armed.
    pub arming: Duration,
    /// Time between the door opening and the alarm triggering.
    pub grace: Duration,
}

impl Default for AlarmTimings {
    fn default() -> Self {
        Self {
            arming: Duration::from_millis(3000),
            grace: Duration::from_millis(10000),
        }
    }
}

/// Per-instance data of the alarm machine.
#[derive(Debug, Clone, Default)]
pub struct Alarm {
    pub timings: AlarmTimings,
    /// How many times the alarm went off.
    pub triggered: u32,
}

impl Alarm {
    pub fn new(timings: AlarmTimings) -> Self {
        Self {
            timings,
            triggered: 0,
        }
    }
}

type AlarmContext<'a> = Context<'a, State, Event, Alarm>;

fn arming_alarm(ctx: &mut AlarmContext<'_>) -> ActionResult {
    let delay = ctx.data().timings.arming;
    ctx.future_event(delay, Event::AlarmEnabled)?;
    log::info!("Start arming the alarm");
    Ok(())
}

fn alarm_armed(_ctx: &mut AlarmContext<'_>) -> ActionResult {
    log::info!("The alarm is now armed");
    Ok(())
}

fn start_grace_period(ctx: &mut AlarmContext<'_>) -> ActionResult {
    let delay = ctx.data().timings.grace;
    ctx.future_event(delay, Event::GracePeriodTimeout)?;
    log::info!("Starting grace period");
    Ok(())
}

fn trigger_alarm(ctx: &mut AlarmContext<'_>) -> ActionResult {
    ctx.data_mut().triggered += 1;
    log::warn!("The alarm is now activated");
    Ok(())
}

fn disable_alarm(_ctx: &mut AlarmContext<'_>) -> ActionResult {
    log::info!("Alarm has been disabled");
    Ok(())
}

fn on_enter(ctx: &mut AlarmContext<'_>) -> ActionResult {
    log::info!("Enter state: {}", ctx.state());
    Ok(())
}

fn on_exit(ctx: &mut AlarmContext<'_>) -> ActionResult {
    log::info!("Exit state: {}", ctx.state());
    Ok(())
}

/// The alarm's transition table.
pub fn table() -> Result<StateTable<State, Event, Alarm>, TableError> {
    use Event::*;
    use State::*;

    StateTable::builder(Disabled)
        // In this state, when this event happens, run this, then go here.
        .transition_with(Disabled, EnableAlarm, arming_alarm, Arming)
        .transition_with(Arming, AlarmEnabled, alarm_armed, Armed)
        .transition_with(Armed, DisableAlarm, disable_alarm, Disabled)
        .transition_with(Armed, DoorOpen, start_grace_period, GracePeriod)
        .transition_with(GracePeriod, GracePeriodTimeout, trigger_alarm, Triggered)
        .transition_with(GracePeriod, DisableAlarm, disable_alarm, Disabled)
        .transition_with(Triggered, DisableAlarm, disable_alarm, Disabled)
        .on_enter_all(State::ALL, on_enter)
        .on_exit_all(State::ALL, on_exit)
        .build()
}

/// Builder for an alarm machine with the given timings.
pub fn builder(timings: AlarmTimings) -> Result<StateMachineBuilder<State, Event, Alarm>, TableError> {
    Ok(StateMachine::with_data(table()?, Alarm::new(timings)))
}
