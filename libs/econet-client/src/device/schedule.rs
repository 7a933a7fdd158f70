//! Weekly schedules
//!
//! A schedule holds 7 days of 48 half-hour slots plus a master switch
//! byte and an associated parameter byte. Edits only touch the local
//! copy and set a dirty flag; nothing reaches the controller until the
//! owning device commits, and a commit always carries the complete
//! schedule set with unchanged schedules resent from last-known state.

use serde::{Deserialize, Serialize};

use econet_wire::structures::schedules::{ScheduleMatrix, SCHEDULE_DAYS, SLOTS_PER_DAY};

use crate::error::{Error, Result};

/// Weekday, in wire day order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(usize)]
pub enum Weekday {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

impl Weekday {
    pub const ALL: [Weekday; SCHEDULE_DAYS] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];
}

/// A point in the day, accepted as "HH:MM" text or a minute count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    minutes: u32,
}

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay { minutes: 0 };

    /// Parse "HH:MM"; "24:00" is accepted as end-of-day
    pub fn parse(text: &str) -> Result<Self> {
        let (hours, minutes) = text
            .split_once(':')
            .ok_or_else(|| Error::invalid_data(format!("invalid time: {text:?}")))?;
        let hours: u32 = hours
            .parse()
            .map_err(|_| Error::invalid_data(format!("invalid time: {text:?}")))?;
        let minutes: u32 = minutes
            .parse()
            .map_err(|_| Error::invalid_data(format!("invalid time: {text:?}")))?;
        if hours > 24 || minutes > 59 || (hours == 24 && minutes != 0) {
            return Err(Error::invalid_data(format!("invalid time: {text:?}")));
        }
        Ok(Self {
            minutes: hours * 60 + minutes,
        })
    }

    /// Half-hour slot index; fails on unaligned times
    fn slot(&self) -> Result<usize> {
        if self.minutes % 30 != 0 {
            return Err(Error::invalid_data(format!(
                "time {:02}:{:02} is not on a half-hour boundary",
                self.minutes / 60,
                self.minutes % 60
            )));
        }
        Ok(self.minutes as usize / 30)
    }
}

impl From<u32> for TimeOfDay {
    fn from(minutes: u32) -> Self {
        Self { minutes }
    }
}

impl TryFrom<&str> for TimeOfDay {
    type Error = Error;

    fn try_from(text: &str) -> Result<Self> {
        Self::parse(text)
    }
}

/// One schedule's local state
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub name: String,
    pub index: u8,
    pub matrix: ScheduleMatrix,
    /// Master switch byte
    pub switch: u8,
    /// Associated parameter byte
    pub parameter: u8,
    /// Local edits not yet committed
    pub dirty: bool,
}

impl Schedule {
    pub fn new(name: impl Into<String>, index: u8) -> Self {
        Self {
            name: name.into(),
            index,
            matrix: [[false; SLOTS_PER_DAY]; SCHEDULE_DAYS],
            switch: 0,
            parameter: 0,
            dirty: false,
        }
    }

    /// Replace local state from a schedules response
    pub fn load(&mut self, matrix: ScheduleMatrix, switch: u8, parameter: u8) {
        self.matrix = matrix;
        self.switch = switch;
        self.parameter = parameter;
        self.dirty = false;
    }

    /// Set an interval on one day.
    ///
    /// `start` defaults to midnight, `end` of midnight wraps to the end
    /// of the day. The interval is half-open: `[start, end)`.
    pub fn set_state(
        &mut self,
        day: Weekday,
        state: bool,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Result<()> {
        let start_slot = start.slot()?;
        let end_slot = match end.slot()? {
            0 => SLOTS_PER_DAY,
            slot => slot,
        };
        if start_slot >= end_slot || end_slot > SLOTS_PER_DAY {
            return Err(Error::invalid_data(format!(
                "invalid schedule interval: slots {start_slot}..{end_slot}"
            )));
        }

        for slot in start_slot..end_slot {
            self.matrix[day as usize][slot] = state;
        }
        self.dirty = true;
        Ok(())
    }

    pub fn set_on(&mut self, day: Weekday, start: TimeOfDay, end: TimeOfDay) -> Result<()> {
        self.set_state(day, true, start, end)
    }

    pub fn set_off(&mut self, day: Weekday, start: TimeOfDay, end: TimeOfDay) -> Result<()> {
        self.set_state(day, false, start, end)
    }

    /// Set the whole week to one state
    pub fn set_all(&mut self, state: bool) {
        for day in self.matrix.iter_mut() {
            day.fill(state);
        }
        self.dirty = true;
    }

    pub fn slot_state(&self, day: Weekday, time: TimeOfDay) -> Result<bool> {
        let slot = time.slot()?;
        if slot >= SLOTS_PER_DAY {
            return Err(Error::invalid_data("time past end of day"));
        }
        Ok(self.matrix[day as usize][slot])
    }
}
