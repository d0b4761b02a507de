//! Which of the five display modes is showing.

use std::fmt;

/// Display modes in their fixed cyclic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Time,
    Date,
    Temp,
    Stopwatch,
    Timer,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Time,
        Mode::Date,
        Mode::Temp,
        Mode::Stopwatch,
        Mode::Timer,
    ];

    /// Modes visited by auto-cycling. Stopwatch and timer need the user's attention.
    pub const AUTO_CYCLE_LEN: usize = 3;

    pub fn label(self) -> &'static str {
        match self {
            Mode::Time => "TIME",
            Mode::Date => "DATE",
            Mode::Temp => "TEMP",
            Mode::Stopwatch => "STOPWATCH",
            Mode::Timer => "TIMER",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Mode::Time => 0,
            Mode::Date => 1,
            Mode::Temp => 2,
            Mode::Stopwatch => 3,
            Mode::Timer => 4,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModeCycler {
    index: usize,
    auto_enabled: bool,
}

impl ModeCycler {
    pub fn new(auto_enabled: bool) -> Self {
        Self {
            index: 0,
            auto_enabled,
        }
    }

    pub fn current(&self) -> Mode {
        Mode::ALL
            .get(self.index)
            .copied()
            .unwrap_or(Mode::Time)
    }

    /// Manual advance through all five modes.
    pub fn cycle(&mut self) -> Mode {
        self.index = (self.index + 1) % Mode::ALL.len();
        self.current()
    }

    /// Auto-cycle advance, confined to TIME, DATE and TEMP.
    ///
    /// From STOPWATCH or TIMER this lands on `(index + 1) % 3`, i.e. DATE or TEMP.
    pub fn auto_advance(&mut self) -> Mode {
        self.index = (self.index + 1) % Mode::AUTO_CYCLE_LEN;
        self.current()
    }

    pub fn auto_enabled(&self) -> bool {
        self.auto_enabled
    }

    pub fn set_auto(&mut self, enabled: bool) {
        self.auto_enabled = enabled;
    }
}
