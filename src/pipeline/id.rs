//! Identity types for the pipeline system.
//!
//! Positions are assigned by concurrent stages to each upstream outcome they
//! admit and never leave the stage.

use std::fmt;

/// Sequence position of an upstream outcome within one concurrent stage.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position(pub u64);

impl Position {
    pub const FIRST: Position = Position(0);

    /// Return this position and advance to the next one.
    #[inline]
    pub fn advance(&mut self) -> Position {
        let current = *self;
        self.0 += 1;
        current
    }

    #[inline]
    pub fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
