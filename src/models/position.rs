//! Bar/beat positions and time signatures
//!
//! A `Position` is the coordinate every leadsheet item lives at. Beats are
//! exact rationals so that triplet and swung placements compare precisely.

use num_rational::Rational32;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Beat offset within a bar (0 = downbeat)
pub type Beat = Rational32;

/// An immutable (bar, beat) coordinate
///
/// Ordering compares the bar first, then the beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub bar: u32,
    pub beat: Beat,
}

impl Position {
    pub fn new(bar: u32, beat: Beat) -> Self {
        Self { bar, beat }
    }

    /// Position on the downbeat of a bar
    pub fn bar_start(bar: u32) -> Self {
        Self::new(bar, Beat::from_integer(0))
    }

    /// Position on a whole beat of a bar
    pub fn on_beat(bar: u32, beat: i32) -> Self {
        Self::new(bar, Beat::from_integer(beat))
    }

    /// Position on a fractional beat, e.g. `(1, 3, 2)` is bar 1 beat 1.5
    pub fn on_fraction(bar: u32, numer: i32, denom: i32) -> Self {
        Self::new(bar, Beat::new(numer, denom))
    }

    pub fn is_bar_start(&self) -> bool {
        self.beat == Beat::from_integer(0)
    }

    /// Same beat, different bar
    pub fn with_bar(self, bar: u32) -> Self {
        Self { bar, ..self }
    }

    /// Beat as a float, for display and JS interop only
    pub fn beat_f32(&self) -> f32 {
        *self.beat.numer() as f32 / *self.beat.denom() as f32
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.beat.is_integer() {
            write!(f, "[{}:{}]", self.bar, self.beat.numer())
        } else {
            write!(f, "[{}:{}/{}]", self.bar, self.beat.numer(), self.beat.denom())
        }
    }
}

/// Time signature carried by a section
///
/// The upper number is the beat count of a bar: every item in a bar governed
/// by this signature must sit at a beat strictly below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSignature {
    upper: u8,
    lower: u8,
}

impl TimeSignature {
    pub const FOUR_FOUR: TimeSignature = TimeSignature { upper: 4, lower: 4 };
    pub const THREE_FOUR: TimeSignature = TimeSignature { upper: 3, lower: 4 };
    pub const TWO_FOUR: TimeSignature = TimeSignature { upper: 2, lower: 4 };
    pub const SIX_EIGHT: TimeSignature = TimeSignature { upper: 6, lower: 8 };

    /// Build a time signature, rejecting unusable values
    ///
    /// The upper number must be 1..=16 and the lower one of 2, 4, 8 or 16.
    pub fn new(upper: u8, lower: u8) -> Option<Self> {
        if !(1..=16).contains(&upper) || ![2, 4, 8, 16].contains(&lower) {
            return None;
        }
        Some(Self { upper, lower })
    }

    pub fn upper(&self) -> u8 {
        self.upper
    }

    pub fn lower(&self) -> u8 {
        self.lower
    }

    /// Number of beats in one bar
    pub fn beats_per_bar(&self) -> Beat {
        Beat::from_integer(i32::from(self.upper))
    }

    /// Check whether a beat offset falls inside one bar of this signature
    pub fn contains_beat(&self, beat: Beat) -> bool {
        beat >= Beat::from_integer(0) && beat < self.beats_per_bar()
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::FOUR_FOUR
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.upper, self.lower)
    }
}

impl FromStr for TimeSignature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (upper, lower) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("Invalid time signature '{}': expected 'N/D'", s))?;
        let upper: u8 = upper
            .trim()
            .parse()
            .map_err(|_| format!("Invalid time signature upper value in '{}'", s))?;
        let lower: u8 = lower
            .trim()
            .parse()
            .map_err(|_| format!("Invalid time signature lower value in '{}'", s))?;
        TimeSignature::new(upper, lower)
            .ok_or_else(|| format!("Unsupported time signature '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ordering() {
        let a = Position::on_beat(1, 3);
        let b = Position::on_beat(2, 0);
        let c = Position::on_fraction(2, 1, 2);

        assert!(a < b);
        assert!(b < c);
        assert_eq!(Position::on_fraction(2, 2, 4), c);
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::on_beat(3, 2).to_string(), "[3:2]");
        assert_eq!(Position::on_fraction(0, 5, 2).to_string(), "[0:5/2]");
    }

    #[test]
    fn test_time_signature_bounds() {
        assert!(TimeSignature::new(0, 4).is_none());
        assert!(TimeSignature::new(4, 3).is_none());
        assert!(TimeSignature::new(17, 4).is_none());
        assert_eq!(TimeSignature::new(3, 4), Some(TimeSignature::THREE_FOUR));
    }

    #[test]
    fn test_time_signature_contains_beat() {
        let ts = TimeSignature::THREE_FOUR;
        assert!(ts.contains_beat(Beat::from_integer(0)));
        assert!(ts.contains_beat(Beat::new(5, 2)));
        assert!(!ts.contains_beat(Beat::from_integer(3)));
        assert!(!ts.contains_beat(Beat::from_integer(-1)));
    }

    #[test]
    fn test_time_signature_parse() {
        assert_eq!("6/8".parse::<TimeSignature>(), Ok(TimeSignature::SIX_EIGHT));
        assert!("6-8".parse::<TimeSignature>().is_err());
        assert!("5/5".parse::<TimeSignature>().is_err());
    }
}
