//! Chord symbol payloads
//!
//! A chord symbol is stored as a parsed `ChordName` (root, quality suffix,
//! optional bass) plus rendering flags and at most one alternate chord.
//! The alternate lives inside the payload so a position never holds two
//! chord symbol items.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Natural note letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteLetter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteLetter {
    fn from_char(ch: char) -> Option<Self> {
        match ch {
            'C' => Some(NoteLetter::C),
            'D' => Some(NoteLetter::D),
            'E' => Some(NoteLetter::E),
            'F' => Some(NoteLetter::F),
            'G' => Some(NoteLetter::G),
            'A' => Some(NoteLetter::A),
            'B' => Some(NoteLetter::B),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            NoteLetter::C => 'C',
            NoteLetter::D => 'D',
            NoteLetter::E => 'E',
            NoteLetter::F => 'F',
            NoteLetter::G => 'G',
            NoteLetter::A => 'A',
            NoteLetter::B => 'B',
        }
    }

    /// Semitones above C
    fn semitones(self) -> i32 {
        match self {
            NoteLetter::C => 0,
            NoteLetter::D => 2,
            NoteLetter::E => 4,
            NoteLetter::F => 5,
            NoteLetter::G => 7,
            NoteLetter::A => 9,
            NoteLetter::B => 11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accidental {
    Flat,
    Natural,
    Sharp,
}

impl Accidental {
    fn offset(self) -> i32 {
        match self {
            Accidental::Flat => -1,
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
        }
    }
}

/// A spelled note (letter + accidental)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub letter: NoteLetter,
    pub accidental: Accidental,
}

// Spellings used when transposing, indexed by pitch class
const SHARP_SPELLINGS: [(NoteLetter, Accidental); 12] = [
    (NoteLetter::C, Accidental::Natural),
    (NoteLetter::C, Accidental::Sharp),
    (NoteLetter::D, Accidental::Natural),
    (NoteLetter::D, Accidental::Sharp),
    (NoteLetter::E, Accidental::Natural),
    (NoteLetter::F, Accidental::Natural),
    (NoteLetter::F, Accidental::Sharp),
    (NoteLetter::G, Accidental::Natural),
    (NoteLetter::G, Accidental::Sharp),
    (NoteLetter::A, Accidental::Natural),
    (NoteLetter::A, Accidental::Sharp),
    (NoteLetter::B, Accidental::Natural),
];

const FLAT_SPELLINGS: [(NoteLetter, Accidental); 12] = [
    (NoteLetter::C, Accidental::Natural),
    (NoteLetter::D, Accidental::Flat),
    (NoteLetter::D, Accidental::Natural),
    (NoteLetter::E, Accidental::Flat),
    (NoteLetter::E, Accidental::Natural),
    (NoteLetter::F, Accidental::Natural),
    (NoteLetter::G, Accidental::Flat),
    (NoteLetter::G, Accidental::Natural),
    (NoteLetter::A, Accidental::Flat),
    (NoteLetter::A, Accidental::Natural),
    (NoteLetter::B, Accidental::Flat),
    (NoteLetter::B, Accidental::Natural),
];

impl Note {
    pub fn new(letter: NoteLetter, accidental: Accidental) -> Self {
        Self { letter, accidental }
    }

    /// Pitch class 0..12 (C = 0)
    pub fn pitch_class(&self) -> u8 {
        (self.letter.semitones() + self.accidental.offset()).rem_euclid(12) as u8
    }

    /// Transpose by semitones, keeping flat spelling for flat notes
    pub fn transposed(&self, semitones: i32) -> Note {
        let pc = (i32::from(self.pitch_class()) + semitones).rem_euclid(12) as usize;
        let (letter, accidental) = if self.accidental == Accidental::Flat {
            FLAT_SPELLINGS[pc]
        } else {
            SHARP_SPELLINGS[pc]
        };
        Note { letter, accidental }
    }

    /// Parse a note at the start of `text`, returning it and the rest of the text
    fn parse_prefix(text: &str) -> Option<(Note, &str)> {
        let mut chars = text.chars();
        let letter = NoteLetter::from_char(chars.next()?)?;
        let rest = chars.as_str();
        if let Some(rest) = rest.strip_prefix('#') {
            Some((Note::new(letter, Accidental::Sharp), rest))
        } else if let Some(rest) = rest.strip_prefix('b') {
            Some((Note::new(letter, Accidental::Flat), rest))
        } else {
            Some((Note::new(letter, Accidental::Natural), rest))
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let acc = match self.accidental {
            Accidental::Flat => "b",
            Accidental::Natural => "",
            Accidental::Sharp => "#",
        };
        write!(f, "{}{}", self.letter.as_char(), acc)
    }
}

/// A chord name such as `Cm7`, `F#7b9/E` or `Bbmaj7`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChordName {
    pub root: Note,
    /// Quality text following the root (e.g. "m7", "maj7#11", "")
    pub suffix: String,
    pub bass: Option<Note>,
}

impl ChordName {
    pub fn new(root: Note, suffix: impl Into<String>, bass: Option<Note>) -> Self {
        Self {
            root,
            suffix: suffix.into(),
            bass,
        }
    }

    /// Transpose root and bass by semitones; the quality is unchanged
    pub fn transposed(&self, semitones: i32) -> ChordName {
        ChordName {
            root: self.root.transposed(semitones),
            suffix: self.suffix.clone(),
            bass: self.bass.map(|b| b.transposed(semitones)),
        }
    }
}

impl fmt::Display for ChordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.suffix)?;
        if let Some(bass) = self.bass {
            write!(f, "/{}", bass)?;
        }
        Ok(())
    }
}

impl FromStr for ChordName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (root, rest) =
            Note::parse_prefix(text).ok_or_else(|| format!("Invalid chord root in '{}'", s))?;

        // A trailing "/X" is a slash bass only when X is a note; "6/9" stays in the suffix
        let (suffix, bass) = match rest.rsplit_once('/') {
            Some((_, "")) => return Err(format!("Missing bass note in '{}'", s)),
            Some((suffix, bass_text)) => match Note::parse_prefix(bass_text) {
                Some((bass, "")) => (suffix, Some(bass)),
                _ => (rest, None),
            },
            None => (rest, None),
        };

        if suffix.chars().any(char::is_whitespace) {
            return Err(format!("Invalid chord quality in '{}'", s));
        }

        Ok(ChordName::new(root, suffix, bass))
    }
}

/// How a chord is accented when played back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Accent {
    #[default]
    None,
    Light,
    Strong,
}

/// Rendering flags carried with a chord symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChordRendering {
    pub accent: Accent,
    /// Sustain the chord until the next one instead of re-striking
    pub hold: bool,
}

/// Alternate chord used instead of the main one when `condition` applies
///
/// The condition is an opaque label for the consumer (e.g. a marker name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlternateChord {
    pub chord: ChordName,
    pub condition: String,
}

/// Payload of a chord symbol item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChordSymbol {
    pub chord: ChordName,
    #[serde(default)]
    pub rendering: ChordRendering,
    #[serde(default)]
    pub alternate: Option<AlternateChord>,
}

impl ChordSymbol {
    pub fn new(chord: ChordName) -> Self {
        Self {
            chord,
            rendering: ChordRendering::default(),
            alternate: None,
        }
    }

    /// Parse a chord symbol from its name, e.g. `"Dm7b5"`
    pub fn parse(name: &str) -> Result<Self, String> {
        Ok(Self::new(name.parse()?))
    }

    pub fn with_rendering(mut self, rendering: ChordRendering) -> Self {
        self.rendering = rendering;
        self
    }

    pub fn with_alternate(mut self, alternate: Option<AlternateChord>) -> Self {
        self.alternate = alternate;
        self
    }

    /// Transpose the chord and its alternate
    pub fn transposed(&self, semitones: i32) -> ChordSymbol {
        ChordSymbol {
            chord: self.chord.transposed(semitones),
            rendering: self.rendering,
            alternate: self.alternate.as_ref().map(|alt| AlternateChord {
                chord: alt.chord.transposed(semitones),
                condition: alt.condition.clone(),
            }),
        }
    }
}

impl fmt::Display for ChordSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.chord)
    }
}
