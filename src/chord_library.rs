//! Chord labels and their piano voicings
//!
//! Labels use the `<root>:<quality>` shorthand emitted by chord recognizers
//! (`C:maj`, `F#:min7`, ...). Voicings are root position, bass to treble, with
//! the root in a configurable octave (octave 3 by default, `C4` = MIDI 60).

use std::fmt;

/// Sharp spelling of the twelve pitch classes, starting at C
pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Label emitted for segments without a chord
pub const NO_CHORD: &str = "N";

/// Octave of the chord root in the default voicing
pub const DEFAULT_BASE_OCTAVE: i8 = 3;

/// Chord qualities covered by the note table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChordQuality {
    Major,
    Minor,
    DominantSeventh,
    MajorSeventh,
    MinorSeventh,
}

impl ChordQuality {
    pub const ALL: [ChordQuality; 5] = [
        ChordQuality::Major,
        ChordQuality::Minor,
        ChordQuality::DominantSeventh,
        ChordQuality::MajorSeventh,
        ChordQuality::MinorSeventh,
    ];

    /// Semitone offsets from the root
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::DominantSeventh => &[0, 4, 7, 10],
            ChordQuality::MajorSeventh => &[0, 4, 7, 11],
            ChordQuality::MinorSeventh => &[0, 3, 7, 10],
        }
    }

    /// Shorthand used in labels
    pub fn shorthand(self) -> &'static str {
        match self {
            ChordQuality::Major => "maj",
            ChordQuality::Minor => "min",
            ChordQuality::DominantSeventh => "7",
            ChordQuality::MajorSeventh => "maj7",
            ChordQuality::MinorSeventh => "min7",
        }
    }

    fn from_shorthand(s: &str) -> Option<Self> {
        match s {
            "" | "maj" => Some(ChordQuality::Major),
            "min" => Some(ChordQuality::Minor),
            "7" => Some(ChordQuality::DominantSeventh),
            "maj7" => Some(ChordQuality::MajorSeventh),
            "min7" => Some(ChordQuality::MinorSeventh),
            _ => None,
        }
    }
}

/// A chord from the supported vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    /// Pitch class of the root, 0 = C
    pub root: u8,
    pub quality: ChordQuality,
}

impl Chord {
    pub fn new(root: u8, quality: ChordQuality) -> Self {
        Self {
            root: root % 12,
            quality,
        }
    }

    /// Parse a chord label, accepting flats, bare roots and slash basses
    ///
    /// Returns `None` for `N`/`X` and for qualities outside the vocabulary.
    pub fn parse(label: &str) -> Option<Self> {
        let simplified = simplify_chord_label(label);
        let (root, quality) = match simplified.split_once(':') {
            Some((root, quality)) => (root, quality),
            None => (simplified, ""),
        };
        let root = parse_pitch_class(root)?;
        let quality = ChordQuality::from_shorthand(quality)?;
        Some(Self::new(root, quality))
    }

    /// Pitch classes of the chord tones, root first
    pub fn pitch_classes(&self) -> Vec<u8> {
        self.quality
            .intervals()
            .iter()
            .map(|&i| (self.root + i) % 12)
            .collect()
    }

    /// MIDI note numbers of the root-position voicing
    pub fn midi_notes(&self, base_octave: i8) -> Vec<u8> {
        let root_midi = (base_octave as i16 + 1) * 12 + self.root as i16;
        self.quality
            .intervals()
            .iter()
            .map(|&i| (root_midi + i as i16).clamp(0, 127) as u8)
            .collect()
    }

    /// Note names of the root-position voicing (e.g. `C3`, `E3`, `G3`)
    pub fn note_names(&self, base_octave: i8) -> Vec<String> {
        self.midi_notes(base_octave)
            .into_iter()
            .map(midi_to_note)
            .collect()
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            PITCH_CLASS_NAMES[self.root as usize],
            self.quality.shorthand()
        )
    }
}

/// Every chord of the vocabulary, ordered by quality then root
pub fn vocabulary() -> Vec<Chord> {
    ChordQuality::ALL
        .iter()
        .flat_map(|&q| (0..12).map(move |root| Chord::new(root, q)))
        .collect()
}

/// Notes for a chord label in the default voicing, bass to treble
///
/// Unknown labels (including `N`) yield an empty list.
pub fn chord_notes(label: &str) -> Vec<String> {
    chord_notes_in_octave(label, DEFAULT_BASE_OCTAVE)
}

/// Notes for a chord label with the root placed in `base_octave`
pub fn chord_notes_in_octave(label: &str, base_octave: i8) -> Vec<String> {
    Chord::parse(label)
        .map(|chord| chord.note_names(base_octave))
        .unwrap_or_default()
}

/// All known chord labels, sorted
pub fn all_chords() -> Vec<String> {
    let mut labels: Vec<String> = vocabulary().iter().map(Chord::to_string).collect();
    labels.sort();
    labels
}

/// Drop a slash bass for display (`G:maj/B` becomes `G:maj`)
pub fn simplify_chord_label(label: &str) -> &str {
    let trimmed = label.trim();
    match trimmed.split_once('/') {
        Some((head, _)) => head.trim(),
        None => trimmed,
    }
}

/// Parse a root spelling such as `C`, `F#` or `Bb`
pub fn parse_pitch_class(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let letter = chars.next()?;
    let natural: i8 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let mut offset: i8 = 0;
    for accidental in chars {
        match accidental {
            '#' => offset += 1,
            'b' => offset -= 1,
            _ => return None,
        }
    }
    Some((natural + offset).rem_euclid(12) as u8)
}

/// Note name (`C4`) to MIDI number (60)
pub fn note_to_midi(note: &str) -> Option<u8> {
    let split = note.find(|c: char| c == '-' || c.is_ascii_digit())?;
    let (name, octave) = note.split_at(split);
    let pitch_class = parse_pitch_class(name)? as i16;
    let octave: i16 = octave.parse().ok()?;
    let midi = (octave + 1) * 12 + pitch_class;
    u8::try_from(midi).ok().filter(|&m| m <= 127)
}

/// MIDI number to sharp-spelled note name
pub fn midi_to_note(midi: u8) -> String {
    let octave = midi as i16 / 12 - 1;
    format!("{}{}", PITCH_CLASS_NAMES[(midi % 12) as usize], octave)
}
