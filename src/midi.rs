//! MIDI export of a chord progression

use crate::chord_library::Chord;
use crate::config::{ChordsConfig, ExportConfig};
use crate::error::{Result as SplitResult, SplitError};
use crate::lab::ChordSegment;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Largest tempo value a set-tempo meta event holds, in microseconds per beat
const MAX_TEMPO_USPQ: u32 = 0xFF_FFFF;

/// Slowest tempo whose microseconds per beat still fit the set-tempo event
pub const MIN_TEMPO_BPM: f32 = 60_000_000.0 / MAX_TEMPO_USPQ as f32;

/// A note-on or note-off at an absolute tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct NoteEvent {
    tick: u32,
    /// false sorts first, so note-offs precede note-ons at the same tick
    is_on: bool,
    key: u8,
}

/// Export chord segments as a single-track MIDI file
///
/// Returns `Ok(false)` without writing when no segment has notes.
pub fn export_chords_midi(
    segments: &[ChordSegment],
    path: &Path,
    chords: &ChordsConfig,
    export: &ExportConfig,
) -> SplitResult<bool> {
    let bytes = match chords_to_midi_bytes(segments, chords.base_octave, export)? {
        Some(bytes) => bytes,
        None => {
            warn!("No chords with notes to export, skipping {}", path.display());
            return Ok(false);
        }
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;

    info!("Exported chord MIDI to {}", path.display());
    Ok(true)
}

/// Seconds to ticks at a fixed tempo
fn seconds_to_ticks(seconds: f32, ticks_per_beat: u16, tempo_bpm: f32) -> u32 {
    (seconds.max(0.0) * ticks_per_beat as f32 * tempo_bpm / 60.0).round() as u32
}

/// Serialize chord segments to SMF bytes, or `None` when nothing is playable
pub fn chords_to_midi_bytes(
    segments: &[ChordSegment],
    base_octave: i8,
    export: &ExportConfig,
) -> SplitResult<Option<Vec<u8>>> {
    let mut events = Vec::new();
    for segment in segments {
        let Some(chord) = Chord::parse(&segment.label) else {
            continue;
        };
        let start = seconds_to_ticks(segment.start_s, export.ticks_per_beat, export.tempo_bpm);
        let end = seconds_to_ticks(segment.end_s, export.ticks_per_beat, export.tempo_bpm);
        if end <= start {
            continue;
        }
        for key in chord.midi_notes(base_octave) {
            events.push(NoteEvent { tick: start, is_on: true, key });
            events.push(NoteEvent { tick: end, is_on: false, key });
        }
    }

    if events.is_empty() {
        return Ok(None);
    }
    events.sort();

    let tempo_uspq = ((60_000_000.0 / export.tempo_bpm) as u32).min(MAX_TEMPO_USPQ);
    let channel = u4::from(export.channel.min(15));
    let velocity = u7::from(export.velocity.min(127));

    let mut track_events = Vec::with_capacity(events.len() + 2);
    track_events.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(tempo_uspq))),
    });

    let mut current_tick = 0u32;
    for event in &events {
        let delta = event.tick - current_tick;
        current_tick = event.tick;
        let message = if event.is_on {
            MidiMessage::NoteOn {
                key: u7::from(event.key),
                vel: velocity,
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::from(event.key),
                vel: u7::from(0),
            }
        };
        track_events.push(TrackEvent {
            delta: u28::from(delta),
            kind: TrackEventKind::Midi { channel, message },
        });
    }

    track_events.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header {
            format: Format::SingleTrack,
            timing: Timing::Metrical(u15::from(export.ticks_per_beat)),
        },
        tracks: vec![track_events],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| SplitError::MidiExportError(format!("Failed to write MIDI data: {:?}", e)))?;
    Ok(Some(bytes))
}
