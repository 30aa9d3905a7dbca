use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-scene background-music request, taken from the music ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicCue {
    pub asset: Option<PathBuf>,
    pub volume: f32,
    pub skip: bool,
}

impl MusicCue {
    pub fn silent() -> Self {
        MusicCue {
            asset: None,
            volume: 0.0,
            skip: true,
        }
    }

    /// The asset that actually plays for this cue, if any.
    fn effective_asset(&self) -> Option<&PathBuf> {
        if self.skip {
            None
        } else {
            self.asset.as_ref()
        }
    }
}

/// One mixing window of the final track: play `asset` at `volume` from
/// `start_time` for `duration` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicWindow {
    pub asset: PathBuf,
    pub start_time: f64,
    pub duration: f64,
    pub volume: f32,
}

/// Walk the segment list in lock-step with the cue list and merge adjacent
/// segments that play the identical asset (or are both silent) into one
/// window. Silent windows advance the running offset but are omitted from
/// the result.
pub fn derive_music_windows(segment_durations: &[f64], cues: &[MusicCue]) -> Vec<MusicWindow> {
    assert!(
        cues.len() >= segment_durations.len(),
        "music cue list must cover every segment"
    );

    // (cue, merged duration) per surviving run
    let mut runs: Vec<(MusicCue, f64)> = Vec::new();
    let mut previous: Option<Option<PathBuf>> = None;

    for (cue, duration) in cues.iter().zip(segment_durations.iter()) {
        let active = cue.effective_asset().cloned();
        match runs.last_mut() {
            Some(last) if previous.as_ref() == Some(&active) => last.1 += duration,
            _ => {
                runs.push((cue.clone(), *duration));
                previous = Some(active);
            }
        }
    }

    let mut windows = Vec::new();
    let mut start = 0.0;
    for (cue, duration) in runs {
        if let Some(asset) = cue.effective_asset() {
            windows.push(MusicWindow {
                asset: asset.clone(),
                start_time: start,
                duration,
                volume: cue.volume,
            });
        }
        start += duration;
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue(asset: &str) -> MusicCue {
        MusicCue {
            asset: Some(PathBuf::from(asset)),
            volume: 0.3,
            skip: false,
        }
    }

    #[test]
    fn adjacent_identical_assets_merge() {
        let durations = [2.0, 3.0, 2.0, 4.0];
        let cues = [cue("a.mp3"), cue("a.mp3"), cue("b.mp3"), cue("b.mp3")];

        let windows = derive_music_windows(&durations, &cues);

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].asset, PathBuf::from("a.mp3"));
        assert_eq!(windows[0].start_time, 0.0);
        assert_eq!(windows[0].duration, 5.0);
        assert_eq!(windows[1].asset, PathBuf::from("b.mp3"));
        assert_eq!(windows[1].start_time, 5.0);
        assert_eq!(windows[1].duration, 6.0);
    }

    #[test]
    fn skipped_cues_advance_the_offset_without_emitting() {
        let durations = [2.0, 3.0, 4.0];
        let cues = [MusicCue::silent(), MusicCue::silent(), cue("b.mp3")];

        let windows = derive_music_windows(&durations, &cues);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_time, 5.0);
        assert_eq!(windows[0].duration, 4.0);
    }

    #[test]
    fn same_asset_separated_by_silence_gets_two_windows() {
        let durations = [2.0, 1.0, 2.0];
        let cues = [cue("a.mp3"), MusicCue::silent(), cue("a.mp3")];

        let windows = derive_music_windows(&durations, &cues);

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start_time, 0.0);
        assert_eq!(windows[1].start_time, 3.0);
    }

    #[test]
    fn skip_flag_silences_even_with_asset_set() {
        let durations = [2.0, 2.0];
        let mut skipped = cue("a.mp3");
        skipped.skip = true;
        let cues = [skipped, cue("a.mp3")];

        let windows = derive_music_windows(&durations, &cues);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_time, 2.0);
        assert_eq!(windows[0].duration, 2.0);
    }

    #[test]
    fn extra_trailing_cues_are_ignored() {
        let durations = [2.0];
        let cues = [cue("a.mp3"), cue("b.mp3")];

        let windows = derive_music_windows(&durations, &cues);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].duration, 2.0);
    }
}
