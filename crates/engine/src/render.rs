use crate::music::MusicWindow;
use crate::overlay::OverlaySchedule;
use crate::timeline::{GapFill, SegmentTiming};
use std::path::{Path, PathBuf};

/// A fully assembled ffmpeg invocation for one compositing step.
pub struct RenderCommand {
    pub ffmpeg_args: Vec<String>,
    pub output_path: PathBuf,
}

fn base_scale_chain(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:flags=lanczos:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
        w = width,
        h = height
    )
}

/// Filter graph that normalizes a scene clip to the target resolution and
/// fills the tail when the narration outlasts the footage. Consumes `[0:v]`
/// and yields `[outv]`.
pub fn scene_segment_filter(
    timing: &SegmentTiming,
    gap_fill: GapFill,
    width: u32,
    height: u32,
) -> String {
    let base = base_scale_chain(width, height);
    if timing.freeze_tail > 0.0 {
        match gap_fill {
            GapFill::FreezeLastFrame => format!(
                "[0:v]{base},tpad=stop_mode=clone:stop_duration={tail}[outv]",
                tail = timing.freeze_tail
            ),
            GapFill::ReverseReplay => format!(
                "[0:v]{base},split[fw][bw];\
                 [bw]reverse,setpts=PTS-STARTPTS,trim=duration={tail}[tailv];\
                 [fw][tailv]concat=n=2:v=1:a=0[outv]",
                tail = timing.freeze_tail
            ),
        }
    } else {
        format!("[0:v]{base}[outv]")
    }
}

/// Combine a silent scene clip with its narration track. The output runs
/// exactly as long as the narration.
pub fn scene_segment_args(
    clip: &Path,
    narration: &Path,
    output: &Path,
    timing: &SegmentTiming,
    gap_fill: GapFill,
    width: u32,
    height: u32,
) -> RenderCommand {
    let filter = scene_segment_filter(timing, gap_fill, width, height);
    let args = vec![
        "-i".to_string(),
        clip.to_string_lossy().to_string(),
        "-i".to_string(),
        narration.to_string_lossy().to_string(),
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "[outv]".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
        "-t".to_string(),
        timing.output_duration.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-crf".to_string(),
        "23".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ];
    RenderCommand {
        ffmpeg_args: args,
        output_path: output.to_path_buf(),
    }
}

/// Cumulative xfade offsets for a crossfaded concat: each fade starts
/// `fade` seconds before the end of the accumulated head.
pub fn crossfade_offsets(durations: &[f64], fade: f64) -> Vec<f64> {
    let mut offsets = Vec::new();
    let mut head = 0.0;
    for duration in &durations[..durations.len().saturating_sub(1)] {
        head += duration - fade;
        offsets.push(head);
    }
    offsets
}

/// Concatenate segments with fade crossfades on both video and audio.
pub fn crossfade_concat_args(
    segments: &[PathBuf],
    durations: &[f64],
    fade: f64,
    output: &Path,
) -> RenderCommand {
    assert_eq!(segments.len(), durations.len());
    let mut args: Vec<String> = Vec::new();
    for segment in segments {
        args.push("-i".to_string());
        args.push(segment.to_string_lossy().to_string());
    }

    if segments.len() == 1 {
        args.extend(["-c".to_string(), "copy".to_string()]);
    } else {
        let offsets = crossfade_offsets(durations, fade);
        let mut filter_parts = Vec::new();
        let mut video_label = "0:v".to_string();
        let mut audio_label = "0:a".to_string();
        for (i, offset) in offsets.iter().enumerate() {
            let next = i + 1;
            let out_v = format!("v{next}");
            let out_a = format!("a{next}");
            filter_parts.push(format!(
                "[{video_label}][{next}:v]xfade=transition=fade:duration={fade}:offset={offset}[{out_v}]"
            ));
            filter_parts.push(format!(
                "[{audio_label}][{next}:a]acrossfade=d={fade}[{out_a}]"
            ));
            video_label = out_v;
            audio_label = out_a;
        }
        args.push("-filter_complex".to_string());
        args.push(filter_parts.join(";"));
        args.push("-map".to_string());
        args.push(format!("[{video_label}]"));
        args.push("-map".to_string());
        args.push(format!("[{audio_label}]"));
        args.extend([
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-crf".to_string(),
            "23".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
        ]);
    }

    args.push("-y".to_string());
    args.push(output.to_string_lossy().to_string());
    RenderCommand {
        ffmpeg_args: args,
        output_path: output.to_path_buf(),
    }
}

/// Mix background-music windows under the main track's own audio.
pub fn music_mix_args(
    video: &Path,
    windows: &[MusicWindow],
    main_volume: f32,
    output: &Path,
) -> RenderCommand {
    let mut args = vec!["-i".to_string(), video.to_string_lossy().to_string()];
    for window in windows {
        args.push("-i".to_string());
        args.push(window.asset.to_string_lossy().to_string());
    }

    let mut filter_parts = Vec::new();
    let mut mix_inputs = String::from("[main]");
    filter_parts.push(format!("[0:a]volume={main_volume}[main]"));
    for (i, window) in windows.iter().enumerate() {
        let delay_ms = (window.start_time * 1000.0).round() as u64;
        filter_parts.push(format!(
            "[{input}:a]atrim=0:{duration},adelay={delay}|{delay},volume={volume}[m{i}]",
            input = i + 1,
            duration = window.duration,
            delay = delay_ms,
            volume = window.volume,
        ));
        mix_inputs.push_str(&format!("[m{i}]"));
    }
    filter_parts.push(format!(
        "{mix_inputs}amix=inputs={count}:duration=first:dropout_transition=0:normalize=0[outa]",
        count = windows.len() + 1
    ));

    args.push("-filter_complex".to_string());
    args.push(filter_parts.join(";"));
    args.extend([
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "[outa]".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]);
    RenderCommand {
        ffmpeg_args: args,
        output_path: output.to_path_buf(),
    }
}

/// Blit an overlay clip onto the main track at every scheduled start time,
/// padding the main track when the schedule requires it.
pub fn overlay_blit_args(
    main: &Path,
    overlay: &Path,
    schedule: &OverlaySchedule,
    overlay_duration: f64,
    main_duration: f64,
    output: &Path,
) -> RenderCommand {
    if schedule.is_empty() {
        // Passthrough copy when nothing was scheduled.
        return RenderCommand {
            ffmpeg_args: vec![
                "-i".to_string(),
                main.to_string_lossy().to_string(),
                "-c".to_string(),
                "copy".to_string(),
                "-y".to_string(),
                output.to_string_lossy().to_string(),
            ],
            output_path: output.to_path_buf(),
        };
    }

    let mut filter_parts = Vec::new();
    filter_parts.push(format!(
        "[1:v]trim=0:{overlay_duration},setpts=PTS-STARTPTS,format=yuva420p[ob]"
    ));
    if schedule.starts.len() > 1 {
        let outs: String = (0..schedule.starts.len()).map(|i| format!("[ib{i}]")).collect();
        filter_parts.push(format!("[ob]split={}{}", schedule.starts.len(), outs));
    } else {
        filter_parts.push("[ob]null[ib0]".to_string());
    }
    for (i, start) in schedule.starts.iter().enumerate() {
        filter_parts.push(format!("[ib{i}]setpts=PTS+{start}/TB[iv{i}]"));
    }

    match schedule.padded_main_duration {
        Some(padded) => {
            let pad = padded - main_duration;
            filter_parts.push(format!(
                "[0:v]format=yuv420p,tpad=stop_mode=clone:stop_duration={pad}[base]"
            ));
        }
        None => filter_parts.push("[0:v]format=yuv420p[base]".to_string()),
    }

    let mut current = "base".to_string();
    for i in 0..schedule.starts.len() {
        let next = if i == schedule.starts.len() - 1 {
            "outv".to_string()
        } else {
            format!("v{}", i + 1)
        };
        filter_parts.push(format!(
            "[{current}][iv{i}]overlay=(W-w)/2:(H-h)/2:eof_action=pass[{next}]"
        ));
        current = next;
    }

    filter_parts.push(format!(
        "[0:a]apad,atrim=duration={}[outa]",
        schedule.padded_main_duration.unwrap_or(main_duration)
    ));

    let args = vec![
        "-i".to_string(),
        main.to_string_lossy().to_string(),
        "-i".to_string(),
        overlay.to_string_lossy().to_string(),
        "-filter_complex".to_string(),
        filter_parts.join(";"),
        "-map".to_string(),
        "[outv]".to_string(),
        "-map".to_string(),
        "[outa]".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-crf".to_string(),
        "23".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ];
    RenderCommand {
        ffmpeg_args: args,
        output_path: output.to_path_buf(),
    }
}

/// Concatenate narration lines with a fixed silence gap between each pair.
pub fn audio_concat_args(inputs: &[PathBuf], gap: f64, output: &Path) -> RenderCommand {
    let mut args: Vec<String> = Vec::new();
    for input in inputs {
        args.push("-i".to_string());
        args.push(input.to_string_lossy().to_string());
    }

    let mut filter_parts = Vec::new();
    let mut concat_labels = Vec::new();
    for i in 0..inputs.len() {
        concat_labels.push(format!("[{i}:a]"));
        if i + 1 < inputs.len() {
            filter_parts.push(format!(
                "aevalsrc=0:d={gap}:s=48000,aformat=channel_layouts=stereo[gap{i}]"
            ));
            concat_labels.push(format!("[gap{i}]"));
        }
    }
    let total = concat_labels.len();
    filter_parts.push(format!(
        "{}concat=n={total}:v=0:a=1[outa]",
        concat_labels.join("")
    ));

    args.push("-filter_complex".to_string());
    args.push(filter_parts.join(";"));
    args.extend([
        "-map".to_string(),
        "[outa]".to_string(),
        "-c:a".to_string(),
        "libmp3lame".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]);
    RenderCommand {
        ffmpeg_args: args,
        output_path: output.to_path_buf(),
    }
}
