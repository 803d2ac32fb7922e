// framereel demo
// Renders an animated scene headlessly and records it

use anyhow::{bail, Context, Result};
use framereel::config::FrameReelConfig;
use framereel::recording::clamp_quality;
use framereel::{
    ContainerFormat, HostEvent, PixelSource, RecorderError, RecordingHost, RecordingSession,
    RecordingStats, RenderHost,
};
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const USAGE: &str = "Usage: framereel-demo [--config <file>] [--format avi|gif|webp] [--output <file>] \
[--frames <max>] [--fps <n>] [--quality <1-100>] [--size <WxH>] [--ticks <n>] [--auto] \
[--duration <10s>] [--async] [--no-pace] [--json]";

/// A box bouncing over a scrolling gradient
struct DemoScene {
    width: u32,
    height: u32,
    tick: u64,
    box_x: i64,
    box_y: i64,
    vel_x: i64,
    vel_y: i64,
}

impl DemoScene {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
            box_x: 0,
            box_y: 0,
            vel_x: 3,
            vel_y: 2,
        }
    }

    fn box_size(&self) -> i64 {
        (self.width.min(self.height) / 6).max(2) as i64
    }
}

impl RenderHost for DemoScene {
    fn on_tick(&mut self) -> Result<(), RecorderError> {
        self.tick += 1;
        let size = self.box_size();
        let (max_x, max_y) = (self.width as i64 - size, self.height as i64 - size);
        self.box_x += self.vel_x;
        self.box_y += self.vel_y;
        if self.box_x <= 0 || self.box_x >= max_x {
            self.vel_x = -self.vel_x;
            self.box_x = self.box_x.clamp(0, max_x.max(0));
        }
        if self.box_y <= 0 || self.box_y >= max_y {
            self.vel_y = -self.vel_y;
            self.box_y = self.box_y.clamp(0, max_y.max(0));
        }
        Ok(())
    }
}

impl PixelSource for DemoScene {
    fn bounds(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), RecorderError> {
        let stride = self.row_stride();
        let size = self.box_size();
        let shift = self.tick as u32;
        for y in 0..self.height {
            let row = &mut dst[y as usize * stride..][..self.width as usize * 4];
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let x = x as u32;
                let inside = (x as i64) >= self.box_x
                    && (x as i64) < self.box_x + size
                    && (y as i64) >= self.box_y
                    && (y as i64) < self.box_y + size;
                if inside {
                    px.copy_from_slice(&[255, 255, 255, 255]);
                } else {
                    px[0] = (x.wrapping_add(shift) % self.width * 255 / self.width) as u8;
                    px[1] = (y * 255 / self.height) as u8;
                    px[2] = shift.wrapping_mul(4) as u8;
                    px[3] = 255;
                }
            }
        }
        Ok(())
    }
}

struct Options {
    config_path: Option<PathBuf>,
    format: Option<ContainerFormat>,
    output: Option<PathBuf>,
    max_frames: Option<u32>,
    fps: Option<u32>,
    quality: Option<u8>,
    size: (u32, u32),
    ticks: Option<u64>,
    auto: bool,
    duration: Option<String>,
    async_encoding: bool,
    pace: bool,
    json: bool,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut opts = Options {
        config_path: None,
        format: None,
        output: None,
        max_frames: None,
        fps: None,
        quality: None,
        size: (320, 240),
        ticks: None,
        auto: false,
        duration: None,
        async_encoding: false,
        pace: true,
        json: false,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" => opts.config_path = Some(PathBuf::from(next_value(args, &mut i)?)),
            "--format" => {
                let name = next_value(args, &mut i)?;
                opts.format =
                    Some(ContainerFormat::parse(name).with_context(|| format!("unknown format {:?}", name))?);
            }
            "--output" => opts.output = Some(PathBuf::from(next_value(args, &mut i)?)),
            "--frames" => opts.max_frames = Some(next_value(args, &mut i)?.parse().context("--frames")?),
            "--fps" => opts.fps = Some(next_value(args, &mut i)?.parse().context("--fps")?),
            "--quality" => {
                let raw: i64 = next_value(args, &mut i)?.parse().context("--quality")?;
                opts.quality = Some(clamp_quality(raw));
            }
            "--ticks" => opts.ticks = Some(next_value(args, &mut i)?.parse().context("--ticks")?),
            "--size" => opts.size = parse_size(next_value(args, &mut i)?)?,
            "--duration" => {
                opts.duration = Some(next_value(args, &mut i)?.clone());
                opts.auto = true;
            }
            "--auto" => opts.auto = true,
            "--async" => opts.async_encoding = true,
            "--no-pace" => opts.pace = false,
            "--json" => opts.json = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("unknown argument {:?}\n{}", other, USAGE),
        }
        i += 1;
    }
    Ok(opts)
}

fn next_value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a String> {
    let flag = &args[*i];
    *i += 1;
    args.get(*i)
        .with_context(|| format!("{} needs a value\n{}", flag, USAGE))
}

fn parse_size(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s.split_once('x').with_context(|| format!("size {:?} is not WxH", s))?;
    let size = (w.parse().context("width")?, h.parse().context("height")?);
    if size.0 == 0 || size.1 == 0 {
        bail!("size must be non-zero");
    }
    Ok(size)
}

fn build_config(opts: &Options) -> Result<FrameReelConfig> {
    let mut config = match &opts.config_path {
        Some(path) => FrameReelConfig::load_from_file(path)?,
        None => FrameReelConfig::load_or_default(),
    };
    config.apply_env();

    let rec = &mut config.recording;
    if let Some(output) = &opts.output {
        if let Some(format) = ContainerFormat::from_path(output) {
            rec.format = format;
        }
        rec.output_path = Some(output.clone());
    }
    if let Some(format) = opts.format {
        rec.format = format;
    }
    if let Some(max_frames) = opts.max_frames {
        rec.max_frames = max_frames;
    }
    if let Some(fps) = opts.fps {
        rec.fps = fps;
    }
    if let Some(quality) = opts.quality {
        rec.quality = quality;
    }
    if opts.async_encoding {
        rec.async_encoding = true;
    }
    if opts.auto {
        config.auto_record.enabled = true;
    }
    if let Some(duration) = &opts.duration {
        config.auto_record.duration = duration.clone();
    }

    config.validate()?;
    Ok(config)
}

fn report(stats: &RecordingStats, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
    } else {
        println!(
            "Saved {} ({} frames, {:.2}s, {} bytes, {} dropped, {} skipped)",
            stats.output_path,
            stats.video_frames,
            stats.duration_secs,
            stats.bytes_written,
            stats.dropped_frames,
            stats.skipped_frames
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    framereel::init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = parse_args(&args)?;
    let config = build_config(&opts)?;
    let fps = config.recording.fps;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;

    let scene = DemoScene::new(opts.size.0, opts.size.1);
    let session = RecordingSession::new(config.recording.clone());
    let mut host = RecordingHost::new(scene, session);
    if config.auto_record.enabled {
        host = host.with_auto_record(config.auto_record.duration());
    } else {
        host.request_toggle();
    }

    if !opts.json {
        println!(
            "Recording {} {}x{} @ {}fps to {}",
            config.recording.format,
            opts.size.0,
            opts.size.1,
            fps,
            config.recording.resolved_output_path().display()
        );
    }

    let frame_interval = Duration::from_secs_f64(1.0 / fps as f64);
    let mut saved = false;
    loop {
        let tick_start = Instant::now();

        if interrupted.load(Ordering::SeqCst) {
            log::info!("Interrupted, saving recording");
            if let Some(stats) = host.finish()? {
                report(&stats, opts.json)?;
                saved = true;
            }
            break;
        }
        if opts.ticks.map_or(false, |n| host.ticks() >= n) {
            if let Some(stats) = host.finish()? {
                report(&stats, opts.json)?;
                saved = true;
            }
            break;
        }

        match host.tick()? {
            HostEvent::Saved(stats) => {
                report(&stats, opts.json)?;
                saved = true;
                // Exiting once the file is written is the demo's policy.
                break;
            }
            HostEvent::Skipped => log::warn!("Frame {} skipped", host.ticks()),
            _ => {}
        }

        if opts.pace {
            if let Some(rest) = frame_interval.checked_sub(tick_start.elapsed()) {
                std::thread::sleep(rest);
            }
        }
    }

    if !saved && !opts.json {
        println!("Nothing was recorded");
    }
    Ok(())
}
