//! boxtrace CLI - render box scenes progressively to an image file.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use boxtrace::prelude::*;
use tracing_subscriber::EnvFilter;

const BUILD_DATE: &str = env!("BOXTRACE_BUILD_DATE");
const BUILD_TIME: &str = env!("BOXTRACE_BUILD_TIME");

const DEFAULT_FRAMES: u32 = 64;
const DEFAULT_SIZE: Extent = Extent::new(640, 360);

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "warn",
            _ => filtered_args.push(arg),
        }
    }
    init_tracing(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        "render" | "r" => cmd_render(&filtered_args[1..]),
        "demo-scene" | "demo" => cmd_demo_scene(),
        "settings" | "s" => cmd_settings(&filtered_args[1..]),
        "version" | "-V" | "--version" => {
            println!("boxtrace {} (built {} {})", env!("CARGO_PKG_VERSION"), BUILD_DATE, BUILD_TIME);
            Ok(())
        }
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        // Default: a scene file renders with default options
        other if Path::new(other).exists() => cmd_render(&filtered_args),
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// RUST_LOG wins over the verbosity flags.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("boxtrace={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_help() {
    println!("boxtrace - progressive box path tracer");
    println!();
    println!("USAGE:");
    println!("    boxtrace [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    r, render <scene.json|--demo>   Render frames and write the result");
    println!("    demo-scene                      Print the built-in demo scene as JSON");
    println!("    s, settings [--settings path]   Print effective tracer settings");
    println!("    version                         Show version and build date");
    println!("    h, help                         Show this help");
    println!();
    println!("RENDER OPTIONS:");
    println!("    -o, --output <file>    Output image (.exr, .hdr, .png) [default: render.exr]");
    println!("    -n, --frames <N>       Frames to accumulate [default: {DEFAULT_FRAMES}]");
    println!("    --size <WxH>           Image size [default: {DEFAULT_SIZE}]");
    println!("    --bounces <N>          Max bounce count, 0-{}", boxtrace::settings::MAX_BOUNCE_LIMIT);
    println!("    --rays <N>             Rays per pixel per frame, 0-{}", boxtrace::settings::RAYS_PER_PIXEL_LIMIT);
    println!("    --denoise              Accumulate frames (default)");
    println!("    --no-denoise           Present the last raw frame");
    println!("    --preview              Render through a preview camera (single raw frame)");
    println!("    --settings <file>      Settings JSON instead of the per-user file");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only warnings and errors");
    println!();
    println!("EXAMPLES:");
    println!("    boxtrace render --demo -o demo.png             # Demo room, 64 frames");
    println!("    boxtrace render room.json -n 512 --rays 4      # Longer convergence");
    println!("    boxtrace demo-scene > room.json                # Start a scene file");
    println!("    boxtrace -v render room.json --no-denoise      # Single noisy frame");
    println!();
    println!("NOTES:");
    println!("    - Passing a .json file directly is equivalent to 'render'");
    match TracerSettings::path() {
        Some(p) => println!("    - Settings file: {}", p.display()),
        None => println!("    - No per-user settings directory on this platform"),
    }
}

/// Parsed `render` arguments.
#[derive(Debug)]
struct RenderArgs {
    scene: Option<PathBuf>,
    output: PathBuf,
    frames: u32,
    size: Extent,
    bounces: Option<u32>,
    rays: Option<u32>,
    denoise: Option<bool>,
    preview: bool,
    settings: Option<PathBuf>,
}

fn next_value<'a>(it: &mut impl Iterator<Item = &'a str>, flag: &str) -> anyhow::Result<&'a str> {
    it.next().with_context(|| format!("{flag} needs a value"))
}

fn parse_u32(value: &str, flag: &str) -> anyhow::Result<u32> {
    value.parse().with_context(|| format!("{flag}: '{value}' is not a number"))
}

fn parse_render_args(args: &[&str]) -> anyhow::Result<RenderArgs> {
    let mut parsed = RenderArgs {
        scene: None,
        output: PathBuf::from("render.exr"),
        frames: DEFAULT_FRAMES,
        size: DEFAULT_SIZE,
        bounces: None,
        rays: None,
        denoise: None,
        preview: false,
        settings: None,
    };
    let mut demo = false;

    let mut it = args.iter().copied();
    while let Some(arg) = it.next() {
        match arg {
            "--demo" => demo = true,
            "-o" | "--output" => parsed.output = PathBuf::from(next_value(&mut it, arg)?),
            "-n" | "--frames" => parsed.frames = parse_u32(next_value(&mut it, arg)?, arg)?,
            "--size" => {
                let v = next_value(&mut it, arg)?;
                parsed.size = Extent::parse(v).with_context(|| format!("--size: expected WxH, got '{v}'"))?;
            }
            "--bounces" => parsed.bounces = Some(parse_u32(next_value(&mut it, arg)?, arg)?),
            "--rays" => parsed.rays = Some(parse_u32(next_value(&mut it, arg)?, arg)?),
            "--denoise" => parsed.denoise = Some(true),
            "--no-denoise" => parsed.denoise = Some(false),
            "--preview" => parsed.preview = true,
            "--settings" => parsed.settings = Some(PathBuf::from(next_value(&mut it, arg)?)),
            flag if flag.starts_with('-') => bail!("unknown option {flag}"),
            path => {
                if parsed.scene.is_some() {
                    bail!("more than one scene given ({path})");
                }
                parsed.scene = Some(PathBuf::from(path));
            }
        }
    }

    match (&parsed.scene, demo) {
        (Some(_), true) => bail!("give either a scene file or --demo, not both"),
        (None, false) => bail!("missing scene argument\nUsage: boxtrace render <scene.json|--demo> [options]"),
        _ => {}
    }
    if parsed.size.is_empty() {
        bail!("--size must be non-zero");
    }
    if parsed.frames == 0 {
        bail!("--frames must be at least 1");
    }
    Ok(parsed)
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<TracerSettings> {
    match path {
        Some(p) => TracerSettings::load_from(p).with_context(|| format!("reading settings {}", p.display())),
        None => Ok(TracerSettings::load()),
    }
}

fn cmd_render(args: &[&str]) -> anyhow::Result<()> {
    let args = parse_render_args(args)?;

    let mut settings = load_settings(args.settings.as_deref())?;
    if let Some(b) = args.bounces {
        settings.max_bounce_count = b;
    }
    if let Some(r) = args.rays {
        settings.rays_per_pixel = r;
    }
    if let Some(d) = args.denoise {
        settings.denoise = d;
    }
    settings.validate()?;

    let scene = match &args.scene {
        Some(path) => SceneDescription::load(path).with_context(|| format!("loading scene {}", path.display()))?,
        None => SceneDescription::demo(),
    };

    let mut camera = scene.camera.to_state(args.size.aspect());
    if args.preview {
        camera = camera.with_kind(CameraKind::Preview);
    }

    tracing::info!(
        "Rendering {} boxes at {} for {} frames (bounces {}, rays {}, {:?})",
        scene.boxes.len(),
        args.size,
        args.frames,
        settings.max_bounce_count,
        settings.rays_per_pixel,
        RenderMode::select(&camera, &settings),
    );

    let mut pipeline = FramePipeline::new(CpuDevice::new())?;
    let mut state = AccumulationState::new();
    let mut target = CpuTarget::new(args.size);

    let start = Instant::now();
    let progress_every = (args.frames / 10).max(1);
    let mut last = None;
    for i in 0..args.frames {
        let report = pipeline.render_frame(&mut state, &settings, &camera, &scene, &mut target)?;
        if (i + 1) % progress_every == 0 {
            tracing::info!("frame {}/{} (sample {})", i + 1, args.frames, report.sample_index);
        }
        last = Some(report);
    }
    let elapsed = start.elapsed();

    let stats = pipeline.pool_stats();
    tracing::debug!(
        "pool: {} acquired, {} released, {} allocated, {} reused",
        stats.acquired,
        stats.released,
        stats.allocated,
        stats.reused
    );
    if let Some(report) = &last {
        tracing::debug!("last frame: {:?}", report);
    }

    let frame = target.take_frame().context("no frame was presented")?;
    write_image(&frame, &args.output)?;
    tracing::info!(
        "Wrote {} in {:.2}s ({:.1} ms/frame)",
        args.output.display(),
        elapsed.as_secs_f64(),
        elapsed.as_secs_f64() * 1000.0 / args.frames as f64
    );
    Ok(())
}

fn write_image(frame: &CpuImage, path: &Path) -> anyhow::Result<()> {
    let extent = frame.extent();
    let buffer = image::Rgba32FImage::from_raw(extent.width, extent.height, frame.to_rgba_f32())
        .context("image buffer size mismatch")?;
    let image = image::DynamicImage::ImageRgba32F(buffer);

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "exr" => image.save(path),
        "hdr" => image::DynamicImage::ImageRgb32F(image.to_rgb32f()).save(path),
        "png" => image::DynamicImage::ImageRgba8(image.to_rgba8()).save(path),
        other => bail!("unsupported output format '.{other}' (use .exr, .hdr or .png)"),
    }
    .with_context(|| format!("writing {}", path.display()))
}

fn cmd_demo_scene() -> anyhow::Result<()> {
    println!("{}", SceneDescription::demo().to_json()?);
    Ok(())
}

fn cmd_settings(args: &[&str]) -> anyhow::Result<()> {
    let path = match args {
        [] => None,
        ["--settings", p] => Some(Path::new(*p)),
        _ => bail!("Usage: boxtrace settings [--settings path]"),
    };
    let settings = load_settings(path)?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render_defaults() {
        let a = parse_render_args(&["--demo"]).unwrap();
        assert!(a.scene.is_none());
        assert_eq!(a.frames, DEFAULT_FRAMES);
        assert_eq!(a.size, DEFAULT_SIZE);
        assert_eq!(a.output, PathBuf::from("render.exr"));
        assert!(!a.preview);
    }

    #[test]
    fn test_parse_render_options() {
        let a = parse_render_args(&[
            "room.json", "-o", "out.png", "-n", "8", "--size", "32x16", "--bounces", "2", "--rays", "1",
            "--no-denoise", "--preview",
        ])
        .unwrap();
        assert_eq!(a.scene, Some(PathBuf::from("room.json")));
        assert_eq!(a.output, PathBuf::from("out.png"));
        assert_eq!(a.frames, 8);
        assert_eq!(a.size, Extent::new(32, 16));
        assert_eq!(a.bounces, Some(2));
        assert_eq!(a.rays, Some(1));
        assert_eq!(a.denoise, Some(false));
        assert!(a.preview);
    }

    #[test]
    fn test_parse_render_errors() {
        assert!(parse_render_args(&[]).is_err());
        assert!(parse_render_args(&["a.json", "--demo"]).is_err());
        assert!(parse_render_args(&["--demo", "--frames"]).is_err());
        assert!(parse_render_args(&["--demo", "--size", "big"]).is_err());
        assert!(parse_render_args(&["--demo", "--frames", "0"]).is_err());
        assert!(parse_render_args(&["--demo", "--bogus"]).is_err());
    }

    #[test]
    fn test_write_image_formats() {
        let dir = tempfile::tempdir().unwrap();
        let frame = CpuImage::new(Extent::new(4, 3));
        for name in ["a.exr", "a.hdr", "a.png"] {
            let path = dir.path().join(name);
            write_image(&frame, &path).unwrap();
            assert!(path.exists());
        }
        assert!(write_image(&frame, &dir.path().join("a.bmp")).is_err());
    }
}
