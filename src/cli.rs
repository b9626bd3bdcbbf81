use clap::{Parser, Subcommand};
use std::path::PathBuf;

// Build version with stack info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Viewer: eframe 0.33\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Scroll-driven image sequence and video playback
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Settings file (default: scrollreel.json in the config directory)
    #[arg(short = 's', long = "settings", value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    /// Base directory for relative frame templates
    #[arg(short = 'a', long = "assets", value_name = "DIR", global = true)]
    pub assets_dir: Option<PathBuf>,

    /// Decode worker threads (overrides settings)
    #[arg(short = 'w', long = "workers", value_name = "N", global = true)]
    pub workers: Option<usize>,

    /// Enable debug logging to file (default: scrollreel.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE", global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Replay a scroll script headless, writing drawn frames and an event trace
    Render(RenderArgs),
    /// Open the interactive viewer (default)
    View,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RenderArgs {
    /// Scroll script (JSON); without it a full-page sweep is replayed
    #[arg(value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Output directory for canvas PNGs and trace.jsonl
    #[arg(short = 'o', long = "out", value_name = "DIR", default_value = "render")]
    pub out_dir: PathBuf,

    /// Sweep duration when no script is given
    #[arg(long = "sweep-ms", value_name = "MS", default_value_t = 3000)]
    pub sweep_ms: u64,

    /// Quiet period appended after the sweep
    #[arg(long = "hold-ms", value_name = "MS", default_value_t = 2000)]
    pub hold_ms: u64,

    /// Seconds to wait for frame decoding before replay
    #[arg(long = "decode-timeout", value_name = "SECS", default_value_t = 30)]
    pub decode_timeout: u64,

    /// Skip writing canvas PNGs (trace only)
    #[arg(long = "no-frames")]
    pub no_frames: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render_args() {
        let args = Args::try_parse_from(["scrollreel", "-vv", "render", "script.json", "-o", "out", "--no-frames"])
            .unwrap();
        assert_eq!(args.verbosity, 2);
        let Some(Command::Render(render)) = args.command else {
            panic!("expected render subcommand");
        };
        assert_eq!(render.script, Some(PathBuf::from("script.json")));
        assert_eq!(render.out_dir, PathBuf::from("out"));
        assert!(render.no_frames);
        assert_eq!(render.sweep_ms, 3000);
    }

    #[test]
    fn test_log_flag_optional_value() {
        let args = Args::try_parse_from(["scrollreel", "view", "--log"]).unwrap();
        assert!(matches!(args.command, Some(Command::View)));
        assert_eq!(args.log_file, Some(None));
    }

    #[test]
    fn test_default_is_viewer() {
        let args = Args::try_parse_from(["scrollreel"]).unwrap();
        assert!(args.command.is_none());
    }
}
