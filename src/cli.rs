use clap::Parser;
use std::path::PathBuf;

use crate::color::Rgb;
use crate::display::DisplayMode;
use crate::lighting::Pattern;

#[derive(Parser, Debug, Default)]
#[command(name = "scopelight")]
#[command(author, version, about = "Control surface for a microscope's 8x8 NeoPixel illuminator")]
pub struct Args {
    /// Display mode: terminal or headless
    #[arg(short, long)]
    pub mode: Option<DisplayMode>,

    /// Config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Initial brightness in percent (clamped to 0-100)
    #[arg(short, long, allow_negative_numbers = true)]
    pub brightness: Option<i64>,

    /// Initial base color, e.g. "#00d4ff"
    #[arg(long)]
    pub color: Option<Rgb>,

    /// Initial pattern
    #[arg(short, long)]
    pub pattern: Option<Pattern>,

    /// Animation frame rate for pulse and strobe
    #[arg(long)]
    pub fps: Option<u32>,

    /// Do not run the telemetry simulator
    #[arg(long)]
    pub no_telemetry: bool,

    /// Write a commented config template to the default path and exit
    #[arg(long)]
    pub init_config: bool,

    /// Send a command to a running instance and print the reply,
    /// e.g. --send "pattern pulse"
    #[arg(long, value_name = "COMMAND")]
    pub send: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let args = Args::try_parse_from([
            "scopelight",
            "--mode",
            "headless",
            "--brightness",
            "40",
            "--color",
            "#ff0000",
            "--pattern",
            "strobe",
        ])
        .unwrap();
        assert!(matches!(args.mode, Some(DisplayMode::Headless)));
        assert_eq!(args.brightness, Some(40));
        assert_eq!(args.color, Some(Rgb::new(255, 0, 0)));
        assert_eq!(args.pattern, Some(Pattern::Strobe));
    }

    #[test]
    fn rejects_unknown_pattern() {
        assert!(Args::try_parse_from(["scopelight", "--pattern", "disco"]).is_err());
    }
}
