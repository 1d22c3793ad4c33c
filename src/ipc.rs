use anyhow::{Context, Result};
use rand::Rng;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::color::Rgb;
use crate::engine;
use crate::grid::GRID_LEN;
use crate::lighting::Pattern;
use crate::preset::PresetCatalog;
use crate::snapshot::Snapshot;
use crate::state::ControlSurfaceState;

/// What a client asked for, before it reaches the render loop
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Brightness(i64),
    Color(Rgb),
    Pattern(Pattern),
    Power(PowerSwitch),
    Preset(String),
    Click(usize),
    Clear,
    Reset,
    Status,
    Frame,
    Export(PathBuf),
    Import(PathBuf),
    ListPresets,
    ListPatterns,
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerSwitch {
    On,
    Off,
    Toggle,
}

/// A request paired with the channel its reply goes back on
pub struct IpcCommand {
    pub request: Request,
    pub reply: oneshot::Sender<String>,
}

/// Get the socket path for IPC
pub fn socket_path() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(dir).join("scopelight.sock")
    } else {
        PathBuf::from("/tmp/scopelight.sock")
    }
}

/// Parse a protocol line into a Request
pub fn parse_request(line: &str) -> Result<Request> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        ["brightness", val] => {
            let v: i64 = val.parse().context("Invalid brightness value")?;
            Ok(Request::Brightness(v))
        }
        ["color", val] => {
            let color = Rgb::from_hex(val)
                .ok_or_else(|| anyhow::anyhow!("Invalid color: {}", val))?;
            Ok(Request::Color(color))
        }
        ["pattern", name] => {
            let pattern = name.parse::<Pattern>().map_err(anyhow::Error::msg)?;
            Ok(Request::Pattern(pattern))
        }
        ["power", "on"] => Ok(Request::Power(PowerSwitch::On)),
        ["power", "off"] => Ok(Request::Power(PowerSwitch::Off)),
        ["power", "toggle"] | ["toggle"] => Ok(Request::Power(PowerSwitch::Toggle)),
        ["preset", rest @ ..] if !rest.is_empty() => Ok(Request::Preset(rest.join(" "))),
        ["click", val] => {
            let index: usize = val.parse().context("Invalid pixel index")?;
            if index >= GRID_LEN {
                anyhow::bail!("Pixel index {} out of range 0..{}", index, GRID_LEN);
            }
            Ok(Request::Click(index))
        }
        ["clear"] => Ok(Request::Clear),
        ["reset"] => Ok(Request::Reset),
        ["status"] => Ok(Request::Status),
        ["frame"] => Ok(Request::Frame),
        ["export", path] => Ok(Request::Export(PathBuf::from(path))),
        ["import", path] => Ok(Request::Import(PathBuf::from(path))),
        ["list", "presets"] => Ok(Request::ListPresets),
        ["list", "patterns"] => Ok(Request::ListPatterns),
        ["ping"] => Ok(Request::Ping),
        _ => Err(anyhow::anyhow!("Unknown command: {}", line)),
    }
}

/// Apply a request to the control surface and build the reply line
pub fn process_request<R: Rng + ?Sized>(
    request: Request,
    state: &mut ControlSurfaceState,
    presets: &PresetCatalog,
    rng: &mut R,
) -> String {
    match request {
        Request::Brightness(value) => {
            state.set_brightness(value);
            format!("ok: {}", state.config.brightness())
        }
        Request::Color(color) => {
            state.set_color(color);
            format!("ok: {}", color)
        }
        Request::Pattern(pattern) => {
            state.set_pattern(pattern);
            format!("ok: {}", pattern)
        }
        Request::Power(switch) => {
            let enabled = match switch {
                PowerSwitch::On => {
                    state.set_enabled(true);
                    true
                }
                PowerSwitch::Off => {
                    state.set_enabled(false);
                    false
                }
                PowerSwitch::Toggle => state.toggle_power(),
            };
            format!("ok: {}", if enabled { "on" } else { "off" })
        }
        Request::Preset(key) => match presets.find(&key) {
            Some(preset) => {
                state.apply_preset(preset);
                format!("ok: {}", preset.name)
            }
            None => format!("err: no preset '{}'", key),
        },
        Request::Click(index) => {
            let color = state.click_pixel(index, rng);
            format!("ok: {} {}", index, color)
        }
        Request::Clear => {
            state.clear_all_pixels();
            "ok: cleared".to_string()
        }
        Request::Reset => {
            state.reset();
            "ok: reset".to_string()
        }
        Request::Status => {
            let config = &state.config;
            format!(
                "ok: enabled={} pattern={} brightness={} color={} speed={} active_pixels={}",
                config.enabled(),
                config.pattern(),
                config.brightness(),
                config.color(),
                config.speed(),
                state.grid.active_count(),
            )
        }
        Request::Frame => {
            let frame = state.render_frame(engine::wall_clock());
            let cells: Vec<String> = frame
                .iter()
                .map(|p| format!("{}@{:.2}", p.color.to_rgb(), p.opacity))
                .collect();
            format!("ok: {}", cells.join(" "))
        }
        Request::Export(path) => match state.snapshot().save(&path) {
            Ok(()) => {
                info!("Exported state to {}", path.display());
                format!("ok: {}", path.display())
            }
            Err(e) => format!("err: {}", e),
        },
        Request::Import(path) => {
            match Snapshot::load(&path).and_then(|snapshot| state.restore(&snapshot)) {
                Ok(()) => format!("ok: {}", path.display()),
                Err(e) => {
                    warn!("Import from {} rejected: {}", path.display(), e);
                    format!("err: {}", e)
                }
            }
        }
        Request::ListPresets => format!("ok: {}", presets.names().join(",")),
        Request::ListPatterns => {
            let names: Vec<&str> = Pattern::all().iter().map(|p| p.name()).collect();
            format!("ok: {}", names.join(","))
        }
        Request::Ping => "ok: pong".to_string(),
    }
}

/// Handle a single client connection
async fn handle_client(stream: UnixStream, cmd_tx: mpsc::Sender<IpcCommand>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();
    buf_reader.read_line(&mut line).await?;
    let line = line.trim();

    if line.is_empty() {
        return Ok(());
    }

    let request = match parse_request(line) {
        Ok(request) => request,
        Err(e) => {
            writer
                .write_all(format!("err: {}\n", e).as_bytes())
                .await?;
            return Ok(());
        }
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    cmd_tx
        .send(IpcCommand {
            request,
            reply: reply_tx,
        })
        .await
        .map_err(|_| anyhow::anyhow!("Control loop has shut down"))?;

    let response = reply_rx
        .await
        .unwrap_or_else(|_| "err: internal error".to_string());

    writer
        .write_all(format!("{}\n", response).as_bytes())
        .await?;
    Ok(())
}

/// Start the IPC server, listening for commands on a Unix socket
pub async fn start_server(cmd_tx: mpsc::Sender<IpcCommand>) -> Result<()> {
    let path = socket_path();

    // Remove stale socket from previous run
    let _ = std::fs::remove_file(&path);

    let listener = UnixListener::bind(&path).context("Failed to bind IPC socket")?;

    info!("IPC server listening on {}", path.display());

    loop {
        let (stream, _) = listener.accept().await?;
        let cmd_tx = cmd_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, cmd_tx).await {
                debug!("IPC client error: {}", e);
            }
        });
    }
}

/// Send a command to a running scopelight instance (client mode)
pub async fn send_command(line: &str) -> Result<String> {
    let path = socket_path();

    let stream = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        UnixStream::connect(&path),
    )
    .await
    .context("Connection timed out")?
    .context("Could not connect to scopelight. Is it running?")?;

    let (reader, mut writer) = stream.into_split();

    writer.write_all(format!("{}\n", line).as_bytes()).await?;
    writer.shutdown().await?;

    let mut buf_reader = BufReader::new(reader);
    let mut response = String::new();

    tokio::time::timeout(
        std::time::Duration::from_secs(2),
        buf_reader.read_line(&mut response),
    )
    .await
    .context("Response timed out")?
    .context("Failed to read response")?;

    Ok(response.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run(line: &str, state: &mut ControlSurfaceState) -> String {
        let mut rng = StdRng::seed_from_u64(8);
        match parse_request(line) {
            Ok(request) => process_request(request, state, &PresetCatalog::default(), &mut rng),
            Err(e) => format!("err: {}", e),
        }
    }

    #[test]
    fn parses_protocol_lines() {
        assert_eq!(parse_request("brightness 40").unwrap(), Request::Brightness(40));
        assert_eq!(parse_request("pattern Rainbow").unwrap(), Request::Pattern(Pattern::Rainbow));
        assert_eq!(parse_request("toggle").unwrap(), Request::Power(PowerSwitch::Toggle));
        assert_eq!(
            parse_request("preset soft blue").unwrap(),
            Request::Preset("soft blue".into())
        );
        assert_eq!(parse_request("click 63").unwrap(), Request::Click(63));
        assert!(parse_request("click 64").is_err());
        assert!(parse_request("color #12").is_err());
        assert!(parse_request("color #+1+2+3").is_err());
        assert!(parse_request("pattern sparkle").is_err());
        assert!(parse_request("dance").is_err());
    }

    #[test]
    fn brightness_is_clamped_not_rejected() {
        let mut state = ControlSurfaceState::default();
        assert_eq!(run("brightness 500", &mut state), "ok: 100");
        assert_eq!(run("brightness -5", &mut state), "ok: 0");
    }

    #[test]
    fn preset_and_status_round() {
        let mut state = ControlSurfaceState::default();
        assert_eq!(run("preset warm", &mut state), "ok: Warm");
        assert_eq!(
            run("status", &mut state),
            "ok: enabled=true pattern=solid brightness=80 color=#fbbf24 speed=50 active_pixels=0"
        );
        assert!(run("preset disco", &mut state).starts_with("err:"));
    }

    #[test]
    fn click_then_clear() {
        let mut state = ControlSurfaceState::default();
        assert!(run("click 5", &mut state).starts_with("ok: 5 #"));
        assert_eq!(state.grid.active_count(), 1);
        assert_eq!(run("clear", &mut state), "ok: cleared");
        assert_eq!(state.grid.active_count(), 0);
    }

    #[test]
    fn power_commands() {
        let mut state = ControlSurfaceState::default();
        assert_eq!(run("power off", &mut state), "ok: off");
        assert_eq!(run("toggle", &mut state), "ok: on");
        assert!(state.config.enabled());
    }

    #[test]
    fn frame_lists_every_pixel() {
        let mut state = ControlSurfaceState::default();
        let reply = run("frame", &mut state);
        let cells: Vec<&str> = reply.trim_start_matches("ok: ").split(' ').collect();
        assert_eq!(cells.len(), GRID_LEN);
        assert_eq!(cells[0], "#00d4ff@0.75");
    }

    #[test]
    fn export_then_import_restores_state() {
        let dir = std::env::temp_dir().join(format!("scopelight-ipc-{}", std::process::id()));
        let path = dir.join("snapshots").join("bench.toml");
        let _ = std::fs::remove_dir_all(&dir);

        let mut source = ControlSurfaceState::default();
        run("preset rainbow", &mut source);
        run("click 9", &mut source);
        run("power off", &mut source);
        assert_eq!(
            run(&format!("export {}", path.display()), &mut source),
            format!("ok: {}", path.display())
        );
        assert!(path.is_file());

        let mut target = ControlSurfaceState::default();
        assert_eq!(
            run(&format!("import {}", path.display()), &mut target),
            format!("ok: {}", path.display())
        );
        assert_eq!(target, source);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn import_of_signed_hex_keeps_state() {
        let dir = std::env::temp_dir().join(format!("scopelight-ipc-signed-{}", std::process::id()));
        let path = dir.join("state.toml");
        let _ = std::fs::remove_dir_all(&dir);

        let mut snapshot = ControlSurfaceState::default().snapshot();
        snapshot.lighting.color = "+f+f+f".into();
        snapshot.save(&path).unwrap();

        let mut state = ControlSurfaceState::default();
        state.set_brightness(20);
        let before = state.clone();
        assert!(run(&format!("import {}", path.display()), &mut state).starts_with("err:"));
        assert_eq!(state, before);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn import_of_missing_file_keeps_state() {
        let mut state = ControlSurfaceState::default();
        state.set_brightness(20);
        let reply = run("import /nonexistent/scopelight-state.toml", &mut state);
        assert!(reply.starts_with("err:"));
        assert_eq!(state.config.brightness(), 20);
    }
}
