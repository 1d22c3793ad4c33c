use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use std::io::{self, stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::headless::next_telemetry;
use crate::color::{over_black, OVERRIDE_PALETTE};
use crate::config::Config;
use crate::engine::Frame as PixelFrame;
use crate::grid::{index_of, row_col, GRID_HEIGHT, GRID_WIDTH};
use crate::ipc;
use crate::session::Session;
use crate::telemetry::{self, TelemetryStatus};

const BRIGHTNESS_STEP: i64 = 5;
const INPUT_POLL: Duration = Duration::from_millis(100);

pub async fn run(config: Config) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, config).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Cursor and feedback line; everything else lives in the session
struct UiState {
    cursor: usize,
    swatch: usize,
    message: String,
    show_telemetry: bool,
}

enum Flow {
    Continue,
    Quit,
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, config: Config) -> Result<()> {
    let (mut session, mut frames) = Session::new(&config)?;

    let (ipc_tx, mut ipc_rx) = mpsc::channel(16);
    tokio::spawn(async move {
        if let Err(e) = ipc::start_server(ipc_tx).await {
            warn!("IPC server stopped: {}", e);
        }
    });

    // Dropping the task at the end of the session cancels the timer.
    let mut telemetry = config
        .telemetry
        .enabled
        .then(|| telemetry::start_simulator(&config.telemetry));
    let mut latest: Option<Arc<TelemetryStatus>> =
        telemetry.as_ref().map(|(rx, _)| rx.borrow().clone());

    let (key_tx, mut key_rx) = mpsc::channel(32);
    spawn_input_reader(key_tx);

    let mut ui = UiState {
        cursor: 0,
        swatch: 0,
        message: String::from("ready"),
        show_telemetry: config.display.show_telemetry && telemetry.is_some(),
    };
    let mut dirty = true;

    loop {
        if dirty {
            let frame = session.frame();
            terminal.draw(|f| draw(f, &session, &ui, &frame, latest.as_deref()))?;
            dirty = false;
        }

        tokio::select! {
            Some(_) = frames.recv() => dirty = true,
            Some(event) = key_rx.recv() => {
                if let Event::Key(key) = event {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if let Flow::Quit = handle_key(key, &mut session, &mut ui) {
                        break;
                    }
                }
                dirty = true;
            }
            Some(cmd) = ipc_rx.recv() => {
                session.handle_ipc(cmd);
                dirty = true;
            }
            status = next_telemetry(&mut telemetry) => {
                latest = Some(status);
                dirty |= ui.show_telemetry;
            }
            else => break,
        }
    }

    info!("Control surface closed");
    Ok(())
}

/// crossterm's event reads block, so they run off the async workers.
fn spawn_input_reader(tx: mpsc::Sender<Event>) {
    tokio::task::spawn_blocking(move || loop {
        match event::poll(INPUT_POLL) {
            Ok(true) => match event::read() {
                Ok(ev) => {
                    if tx.blocking_send(ev).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if tx.is_closed() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

fn handle_key(key: KeyEvent, session: &mut Session, ui: &mut UiState) -> Flow {
    let (row, col) = row_col(ui.cursor);
    match key {
        KeyEvent {
            code: KeyCode::Char('q'),
            ..
        }
        | KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => return Flow::Quit,
        KeyEvent {
            code: KeyCode::Up | KeyCode::Char('k'),
            ..
        } => ui.cursor = index_of(row.saturating_sub(1), col),
        KeyEvent {
            code: KeyCode::Down | KeyCode::Char('j'),
            ..
        } => ui.cursor = index_of((row + 1).min(GRID_HEIGHT - 1), col),
        KeyEvent {
            code: KeyCode::Left | KeyCode::Char('h'),
            ..
        } => ui.cursor = index_of(row, col.saturating_sub(1)),
        KeyEvent {
            code: KeyCode::Right | KeyCode::Char('l'),
            ..
        } => ui.cursor = index_of(row, (col + 1).min(GRID_WIDTH - 1)),
        KeyEvent {
            code: KeyCode::Char(' ') | KeyCode::Enter,
            ..
        } => {
            let index = ui.cursor;
            let color = session.mutate(|state, rng| state.click_pixel(index, rng));
            ui.message = format!("pixel {} -> {}", index, color);
        }
        KeyEvent {
            code: KeyCode::Char('+') | KeyCode::Char('='),
            ..
        } => {
            session.mutate(|state, _| {
                let next = state.config.brightness() as i64 + BRIGHTNESS_STEP;
                state.set_brightness(next)
            });
            ui.message = format!("brightness {}%", session.state().config.brightness());
        }
        KeyEvent {
            code: KeyCode::Char('-'),
            ..
        } => {
            session.mutate(|state, _| {
                let next = state.config.brightness() as i64 - BRIGHTNESS_STEP;
                state.set_brightness(next)
            });
            ui.message = format!("brightness {}%", session.state().config.brightness());
        }
        KeyEvent {
            code: KeyCode::Char('p'),
            ..
        } => {
            let pattern = session.state().config.pattern().next();
            session.mutate(|state, _| state.set_pattern(pattern));
            ui.message = format!("pattern {}", pattern);
        }
        KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::NONE,
            ..
        } => {
            ui.swatch = (ui.swatch + 1) % OVERRIDE_PALETTE.len();
            let color = OVERRIDE_PALETTE[ui.swatch];
            session.mutate(|state, _| state.set_color(color));
            ui.message = format!("color {}", color);
        }
        KeyEvent {
            code: KeyCode::Char('o'),
            ..
        } => {
            let on = session.mutate(|state, _| state.toggle_power());
            ui.message = format!("power {}", if on { "on" } else { "off" });
        }
        KeyEvent {
            code: KeyCode::Char(digit @ '1'..='9'),
            ..
        } => {
            let index = digit as usize - '1' as usize;
            ui.message = match session.apply_preset(index) {
                Some(name) => format!("preset {}", name),
                None => format!("no preset {}", digit),
            };
        }
        KeyEvent {
            code: KeyCode::Char('x'),
            ..
        } => {
            session.mutate(|state, _| state.clear_all_pixels());
            ui.message = String::from("pixels cleared");
        }
        KeyEvent {
            code: KeyCode::Char('r'),
            ..
        } => {
            session.mutate(|state, _| state.reset());
            ui.message = String::from("reset to defaults");
        }
        KeyEvent {
            code: KeyCode::Char('w'),
            ..
        } => {
            ui.message = match session.export() {
                Ok(path) => format!("saved {}", path.display()),
                Err(e) => format!("save failed: {}", e),
            };
        }
        KeyEvent {
            code: KeyCode::Char('L'),
            ..
        } => {
            ui.message = match session.import() {
                Ok(path) => format!("loaded {}", path.display()),
                Err(e) => format!("load failed: {}", e),
            };
        }
        KeyEvent {
            code: KeyCode::Char('t'),
            ..
        } => ui.show_telemetry = !ui.show_telemetry,
        _ => {}
    }
    Flow::Continue
}

fn draw(
    frame: &mut Frame,
    session: &Session,
    ui: &UiState,
    pixels: &PixelFrame,
    telemetry: Option<&TelemetryStatus>,
) {
    let area = frame.area();
    let block = Block::default().style(Style::default().bg(Color::Reset));
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(12), Constraint::Length(2)])
        .split(area);

    // 8 cells of two columns each, plus borders
    let grid_width = (GRID_WIDTH as u16) * 2 + 2;
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(grid_width + 2), Constraint::Min(30)])
        .split(rows[0]);

    render_grid(frame, columns[0], pixels, ui.cursor);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8),
            Constraint::Length(session.presets().len() as u16 + 2),
            Constraint::Min(0),
        ])
        .split(columns[1]);

    render_lighting(frame, side[0], session);
    render_presets(frame, side[1], session);
    if ui.show_telemetry {
        if let Some(status) = telemetry {
            render_telemetry(frame, side[2], status);
        }
    }

    render_status(frame, rows[1], &ui.message);
}

fn render_grid(frame: &mut Frame, area: Rect, pixels: &PixelFrame, cursor: usize) {
    let block = Block::default().borders(Borders::ALL).title(" 8x8 ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width < (GRID_WIDTH as u16) * 2 || inner.height < GRID_HEIGHT as u16 {
        return;
    }

    for (index, pixel) in pixels.iter().enumerate() {
        let (row, col) = row_col(index);
        let (r, g, b) = over_black(&pixel.color, pixel.opacity);
        let x = inner.x + col as u16 * 2;
        let y = inner.y + row as u16;

        let glyphs = if index == cursor { ['[', ']'] } else { ['█', '█'] };
        for (offset, glyph) in glyphs.iter().enumerate() {
            if let Some(cell) = frame.buffer_mut().cell_mut((x + offset as u16, y)) {
                cell.set_char(*glyph);
                if index == cursor {
                    cell.set_fg(Color::White);
                    cell.set_bg(Color::Rgb(r, g, b));
                } else {
                    cell.set_fg(Color::Rgb(r, g, b));
                }
            }
        }
    }
}

fn render_lighting(frame: &mut Frame, area: Rect, session: &Session) {
    let state = session.state();
    let config = &state.config;
    let block = Block::default().borders(Borders::ALL).title(" Lighting ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(config.brightness() as u16)
        .label(format!("brightness {}%", config.brightness()));
    frame.render_widget(gauge, parts[0]);

    let base = config.color();
    let power = if config.enabled() {
        Span::styled("on", Style::default().fg(Color::Green))
    } else {
        Span::styled("off", Style::default().fg(Color::DarkGray))
    };
    let lines = vec![
        Line::from(vec![Span::raw("power    "), power]),
        Line::from(format!("pattern  {}", config.pattern())),
        Line::from(vec![
            Span::raw("color    "),
            Span::styled("██ ", Style::default().fg(Color::Rgb(base.r, base.g, base.b))),
            Span::raw(base.to_hex()),
        ]),
        Line::from(format!("speed    {}", config.speed())),
        Line::from(format!(
            "painted  {}{}",
            state.grid.active_count(),
            if session.is_animating() { "  (animating)" } else { "" }
        )),
    ];
    frame.render_widget(Paragraph::new(lines), parts[1]);
}

fn render_presets(frame: &mut Frame, area: Rect, session: &Session) {
    let lines: Vec<Line> = session
        .presets()
        .all()
        .iter()
        .enumerate()
        .map(|(i, preset)| {
            let key = if i < 9 {
                format!("[{}] ", i + 1)
            } else {
                String::from("    ")
            };
            let c = preset.color;
            Line::from(vec![
                Span::styled(key, Style::default().fg(Color::DarkGray)),
                Span::styled("● ", Style::default().fg(Color::Rgb(c.r, c.g, c.b))),
                Span::raw(format!("{} ({}%, {})", preset.name, preset.brightness, preset.pattern)),
            ])
        })
        .collect();

    let block = Block::default().borders(Borders::ALL).title(" Presets ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_telemetry(frame: &mut Frame, area: Rect, status: &TelemetryStatus) {
    let link = if status.connected {
        Span::styled("connected", Style::default().fg(Color::Green))
    } else {
        Span::styled("disconnected", Style::default().fg(Color::Red))
    };
    let lines = vec![
        Line::from(vec![Span::raw("link     "), link]),
        Line::from(format!("temp     {:.1}°C", status.temperature)),
        Line::from(format!("voltage  {:.2}V", status.voltage)),
        Line::from(format!("current  {:.2}A", status.current)),
        Line::from(format!("uptime   {}", status.uptime_text())),
    ];
    let block = Block::default().borders(Borders::ALL).title(" Instrument ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status(frame: &mut Frame, area: Rect, message: &str) {
    let help = " arrows move | space paint | +/- brightness | [p]attern | [c]olor | p[o]wer | 1-9 preset | [x] clear | [r]eset | [w]rite | [L]oad | [t]elemetry | [q]uit ";
    let lines = vec![
        Line::styled(help, Style::default().fg(Color::DarkGray)),
        Line::from(format!(" {}", message)),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}
