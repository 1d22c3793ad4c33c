use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::Config;
use crate::engine::{self, Frame};
use crate::ipc::{self, IpcCommand};
use crate::preset::PresetCatalog;
use crate::scheduler::{AnimationScheduler, FrameTick};
use crate::snapshot::Snapshot;
use crate::state::ControlSurfaceState;

/// One running control surface: the state plus the animation loop that
/// follows it. Every mutation goes through [`Session::mutate`] so the loop
/// is resynchronised right after the state changes.
pub struct Session {
    state: ControlSurfaceState,
    presets: PresetCatalog,
    snapshot_path: Option<PathBuf>,
    scheduler: AnimationScheduler,
    rng: StdRng,
}

impl Session {
    pub fn new(config: &Config) -> Result<(Self, mpsc::Receiver<FrameTick>)> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: &Config, rng: StdRng) -> Result<(Self, mpsc::Receiver<FrameTick>)> {
        let (scheduler, frames) = AnimationScheduler::new(config.frame_rate());
        let mut session = Self {
            state: ControlSurfaceState::new(config.lighting.to_lighting()),
            presets: config.preset_catalog()?,
            snapshot_path: config.snapshot_path(),
            scheduler,
            rng,
        };
        session.scheduler.sync(&session.state.config);
        Ok((session, frames))
    }

    pub fn state(&self) -> &ControlSurfaceState {
        &self.state
    }

    pub fn presets(&self) -> &PresetCatalog {
        &self.presets
    }

    pub fn is_animating(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn mutate<T>(&mut self, f: impl FnOnce(&mut ControlSurfaceState, &mut StdRng) -> T) -> T {
        let result = f(&mut self.state, &mut self.rng);
        self.scheduler.sync(&self.state.config);
        result
    }

    pub fn apply_preset(&mut self, index: usize) -> Option<String> {
        let preset = self.presets.get(index)?.clone();
        self.mutate(|state, _| state.apply_preset(&preset));
        Some(preset.name)
    }

    pub fn handle_ipc(&mut self, cmd: IpcCommand) {
        let Self {
            state,
            presets,
            scheduler,
            rng,
            ..
        } = self;
        let reply = ipc::process_request(cmd.request, state, presets, rng);
        scheduler.sync(&state.config);
        let _ = cmd.reply.send(reply);
    }

    pub fn frame(&self) -> Frame {
        self.state.render_frame(engine::wall_clock())
    }

    pub fn export(&self) -> Result<PathBuf> {
        let path = self
            .snapshot_path
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Could not determine snapshot path"))?;
        self.state.snapshot().save(&path)?;
        info!("Exported state to {}", path.display());
        Ok(path)
    }

    pub fn import(&mut self) -> Result<PathBuf> {
        let path = self
            .snapshot_path
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Could not determine snapshot path"))?;
        let snapshot = Snapshot::load(&path)?;
        self.mutate(|state, _| state.restore(&snapshot))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::Request;
    use crate::lighting::Pattern;
    use tokio::sync::oneshot;

    fn session() -> (Session, mpsc::Receiver<FrameTick>) {
        Session::with_rng(&Config::default(), StdRng::seed_from_u64(1)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_drive_the_animation_loop() {
        let (mut session, _frames) = session();
        assert!(!session.is_animating());

        session.mutate(|state, _| state.set_pattern(Pattern::Pulse));
        assert!(session.is_animating());

        session.mutate(|state, _| state.set_enabled(false));
        assert!(!session.is_animating());

        session.mutate(|state, _| state.reset());
        assert!(!session.is_animating());
    }

    #[tokio::test(start_paused = true)]
    async fn ipc_requests_are_applied_and_answered() {
        let (mut session, _frames) = session();
        let (reply, rx) = oneshot::channel();
        session.handle_ipc(IpcCommand {
            request: Request::Pattern(Pattern::Strobe),
            reply,
        });
        assert_eq!(rx.await.unwrap(), "ok: strobe");
        assert!(session.is_animating());
    }

    #[tokio::test(start_paused = true)]
    async fn ipc_power_off_stops_the_animation_loop() {
        let (mut session, _frames) = session();
        session.mutate(|state, _| state.set_pattern(Pattern::Pulse));
        assert!(session.is_animating());

        let (reply, rx) = oneshot::channel();
        session.handle_ipc(IpcCommand {
            request: Request::Power(crate::ipc::PowerSwitch::Off),
            reply,
        });
        assert_eq!(rx.await.unwrap(), "ok: off");
        assert!(!session.is_animating());
    }

    #[tokio::test(start_paused = true)]
    async fn export_and_import_use_the_configured_path() {
        let dir = std::env::temp_dir().join(format!("scopelight-session-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mut config = Config::default();
        config.snapshot.path = Some(dir.join("state.toml"));

        let (mut session, _frames) = Session::with_rng(&config, StdRng::seed_from_u64(3)).unwrap();
        session.apply_preset(1);
        session.mutate(|state, rng| state.click_pixel(12, rng));
        let saved = session.state().clone();
        assert_eq!(session.export().unwrap(), dir.join("state.toml"));

        session.mutate(|state, _| state.reset());
        assert!(!session.is_animating());

        session.import().unwrap();
        assert_eq!(session.state(), &saved);
        assert!(session.is_animating());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn preset_by_index() {
        let (mut session, _frames) = session();
        assert_eq!(session.apply_preset(1).as_deref(), Some("Soft Blue"));
        assert_eq!(session.state().config.pattern(), Pattern::Pulse);
        assert!(session.is_animating());
        assert!(session.apply_preset(99).is_none());
    }
}
