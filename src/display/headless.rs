use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::ipc;
use crate::session::Session;
use crate::telemetry::{self, TelemetryStatus};

/// Run the control surface without drawing anything. State is driven over
/// IPC; rendered frames are only traced.
pub async fn run(config: Config) -> Result<()> {
    let (mut session, mut frames) = Session::new(&config)?;

    let (ipc_tx, mut ipc_rx) = mpsc::channel(16);
    tokio::spawn(async move {
        if let Err(e) = ipc::start_server(ipc_tx).await {
            warn!("IPC server stopped: {}", e);
        }
    });

    let mut telemetry = config
        .telemetry
        .enabled
        .then(|| telemetry::start_simulator(&config.telemetry));

    info!("Headless control surface running, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(tick) = frames.recv() => {
                let frame = session.frame();
                trace!("frame {} pixel[0]={}@{:.2}", tick.generation, frame[0].color, frame[0].opacity);
            }
            Some(cmd) = ipc_rx.recv() => {
                debug!("IPC request {:?}", cmd.request);
                session.handle_ipc(cmd);
            }
            status = next_telemetry(&mut telemetry) => {
                debug!(
                    "telemetry {:.1}C {:.2}V {:.2}A up {}",
                    status.temperature,
                    status.voltage,
                    status.current,
                    status.uptime_text()
                );
            }
        }
    }

    info!("Shutting down");
    Ok(())
}

/// Wait for the next telemetry sample; never resolves once the simulator is
/// off or gone.
pub(crate) async fn next_telemetry<T>(
    telemetry: &mut Option<(watch::Receiver<Arc<TelemetryStatus>>, T)>,
) -> Arc<TelemetryStatus> {
    if let Some((rx, _)) = telemetry {
        if rx.changed().await.is_ok() {
            return rx.borrow_and_update().clone();
        }
    }
    std::future::pending().await
}
