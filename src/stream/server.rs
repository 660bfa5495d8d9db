//! TCP accept loop for viewer connections.
//!
//! Each accepted connection runs one drive session. The camera and the
//! serial port are process-wide resources, so at most one session may be
//! active: later connections are rejected while the actuator guard is held.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::actuator::Actuator;
use crate::camera::CameraSettings;
use crate::session::{self, SessionConfig};

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Run the stream server until shutdown is requested.
///
/// # Arguments
/// * `listen` - Bind address, e.g. `0.0.0.0:8765`
/// * `actuator` - The process-wide actuator link; one session owns it at a
///   time
/// * `camera` - Settings each session opens the camera with
/// * `session_config` - Tick pacing and encoding settings
/// * `shutdown` - Cooperative stop flag, checked between accepts and ticks
pub async fn run(
    listen: &str,
    actuator: Arc<Mutex<Actuator>>,
    camera: CameraSettings,
    session_config: SessionConfig,
    shutdown: Arc<AtomicBool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(listen).await?;
    info!("stream server listening on {}", listen);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("shutdown requested, stopping accept loop");
            break;
        }

        let accepted = match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(accepted) => accepted,
            // Timed out; poll the shutdown flag again.
            Err(_) => continue,
        };

        let (socket, addr) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!("failed to accept connection: {}", e);
                continue;
            }
        };

        match Arc::clone(&actuator).try_lock_owned() {
            Ok(guard) => {
                let camera = camera.clone();
                let shutdown = Arc::clone(&shutdown);
                tokio::spawn(async move {
                    if let Err(e) =
                        session::run(socket, guard, camera, session_config, shutdown).await
                    {
                        error!("drive session ended with error: {}", e);
                    }
                });
            }
            Err(_) => {
                warn!(
                    "rejecting viewer {}: a drive session is already active",
                    addr
                );
            }
        }
    }

    Ok(())
}
