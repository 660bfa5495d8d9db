//! Serial link to the motor controller.

use std::fmt;
use std::io::Write;
use std::thread;
use std::time::Duration;

use log::info;

use crate::control::Command;

/// Opening the port pulls DTR and reboots the controller; commands written
/// before it is back up are lost.
const RESET_SETTLE: Duration = Duration::from_secs(2);
const LINK_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors that can occur on the actuator link.
#[derive(Debug)]
pub enum ActuatorError {
    /// Failed to open the serial port
    OpenFailed {
        port: String,
        source: serialport::Error,
    },
    /// Failed to write a command
    WriteFailed(std::io::Error),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorError::OpenFailed { port, source } => {
                write!(f, "Failed to open serial port '{}': {}", port, source)
            }
            ActuatorError::WriteFailed(e) => write!(f, "Failed to write command: {}", e),
        }
    }
}

impl std::error::Error for ActuatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ActuatorError::OpenFailed { source, .. } => Some(source),
            ActuatorError::WriteFailed(source) => Some(source),
        }
    }
}

/// The outbound command link to the motor controller.
///
/// Writes are fire-and-forget: the firmware never replies on this channel.
pub struct Actuator {
    link: Box<dyn Write + Send>,
}

impl Actuator {
    /// Open the serial link and wait out the controller reset.
    ///
    /// # Errors
    /// * `ActuatorError::OpenFailed` - If the port cannot be opened. Callers
    ///   treat this as fatal at startup; driving with a dead actuator link
    ///   is not an option.
    pub fn open(port: &str, baud: u32) -> Result<Self, ActuatorError> {
        let link = serialport::new(port, baud)
            .timeout(LINK_TIMEOUT)
            .open()
            .map_err(|e| ActuatorError::OpenFailed {
                port: port.to_string(),
                source: e,
            })?;

        thread::sleep(RESET_SETTLE);
        info!("actuator link open on {} at {} baud", port, baud);

        Ok(Self {
            link: Box::new(link),
        })
    }

    /// Wrap an already-open writer. Used by tests.
    pub fn from_writer(link: Box<dyn Write + Send>) -> Self {
        Self { link }
    }

    /// Write one command line to the controller.
    pub fn send(&mut self, command: &Command) -> Result<(), ActuatorError> {
        self.link
            .write_all(command.to_wire().as_bytes())
            .map_err(ActuatorError::WriteFailed)
    }
}
