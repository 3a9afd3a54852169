//! Control socket
//!
//! Lets another process (`crosshair ctl ...`) drive a running overlay. One
//! connection carries one length-prefixed JSON [`Command`] and gets one
//! [`ControlResponse`] back.

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::Command;

/// Frames larger than this are rejected before allocating
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

const SOCKET_DIR: &str = "crosshair";
const SOCKET_NAME: &str = "control.sock";
/// A client that stalls mid-frame is dropped after this long
const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("socket I/O failed")]
    Io(#[from] std::io::Error),

    #[error("failed to encode message")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode message")]
    Decode(#[source] serde_json::Error),

    #[error("message of {size} bytes exceeds the {MAX_MESSAGE_SIZE} byte limit")]
    TooLarge { size: usize },

    #[error("no runtime or cache directory for the control socket")]
    NoSocketDir,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlResponse {
    Ack,
    Error(String),
}

/// `$XDG_RUNTIME_DIR/crosshair/control.sock`, else under the cache dir
pub fn default_socket_path() -> Result<PathBuf, IpcError> {
    let base = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .or_else(dirs::cache_dir)
        .ok_or(IpcError::NoSocketDir)?;
    Ok(base.join(SOCKET_DIR).join(SOCKET_NAME))
}

/// Write one u32-LE length-prefixed JSON frame
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<(), IpcError> {
    let json = serde_json::to_vec(message).map_err(IpcError::Encode)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(IpcError::TooLarge { size: json.len() });
    }
    writer.write_all(&(json.len() as u32).to_le_bytes())?;
    writer.write_all(&json)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame written by [`write_message`]
pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, IpcError> {
    let mut len = [0u8; 4];
    reader.read_exact(&mut len)?;
    let size = u32::from_le_bytes(len) as usize;
    if size > MAX_MESSAGE_SIZE {
        return Err(IpcError::TooLarge { size });
    }

    let mut buf = vec![0u8; size];
    reader.read_exact(&mut buf)?;
    serde_json::from_slice(&buf).map_err(IpcError::Decode)
}

/// Listening end, owned by the overlay process. The socket file is removed
/// on drop.
pub struct ControlServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl ControlServer {
    pub fn bind_to(socket_path: PathBuf) -> Result<Self, IpcError> {
        if let Some(parent) = socket_path.parent() {
            use std::os::unix::fs::DirBuilderExt;
            // Owner-only before the socket exists; an existing directory is left alone
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(parent)?;
        }
        // Stale socket from a previous run
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }

        let listener = UnixListener::bind(&socket_path)?;
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))?;
        }

        info!(path = %socket_path.display(), "control socket listening");
        Ok(Self {
            listener,
            socket_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections on a background thread, forwarding each decoded
    /// command to `sender`.
    pub fn spawn(&self, sender: Sender<Command>) -> Result<thread::JoinHandle<()>, IpcError> {
        let listener = self.listener.try_clone()?;
        Ok(thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(mut stream) => {
                        if let Err(e) = stream
                            .set_read_timeout(Some(CLIENT_TIMEOUT))
                            .and_then(|()| stream.set_write_timeout(Some(CLIENT_TIMEOUT)))
                        {
                            warn!(error = %e, "failed to set control client timeout");
                            continue;
                        }
                        if !serve(&mut stream, &sender) {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to accept control connection"),
                }
            }
            debug!("control socket thread exiting");
        }))
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Handle one connection. Returns false once the command channel is gone.
fn serve(stream: &mut UnixStream, sender: &Sender<Command>) -> bool {
    let (response, keep_going) = match read_message::<_, Command>(stream) {
        Ok(command) => {
            debug!(?command, "control command received");
            match sender.send(command) {
                Ok(()) => (ControlResponse::Ack, true),
                Err(_) => (ControlResponse::Error("overlay is shutting down".into()), false),
            }
        }
        Err(e) => {
            warn!(error = %e, "bad control message");
            (ControlResponse::Error(e.to_string()), true)
        }
    };

    if let Err(e) = write_message(stream, &response) {
        debug!(error = %e, "failed to reply on control socket");
    }
    keep_going
}

/// Client side: deliver one command to a running overlay
pub fn send_command(socket_path: &Path, command: &Command) -> Result<ControlResponse, IpcError> {
    let mut stream = UnixStream::connect(socket_path)?;
    write_message(&mut stream, command)?;
    read_message(&mut stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn frames_are_length_prefixed_json() {
        let mut buf = Vec::new();
        write_message(&mut buf, &Command::SetStyle(3)).unwrap();

        let body = br#"{"SetStyle":3}"#;
        assert_eq!(&buf[..4], &(body.len() as u32).to_le_bytes());
        assert_eq!(&buf[4..], body);

        let back: Command = read_message(&mut buf.as_slice()).unwrap();
        assert_eq!(back, Command::SetStyle(3));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut buf = ((MAX_MESSAGE_SIZE + 1) as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(b"{}");
        let result: Result<Command, _> = read_message(&mut buf.as_slice());
        assert!(matches!(result, Err(IpcError::TooLarge { .. })));
    }

    #[test]
    fn garbage_frame_is_a_decode_error() {
        let mut buf = 5u32.to_le_bytes().to_vec();
        buf.extend_from_slice(b"nope!");
        let result: Result<Command, _> = read_message(&mut buf.as_slice());
        assert!(matches!(result, Err(IpcError::Decode(_))));
    }

    #[test]
    fn server_forwards_commands_and_acks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("control.sock");
        let server = ControlServer::bind_to(path.clone()).unwrap();
        let (tx, rx) = mpsc::channel();
        server.spawn(tx).unwrap();

        let response = send_command(&path, &Command::SetGap(4.0)).unwrap();
        assert_eq!(response, ControlResponse::Ack);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Command::SetGap(4.0)
        );
    }

    #[test]
    fn server_replies_error_to_bad_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let server = ControlServer::bind_to(path.clone()).unwrap();
        let (tx, _rx) = mpsc::channel();
        server.spawn(tx).unwrap();

        let mut stream = UnixStream::connect(&path).unwrap();
        write_message(&mut stream, &"not a command").unwrap();
        let response: ControlResponse = read_message(&mut stream).unwrap();
        assert!(matches!(response, ControlResponse::Error(_)));
    }

    #[test]
    fn stalled_client_does_not_block_later_commands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let server = ControlServer::bind_to(path.clone()).unwrap();
        let (tx, rx) = mpsc::channel();
        server.spawn(tx).unwrap();

        // Connects and never sends a frame
        let _silent = UnixStream::connect(&path).unwrap();

        let response = send_command(&path, &Command::ToggleVisibility).unwrap();
        assert_eq!(response, ControlResponse::Ack);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Command::ToggleVisibility
        );
    }

    #[test]
    fn socket_directory_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("crosshair");
        let _server = ControlServer::bind_to(parent.join("control.sock")).unwrap();

        let mode = std::fs::metadata(&parent).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn stale_socket_is_replaced_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        std::fs::write(&path, b"stale").unwrap();

        let server = ControlServer::bind_to(path.clone()).unwrap();
        assert!(path.exists());
        drop(server);
        assert!(!path.exists());
    }
}
