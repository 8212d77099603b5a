//! Local transport for the relay server
//!
//! Unix: domain sockets named `discord-ipc-{N}` in the runtime directory.
//! Windows: named pipes `\\?\pipe\discord-ipc-{N}`.
//!
//! Clients scan slots 0 to 9 in order and take the first that answers, so
//! the server binds the lowest free slot.

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite};

#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

#[cfg(windows)]
use tokio::net::windows::named_pipe::{NamedPipeServer, ServerOptions};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::ipc::protocol::constants;

/// A connected client stream of either transport
pub trait IpcStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> IpcStream for T {}

/// Directory that holds the Unix sockets.
///
/// Follows the same lookup as client SDKs: `XDG_RUNTIME_DIR`, `TMPDIR`,
/// `TMP`, `TEMP`, then `/run/user/{uid}` and finally `/tmp`.
#[cfg(unix)]
pub fn socket_dir() -> PathBuf {
    socket_dir_from(|key| std::env::var(key).ok())
}

#[cfg(unix)]
fn socket_dir_from<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let env_keys = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"];
    for key in &env_keys {
        if let Some(dir) = lookup(key).filter(|d| !d.is_empty()) {
            return PathBuf::from(dir);
        }
    }

    let run_user = PathBuf::from(format!("/run/user/{}", unsafe { libc::getuid() }));
    if run_user.is_dir() {
        return run_user;
    }
    PathBuf::from("/tmp")
}

/// Path of instance slot `slot` inside `dir`
pub fn slot_path(dir: &Path, slot: u8) -> PathBuf {
    dir.join(format!("{}{}", constants::IPC_SOCKET_PREFIX, slot))
}

/// Name of the named pipe for instance slot `slot`
pub fn pipe_name(slot: u8) -> String {
    format!(r"\\?\pipe\{}{}", constants::IPC_SOCKET_PREFIX, slot)
}

/// A bound instance slot accepting client connections
pub struct IpcListener {
    slot: u8,
    #[cfg(unix)]
    listener: UnixListener,
    #[cfg(unix)]
    path: PathBuf,
    #[cfg(windows)]
    name: String,
    #[cfg(windows)]
    next: NamedPipeServer,
}

impl IpcListener {
    /// Bind the first free slot among `config.max_sockets`
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        config.validate()?;

        for slot in 0..config.max_sockets {
            match Self::try_bind(config, slot).await {
                Ok(Some(listener)) => {
                    info!("Listening on {}", listener.address());
                    return Ok(listener);
                }
                Ok(None) => debug!("Slot {} is in use", slot),
                Err(err) => debug!("Slot {} unavailable: {}", slot, err),
            }
        }

        Err(RelayError::NoFreeSlot {
            attempted: config.max_sockets,
        })
    }

    #[cfg(unix)]
    async fn try_bind(config: &RelayConfig, slot: u8) -> io::Result<Option<Self>> {
        let dir = config.socket_dir.clone().unwrap_or_else(socket_dir);
        let path = slot_path(&dir, slot);

        // A socket that answers belongs to a live server
        if UnixStream::connect(&path).await.is_ok() {
            return Ok(None);
        }

        match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_socket() => {
                std::fs::remove_file(&path)?;
                debug!("Removed stale socket {}", path.display());
            }
            Ok(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} exists and is not a socket", path.display()),
                ))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }

        let listener = UnixListener::bind(&path)?;
        Ok(Some(Self {
            slot,
            listener,
            path,
        }))
    }

    #[cfg(windows)]
    async fn try_bind(_config: &RelayConfig, slot: u8) -> io::Result<Option<Self>> {
        let name = pipe_name(slot);
        match ServerOptions::new().first_pipe_instance(true).create(&name) {
            Ok(next) => Ok(Some(Self { slot, name, next })),
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Human readable address of the bound slot
    pub fn address(&self) -> String {
        #[cfg(unix)]
        {
            self.path.display().to_string()
        }

        #[cfg(windows)]
        {
            self.name.clone()
        }
    }

    /// Wait for the next client
    pub async fn accept(&mut self) -> io::Result<Box<dyn IpcStream>> {
        #[cfg(unix)]
        {
            let (stream, _) = self.listener.accept().await?;
            Ok(Box::new(stream))
        }

        #[cfg(windows)]
        {
            self.next.connect().await?;
            let fresh = ServerOptions::new().create(&self.name)?;
            let connected = std::mem::replace(&mut self.next, fresh);
            Ok(Box::new(connected))
        }
    }
}

#[cfg(unix)]
impl Drop for IpcListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
