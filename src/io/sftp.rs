//! SFTP repository client
//!
//! libssh2 is blocking, so every call runs on tokio's blocking pool with the
//! channel behind a mutex. One session is opened per run and reused for every
//! listing and transfer.

use crate::infra::config::RemoteConfig;
use crate::io::source::{ReportSource, SourceError};
use async_trait::async_trait;
use parking_lot::Mutex;
use ssh2::{Session, Sftp};
use std::fs::File;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

fn connection_error(context: &str, err: impl std::fmt::Display) -> SourceError {
    SourceError::Connection(format!("{}: {}", context, err))
}

pub struct SftpSource {
    session: Arc<Mutex<Session>>,
    sftp: Arc<Mutex<Sftp>>,
}

impl SftpSource {
    /// Connect, authenticate with password and open the SFTP channel
    pub async fn connect(config: &RemoteConfig) -> Result<Self, SourceError> {
        let host = config.host.clone();
        let port = config.port;
        let user = config.user.clone();
        let password = config.password.clone();

        let (session, sftp) = tokio::task::spawn_blocking(move || {
            open_session(&host, port, &user, &password)
        })
        .await??;

        info!(host = %config.host, port = %config.port, user = %config.user, "sftp_connected");
        Ok(Self { session: Arc::new(Mutex::new(session)), sftp: Arc::new(Mutex::new(sftp)) })
    }
}

fn open_session(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
) -> Result<(Session, Sftp), SourceError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| connection_error("resolve", e))?
        .next()
        .ok_or_else(|| SourceError::Connection(format!("no address for {}:{}", host, port)))?;

    let tcp =
        TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(|e| connection_error("connect", e))?;

    let mut session = Session::new().map_err(|e| connection_error("session", e))?;
    session.set_timeout(CONNECT_TIMEOUT.as_millis() as u32);
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|e| connection_error("handshake", e))?;
    session
        .userauth_password(user, password)
        .map_err(|e| connection_error("authentication", e))?;

    let sftp = session.sftp().map_err(|e| connection_error("sftp channel", e))?;
    Ok((session, sftp))
}

#[async_trait]
impl ReportSource for SftpSource {
    async fn list(&self, dir: &str) -> Result<Vec<String>, SourceError> {
        let sftp = self.sftp.clone();
        let path = PathBuf::from(dir);

        let names = tokio::task::spawn_blocking(move || -> Result<Vec<String>, SourceError> {
            let entries = sftp.lock().readdir(&path).map_err(std::io::Error::from)?;
            Ok(entries
                .into_iter()
                .filter(|(_, stat)| stat.is_file())
                .filter_map(|(p, _)| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
                .collect())
        })
        .await??;

        debug!(dir = %dir, files = %names.len(), "source_listed");
        Ok(names)
    }

    async fn fetch(&self, dir: &str, name: &str, dest: &Path) -> Result<(), SourceError> {
        let sftp = self.sftp.clone();
        let remote = Path::new(dir).join(name);
        let local = dest.to_path_buf();

        let bytes = tokio::task::spawn_blocking(move || -> Result<u64, SourceError> {
            let guard = sftp.lock();
            let mut remote_file = guard.open(&remote).map_err(std::io::Error::from)?;
            let mut local_file = File::create(&local)?;
            Ok(std::io::copy(&mut remote_file, &mut local_file)?)
        })
        .await??;

        debug!(dir = %dir, name = %name, dest = %dest.display(), bytes = %bytes, "source_fetched");
        Ok(())
    }

    async fn close(&self) -> Result<(), SourceError> {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || session.lock().disconnect(None, "import finished", None))
            .await?
            .map_err(|e| connection_error("disconnect", e))?;
        info!("sftp_disconnected");
        Ok(())
    }
}
