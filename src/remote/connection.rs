//! SSH connection setup and the channels opened on it.
//!
//! Connection failures are fatal and never retried. The error carries
//! troubleshooting suggestions built from the failure text.

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::remote::diagnostics::diagnose_connection_error;
use crate::remote::shell::ShellSession;
use crate::remote::transfer::SftpTransfer;
use log::{debug, info, warn};
use ssh2::{Channel, Session, Stream};
use std::io::BufReader;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Terminal width requested for the shell, wide enough that the shell does
/// not wrap long command echoes.
const PTY_WIDTH: u32 = 4096;
const PTY_HEIGHT: u32 = 24;

/// Shell protocol session over an SSH channel.
pub type SshShell = ShellSession<Stream, BufReader<Stream>>;

/// An authenticated SSH session to one remote host.
pub struct RemoteConnection {
    session: Session,
    host: String,
}

impl RemoteConnection {
    /// Connects and authenticates using the given remote configuration.
    pub fn connect(config: &RemoteConfig) -> Result<Self> {
        info!("Connecting to {}", config.connection_string());

        let session = connect_once(config).map_err(|message| {
            Error::Connection(diagnose_connection_error(
                &message,
                &config.host,
                config.port,
                config.ssh_key.as_deref(),
            ))
        })?;

        debug!("SSH connection established");
        Ok(Self {
            session,
            host: config.host.clone(),
        })
    }

    /// Wraps a session that was connected and authenticated elsewhere.
    pub fn from_session(session: Session, host: impl Into<String>) -> Result<Self> {
        let host = host.into();
        if !session.authenticated() {
            return Err(Error::Connection(format!(
                "SSH session to {} is not authenticated",
                host
            )));
        }
        Ok(Self { session, host })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Applies a timeout to every blocking call on the session.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        let millis = timeout
            .map(|t| u32::try_from(t.as_millis()).unwrap_or(u32::MAX))
            .unwrap_or(0);
        self.session.set_timeout(millis);
    }

    /// Opens an interactive shell on a PTY.
    ///
    /// The writer and reader are independent handles on the channel's
    /// primary stream; the channel itself is returned for teardown.
    pub fn open_shell(&self) -> Result<(Channel, SshShell)> {
        info!("Opening interactive shell session");

        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| Error::Connection(format!("Failed to open channel: {}", e)))?;

        channel
            .request_pty("vt100", None, Some((PTY_WIDTH, PTY_HEIGHT, 0, 0)))
            .map_err(|e| Error::Connection(format!("Failed to request PTY: {}", e)))?;

        channel
            .shell()
            .map_err(|e| Error::Connection(format!("Failed to start shell: {}", e)))?;

        let writer = channel.stream(0);
        let reader = BufReader::new(channel.stream(0));
        Ok((channel, ShellSession::new(writer, reader)))
    }

    /// Opens an SFTP session for file staging.
    pub fn open_sftp(&self) -> Result<SftpTransfer> {
        info!("Opening SFTP session");

        let sftp = self
            .session
            .sftp()
            .map_err(|e| Error::Connection(format!("Failed to open SFTP session: {}", e)))?;
        Ok(SftpTransfer::new(sftp))
    }

    /// Disconnects the session.
    pub fn disconnect(&self) -> Result<()> {
        debug!("Disconnecting from {}", self.host);
        self.session
            .disconnect(None, "shellflow session closed", None)
            .map_err(|e| Error::Connection(format!("Failed to disconnect: {}", e)))
    }
}

/// Attempts to establish an SSH connection once.
fn connect_once(config: &RemoteConfig) -> std::result::Result<Session, String> {
    let addr = format!("{}:{}", config.host, config.port)
        .to_socket_addrs()
        .map_err(|e| format!("Failed to resolve host '{}': {}", config.host, e))?
        .next()
        .ok_or_else(|| format!("Failed to resolve host '{}': no addresses", config.host))?;

    let timeout = Duration::from_secs(config.timeout);
    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| format!("Failed to connect to {}: {}", config.host, e))?;

    let mut session =
        Session::new().map_err(|e| format!("Failed to create SSH session: {}", e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
    session
        .handshake()
        .map_err(|e| format!("SSH handshake failed: {}", e))?;

    authenticate(&session, config)?;

    // Blocking reads on the shell wait indefinitely unless a command
    // timeout is applied later.
    session.set_timeout(0);
    Ok(session)
}

/// Tries password, then key file, then agent authentication.
fn authenticate(session: &Session, config: &RemoteConfig) -> std::result::Result<(), String> {
    debug!("Authenticating as user: {}", config.user);

    if let Some(password) = &config.password {
        match session.userauth_password(&config.user, password) {
            Ok(()) if session.authenticated() => {
                debug!("Password authentication successful");
                return Ok(());
            }
            Ok(()) => warn!("Password authentication incomplete"),
            Err(e) => warn!("Password authentication failed: {}", e),
        }
    }

    if let Some(key_path) = config.expanded_ssh_key() {
        debug!("Attempting public key authentication with: {:?}", key_path);
        match session.userauth_pubkey_file(&config.user, None, &key_path, config.password.as_deref()) {
            Ok(()) if session.authenticated() => {
                debug!("Public key authentication successful");
                return Ok(());
            }
            Ok(()) => warn!("Public key authentication incomplete"),
            Err(e) => warn!("Public key authentication failed: {}", e),
        }
    }

    debug!("Attempting agent authentication");
    match session.userauth_agent(&config.user) {
        Ok(()) if session.authenticated() => {
            debug!("Agent authentication successful");
            return Ok(());
        }
        Ok(()) => warn!("Agent authentication incomplete"),
        Err(e) => warn!("Agent authentication failed: {}", e),
    }

    Err(format!(
        "SSH authentication failed for user {}. Tried: {}{}agent",
        config.user,
        if config.password.is_some() { "password, " } else { "" },
        config
            .ssh_key
            .as_deref()
            .map(|k| format!("{}, ", k))
            .unwrap_or_default()
    ))
}
