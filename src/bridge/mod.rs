//! Length-prefixed JSON channel between the platform shell and the lock core.
//!
//! Each frame is a 4-byte little-endian length followed by a UTF-8 JSON body.
//! The shell reports window and usage events, permission changes, lock
//! toggles and lock screen results; the core answers with lock screen and
//! navigation requests.

use crate::config::LockerConfig;
use crate::constants::MAX_BRIDGE_MESSAGE_SIZE;
use crate::error::LockerError;
use crate::gate::LockTicket;
use crate::models::{current_timestamp_ms, AppId, LockOutcome};
use crate::platform::{
    EventKind, LockPresenter, PermissionFlags, Permissions, RecordedUsageEvents, UsageEvent,
    UsageEvents, WindowEvent,
};
use crate::safe_lock;
use crate::service::{Collaborators, LockService};
use crate::settings;
use crate::store::PreferenceStore;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    WindowStateChanged { package: String, timestamp: Option<i64> },
    UsageEvent { package: String, kind: EventKind, timestamp: Option<i64> },
    SetLocked { package: String, locked: bool },
    LockResult { ticket: u64, outcome: LockOutcome },
    Permissions { usage: bool, overlay: bool },
    RequestState,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    PresentLock { package: AppId, ticket: u64 },
    GoHome,
    State {
        locked: Vec<AppId>,
        current: Option<AppId>,
        presented: Vec<AppId>,
    },
    Error { message: String },
}

/// Read one frame body. Errors here (EOF, oversized or truncated frames)
/// leave the channel out of sync and end the session.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = usize::try_from(u32::from_le_bytes(len_bytes))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    if len > MAX_BRIDGE_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Message too large: {len} bytes (max: {MAX_BRIDGE_MESSAGE_SIZE} bytes)"),
        ));
    }

    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Decode a frame body. A body that does not decode only affects its own frame.
pub fn decode_message(body: &[u8]) -> Result<IncomingMessage, LockerError> {
    serde_json::from_slice(body).map_err(|e| LockerError::Malformed(e.to_string()))
}

pub fn write_frame<W: Write>(writer: &mut W, message: &OutgoingMessage) -> io::Result<()> {
    let json = serde_json::to_vec(message)?;
    let len = u32::try_from(json.len()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&json)?;
    writer.flush()?;

    Ok(())
}

/// Lock presenter that asks the shell to show the lock screen and holds the
/// ticket until the shell reports the result.
pub struct BridgePresenter<W: Write + Send> {
    out: Arc<Mutex<W>>,
    pending: Mutex<HashMap<u64, LockTicket>>,
}

impl<W: Write + Send> BridgePresenter<W> {
    pub fn new(out: Arc<Mutex<W>>) -> Self {
        Self {
            out,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn send(&self, message: &OutgoingMessage) -> Result<(), LockerError> {
        let mut out = safe_lock(&self.out, "Bridge output");
        write_frame(&mut *out, message).map_err(|e| LockerError::Presentation(e.to_string()))
    }

    /// Hand a shell-reported result to its ticket. Returns false for unknown
    /// or already resolved tickets.
    pub fn resolve(&self, ticket: u64, outcome: LockOutcome) -> bool {
        let ticket = safe_lock(&self.pending, "Pending lock tickets").remove(&ticket);
        match ticket {
            Some(ticket) => {
                ticket.resolve(outcome);
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        safe_lock(&self.pending, "Pending lock tickets").len()
    }
}

impl<W: Write + Send> LockPresenter for BridgePresenter<W> {
    fn present(&self, ticket: LockTicket) -> Result<(), LockerError> {
        let id = ticket.id();
        let message = OutgoingMessage::PresentLock {
            package: ticket.app().clone(),
            ticket: id,
        };
        safe_lock(&self.pending, "Pending lock tickets").insert(id, ticket);

        if let Err(e) = self.send(&message) {
            safe_lock(&self.pending, "Pending lock tickets").remove(&id);
            return Err(e);
        }
        Ok(())
    }

    fn show_home(&self) -> Result<(), LockerError> {
        self.send(&OutgoingMessage::GoHome)
    }
}

pub struct Bridge<R: Read, W: Write + Send + 'static> {
    reader: R,
    out: Arc<Mutex<W>>,
    service: LockService,
    store: Arc<dyn PreferenceStore>,
    permissions: Arc<PermissionFlags>,
    presenter: Arc<BridgePresenter<W>>,
    usage_log: Arc<RecordedUsageEvents>,
}

impl<R: Read, W: Write + Send + 'static> Bridge<R, W> {
    /// Start the lock service wired to this channel. Permissions are assumed
    /// missing until the shell reports them.
    pub fn new(
        config: LockerConfig,
        store: Arc<dyn PreferenceStore>,
        reader: R,
        writer: W,
    ) -> Result<Self, LockerError> {
        let out = Arc::new(Mutex::new(writer));
        let permissions = Arc::new(PermissionFlags::default());
        let presenter = Arc::new(BridgePresenter::new(Arc::clone(&out)));
        let horizon_ms = i64::try_from(config.lookback_ms.saturating_mul(4)).unwrap_or(i64::MAX);
        let usage_log = Arc::new(RecordedUsageEvents::new(horizon_ms));

        let service = LockService::start(
            config,
            Collaborators {
                store: Arc::clone(&store),
                permissions: Arc::clone(&permissions) as Arc<dyn Permissions>,
                presenter: Arc::clone(&presenter) as Arc<dyn LockPresenter>,
                usage_events: Some(Arc::clone(&usage_log) as Arc<dyn UsageEvents>),
            },
        )?;

        Ok(Self {
            reader,
            out,
            service,
            store,
            permissions,
            presenter,
            usage_log,
        })
    }

    /// Serve frames until the reader fails. EOF surfaces as
    /// [`io::ErrorKind::UnexpectedEof`] when the shell closes the channel.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            let body = read_frame(&mut self.reader)?;
            let response = match decode_message(&body) {
                Ok(message) => self.handle_message(message),
                Err(e) => {
                    warn!("Skipping frame: {e}");
                    Some(OutgoingMessage::Error { message: e.to_string() })
                }
            };
            if let Some(response) = response {
                let mut out = safe_lock(&self.out, "Bridge output");
                write_frame(&mut *out, &response)?;
            }
        }
    }

    pub fn handle_message(&self, message: IncomingMessage) -> Option<OutgoingMessage> {
        match message {
            IncomingMessage::WindowStateChanged { package, timestamp } => {
                let event = WindowEvent {
                    kind: EventKind::WindowStateChanged,
                    app: Some(AppId::new(package)),
                    timestamp_ms: timestamp.unwrap_or_else(current_timestamp_ms),
                };
                let action = self.service.on_window_event(&event);
                debug!("Window event handled: {action:?}");
                None
            }
            IncomingMessage::UsageEvent { package, kind, timestamp } => {
                self.usage_log.record(UsageEvent {
                    kind,
                    app: AppId::new(package),
                    timestamp_ms: timestamp.unwrap_or_else(current_timestamp_ms),
                });
                None
            }
            IncomingMessage::SetLocked { package, locked } => {
                match settings::set_locked(self.store.as_ref(), &package, locked) {
                    Ok(_) => None,
                    Err(e) => Some(OutgoingMessage::Error { message: e.to_string() }),
                }
            }
            IncomingMessage::LockResult { ticket, outcome } => {
                if self.presenter.resolve(ticket, outcome) {
                    self.service.process_outcomes();
                    None
                } else {
                    warn!("Result for unknown lock ticket {ticket}");
                    Some(OutgoingMessage::Error {
                        message: format!("Unknown lock ticket {ticket}"),
                    })
                }
            }
            IncomingMessage::Permissions { usage, overlay } => {
                self.permissions.update(usage, overlay);
                None
            }
            IncomingMessage::RequestState => Some(self.state()),
        }
    }

    fn state(&self) -> OutgoingMessage {
        OutgoingMessage::State {
            locked: self.service.locked_apps(),
            current: self.service.current_app(),
            presented: self.service.presented_apps(),
        }
    }

    pub fn service(&self) -> &LockService {
        &self.service
    }

    pub fn presenter(&self) -> &BridgePresenter<W> {
        &self.presenter
    }
}
