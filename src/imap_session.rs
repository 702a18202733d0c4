//! Thin capability over the blocking IMAP client library: connect, list,
//! select, create, fetch, append, logout — plus the reconnect-on-closed-
//! session helper the account pipeline drives every retryable operation
//! through.

use std::net::TcpStream;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use imap::Session;
use native_tls::TlsStream;

/// Result of a SELECT: message count, next UID the server will assign,
/// and the UID-validity generation token.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectedMailbox {
    pub exists: u32,
    pub uid_next: u32,
}

/// One mailbox as returned by LIST.
#[derive(Debug, Clone)]
pub struct MailboxDescriptor {
    pub name: String,
    pub no_select: bool,
}

/// The envelope fields the pipeline needs: enough to derive a duplicate
/// key and apply the date filter.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub message_id: String,
    pub subject: String,
    pub from: String,
    pub date: DateTime<Utc>,
}

/// One fetched message: its UID within the selected folder, envelope,
/// flags, and full RFC-822 body.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub uid: u32,
    pub envelope: Envelope,
    pub flags: Vec<String>,
    pub body: Vec<u8>,
}

/// Capability boundary the account pipeline is written against. The real
/// implementation wraps a blocking `imap::Session`; tests drive the
/// pipeline against an in-memory fake (see the `testing` submodule)
/// since no live IMAP server is available in this environment.
pub trait MailboxSession {
    fn list(&mut self) -> Result<Vec<MailboxDescriptor>>;
    fn select(&mut self, name: &str, read_only: bool) -> Result<SelectedMailbox>;
    fn create(&mut self, name: &str) -> Result<()>;
    fn fetch_range(&mut self, uid_lo: u32, uid_hi: u32) -> Result<Vec<FetchedMessage>>;
    fn fetch_envelopes(&mut self, uid_lo: u32, uid_hi: u32) -> Result<Vec<Envelope>>;
    fn append(
        &mut self,
        folder: &str,
        body: &[u8],
        flags: &[String],
        internal_date: DateTime<Utc>,
    ) -> Result<()>;
    fn logout(&mut self);
}

/// Dial parameters for a single endpoint; reused both for the initial
/// connect and for every reconnect-on-closed-session swap.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub starttls: bool,
    pub user: String,
    pub password: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Endpoint {
            host: host.into(),
            port: 993,
            starttls: false,
            user: user.into(),
            password: password.into(),
        }
    }
}

/// TLS dial + LOGIN. Fails with a connect-error on dial, auth-error on
/// login rejection; the client is dropped (never left half-open) on
/// login failure.
pub fn connect(endpoint: &Endpoint) -> Result<Box<dyn MailboxSession>> {
    let mut tls_builder = native_tls::TlsConnector::builder();
    if endpoint.starttls || endpoint.host == "127.0.0.1" || endpoint.host == "localhost" {
        tls_builder.danger_accept_invalid_certs(true);
        tls_builder.danger_accept_invalid_hostnames(true);
    }
    let tls = tls_builder.build().context("building TLS connector")?;

    let client = if endpoint.starttls {
        imap::connect_starttls((endpoint.host.as_str(), endpoint.port), &endpoint.host, &tls)
    } else {
        imap::connect((endpoint.host.as_str(), endpoint.port), &endpoint.host, &tls)
    }
    .map_err(|e| crate::error::MigrationError::Connect {
        host: format!("{}:{}", endpoint.host, endpoint.port),
        source: anyhow::anyhow!(e),
    })?;

    let session = client.login(&endpoint.user, &endpoint.password).map_err(|(e, _client)| {
        crate::error::MigrationError::Auth {
            host: endpoint.host.clone(),
            user: endpoint.user.clone(),
            source: anyhow::anyhow!(e),
        }
    })?;

    Ok(Box::new(RealSession { session }))
}

/// connect(), then LOGOUT — used by the scheduler's pre-flight probe.
pub fn test_connection(endpoint: &Endpoint) -> Result<()> {
    let mut session = connect(endpoint)?;
    session.logout();
    Ok(())
}

/// A dial function: takes an endpoint, opens a fresh session. `connect`
/// is the real implementation; tests substitute one that hands back a
/// fresh in-memory `FakeSession` instead of dialing out, which is what
/// lets the reconnect-retry discipline be exercised without a live
/// IMAP server.
pub type Dialer<'a> = dyn Fn(&Endpoint) -> Result<Box<dyn MailboxSession>> + 'a;

/// Inspects `err`'s rendered message for the closed-connection markers.
/// On a match, dials a fresh session via `dialer` and swaps it into
/// `slot`, returning true. On a mismatch, or a failed redial, `slot` is
/// left untouched and false is returned — callers treat that as "not
/// retryable, surface the original error".
pub fn reconnect_if_transient(
    slot: &mut Box<dyn MailboxSession>,
    endpoint: &Endpoint,
    dialer: &Dialer<'_>,
    err: &anyhow::Error,
) -> bool {
    if !crate::util::is_transient(&crate::util::error_chain_message(err)) {
        return false;
    }
    match dialer(endpoint) {
        Ok(fresh) => {
            slot.logout();
            *slot = fresh;
            true
        }
        Err(_) => false,
    }
}

type ImapSession = Session<TlsStream<TcpStream>>;

struct RealSession {
    session: ImapSession,
}

impl MailboxSession for RealSession {
    fn list(&mut self) -> Result<Vec<MailboxDescriptor>> {
        let names = self.session.list(Some(""), Some("*")).context("LIST")?;
        Ok(names
            .iter()
            .map(|n| MailboxDescriptor {
                name: n.name().to_string(),
                no_select: n
                    .attributes()
                    .iter()
                    .any(|a| matches!(a, imap::types::NameAttribute::NoSelect)),
            })
            .collect())
    }

    fn select(&mut self, name: &str, read_only: bool) -> Result<SelectedMailbox> {
        let mailbox = if read_only {
            self.session.examine(name).with_context(|| format!("EXAMINE {}", name))?
        } else {
            self.session.select(name).with_context(|| format!("SELECT {}", name))?
        };
        Ok(SelectedMailbox {
            exists: mailbox.exists,
            uid_next: mailbox.uid_next.unwrap_or(1),
        })
    }

    fn create(&mut self, name: &str) -> Result<()> {
        self.session.create(name).with_context(|| format!("CREATE {}", name))
    }

    fn fetch_range(&mut self, uid_lo: u32, uid_hi: u32) -> Result<Vec<FetchedMessage>> {
        if uid_hi < uid_lo {
            return Ok(Vec::new());
        }
        let range = format!("{}:{}", uid_lo, uid_hi);
        let fetches = self
            .session
            .uid_fetch(&range, "(UID ENVELOPE FLAGS BODY[])")
            .with_context(|| format!("UID FETCH {}", range))?;

        Ok(fetches
            .iter()
            .filter_map(|f| {
                let body = f.body()?.to_vec();
                let uid = f.uid.unwrap_or(0);
                let envelope = parse_envelope(f.envelope());
                let flags = f.flags().iter().map(flag_to_string).collect();
                Some(FetchedMessage {
                    uid,
                    envelope,
                    flags,
                    body,
                })
            })
            .collect())
    }

    fn fetch_envelopes(&mut self, uid_lo: u32, uid_hi: u32) -> Result<Vec<Envelope>> {
        if uid_hi < uid_lo {
            return Ok(Vec::new());
        }
        let range = format!("{}:{}", uid_lo, uid_hi);
        let fetches = self
            .session
            .uid_fetch(&range, "(UID ENVELOPE)")
            .with_context(|| format!("UID FETCH {}", range))?;
        Ok(fetches.iter().map(|f| parse_envelope(f.envelope())).collect())
    }

    fn append(
        &mut self,
        folder: &str,
        body: &[u8],
        flags: &[String],
        internal_date: DateTime<Utc>,
    ) -> Result<()> {
        let imap_flags: Vec<imap::types::Flag<'static>> =
            flags.iter().map(|f| string_to_flag(f)).collect();

        self.session
            .append(folder, body)
            .flags(imap_flags)
            .internal_date(internal_date.fixed_offset())
            .finish()
            .with_context(|| format!("APPEND to {}", folder))
    }

    fn logout(&mut self) {
        // Logout errors are non-fatal: some servers send a LOGOUT
        // response the client can't fully parse, and by this point the
        // command stream's work is already done.
        let _ = self.session.logout();
    }
}

fn parse_envelope(envelope: Option<&imap::types::Envelope>) -> Envelope {
    let Some(envelope) = envelope else {
        return Envelope::default();
    };

    let message_id = envelope
        .message_id
        .as_ref()
        .map(|b| String::from_utf8_lossy(b).trim_matches(['<', '>']).to_string())
        .unwrap_or_default();

    let subject = envelope
        .subject
        .as_ref()
        .map(|b| String::from_utf8_lossy(b).to_string())
        .unwrap_or_default();

    let from = envelope
        .from
        .as_ref()
        .and_then(|addrs| addrs.first())
        .map(|addr| {
            let mailbox = addr
                .mailbox
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).to_string())
                .unwrap_or_default();
            let host = addr
                .host
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).to_string())
                .unwrap_or_default();
            format!("{}@{}", mailbox, host)
        })
        .unwrap_or_default();

    let date = envelope
        .date
        .as_ref()
        .and_then(|b| DateTime::parse_from_rfc2822(&String::from_utf8_lossy(b)).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default();

    Envelope {
        message_id,
        subject,
        from,
        date,
    }
}

fn flag_to_string(flag: &imap::types::Flag<'_>) -> String {
    match flag {
        imap::types::Flag::Seen => "\\Seen".to_string(),
        imap::types::Flag::Answered => "\\Answered".to_string(),
        imap::types::Flag::Flagged => "\\Flagged".to_string(),
        imap::types::Flag::Deleted => "\\Deleted".to_string(),
        imap::types::Flag::Draft => "\\Draft".to_string(),
        imap::types::Flag::Recent => "\\Recent".to_string(),
        imap::types::Flag::MayCreate => "\\*".to_string(),
        imap::types::Flag::Custom(s) => s.to_string(),
        _ => String::new(),
    }
}

/// Removes the volatile `\Recent` flag, matching `filterValidFlags` in
/// the original pipeline: `\Recent` is server-assigned per-session and
/// must never be replayed on APPEND.
pub fn filter_valid_flags(flags: &[String]) -> Vec<String> {
    flags.iter().filter(|f| *f != "\\Recent").cloned().collect()
}
