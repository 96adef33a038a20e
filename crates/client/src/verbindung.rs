//! TCP-Implementierung des Event-Socket-Clients
//!
//! `verbinden` baut die Verbindung unter einem Zeitlimit auf, wartet auf
//! die Auth-Aufforderung des Peers und fuehrt den Passwort-Handshake aus.
//! Danach teilen sich Sende- und Lese-Haelfte den Socket: Kommandos laufen
//! ueber die Mutex-geschuetzte Schreibseite, der Nachrichtenstrom ueber den
//! exklusiven Leser.
//!
//! Die Leseseite ist cancellation-sicher: `read_buf` fuellt einen
//! persistenten Buffer, der Codec konsumiert erst vollstaendige
//! Nachrichten. Ein an einem `select!` abgebrochener Lesevorgang verliert
//! keine Bytes.

use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Decoder;

use telegraph_core::{Event, Result, TelegraphError};
use telegraph_protocol::antworten;
use telegraph_protocol::rahmen::{EslNachricht, NachrichtenCodec, BEFEHL_TRENNER};
use telegraph_protocol::{ereignis_aus_json, ereignis_aus_plain};

use crate::schnittstelle::{EslLeser, EslSender};

// ---------------------------------------------------------------------------
// Sende-Haelfte
// ---------------------------------------------------------------------------

/// Teilbares Sende-Handle auf die Schreibseite des Sockets
pub struct TcpSender<S> {
    schreiber: Mutex<S>,
}

impl<S> TcpSender<S>
where
    S: AsyncWrite + Unpin + Send,
{
    /// Erstellt einen Sender auf einer Schreibhaelfte
    pub fn neu(schreiber: S) -> Self {
        Self {
            schreiber: Mutex::new(schreiber),
        }
    }
}

#[async_trait]
impl<S> EslSender for TcpSender<S>
where
    S: AsyncWrite + Unpin + Send,
{
    async fn senden(&self, befehl: &str) -> Result<()> {
        let mut schreiber = self.schreiber.lock().await;
        schreiber.write_all(befehl.as_bytes()).await?;
        schreiber.write_all(BEFEHL_TRENNER).await?;
        schreiber.flush().await?;
        Ok(())
    }

    async fn schliessen(&self) -> Result<()> {
        let mut schreiber = self.schreiber.lock().await;
        schreiber.shutdown().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lese-Haelfte
// ---------------------------------------------------------------------------

/// Exklusiver Leser des Nachrichtenstroms
pub struct TcpLeser<L> {
    leser: L,
    buffer: BytesMut,
    codec: NachrichtenCodec,
}

impl<L> TcpLeser<L>
where
    L: AsyncRead + Unpin + Send,
{
    /// Erstellt einen Leser auf einer Lesehaelfte
    pub fn neu(leser: L) -> Self {
        Self {
            leser,
            buffer: BytesMut::with_capacity(4096),
            codec: NachrichtenCodec::new(),
        }
    }

    /// Liest die naechste Rohnachricht; `None` bei EOF
    async fn rohnachricht_lesen(&mut self) -> Result<Option<EslNachricht>> {
        loop {
            if let Some(nachricht) = self.codec.decode(&mut self.buffer)? {
                return Ok(Some(nachricht));
            }
            let gelesen = self.leser.read_buf(&mut self.buffer).await?;
            if gelesen == 0 {
                return Ok(None);
            }
        }
    }
}

#[async_trait]
impl<L> EslLeser for TcpLeser<L>
where
    L: AsyncRead + Unpin + Send,
{
    async fn nachricht_lesen(&mut self) -> Result<Option<Event>> {
        loop {
            let Some(nachricht) = self.rohnachricht_lesen().await? else {
                return Ok(None);
            };
            match nachricht.content_type() {
                Some(antworten::CONTENT_TYPE_EVENT_PLAIN) => {
                    let body = nachricht.body.as_deref().unwrap_or_default();
                    return Ok(Some(ereignis_aus_plain(body)));
                }
                Some(antworten::CONTENT_TYPE_EVENT_JSON) => {
                    let body = nachricht.body.as_deref().unwrap_or_default();
                    // der gezaehlte Trailing-Newline gehoert nicht zum JSON
                    return Ok(Some(ereignis_aus_json(body.trim_end_matches('\n'))?));
                }
                Some(antworten::CONTENT_TYPE_DISCONNECT) => {
                    tracing::debug!("Disconnect-Hinweis vom Peer, Strom beendet");
                    return Ok(None);
                }
                typ => {
                    // Kommando-Antworten u.ae. sind No-ops: weiterlesen
                    tracing::trace!(content_type = ?typ, "Nachricht uebersprungen");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Verbindungsaufbau
// ---------------------------------------------------------------------------

/// Fuehrt den Auth-Handshake auf einer frisch aufgebauten Verbindung aus
///
/// Wartet auf die `auth/request`-Aufforderung, sendet `auth <passwort>` und
/// prueft die `Reply-Text`-Antwort. Alles ausser `+OK` ist ein
/// Authentifizierungsfehler.
pub async fn handshake<S, L>(
    sender: &TcpSender<S>,
    leser: &mut TcpLeser<L>,
    passwort: &str,
) -> Result<()>
where
    S: AsyncWrite + Unpin + Send,
    L: AsyncRead + Unpin + Send,
{
    loop {
        let Some(nachricht) = leser.rohnachricht_lesen().await? else {
            return Err(TelegraphError::Getrennt(
                "Peer hat vor der Auth-Anfrage geschlossen".into(),
            ));
        };
        if nachricht.content_type() == Some(antworten::CONTENT_TYPE_AUTH_ANFRAGE) {
            break;
        }
    }

    sender.senden(&format!("auth {passwort}")).await?;

    loop {
        let Some(nachricht) = leser.rohnachricht_lesen().await? else {
            return Err(TelegraphError::Authentifizierung(
                "Verbindung waehrend der Authentifizierung getrennt".into(),
            ));
        };
        if nachricht.content_type() != Some(antworten::CONTENT_TYPE_BEFEHL_ANTWORT) {
            continue;
        }
        let antwort = nachricht.header("Reply-Text").unwrap_or_default();
        if antwort.starts_with("+OK") {
            return Ok(());
        }
        return Err(TelegraphError::Authentifizierung(antwort.to_string()));
    }
}

/// Baut eine authentifizierte Event-Socket-Verbindung auf
///
/// Das Zeitlimit gilt fuer den TCP-Aufbau und den Handshake getrennt.
/// Gibt die geteilte Sende-Haelfte und den exklusiven Leser zurueck.
pub async fn verbinden(
    host: &str,
    port: u16,
    passwort: &str,
    timeout: Duration,
) -> Result<(TcpSender<OwnedWriteHalf>, TcpLeser<OwnedReadHalf>)> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| TelegraphError::Zeitlimit(format!("Verbindungsaufbau zu {host}:{port}")))?
        .map_err(|e| TelegraphError::Verbindung(format!("{host}:{port}: {e}")))?;

    let (lese_haelfte, schreib_haelfte) = stream.into_split();
    let sender = TcpSender::neu(schreib_haelfte);
    let mut leser = TcpLeser::neu(lese_haelfte);

    tokio::time::timeout(timeout, handshake(&sender, &mut leser, passwort))
        .await
        .map_err(|_| TelegraphError::Zeitlimit("Authentifizierungs-Handshake".into()))??;

    tracing::debug!(host, port, "Event-Socket-Verbindung aufgebaut");
    Ok((sender, leser))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
