//! Framing der beiden Wire-Richtungen
//!
//! Client->Peer: Befehlssegmente, getrennt durch den 4-Byte-Trenner
//! `\r\n\r\n`. Peer->Client: Nachrichten aus einem `\n\n`-terminierten
//! Header-Block plus optionalem Body exakter `Content-Length`.
//!
//! Beide Codecs konsumieren den Buffer erst, wenn eine Einheit vollstaendig
//! vorliegt; unvollstaendige Reste bleiben als neuer Buffer stehen.

use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Trenner zwischen zwei Befehlssegmenten
pub const BEFEHL_TRENNER: &[u8] = b"\r\n\r\n";

/// Standard-Limit fuer ein einzelnes Befehlssegment
pub const DEFAULT_MAX_SEGMENT: usize = 8192;

/// Standard-Limit fuer eine Peer->Client-Nachricht (Header + Body)
pub const DEFAULT_MAX_NACHRICHT: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// KommandoCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer die Befehlsrichtung
///
/// Decoder-Seite (Peer): zerlegt den Byte-Strom in Segmente. Encoder-Seite
/// (Client): haengt den Trenner an jedes gesendete Kommando an.
#[derive(Debug, Clone)]
pub struct KommandoCodec {
    /// Maximal erlaubte Segmentlaenge in Bytes
    max_segment: usize,
}

impl KommandoCodec {
    /// Erstellt einen neuen `KommandoCodec` mit Standard-Limit
    pub fn new() -> Self {
        Self {
            max_segment: DEFAULT_MAX_SEGMENT,
        }
    }

    /// Erstellt einen `KommandoCodec` mit eigenem Segment-Limit
    pub fn with_max_segment(max_segment: usize) -> Self {
        Self { max_segment }
    }
}

impl Default for KommandoCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for KommandoCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let position = src
            .windows(BEFEHL_TRENNER.len())
            .position(|fenster| fenster == BEFEHL_TRENNER);

        match position {
            Some(pos) => {
                let segment = src.split_to(pos);
                src.advance(BEFEHL_TRENNER.len());
                Ok(Some(String::from_utf8_lossy(&segment).into_owned()))
            }
            None => {
                if src.len() > self.max_segment {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "Befehlssegment zu gross: {} Bytes (Maximum: {} Bytes)",
                            src.len(),
                            self.max_segment
                        ),
                    ));
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for KommandoCodec {
    type Error = io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_segment {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Kommando zu gross: {} Bytes (Maximum: {} Bytes)",
                    item.len(),
                    self.max_segment
                ),
            ));
        }
        dst.reserve(item.len() + BEFEHL_TRENNER.len());
        dst.extend_from_slice(item.as_bytes());
        dst.extend_from_slice(BEFEHL_TRENNER);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EslNachricht + NachrichtenCodec
// ---------------------------------------------------------------------------

/// Eine rohe Peer->Client-Nachricht: Header-Block + optionaler Body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EslNachricht {
    /// Header in Empfangsreihenfolge
    pub headers: Vec<(String, String)>,
    /// Body, wenn die Nachricht einen `Content-Length`-Header trug
    pub body: Option<String>,
}

impl EslNachricht {
    /// Gibt den Wert des ersten Headers mit diesem Namen zurueck
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Der `Content-Type` der Nachricht
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }
}

/// tokio-util Decoder fuer die Nachrichtenrichtung (Peer->Client)
#[derive(Debug, Clone)]
pub struct NachrichtenCodec {
    /// Maximal erlaubte Nachrichtengroesse in Bytes
    max_nachricht: usize,
}

impl NachrichtenCodec {
    /// Erstellt einen neuen `NachrichtenCodec` mit Standard-Limit
    pub fn new() -> Self {
        Self {
            max_nachricht: DEFAULT_MAX_NACHRICHT,
        }
    }

    /// Erstellt einen `NachrichtenCodec` mit eigenem Limit
    pub fn with_max_nachricht(max_nachricht: usize) -> Self {
        Self { max_nachricht }
    }
}

impl Default for NachrichtenCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for NachrichtenCodec {
    type Item = EslNachricht;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Header-Block suchen, ohne den Buffer zu veraendern
        let Some(kopf_ende) = src.windows(2).position(|fenster| fenster == b"\n\n") else {
            if src.len() > self.max_nachricht {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Header-Block ohne Abschluss ueberschreitet das Nachrichtenlimit",
                ));
            }
            return Ok(None);
        };

        let kopf = String::from_utf8_lossy(&src[..kopf_ende]).into_owned();
        let mut headers = Vec::new();
        for zeile in kopf.lines() {
            if let Some((name, wert)) = zeile.split_once(':') {
                let wert = wert.strip_prefix(' ').unwrap_or(wert);
                headers.push((name.to_string(), wert.to_string()));
            }
        }

        let body_laenge = match headers
            .iter()
            .find(|(n, _)| n == "Content-Length")
            .map(|(_, v)| v.trim().parse::<usize>())
        {
            Some(Ok(n)) => Some(n),
            Some(Err(_)) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Ungueltiger Content-Length-Header",
                ));
            }
            None => None,
        };

        match body_laenge {
            Some(laenge) => {
                if laenge > self.max_nachricht {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "Nachrichten-Body zu gross: {} Bytes (Maximum: {} Bytes)",
                            laenge, self.max_nachricht
                        ),
                    ));
                }
                let gesamt = kopf_ende + 2 + laenge;
                if src.len() < gesamt {
                    // Speicher vorbelegen und auf den Rest des Bodys warten
                    src.reserve(gesamt - src.len());
                    return Ok(None);
                }
                src.advance(kopf_ende + 2);
                let body = src.split_to(laenge);
                Ok(Some(EslNachricht {
                    headers,
                    body: Some(String::from_utf8_lossy(&body).into_owned()),
                }))
            }
            None => {
                src.advance(kopf_ende + 2);
                Ok(Some(EslNachricht {
                    headers,
                    body: None,
                }))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::antworten;
    use crate::ereignis_format::{ereignis_aus_plain, EventFormat};
    use telegraph_core::Event;

    #[test]
    fn kommando_codec_einzelnes_segment() {
        let mut codec = KommandoCodec::new();
        let mut buf = BytesMut::from(&b"auth ClueCon\r\n\r\n"[..]);

        let segment = codec.decode(&mut buf).unwrap().expect("Segment erwartet");
        assert_eq!(segment, "auth ClueCon");
        assert!(buf.is_empty());
    }

    #[test]
    fn kommando_codec_unvollstaendiges_segment() {
        let mut codec = KommandoCodec::new();
        let mut buf = BytesMut::from(&b"event plain HEART"[..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        // Rest bleibt als Buffer erhalten
        assert_eq!(&buf[..], b"event plain HEART");
    }

    #[test]
    fn kommando_codec_mehrere_segmente_im_buffer() {
        let mut codec = KommandoCodec::new();
        let mut buf = BytesMut::from(&b"auth pw\r\n\r\nstatus\r\n\r\nexi"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("auth pw"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("status"));
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], b"exi");
    }

    #[test]
    fn kommando_codec_encode_decode_round_trip() {
        let mut codec = KommandoCodec::new();
        let mut buf = BytesMut::new();

        codec.encode("event json HEARTBEAT".to_string(), &mut buf).unwrap();
        let segment = codec.decode(&mut buf).unwrap().expect("Segment erwartet");
        assert_eq!(segment, "event json HEARTBEAT");
    }

    #[test]
    fn kommando_codec_ablehnung_zu_grosses_segment() {
        let mut codec = KommandoCodec::with_max_segment(8);
        let mut buf = BytesMut::from(&b"ein viel zu langes Segment ohne Trenner"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn nachrichten_codec_header_ohne_body() {
        let mut codec = NachrichtenCodec::new();
        let mut buf = BytesMut::from(antworten::AUTH_ANFRAGE.as_bytes());

        let nachricht = codec.decode(&mut buf).unwrap().expect("Nachricht erwartet");
        assert_eq!(nachricht.content_type(), Some("auth/request"));
        assert!(nachricht.body.is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn nachrichten_codec_mit_body() {
        let mut original = Event::mit_namen("TEST");
        original.header_setzen("Core-UUID", "abc");
        let gerendert = original.serialisieren_plain();
        let push = antworten::event_nachricht(EventFormat::Plain, &gerendert);

        let mut codec = NachrichtenCodec::new();
        let mut buf = BytesMut::from(push.as_bytes());
        let nachricht = codec.decode(&mut buf).unwrap().expect("Nachricht erwartet");

        assert_eq!(nachricht.content_type(), Some("text/event-plain"));
        let body = nachricht.body.expect("Body erwartet");
        // Der Body traegt den gezaehlten Trailing-Newline
        assert_eq!(body.len(), gerendert.len() + 1);

        // Round trip: Plain-Serialisierung -> Framing-Parser -> Event
        let geparst = ereignis_aus_plain(&body);
        assert_eq!(geparst, original);
    }

    #[test]
    fn nachrichten_codec_wartet_auf_vollstaendigen_body() {
        let push = antworten::event_nachricht(EventFormat::Plain, "Event-Name: TEST\n");
        let (erste_haelfte, rest) = push.as_bytes().split_at(push.len() - 5);

        let mut codec = NachrichtenCodec::new();
        let mut buf = BytesMut::from(erste_haelfte);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(rest);
        assert!(codec.decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn nachrichten_codec_mehrere_nachrichten() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(antworten::AUTH_AKZEPTIERT.as_bytes());
        buf.extend_from_slice(antworten::EXIT_BESTAETIGT.as_bytes());

        let mut codec = NachrichtenCodec::new();
        let erste = codec.decode(&mut buf).unwrap().expect("Nachricht erwartet");
        let zweite = codec.decode(&mut buf).unwrap().expect("Nachricht erwartet");
        assert_eq!(erste.header("Reply-Text"), Some("+OK accepted"));
        assert_eq!(zweite.header("Reply-Text"), Some("+OK bye"));
    }

    #[test]
    fn nachrichten_codec_ablehnung_ungueltiger_content_length() {
        let mut codec = NachrichtenCodec::new();
        let mut buf = BytesMut::from(&b"Content-Length: viele\n\n"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn nachrichten_codec_ablehnung_zu_grosser_body() {
        let mut codec = NachrichtenCodec::with_max_nachricht(16);
        let mut buf = BytesMut::from(&b"Content-Length: 4096\n\nx"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn disconnect_hinweis_parst_sauber() {
        let mut codec = NachrichtenCodec::new();
        let mut buf = BytesMut::from(antworten::disconnect_hinweis().as_bytes());

        let nachricht = codec.decode(&mut buf).unwrap().expect("Nachricht erwartet");
        assert_eq!(nachricht.content_type(), Some("text/disconnect-notice"));
        assert_eq!(nachricht.body.as_deref(), Some(antworten::DISCONNECT_BODY));
    }
}
