//! Befehlsgrammatik der Client->Peer-Richtung
//!
//! Ein Befehl ist ein `\r\n\r\n`-terminiertes Textsegment; das erste
//! Whitespace-Token ist das Verb, der Rest sind Argumente. Die Grammatik
//! kennt `auth`, `event`, `exit` und `status` – alles andere bleibt als
//! unbekanntes Segment erhalten, damit der Antwortpfad es melden kann.

use crate::ereignis_format::EventFormat;
use telegraph_core::event::EVENT_NAME_CUSTOM;

/// Ein geparster Befehl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Befehl {
    /// `auth <passwort>` – fehlt das Argument, ist das Passwort leer
    Auth { passwort: String },
    /// `event plain|json <name>...` – Abonnement-Kommando
    ///
    /// Das Token `CUSTOM` schaltet alle NACHFOLGENDEN Namen desselben
    /// Kommandos in die Subclass-Liste um (einmalige Weiche, gilt nicht
    /// ueber Kommandogrenzen hinweg). Null Namen sind ein gueltiges No-op.
    Event {
        format: EventFormat,
        events: Vec<String>,
        custom_events: Vec<String>,
    },
    /// `exit` – geordnetes Verbindungsende
    Exit,
    /// `status` – Uptime-/Statistik-Abfrage
    Status,
    /// Unbekanntes oder fehlerhaftes Segment (Originaltext)
    Unbekannt(String),
}

impl Befehl {
    /// Parst ein einzelnes Befehlssegment
    pub fn parsen(segment: &str) -> Self {
        let mut felder = segment.split_whitespace();
        match felder.next() {
            Some("auth") => Self::Auth {
                passwort: felder.next().unwrap_or_default().to_string(),
            },
            Some("exit") => Self::Exit,
            Some("status") => Self::Status,
            Some("event") => {
                let Some(format) = felder.next().and_then(EventFormat::parsen) else {
                    return Self::Unbekannt(segment.to_string());
                };
                let mut events = Vec::new();
                let mut custom_events = Vec::new();
                let mut custom_weiche = false;
                for name in felder {
                    if name == EVENT_NAME_CUSTOM {
                        custom_weiche = true;
                        continue;
                    }
                    if custom_weiche {
                        custom_events.push(name.to_string());
                    } else {
                        events.push(name.to_string());
                    }
                }
                Self::Event {
                    format,
                    events,
                    custom_events,
                }
            }
            _ => Self::Unbekannt(segment.to_string()),
        }
    }
}

/// Baut das Abonnement-Kommando fuer einen Abo-Schluessel
///
/// Ein zusammengesetzter Schluessel (`"CUSTOM x"`) landet mit seinem
/// `CUSTOM`-Praefix als Weichen-Token im Kommando.
pub fn abo_befehl(format: EventFormat, schluessel: &str) -> String {
    format!("event {} {}", format.als_str(), schluessel)
}
