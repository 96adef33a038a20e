//! Event-Kodierungen und ihre Parser
//!
//! Das Gegenstueck zu `Event::serialisieren_plain`/`serialisieren_json`:
//! aus dem Payload einer Push-Nachricht wird wieder ein Event-Record.
//! Ein einzelnes fuehrendes Leerzeichen nach dem Doppelpunkt wird beim
//! Parsen roher Header-Zeilen entfernt.

use serde_json::Value;
use telegraph_core::{Event, Result, TelegraphError};

/// Kodierung der Event-Pushes einer Session
///
/// Eine Session ohne explizit gesetzten Modus verhaelt sich wie `Plain`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventFormat {
    #[default]
    Plain,
    Json,
}

impl EventFormat {
    /// Wire-Token der Kodierung (`plain` / `json`)
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Json => "json",
        }
    }

    /// Parst das Wire-Token; unbekannte Tokens sind `None`
    pub fn parsen(token: &str) -> Option<Self> {
        match token {
            "plain" => Some(Self::Plain),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

/// Parst einen plain-serialisierten Event-Payload
///
/// Header-Zeilen bis zur ersten Leerzeile (oder bis zum Ende); ein
/// `Content-Length`-Header kuendigt einen Body exakt dieser Laenge an.
/// Ueberzaehlige Bytes danach (der angehaengte Zeilenumbruch des
/// Push-Framings) werden ignoriert. Doppelte Header-Namen bleiben in
/// Reihenfolge erhalten.
pub fn ereignis_aus_plain(text: &str) -> Event {
    let mut event = Event::neu();
    let mut body_laenge: Option<usize> = None;
    let mut rest = text;

    loop {
        let Some(zeilen_ende) = rest.find('\n') else {
            // letzte Zeile ohne Umbruch
            if let Some((name, wert)) = header_zeile(rest) {
                event.header_anhaengen(name, wert);
            }
            return event;
        };
        let zeile = &rest[..zeilen_ende];
        rest = &rest[zeilen_ende + 1..];

        if zeile.is_empty() {
            // Leerzeile beendet den Header-Block, danach folgt der Body
            break;
        }
        match header_zeile(zeile) {
            Some(("Content-Length", wert)) => {
                body_laenge = wert.trim().parse().ok();
            }
            Some((name, wert)) => event.header_anhaengen(name, wert),
            None => {}
        }
    }

    if let Some(laenge) = body_laenge {
        let body = rest.get(..laenge).unwrap_or(rest);
        event.body_anhaengen(body);
    }
    event
}

/// Parst einen json-serialisierten Event-Payload
///
/// Der Schluessel `"body"` wird zum Event-Body, alle anderen Schluessel
/// werden Header. Die Reihenfolge ist bei dieser Kodierung undefiniert.
pub fn ereignis_aus_json(text: &str) -> Result<Event> {
    let wert: Value = serde_json::from_str(text)?;
    let Value::Object(objekt) = wert else {
        return Err(TelegraphError::protokoll(
            "Event-JSON ist kein Objekt".to_string(),
        ));
    };

    let mut event = Event::neu();
    for (name, wert) in objekt {
        let text = match wert {
            Value::String(s) => s,
            andere => andere.to_string(),
        };
        if name == "body" {
            event.body_anhaengen(&text);
        } else {
            event.header_anhaengen(name, text);
        }
    }
    Ok(event)
}

/// Zerlegt eine rohe Header-Zeile und entfernt EIN fuehrendes Leerzeichen
fn header_zeile(zeile: &str) -> Option<(&str, &str)> {
    let (name, wert) = zeile.split_once(':')?;
    Some((name, wert.strip_prefix(' ').unwrap_or(wert)))
}
