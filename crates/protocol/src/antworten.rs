//! Feste Wire-Antworten des Event-Sockets
//!
//! Die Reply-Strings sind FreeSWITCH-kompatibel und byte-genau festgelegt –
//! Clients matchen auf `+OK` bzw. `-ERR` in der `Reply-Text`-Zeile.

use crate::ereignis_format::EventFormat;

/// Aufforderung zur Authentifizierung, direkt nach dem Verbindungsaufbau
pub const AUTH_ANFRAGE: &str = "Content-Type: auth/request\n\n";

/// Antwort auf ein korrektes `auth`-Kommando
pub const AUTH_AKZEPTIERT: &str = "Content-Type: command/reply\nReply-Text: +OK accepted\n\n";

/// Antwort auf ein falsches Passwort
pub const AUTH_ABGELEHNT: &str = "Content-Type: command/reply\nReply-Text: -ERR invalid\n\n";

/// Antwort auf ein `exit`-Kommando
pub const EXIT_BESTAETIGT: &str = "Content-Type: command/reply\nReply-Text: +OK bye\n\n";

/// Antwort auf ein unbekanntes Kommando; die Session bleibt offen
pub const BEFEHL_UNBEKANNT: &str =
    "Content-Type: command/reply\nReply-Text: -ERR command not found\n\n";

/// Body des Disconnect-Hinweises
pub const DISCONNECT_BODY: &str =
    "Disconnect, goodbye.\nSee you at ClueCon! http://www.cluecon.com/\n";

// Content-Types der Peer->Client-Nachrichten
pub const CONTENT_TYPE_AUTH_ANFRAGE: &str = "auth/request";
pub const CONTENT_TYPE_BEFEHL_ANTWORT: &str = "command/reply";
pub const CONTENT_TYPE_API_ANTWORT: &str = "api/response";
pub const CONTENT_TYPE_DISCONNECT: &str = "text/disconnect-notice";
pub const CONTENT_TYPE_EVENT_PLAIN: &str = "text/event-plain";
pub const CONTENT_TYPE_EVENT_JSON: &str = "text/event-json";

/// Baut den Disconnect-Hinweis mit korrekt deklariertem Body
pub fn disconnect_hinweis() -> String {
    format!(
        "Content-Type: {}\nContent-Length: {}\n\n{}",
        CONTENT_TYPE_DISCONNECT,
        DISCONNECT_BODY.len(),
        DISCONNECT_BODY
    )
}

/// Rahmt einen freien Antwort-Text (z.B. `status`) als API-Antwort
pub fn api_antwort(body: &str) -> String {
    format!(
        "Content-Type: {}\nContent-Length: {}\n\n{}",
        CONTENT_TYPE_API_ANTWORT,
        body.len(),
        body
    )
}

/// Rahmt ein gerendertes Event als Push-Nachricht
///
/// `Content-Length` zaehlt den Zeilenumbruch mit, der nach dem Body
/// geschrieben wird (gerenderte Laenge + 1). Dieses Off-by-one ist
/// Kompatibilitaetsvertrag – Client-Parser verlassen sich darauf und es
/// darf nicht "repariert" werden, ohne auch die Leser anzupassen.
pub fn event_nachricht(format: EventFormat, gerendert: &str) -> String {
    format!(
        "Content-Length: {}\nContent-Type: text/event-{}\n\n{}\n",
        gerendert.len() + 1,
        format.als_str(),
        gerendert
    )
}
