//! Decoding of stored RFC 5322 messages into [`RawEmail`]

use chrono::{DateTime, Utc};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use tracing::debug;

use crate::error::{LeadError, Result};
use crate::types::{RawEmail, StorageKey};

const BLOCK_TAGS: &[&str] = &[
    "br", "p", "div", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Decode raw message bytes.
///
/// Every `text/plain` leaf becomes a body part, in message order. A message
/// without any plain-text leaf contributes its first HTML leaf, tag-stripped.
/// `received_at` is used when the `Date` header is absent or unparseable.
pub fn decode_raw_email(
    storage_key: StorageKey,
    raw: &[u8],
    received_at: DateTime<Utc>,
) -> Result<RawEmail> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| LeadError::Decode(e.to_string()))?;

    let sender = parsed
        .headers
        .get_first_value("From")
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| LeadError::Decode("missing From header".into()))?;
    let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();
    let date = parsed
        .headers
        .get_first_value("Date")
        .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
        .map_or(received_at, |dt| dt.with_timezone(&Utc));

    let mut text = Vec::new();
    let mut html = None;
    collect_bodies(&parsed, &mut text, &mut html);

    if text.is_empty()
        && let Some(html) = html
    {
        text.push(html_to_text(&html));
    }

    debug!(
        key = %storage_key,
        parts = text.len(),
        "Decoded email from {}",
        sender
    );

    Ok(RawEmail::new(storage_key, sender, subject, text, date))
}

fn collect_bodies(part: &ParsedMail, text: &mut Vec<String>, html: &mut Option<String>) {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_bodies(sub, text, html);
        }
        return;
    }

    if matches!(
        part.get_content_disposition().disposition,
        DispositionType::Attachment
    ) {
        return;
    }

    let mimetype = part.ctype.mimetype.to_ascii_lowercase();
    match part.get_body() {
        Ok(body) if mimetype == "text/plain" => text.push(body),
        Ok(body) if mimetype == "text/html" && html.is_none() => *html = Some(body),
        Ok(_) => {}
        Err(e) => debug!(mimetype = %mimetype, error = %e, "Skipping undecodable body part"),
    }
}

/// Strip tags, drop script and style content, break lines at block tags.
pub(crate) fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let mut skipping: Option<&'static str> = None;

    while let Some(open) = rest.find('<') {
        if skipping.is_none() {
            out.push_str(&rest[..open]);
        }
        let Some(len) = rest[open..].find('>') else {
            rest = "";
            break;
        };

        let tag = rest[open + 1..open + len].trim().to_ascii_lowercase();
        let closing = tag.starts_with('/');
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();

        match skipping {
            Some(end) if closing && name == end => skipping = None,
            Some(_) => {}
            None if !closing && name == "script" => skipping = Some("script"),
            None if !closing && name == "style" => skipping = Some("style"),
            None if BLOCK_TAGS.contains(&name) => out.push('\n'),
            None => {}
        }

        rest = &rest[open + len + 1..];
    }
    if skipping.is_none() {
        out.push_str(rest);
    }

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
