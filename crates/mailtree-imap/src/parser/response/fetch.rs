//! FETCH response parsing.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;

use super::helpers::{parse_flag_list, parse_value};
use super::types::{Address, Envelope, FetchItem, Value};

/// Parses the parenthesized item list of a FETCH response.
pub fn parse_fetch(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;
    let mut items = Vec::new();

    loop {
        match lexer.peek() {
            Some(b')') => {
                lexer.advance();
                break;
            }
            Some(b' ') => {
                lexer.advance();
            }
            _ => items.push(parse_item(lexer)?),
        }
    }

    Ok(items)
}

fn parse_item(lexer: &mut Lexer<'_>) -> Result<FetchItem> {
    let name = lexer.read_atom()?.to_ascii_uppercase();
    let section = read_section(lexer)?;
    let origin = read_origin(lexer)?;
    lexer.expect_space()?;

    let item = match (name.as_str(), &section) {
        ("FLAGS", None) => FetchItem::Flags(parse_flag_list(lexer)?),
        ("UID", None) => {
            let n = lexer.read_nz_number()?;
            FetchItem::Uid(Uid::new(n).ok_or_else(|| lexer.error("UID 0"))?)
        }
        ("RFC822.SIZE", None) => FetchItem::Rfc822Size(lexer.read_number()?),
        ("INTERNALDATE", None) => FetchItem::InternalDate(lexer.read_string()?),
        ("ENVELOPE", None) => FetchItem::Envelope(Box::new(parse_envelope(lexer)?)),
        ("BODYSTRUCTURE" | "BODY", None) => FetchItem::BodyStructure(parse_value(lexer)?),
        ("MODSEQ", None) => {
            lexer.expect(Token::LParen)?;
            let n = lexer.read_number64()?;
            lexer.expect(Token::RParen)?;
            FetchItem::ModSeq(n)
        }
        ("BODY", Some(section)) => FetchItem::Body {
            section: section.clone(),
            origin,
            data: read_body_data(lexer)?,
        },
        ("RFC822" | "RFC822.HEADER" | "RFC822.TEXT", None) => FetchItem::Body {
            section: name.strip_prefix("RFC822.").unwrap_or_default().to_string(),
            origin: None,
            data: read_body_data(lexer)?,
        },
        _ => {
            let mut full = name.clone();
            if let Some(section) = &section {
                full.push('[');
                full.push_str(section);
                full.push(']');
            }
            if let Some(origin) = origin {
                full.push_str(&format!("<{origin}>"));
            }
            FetchItem::Other {
                name: full,
                value: parse_value(lexer)?,
            }
        }
    };

    Ok(item)
}

/// Reads `[section]` verbatim; sections may hold spaces and parentheses.
fn read_section(lexer: &mut Lexer<'_>) -> Result<Option<String>> {
    if lexer.peek() != Some(b'[') {
        return Ok(None);
    }
    lexer.advance();
    let rest = lexer.remaining();
    let end = rest
        .iter()
        .position(|&b| b == b']')
        .ok_or_else(|| lexer.error("unterminated section"))?;
    let section = String::from_utf8_lossy(&rest[..end]).into_owned();
    lexer.skip(end + 1);
    Ok(Some(section))
}

fn read_origin(lexer: &mut Lexer<'_>) -> Result<Option<u32>> {
    if lexer.peek() != Some(b'<') {
        return Ok(None);
    }
    lexer.advance();
    let rest = lexer.remaining();
    let end = rest
        .iter()
        .position(|&b| b == b'>')
        .ok_or_else(|| lexer.error("unterminated origin"))?;
    let origin = std::str::from_utf8(&rest[..end])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| lexer.error("invalid origin"))?;
    lexer.skip(end + 1);
    Ok(Some(origin))
}

fn read_body_data(lexer: &mut Lexer<'_>) -> Result<Option<Vec<u8>>> {
    match lexer.next_token()? {
        Token::Nil => Ok(None),
        Token::Literal(data) => Ok(Some(data.to_vec())),
        Token::QuotedString(s) => Ok(Some(s.into_bytes())),
        token => Err(lexer.error(format!("expected body data, got {token:?}"))),
    }
}

/// Parses an ENVELOPE structure.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(Token::LParen)?;

    let date = lexer.read_nstring()?;
    lexer.expect_space()?;
    let subject = lexer.read_nstring()?;

    let mut lists: [Vec<Address>; 6] = Default::default();
    for list in &mut lists {
        lexer.expect_space()?;
        *list = parse_address_list(lexer)?;
    }

    lexer.expect_space()?;
    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;
    let message_id = lexer.read_nstring()?;
    lexer.expect(Token::RParen)?;

    let [from, sender, reply_to, to, cc, bcc] = lists;
    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    let value = parse_value(lexer)?;
    let Value::List(entries) = value else {
        return if value == Value::Nil {
            Ok(Vec::new())
        } else {
            Err(lexer.error("expected address list"))
        };
    };

    entries
        .iter()
        .map(|entry| match entry.as_list() {
            Some([name, adl, mailbox, host]) => Ok(Address {
                name: nstring(name),
                adl: nstring(adl),
                mailbox: nstring(mailbox),
                host: nstring(host),
            }),
            _ => Err(lexer.error("malformed address")),
        })
        .collect()
}

fn nstring(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::types::Flag;

    fn fetch(input: &[u8]) -> Vec<FetchItem> {
        parse_fetch(&mut Lexer::new(input)).unwrap()
    }

    #[test]
    fn flags_uid_size() {
        let items = fetch(b"(FLAGS (\\Seen) UID 4827313 RFC822.SIZE 44827)");
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], FetchItem::Flags(f) if f.contains(&Flag::Seen)));
        assert_eq!(items[1], FetchItem::Uid(Uid::new(4827313).unwrap()));
        assert_eq!(items[2], FetchItem::Rfc822Size(44827));
    }

    #[test]
    fn body_section_with_literal() {
        let items = fetch(b"(BODY[HEADER.FIELDS (FROM)]<0> {10}\r\nFrom: a\r\n\r UID 7)");
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: "HEADER.FIELDS (FROM)".into(),
                origin: Some(0),
                data: Some(b"From: a\r\n\r".to_vec()),
            }
        );
        assert_eq!(items[1], FetchItem::Uid(Uid::new(7).unwrap()));
    }

    #[test]
    fn rfc822_maps_to_sections() {
        let items = fetch(b"(RFC822.HEADER NIL RFC822 {2}\r\nhi)");
        assert!(matches!(&items[0], FetchItem::Body { section, data: None, .. } if section == "HEADER"));
        assert!(matches!(&items[1], FetchItem::Body { section, data: Some(d), .. } if section.is_empty() && d == b"hi"));
    }

    #[test]
    fn envelope() {
        let items = fetch(
            b"(ENVELOPE (\"Wed, 17 Jul 1996 02:23:25 -0700\" \"IMAP4rev1 WG mtg\" \
              ((\"Terry Gray\" NIL \"gray\" \"cac.washington.edu\")) NIL NIL \
              ((NIL NIL \"imap\" \"cac.washington.edu\")) NIL NIL NIL \"<B27397-0100000@cac.washington.edu>\"))",
        );
        let FetchItem::Envelope(env) = &items[0] else {
            panic!("expected envelope");
        };
        assert_eq!(env.subject.as_deref(), Some("IMAP4rev1 WG mtg"));
        assert_eq!(env.from[0].email().as_deref(), Some("gray@cac.washington.edu"));
        assert!(env.sender.is_empty());
        assert_eq!(env.to[0].name, None);
        assert!(env.message_id.is_some());
    }

    #[test]
    fn bodystructure_and_unknown_items_are_generic() {
        let items = fetch(b"(BODYSTRUCTURE (\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 3 1) X-GM-LABELS (\\Inbox \"Work\") MODSEQ (12121231000))");
        assert!(matches!(&items[0], FetchItem::BodyStructure(Value::List(parts)) if parts.len() == 8));
        assert!(matches!(&items[1], FetchItem::Other { name, value: Value::List(_) } if name == "X-GM-LABELS"));
        assert_eq!(items[2], FetchItem::ModSeq(12121231000));
    }

    #[test]
    fn uid_zero_rejected() {
        assert!(parse_fetch(&mut Lexer::new(b"(UID 0)")).is_err());
    }
}
