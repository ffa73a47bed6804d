//! Parsers for the pieces shared between response kinds.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, Namespace, Namespaces,
    ResponseCode, SeqNum, Uid, UidSet, UidValidity,
};
use crate::Result;

use super::types::{StatusItem, Value};

/// Parses `[code args]` after the opening bracket has been peeked.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;
    let name = lexer.read_atom()?.to_ascii_uppercase();

    let code = match name.as_str() {
        "UIDNEXT" => {
            lexer.expect_space()?;
            ResponseCode::UidNext(nz(lexer, Uid::new)?)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            ResponseCode::UidValidity(nz(lexer, UidValidity::new)?)
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            ResponseCode::Unseen(nz(lexer, SeqNum::new)?)
        }
        "HIGHESTMODSEQ" => {
            lexer.expect_space()?;
            ResponseCode::HighestModSeq(lexer.read_number64()?)
        }
        "CAPABILITY" => ResponseCode::Capability(parse_capability_list(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?.into_iter().collect())
        }
        "APPENDUID" => {
            lexer.expect_space()?;
            let uidvalidity = nz(lexer, UidValidity::new)?;
            lexer.expect_space()?;
            let uids = read_uid_set(lexer)?;
            ResponseCode::AppendUid { uidvalidity, uids }
        }
        "COPYUID" => {
            lexer.expect_space()?;
            let uidvalidity = nz(lexer, UidValidity::new)?;
            lexer.expect_space()?;
            let source = read_uid_set(lexer)?;
            lexer.expect_space()?;
            let dest = read_uid_set(lexer)?;
            ResponseCode::CopyUid {
                uidvalidity,
                source,
                dest,
            }
        }
        _ => match ResponseCode::from_atom(&name) {
            Some(code) => code,
            None => {
                let args = read_until_bracket(lexer);
                ResponseCode::Unknown {
                    name,
                    args: (!args.is_empty()).then_some(args),
                }
            }
        },
    };

    lexer.expect(Token::RBracket)?;
    Ok(code)
}

fn nz<T>(lexer: &mut Lexer<'_>, make: impl Fn(u32) -> Option<T>) -> Result<T> {
    let n = lexer.read_number()?;
    make(n).ok_or_else(|| lexer.error("zero where a non-zero number is required"))
}

fn read_uid_set(lexer: &mut Lexer<'_>) -> Result<UidSet> {
    let text = match lexer.next_token()? {
        Token::Number(n) => n.to_string(),
        Token::Atom(s) => s.to_string(),
        token => return Err(lexer.error(format!("expected UID set, got {token:?}"))),
    };
    UidSet::parse(&text).map_err(|e| lexer.error(e))
}

fn read_until_bracket(lexer: &mut Lexer<'_>) -> String {
    if lexer.peek() == Some(b' ') {
        lexer.advance();
    }
    let rest = lexer.remaining();
    let end = rest
        .iter()
        .position(|&b| b == b']' || b == b'\r')
        .unwrap_or(rest.len());
    lexer.skip(end);
    String::from_utf8_lossy(&rest[..end]).into_owned()
}

/// Parses `SP atom *(SP atom)` up to the end of line or a closing bracket.
pub fn parse_capability_list(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        match lexer.next_token()? {
            Token::Atom(s) => caps.push(Capability::parse(s)),
            token => return Err(lexer.error(format!("unexpected {token:?} in capability list"))),
        }
    }
    Ok(caps)
}

/// Parses a parenthesized flag list, including `\*`.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;
    let mut flags = Flags::new();

    loop {
        if lexer.peek() == Some(b'\\') && lexer.peek_at(1) == Some(b'*') {
            lexer.skip(2);
            flags.insert(Flag::MayCreate);
            continue;
        }
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            token => return Err(lexer.error(format!("unexpected {token:?} in flag list"))),
        }
    }

    Ok(flags)
}

/// Parses the body of a LIST or LSUB response.
pub fn parse_list(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    lexer.expect(Token::LParen)?;
    let mut attributes = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(s) => attributes.push(MailboxAttribute::parse(s)),
            token => return Err(lexer.error(format!("unexpected {token:?} in mailbox attributes"))),
        }
    }

    lexer.expect_space()?;
    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::QuotedString(s) => s.chars().next(),
        token => return Err(lexer.error(format!("expected delimiter, got {token:?}"))),
    };

    lexer.expect_space()?;
    let name = lexer.read_astring()?;

    // LIST-EXTENDED data is not interpreted.
    if lexer.peek() == Some(b' ') {
        lexer.advance();
        parse_value(lexer)?;
    }

    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox: Mailbox::new(name),
    })
}

/// Parses the numbers of a SEARCH response.
pub fn parse_search(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut nums = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if lexer.peek() == Some(b'(') {
            // (MODSEQ n)
            parse_value(lexer)?;
        } else {
            nums.push(lexer.read_nz_number()?);
        }
    }
    Ok(nums)
}

/// Parses `mailbox (name value ...)` of a STATUS response.
pub fn parse_status(lexer: &mut Lexer<'_>) -> Result<(Mailbox, Vec<StatusItem>)> {
    let name = lexer.read_astring()?;
    lexer.expect_space()?;
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();
    loop {
        let attr = match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => continue,
            Token::Atom(attr) => attr.to_ascii_uppercase(),
            token => return Err(lexer.error(format!("unexpected {token:?} in STATUS"))),
        };
        lexer.expect_space()?;
        let value = lexer.read_number64()?;
        let small = u32::try_from(value).ok();

        let item = match attr.as_str() {
            "MESSAGES" => small.map(StatusItem::Messages),
            "RECENT" => small.map(StatusItem::Recent),
            "UNSEEN" => small.map(StatusItem::Unseen),
            "UIDNEXT" => small.and_then(Uid::new).map(StatusItem::UidNext),
            "UIDVALIDITY" => small.and_then(UidValidity::new).map(StatusItem::UidValidity),
            "HIGHESTMODSEQ" => Some(StatusItem::HighestModSeq(value)),
            _ => None,
        };
        items.extend(item);
    }

    Ok((Mailbox::new(name), items))
}

/// Parses the three namespace groups of a NAMESPACE response.
pub fn parse_namespace(lexer: &mut Lexer<'_>) -> Result<Namespaces> {
    let personal = parse_namespace_group(lexer)?;
    lexer.expect_space()?;
    let other_users = parse_namespace_group(lexer)?;
    lexer.expect_space()?;
    let shared = parse_namespace_group(lexer)?;

    Ok(Namespaces {
        personal,
        other_users,
        shared,
    })
}

fn parse_namespace_group(lexer: &mut Lexer<'_>) -> Result<Vec<Namespace>> {
    let mut out = Vec::new();
    match lexer.next_token()? {
        Token::Nil => return Ok(out),
        Token::LParen => {}
        token => return Err(lexer.error(format!("expected namespace list, got {token:?}"))),
    }

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::LParen => {
                let prefix = lexer.read_string()?;
                lexer.expect_space()?;
                let delimiter = match lexer.next_token()? {
                    Token::Nil => None,
                    Token::QuotedString(s) => s.chars().next(),
                    token => return Err(lexer.error(format!("expected delimiter, got {token:?}"))),
                };
                // Namespace response extensions are skipped.
                while lexer.peek() == Some(b' ') {
                    lexer.advance();
                    parse_value(lexer)?;
                }
                lexer.expect(Token::RParen)?;
                out.push(Namespace { prefix, delimiter });
            }
            token => return Err(lexer.error(format!("unexpected {token:?} in namespace"))),
        }
    }

    Ok(out)
}

/// Parses any value: NIL, number, atom, string, literal or a nested list.
pub fn parse_value(lexer: &mut Lexer<'_>) -> Result<Value> {
    match lexer.next_token()? {
        Token::Nil => Ok(Value::Nil),
        Token::Number(n) => Ok(Value::Number(n)),
        Token::Atom(s) => Ok(Value::Atom(s.to_string())),
        Token::QuotedString(s) => Ok(Value::String(s)),
        Token::Literal(data) => Ok(Value::Literal(data.to_vec())),
        Token::Asterisk => Ok(Value::Atom("*".to_string())),
        Token::LParen => {
            let mut items = Vec::new();
            loop {
                if lexer.peek() == Some(b')') {
                    lexer.advance();
                    break;
                }
                if lexer.peek() == Some(b' ') {
                    lexer.advance();
                    continue;
                }
                items.push(parse_value(lexer)?);
            }
            Ok(Value::List(items))
        }
        token => Err(lexer.error(format!("unexpected {token:?} in value"))),
    }
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

    #[test]
    fn response_code_with_uid_sets() {
        let mut lexer = Lexer::new(b"[COPYUID 38505 304,319:320 3956:3958]");
        let code = parse_response_code(&mut lexer).unwrap();
        let ResponseCode::CopyUid {
            uidvalidity,
            source,
            dest,
        } = code
        else {
            panic!("expected COPYUID, got {code:?}");
        };
        assert_eq!(uidvalidity.get(), 38505);
        assert_eq!(source.to_string(), "304,319:320");
        assert_eq!(dest.len(), 3);
    }

    #[test]
    fn unknown_code_keeps_args() {
        let mut lexer = Lexer::new(b"[X-GUID abc def]");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::Unknown {
                name: "X-GUID".into(),
                args: Some("abc def".into()),
            }
        );
    }

    #[test]
    fn flag_list_with_wildcard() {
        let mut lexer = Lexer::new(b"(\\Answered \\Deleted $Label \\*)");
        let flags = parse_flag_list(&mut lexer).unwrap();
        assert_eq!(flags.len(), 4);
        assert!(flags.contains(&Flag::MayCreate));
        assert!(flags.contains(&Flag::Keyword("$Label".into())));
    }

    #[test]
    fn namespace_groups() {
        let mut lexer = Lexer::new(b"((\"\" \"/\")) ((\"~\" \"/\")) NIL");
        let ns = parse_namespace(&mut lexer).unwrap();
        assert_eq!(ns.personal[0].prefix, "");
        assert_eq!(ns.other_users[0].prefix, "~");
        assert!(ns.shared.is_empty());
    }

    #[test]
    fn nested_values() {
        let mut lexer = Lexer::new(b"(\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL 3028 {2}\r\nhi)");
        let value = parse_value(&mut lexer).unwrap();
        let items = value.as_list().unwrap();
        assert_eq!(items.len(), 6);
        assert_eq!(items[0].as_str(), Some("TEXT"));
        assert_eq!(items[3], Value::Nil);
        assert_eq!(items[4], Value::Number(3028));
        assert_eq!(items[5], Value::Literal(b"hi".to_vec()));
    }
}
