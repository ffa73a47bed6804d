//! Response parser.
//!
//! Turns one complete frame (a response line with its literals spliced in)
//! into a [`Response`]. Grammar follows RFC 3501 with the RFC 9051 additions
//! the client needs.

mod fetch;
mod helpers;
mod types;

pub use types::{Address, Envelope, FetchItem, StatusItem, UntaggedResponse, Value};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, SeqNum, Status, Tag};
use crate::Result;

use helpers::{
    parse_capability_list, parse_flag_list, parse_list, parse_namespace, parse_response_code,
    parse_search, parse_status,
};

/// A parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged completion of a command.
    Tagged {
        /// The command tag.
        tag: Tag,
        /// `Ok`, `No` or `Bad`.
        status: Status,
        /// Response code, if any.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged server data.
    Untagged(UntaggedResponse),
    /// Continuation request (`+`).
    Continuation {
        /// Text after the `+`; base64 challenge data during AUTHENTICATE.
        text: String,
    },
}

/// Stateless frame parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one complete frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Protocol`] on any grammar violation.
    pub fn parse(frame: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(frame);

        let response = match lexer.next_token()? {
            Token::Asterisk => {
                lexer.expect_space()?;
                Response::Untagged(Self::parse_untagged(&mut lexer)?)
            }
            Token::Plus => {
                if lexer.peek() == Some(b' ') {
                    lexer.advance();
                }
                return Ok(Response::Continuation {
                    text: lexer.read_text(),
                });
            }
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag.to_string())?,
            Token::Number(n) => Self::parse_tagged(&mut lexer, n.to_string())?,
            token => return Err(lexer.error(format!("expected *, + or tag, got {token:?}"))),
        };

        Self::finish(&mut lexer)?;
        Ok(response)
    }

    fn finish(lexer: &mut Lexer<'_>) -> Result<()> {
        while lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        match lexer.next_token()? {
            Token::Crlf | Token::Eof if lexer.is_eof() => Ok(()),
            token => Err(lexer.error(format!("trailing data after response: {token:?}"))),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: String) -> Result<Response> {
        let tag = Tag::new(tag).ok_or_else(|| lexer.error("malformed tag"))?;
        lexer.expect_space()?;

        let status = match lexer.read_atom()?.to_ascii_uppercase().as_str() {
            "OK" => Status::Ok,
            "NO" => Status::No,
            "BAD" => Status::Bad,
            other => return Err(lexer.error(format!("invalid tagged status {other}"))),
        };
        let (code, text) = Self::parse_resp_text(lexer)?;

        Ok(Response::Tagged {
            tag,
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
        match lexer.next_token()? {
            Token::Number(n) => Self::parse_message_data(lexer, n),
            Token::Atom(keyword) => {
                let upper = keyword.to_ascii_uppercase();
                let status = match upper.as_str() {
                    "OK" => Some(Status::Ok),
                    "NO" => Some(Status::No),
                    "BAD" => Some(Status::Bad),
                    "PREAUTH" => Some(Status::PreAuth),
                    "BYE" => Some(Status::Bye),
                    _ => None,
                };
                if let Some(status) = status {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    return Ok(UntaggedResponse::Condition { status, code, text });
                }

                let data = match upper.as_str() {
                    "CAPABILITY" => UntaggedResponse::Capability(parse_capability_list(lexer)?),
                    "ENABLED" => UntaggedResponse::Enabled(parse_capability_list(lexer)?),
                    "FLAGS" => {
                        lexer.expect_space()?;
                        UntaggedResponse::Flags(parse_flag_list(lexer)?)
                    }
                    "LIST" => {
                        lexer.expect_space()?;
                        UntaggedResponse::List(parse_list(lexer)?)
                    }
                    "LSUB" => {
                        lexer.expect_space()?;
                        UntaggedResponse::Lsub(parse_list(lexer)?)
                    }
                    "SEARCH" => UntaggedResponse::Search(parse_search(lexer)?),
                    "STATUS" => {
                        lexer.expect_space()?;
                        let (mailbox, items) = parse_status(lexer)?;
                        UntaggedResponse::Status { mailbox, items }
                    }
                    "NAMESPACE" => {
                        lexer.expect_space()?;
                        UntaggedResponse::Namespace(parse_namespace(lexer)?)
                    }
                    _ => UntaggedResponse::Other {
                        keyword: upper,
                        text: Self::rest(lexer),
                    },
                };
                Ok(data)
            }
            token => Err(lexer.error(format!("unexpected {token:?} in untagged response"))),
        }
    }

    fn parse_message_data(lexer: &mut Lexer<'_>, n: u64) -> Result<UntaggedResponse> {
        let n = u32::try_from(n).map_err(|_| lexer.error("message number out of range"))?;
        lexer.expect_space()?;
        let keyword = lexer.read_atom()?.to_ascii_uppercase();

        let seq = SeqNum::new(n);

        match keyword.as_str() {
            "EXISTS" => Ok(UntaggedResponse::Exists(n)),
            "RECENT" => Ok(UntaggedResponse::Recent(n)),
            "EXPUNGE" => {
                let seq = seq.ok_or_else(|| lexer.error("message number 0"))?;
                Ok(UntaggedResponse::Expunge(seq))
            }
            "FETCH" => {
                let seq = seq.ok_or_else(|| lexer.error("message number 0"))?;
                lexer.expect_space()?;
                let items = fetch::parse_fetch(lexer)?;
                Ok(UntaggedResponse::Fetch { seq, items })
            }
            _ => Ok(UntaggedResponse::Other {
                keyword: format!("{n} {keyword}"),
                text: Self::rest(lexer),
            }),
        }
    }

    /// Parses `[SP] ["[" code "]" [SP]] text`.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        let code = if lexer.peek() == Some(b'[') {
            Some(parse_response_code(lexer)?)
        } else {
            None
        };
        Ok((code, Self::rest(lexer)))
    }

    /// Rest of the line without the CRLF, which is left for `finish`.
    fn rest(lexer: &mut Lexer<'_>) -> String {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        let remaining = lexer.remaining();
        let end = remaining
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(remaining.len());
        lexer.skip(end);
        String::from_utf8_lossy(&remaining[..end]).into_owned()
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
    use crate::types::{Capability, MailboxAttribute, Uid};
    use crate::Error;

    fn untagged(input: &[u8]) -> UntaggedResponse {
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(u) => u,
            other => panic!("expected untagged, got {other:?}"),
        }
    }

    mod status_responses {
        use super::*;

        #[test]
        fn greeting_with_capability_code() {
            let resp = untagged(b"* OK [CAPABILITY IMAP4rev1 IDLE AUTH=PLAIN] Dovecot ready.\r\n");
            let UntaggedResponse::Condition { status, code, text } = resp else {
                panic!("expected condition");
            };
            assert_eq!(status, Status::Ok);
            assert_eq!(text, "Dovecot ready.");
            let Some(ResponseCode::Capability(caps)) = code else {
                panic!("expected capability code");
            };
            assert!(caps.contains(&Capability::Idle));
            assert!(caps.contains(&Capability::Auth("PLAIN".into())));
        }

        #[test]
        fn tagged_no_with_code_keeps_text() {
            let resp = ResponseParser::parse(b"A0003 NO [ALREADYEXISTS] Mailbox already exists\r\n").unwrap();
            assert_eq!(
                resp,
                Response::Tagged {
                    tag: Tag::new("A0003").unwrap(),
                    status: Status::No,
                    code: Some(ResponseCode::AlreadyExists),
                    text: "Mailbox already exists".into(),
                }
            );
        }

        #[test]
        fn code_without_text() {
            let resp = untagged(b"* OK [UIDNEXT 4392]\r\n");
            assert!(matches!(
                resp,
                UntaggedResponse::Condition { code: Some(ResponseCode::UidNext(u)), ref text, .. }
                    if u == Uid::new(4392).unwrap() && text.is_empty()
            ));
        }

        #[test]
        fn bye() {
            assert!(untagged(b"* BYE Autologout; idle for too long\r\n").is_bye());
        }

        #[test]
        fn continuation() {
            assert_eq!(
                ResponseParser::parse(b"+ idling\r\n").unwrap(),
                Response::Continuation { text: "idling".into() }
            );
            assert_eq!(
                ResponseParser::parse(b"+\r\n").unwrap(),
                Response::Continuation { text: String::new() }
            );
        }
    }

    mod data_responses {
        use super::*;

        #[test]
        fn list_and_lsub() {
            let resp = untagged(b"* LIST (\\HasChildren \\Noselect) \"/\" \"Archive\"\r\n");
            let UntaggedResponse::List(list) = resp else {
                panic!("expected LIST");
            };
            assert_eq!(list.mailbox.as_str(), "Archive");
            assert_eq!(list.delimiter, Some('/'));
            assert!(list.has(&MailboxAttribute::NoSelect));

            let resp = untagged(b"* LSUB () \".\" inbox\r\n");
            let UntaggedResponse::Lsub(list) = resp else {
                panic!("expected LSUB");
            };
            assert!(list.mailbox.is_inbox());
        }

        #[test]
        fn list_name_as_literal() {
            let resp = untagged(b"* LIST () \"/\" {9}\r\nfoo\r\nbar \r\n");
            let UntaggedResponse::List(list) = resp else {
                panic!("expected LIST");
            };
            assert_eq!(list.mailbox.as_str(), "foo\r\nbar ");
        }

        #[test]
        fn message_data() {
            assert_eq!(untagged(b"* 23 EXISTS\r\n"), UntaggedResponse::Exists(23));
            assert_eq!(untagged(b"* 5 RECENT\r\n"), UntaggedResponse::Recent(5));
            assert_eq!(
                untagged(b"* 44 EXPUNGE\r\n"),
                UntaggedResponse::Expunge(SeqNum::new(44).unwrap())
            );
            assert!(untagged(b"* 12 FETCH (UID 100)\r\n").fetch_items().is_some());
        }

        #[test]
        fn search_status_enabled() {
            assert_eq!(untagged(b"* SEARCH 2 84 882\r\n"), UntaggedResponse::Search(vec![2, 84, 882]));
            assert_eq!(untagged(b"* SEARCH\r\n"), UntaggedResponse::Search(vec![]));

            let UntaggedResponse::Status { mailbox, items } =
                untagged(b"* STATUS blurdybloop (MESSAGES 231 UIDNEXT 44292)\r\n")
            else {
                panic!("expected STATUS");
            };
            assert_eq!(mailbox.as_str(), "blurdybloop");
            assert_eq!(items.len(), 2);

            assert_eq!(
                untagged(b"* ENABLED CONDSTORE\r\n"),
                UntaggedResponse::Enabled(vec![Capability::Unknown("CONDSTORE".into())])
            );
        }

        #[test]
        fn unknown_keyword_is_other() {
            assert_eq!(
                untagged(b"* XSTATE running fine\r\n"),
                UntaggedResponse::Other {
                    keyword: "XSTATE".into(),
                    text: "running fine".into(),
                }
            );
        }
    }

    mod malformed {
        use super::*;

        #[test]
        fn rejects_grammar_violations() {
            for bad in [
                &b"(garbage\r\n"[..],
                b"A1 MAYBE done\r\n",
                b"* 0 EXPUNGE\r\n",
                b"* 3 FETCH (UID)\r\n",
                b"A+1 OK done\r\n",
                b"* FLAGS (\\Seen\r\n",
                b"* 1 EXISTS extra\r\n",
            ] {
                assert!(
                    matches!(ResponseParser::parse(bad), Err(Error::Protocol(_))),
                    "accepted {:?}",
                    String::from_utf8_lossy(bad)
                );
            }
        }
    }
}
