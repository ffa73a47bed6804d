//! Server response parsing.
//!
//! Three layers, each usable on its own:
//!
//! - [`Lexer`] tokenizes one frame.
//! - [`ResponseParser`] turns one frame into a [`Response`].
//! - [`ResponseDecoder`] frames a byte stream, splicing literals into their
//!   response, and drives the parser.
//!
//! # Example
//!
//! ```
//! use mailtree_imap::parser::{Response, ResponseDecoder, UntaggedResponse};
//!
//! let mut decoder = ResponseDecoder::new();
//! decoder.feed(b"* 4 EXISTS\r\n");
//! let response = decoder.next_response().unwrap();
//! assert_eq!(response, Some(Response::Untagged(UntaggedResponse::Exists(4))));
//! ```

mod decoder;
pub mod lexer;
pub mod response;

pub use decoder::{DecoderState, MAX_LINE_LENGTH, MAX_LITERAL_SIZE, ResponseDecoder};
pub use lexer::{Lexer, Token};
pub use response::{
    Address, Envelope, FetchItem, Response, ResponseParser, StatusItem, UntaggedResponse, Value,
};
