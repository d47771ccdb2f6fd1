use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One line of the peer wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    RequestPiece(u32),
    PieceData(u32),
    PieceNotAvailable,
    HavePiece(u32),
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::RequestPiece(index) => write!(f, "REQUEST_PIECE:{}", index),
            Message::PieceData(index) => write!(f, "PIECE_DATA:{}", index),
            Message::PieceNotAvailable => f.write_str("PIECE_NOT_AVAILABLE"),
            Message::HavePiece(index) => write!(f, "HAVE_PIECE:{}", index),
        }
    }
}

fn parse_index(line: &str, raw: &str) -> Result<u32, Error> {
    raw.trim()
        .parse()
        .map_err(|_| Error::PeerProtocol(format!("bad piece index in {:?}", line)))
}

impl FromStr for Message {
    type Err = Error;

    fn from_str(line: &str) -> Result<Message, Error> {
        let trimmed = line.trim();
        match trimmed.split_once(':') {
            Some(("REQUEST_PIECE", index)) => Ok(Message::RequestPiece(parse_index(line, index)?)),
            Some(("PIECE_DATA", index)) => Ok(Message::PieceData(parse_index(line, index)?)),
            Some(("HAVE_PIECE", index)) => Ok(Message::HavePiece(parse_index(line, index)?)),
            None if trimmed == "PIECE_NOT_AVAILABLE" => Ok(Message::PieceNotAvailable),
            _ => Err(Error::PeerProtocol(format!("malformed message {:?}", line))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_message() {
        assert_eq!(
            "REQUEST_PIECE:3".parse::<Message>().unwrap(),
            Message::RequestPiece(3)
        );
        assert_eq!(
            "PIECE_DATA:0\r".parse::<Message>().unwrap(),
            Message::PieceData(0)
        );
        assert_eq!(
            "PIECE_NOT_AVAILABLE".parse::<Message>().unwrap(),
            Message::PieceNotAvailable
        );
        assert_eq!(
            "HAVE_PIECE:12".parse::<Message>().unwrap(),
            Message::HavePiece(12)
        );
    }

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(Message::RequestPiece(7).to_string(), "REQUEST_PIECE:7");
        assert_eq!(Message::PieceNotAvailable.to_string(), "PIECE_NOT_AVAILABLE");
    }

    #[test]
    fn rejects_malformed_lines() {
        let lines = [
            "",
            "HELLO",
            "REQUEST_PIECE:",
            "REQUEST_PIECE:-1",
            "PIECE_DATA:x",
            "PIECE_NOT_AVAILABLE:1",
        ];
        for line in lines {
            assert!(
                matches!(line.parse::<Message>(), Err(Error::PeerProtocol(_))),
                "{:?} should be rejected",
                line
            );
        }
    }
}
