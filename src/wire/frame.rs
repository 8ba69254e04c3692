//! Wire framing: deterministic serialization and lexical classification of
//! the plain-text frames exchanged between controller and agent (spec §3,
//! §4.1).
//!
//! There is no structured encoding here on purpose — the wire format is a
//! handful of `\n`-separated lines, not JSON, because the transport is a
//! single short text datagram. Classification is purely lexical prefix
//! matching; it never attempts to parse the frame as a data format.

/// A parsed `CHUNK:<i>/<n>` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkMarker {
    /// Zero-based chunk index.
    pub index: usize,
    /// Total chunk count.
    pub total: usize,
}

/// A structured `MSG-ID:` frame, as emitted by the agent.
///
/// Holds both the parsed markers an endpoint needs to update its state
/// machine and the original text, since the controller's output-extraction
/// logic (spec §4.7) operates on the raw frame body rather than a derived
/// field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    /// The command id from the first line.
    pub id: String,
    /// The frame's full original text.
    pub raw: String,
    /// Whether a `Cmd received:` line is present (this is the ack).
    pub has_ack: bool,
    /// Whether the final line is the literal `Done` sentinel.
    pub has_done: bool,
    /// The parsed `CHUNK:i/n` marker, if a well-formed one is present.
    ///
    /// A malformed `CHUNK:` line (non-numeric index/total) is not treated
    /// as an error: the frame is still classified as a reply, it simply
    /// carries no chunk marker (spec §4.1 item 3).
    pub chunk: Option<ChunkMarker>,
    /// Whether an `Output:` marker line is present (first-chunk indicator).
    pub has_output_marker: bool,
}

/// The classification of an inbound text frame (spec §4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The frame was empty after trimming.
    Empty,
    /// A paging request: `more <id>` or `more <id> <i>`.
    Paging {
        /// The command id being paged.
        id: String,
        /// The requested chunk index (0 if omitted or malformed).
        index: usize,
    },
    /// A structured `MSG-ID:` reply from the agent.
    Reply(AgentReply),
    /// An echo of our own `Output:`/`Cmd received:` emission, not prefixed
    /// by `MSG-ID:`. Never produced by a conforming agent, but ignored
    /// defensively rather than treated as a command.
    Echo,
    /// Any other non-empty text: a shell command to execute.
    Command(String),
}

/// Classifies a raw inbound frame per spec §4.1 (order matters).
#[must_use]
pub fn parse(text: &str) -> Frame {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Frame::Empty;
    }

    if let Some(rest) = trimmed.strip_prefix("more ") {
        let mut tokens = rest.split_whitespace();
        let id = tokens.next().unwrap_or_default().to_string();
        let index = tokens.next().and_then(|tok| tok.parse().ok()).unwrap_or(0);
        return Frame::Paging { id, index };
    }

    if let Some(rest) = trimmed.strip_prefix("MSG-ID:") {
        let mut lines = trimmed.lines();
        lines.next();
        let id = rest
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        let mut has_ack = false;
        let mut has_output_marker = false;
        let mut chunk = None;
        let mut last_line = "";
        for line in lines {
            let line = line.trim();
            last_line = line;
            if let Some(spec_part) = line.strip_prefix("CHUNK:") {
                if let Some((i_str, n_str)) = spec_part.split_once('/') {
                    if let (Ok(index), Ok(total)) =
                        (i_str.trim().parse(), n_str.trim().parse())
                    {
                        chunk = Some(ChunkMarker { index, total });
                    }
                }
            }
            if line.starts_with("Output:") {
                has_output_marker = true;
            }
            if line.starts_with("Cmd received:") {
                has_ack = true;
            }
        }
        let has_done = last_line == "Done";

        return Frame::Reply(AgentReply {
            id,
            raw: text.to_string(),
            has_ack,
            has_done,
            chunk,
            has_output_marker,
        });
    }

    if trimmed.starts_with("Output:") || trimmed.starts_with("Cmd received:") {
        return Frame::Echo;
    }

    Frame::Command(trimmed.to_string())
}

/// Builds the ack frame: `MSG-ID:<id>\nHost:<host>\nCmd received: <command>`.
#[must_use]
pub fn serialize_ack(id: &str, host: &str, command: &str) -> String {
    format!("MSG-ID:{id}\nHost:{host}\nCmd received: {command}")
}

/// Builds the chunk header for index `index` of `total`.
///
/// Index 0 carries the `Output:` first-chunk marker; all other indices
/// carry a bare `CHUNK:i/n` line. Exactly one such line form is present per
/// chunk (spec §3).
#[must_use]
pub fn chunk_header(id: &str, index: usize, total: usize) -> String {
    if index == 0 {
        format!("MSG-ID:{id}\nCHUNK:0/{total}\nOutput:\n")
    } else {
        format!("MSG-ID:{id}\nCHUNK:{index}/{total}\n")
    }
}

/// Builds the overflow frame sent when `MAX_PAYLOAD` is too small to fit
/// even one header.
#[must_use]
pub fn serialize_overflow(id: &str) -> String {
    format!("MSG-ID:{id}\nOutput too long")
}

/// Builds the no-more frame sent when paging requests an index past the
/// end of a stored reply.
#[must_use]
pub fn serialize_no_more(id: &str) -> String {
    format!("MSG-ID:{id}\nDone")
}

/// Builds a paging request frame: `more <id> <i>`.
#[must_use]
pub fn serialize_paging(id: &str, index: usize) -> String {
    format!("more {id} {index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("more 1 0", 1, 0; "indexed")]
    #[test_case("more 1", 1, 0; "bare defaults to zero")]
    #[test_case("more 1 abc", 1, 0; "malformed index defaults to zero")]
    #[test_case("more 1 9", 1, 9; "later index")]
    fn paging_requests_classify_with_expected_id_and_index(text: &str, expected_id: u32, expected_index: usize) {
        match parse(text) {
            Frame::Paging { id, index } => {
                assert_eq!(id, expected_id.to_string());
                assert_eq!(index, expected_index);
            }
            other => panic!("expected Paging, got {other:?}"),
        }
    }

    #[test]
    fn classifies_empty() {
        assert_eq!(parse(""), Frame::Empty);
        assert_eq!(parse("   \n  "), Frame::Empty);
    }

    #[test]
    fn classifies_paging_with_index() {
        assert_eq!(
            parse("more 123 4"),
            Frame::Paging {
                id: "123".to_string(),
                index: 4
            }
        );
    }

    #[test]
    fn classifies_bare_paging_as_index_zero() {
        assert_eq!(
            parse("more 123"),
            Frame::Paging {
                id: "123".to_string(),
                index: 0
            }
        );
    }

    #[test]
    fn classifies_paging_with_malformed_index_as_zero() {
        assert_eq!(
            parse("more 123 banana"),
            Frame::Paging {
                id: "123".to_string(),
                index: 0
            }
        );
    }

    #[test]
    fn classifies_ack_reply() {
        let text = serialize_ack("42", "host1", "whoami");
        match parse(&text) {
            Frame::Reply(reply) => {
                assert_eq!(reply.id, "42");
                assert!(reply.has_ack);
                assert!(!reply.has_done);
                assert!(reply.chunk.is_none());
            }
            other => panic!("expected Reply, got {other:?}"),
        }
    }

    #[test]
    fn classifies_chunk_reply_with_done_sentinel() {
        let text = format!("{}alice\nDone", chunk_header("42", 0, 1));
        match parse(&text) {
            Frame::Reply(reply) => {
                assert_eq!(reply.id, "42");
                assert!(reply.has_output_marker);
                assert!(reply.has_done);
                assert_eq!(
                    reply.chunk,
                    Some(ChunkMarker { index: 0, total: 1 })
                );
            }
            other => panic!("expected Reply, got {other:?}"),
        }
    }

    #[test]
    fn malformed_chunk_marker_keeps_frame_as_reply() {
        let text = "MSG-ID:7\nCHUNK:x/y\nsome body";
        match parse(text) {
            Frame::Reply(reply) => {
                assert_eq!(reply.id, "7");
                assert!(reply.chunk.is_none());
            }
            other => panic!("expected Reply, got {other:?}"),
        }
    }

    #[test]
    fn classifies_own_echo() {
        assert_eq!(parse("Output:\nsome text"), Frame::Echo);
        assert_eq!(parse("Cmd received: ls"), Frame::Echo);
    }

    #[test]
    fn classifies_command_frame() {
        assert_eq!(parse("whoami"), Frame::Command("whoami".to_string()));
    }

    #[test]
    fn no_more_and_overflow_frames_roundtrip_as_replies() {
        match parse(&serialize_no_more("1")) {
            Frame::Reply(reply) => assert!(reply.has_done),
            other => panic!("expected Reply, got {other:?}"),
        }
        match parse(&serialize_overflow("1")) {
            Frame::Reply(reply) => assert!(!reply.has_done && !reply.has_ack),
            other => panic!("expected Reply, got {other:?}"),
        }
    }
}
