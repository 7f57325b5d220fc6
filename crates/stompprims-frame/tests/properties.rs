//! Generated checks for serialization round-trips and chunked parsing.

use bytes::Bytes;
use proptest::prelude::*;
use proptest::sample::Index;
use stompprims_frame::{parse_frame, Command, Feed, Frame, FrameParser, Headers, ALL_COMMANDS};

fn frame_strategy() -> impl Strategy<Value = Frame> {
    let command = prop::sample::select(ALL_COMMANDS);
    let headers = prop::collection::vec(("[a-z]{1,10}", "[ -~]{0,16}"), 0..6);
    let body = prop::collection::vec(any::<u8>(), 0..64);

    (command, headers, body).prop_map(|(command, headers, body)| {
        let command: Command = command.parse().expect("listed command parses");
        Frame::from_parts(
            command,
            headers.into_iter().collect::<Headers>(),
            Bytes::from(body),
        )
    })
}

fn split(bytes: &[u8], cuts: &[Index]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len())).collect();
    points.push(0);
    points.push(bytes.len());
    points.sort_unstable();
    points.dedup();
    points
        .windows(2)
        .map(|w| bytes[w[0]..w[1]].to_vec())
        .collect()
}

proptest! {
    #[test]
    fn serialize_then_parse_round_trips(mut frame in frame_strategy()) {
        let wire = frame.serialize().expect("generated headers are encodable");
        let parsed = parse_frame(&wire).expect("serialized frame parses");
        prop_assert_eq!(parsed, frame);
    }

    #[test]
    fn chunked_parse_matches_one_shot(
        mut frame in frame_strategy(),
        cuts in prop::collection::vec(any::<Index>(), 0..8),
    ) {
        let wire = frame.serialize().expect("generated headers are encodable");
        let whole = parse_frame(&wire).expect("serialized frame parses");

        let mut parser = FrameParser::new();
        let mut total = 0usize;
        let mut result = None;
        for chunk in split(&wire, &cuts) {
            prop_assert!(result.is_none(), "frame completed before input ended");
            match parser.feed(&chunk).expect("chunk parses") {
                Feed::Pending { consumed } => total += consumed,
                Feed::Complete { frame, consumed } => {
                    total += consumed;
                    result = Some(frame);
                }
            }
        }

        prop_assert_eq!(total, wire.len());
        prop_assert_eq!(result, Some(whole));
    }

    #[test]
    fn heartbeat_before_frame_is_skipped(mut frame in frame_strategy()) {
        let wire = frame.serialize().expect("generated headers are encodable");
        let mut input = vec![b'\n'];
        input.extend_from_slice(&wire);

        let mut parser = FrameParser::new();
        match parser.feed(&input).expect("input parses") {
            Feed::Complete { frame: parsed, consumed } => {
                prop_assert_eq!(consumed, input.len());
                prop_assert_eq!(parsed, frame);
            }
            Feed::Pending { .. } => prop_assert!(false, "frame should complete"),
        }
    }
}

#[test]
fn content_length_three_with_non_nul_fourth_byte_is_malformed() {
    let err = parse_frame(b"SEND\ncontent-length:3\n\nabcX").unwrap_err();
    assert!(matches!(err, stompprims_frame::FrameError::MalformedFrame(_)));
}
