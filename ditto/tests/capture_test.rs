mod common;

use std::time::Duration;

use common::MockBackend;
use ditto::{CaptureSession, CoordLabel, CoordinateSet, DittoError, Position};

fn hover(i: i32) -> Position {
    Position::new(50 + i * 25, 60 + i * 25)
}

#[tokio::test]
async fn full_session_walks_all_six_labels_in_order() {
    let mock = MockBackend::new();
    let mut session = CaptureSession::new().with_settle(Duration::ZERO);

    let mut seen = Vec::new();
    let mut i = 0;
    while let Some(pending) = session.pending() {
        mock.set_cursor(hover(i));
        let (label, position) = session.capture_next(mock.as_ref()).await.unwrap();
        assert_eq!(label, pending);
        assert_eq!(position, hover(i));
        seen.push(label);
        i += 1;
    }

    assert_eq!(seen, CoordLabel::ALL);
    assert!(session.is_finished());

    let set = session.into_set();
    assert!(set.is_complete());
    assert_eq!(set.get(CoordLabel::DateField), Some(hover(0)));
    assert_eq!(set.get(CoordLabel::CopyButton), Some(hover(5)));
    set.resolve().unwrap();
}

#[tokio::test]
async fn capture_past_the_end_is_rejected() {
    let mock = MockBackend::new();
    let mut session =
        CaptureSession::for_label(CoordinateSet::new(), CoordLabel::LookupButton)
            .with_settle(Duration::ZERO);

    session.capture_next(mock.as_ref()).await.unwrap();
    assert!(session.is_finished());

    let err = session.capture_next(mock.as_ref()).await.unwrap_err();
    assert!(matches!(err, DittoError::Precondition(_)));
}

#[tokio::test]
async fn single_label_session_only_touches_that_label() {
    let mut existing = CoordinateSet::new();
    for label in CoordLabel::ALL {
        existing.set(label, Position::new(1, 1));
    }

    let mock = MockBackend::new();
    mock.set_cursor(Position::new(777, 888));
    let mut session = CaptureSession::for_label(existing, CoordLabel::ItemSelector)
        .with_settle(Duration::ZERO);
    assert_eq!(session.remaining(), 1);

    session.capture_next(mock.as_ref()).await.unwrap();
    let set = session.into_set();

    assert_eq!(set.get(CoordLabel::ItemSelector), Some(Position::new(777, 888)));
    for label in CoordLabel::ALL {
        if label != CoordLabel::ItemSelector {
            assert_eq!(set.get(label), Some(Position::new(1, 1)));
        }
    }
}

#[tokio::test]
async fn abandoned_session_keeps_earlier_positions() {
    let mut existing = CoordinateSet::new();
    for label in CoordLabel::ALL {
        existing.set(label, Position::new(9, 9));
    }

    let mock = MockBackend::new();
    mock.set_cursor(Position::new(123, 456));
    let mut session = CaptureSession::with_existing(existing).with_settle(Duration::ZERO);

    // Capture only the first two labels, then walk away.
    session.capture_next(mock.as_ref()).await.unwrap();
    session.capture_next(mock.as_ref()).await.unwrap();
    assert_eq!(session.remaining(), 4);

    let set = session.into_set();
    assert!(set.is_complete());
    assert_eq!(set.get(CoordLabel::DateField), Some(Position::new(123, 456)));
    assert_eq!(set.get(CoordLabel::LookupButton), Some(Position::new(123, 456)));
    assert_eq!(set.get(CoordLabel::ReferenceDateField), Some(Position::new(9, 9)));
}
