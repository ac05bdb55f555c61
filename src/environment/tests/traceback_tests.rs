//! Tests for the bounded trace stack

use crate::environment::{Location, TraceFrame, Traceback};
use crate::interpreter::types::Span;

fn frame(description: &str) -> TraceFrame {
    TraceFrame::new(Location::new("main", Span::new(1, 2)), description)
}

fn descriptions(traceback: &Traceback) -> Vec<String> {
    traceback.frames().map(|f| f.description.clone()).collect()
}

#[test]
fn test_limit_drops_oldest() {
    let mut traceback = Traceback::new(3);
    for name in ["a", "b", "c", "d", "e"] {
        traceback.push(frame(name));
    }

    assert_eq!(descriptions(&traceback), vec!["c", "d", "e"]);
    assert_eq!(traceback.depth(), 5);
}

#[test]
fn test_zero_limit_is_unbounded() {
    let mut traceback = Traceback::new(0);
    for i in 0..1000 {
        traceback.push(frame(&i.to_string()));
    }

    assert_eq!(traceback.frames().count(), 1000);
}

#[test]
fn test_truncate_to_mark() {
    let mut traceback = Traceback::new(0);
    traceback.push(frame("outer"));
    let mark = traceback.mark();
    traceback.push(frame("inner"));
    traceback.push(frame("innermost"));

    traceback.truncate(mark);

    assert_eq!(descriptions(&traceback), vec!["outer"]);
}

#[test]
fn test_truncate_across_dropped_frames() {
    let mut traceback = Traceback::new(2);
    traceback.push(frame("a"));
    let mark = traceback.mark();
    for name in ["b", "c", "d"] {
        traceback.push(frame(name));
    }

    traceback.truncate(mark);

    assert_eq!(traceback.depth(), mark);
    assert!(traceback.is_empty());
}

#[test]
fn test_pop_and_clear() {
    let mut traceback = Traceback::new(1);
    traceback.push(frame("a"));
    traceback.push(frame("b"));

    assert_eq!(traceback.pop().map(|f| f.description), Some("b".to_string()));
    traceback.clear();
    assert_eq!(traceback.depth(), 0);
}

#[test]
fn test_format() {
    let mut traceback = Traceback::new(2);
    traceback.push(frame("first"));
    traceback.push(frame("second"));
    traceback.push(frame("third"));

    assert_eq!(
        traceback.format(),
        "Traceback (most recent last):\n\
         \x20 ... 1 earlier frames dropped\n\
         \x20 at main:1:2: second\n\
         \x20 at main:1:2: third\n"
    );
}
