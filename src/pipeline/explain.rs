//! Text rendering of a stream's descriptor chain.
//!
//! The terminal stage is printed first and each upstream stage one level
//! deeper, ending with the source:
//!
//! ```text
//! └─• group(size=2)
//!   │
//!   └─• par_map(double, concurrency=4, order=ordered)
//!     │
//!     └─┤ source(Vec)
//! ```

use super::kind::StageKind;
use super::node::Describe;
use std::fmt::Write;

const INDENT: usize = 2;

/// Render the chain ending at `terminal`.
pub fn explain(terminal: &dyn Describe) -> String {
    let mut out = String::new();
    let mut depth = 0;
    let mut cursor = Some(terminal);

    while let Some(node) = cursor {
        let descriptor = node.descriptor();
        let pad = " ".repeat(depth * INDENT);
        if depth > 0 {
            let _ = writeln!(out, "{}│", pad);
        }
        let marker = if descriptor.kind == StageKind::Source {
            "└─┤"
        } else {
            "└─•"
        };
        let _ = writeln!(out, "{}{} {}", pad, marker, descriptor);

        cursor = node.upstream();
        depth += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Stream;

    #[test]
    fn test_explain_source_only() {
        let stream = Stream::new(vec![1, 2, 3]);
        assert_eq!(explain(&stream), "└─┤ source(Vec)\n");
    }

    #[test]
    fn test_explain_chain() {
        fn double(x: i32) -> i32 {
            x * 2
        }

        let stream = Stream::new(vec![1, 2, 3])
            .map(double)
            .group_by_size(2)
            .unwrap();

        let expected = "└─• group(size=2)\n  │\n  └─• map(double)\n    │\n    └─┤ source(Vec)\n";
        assert_eq!(explain(&stream), expected);
    }
}
