//! Call-stack capture and rendering for structured errors.

use std::ffi::c_void;
use std::fmt::Write;

/// Upper bound on captured frames; deeper stacks are truncated.
const MAX_DEPTH: usize = 64;

/// Symbol path fragments belonging to the capture machinery itself.
const INTERNAL_FRAMES: &[&str] = &["backtrace::", "capstan_errors::stack::"];

/// Capture the instruction pointers of the current call stack.
///
/// Null frames are dropped. The result is never empty: on platforms where
/// unwinding yields nothing, the address of this function stands in.
#[inline(never)]
pub(crate) fn capture() -> Vec<usize> {
    let mut frames = Vec::with_capacity(MAX_DEPTH);

    backtrace::trace(|frame| {
        let ip = frame.ip() as usize;
        if ip != 0 {
            frames.push(ip);
        }
        frames.len() < MAX_DEPTH
    });

    if frames.is_empty() {
        frames.push(capture as fn() -> Vec<usize> as usize);
    }

    frames
}

/// Render frames as `function\n\tfile:line` pairs, one per frame.
pub(crate) fn render(frames: &[usize]) -> String {
    let mut out = String::new();

    for &ip in frames {
        let mut name = None;
        let mut location = None;

        backtrace::resolve(ip as *mut c_void, |symbol| {
            if name.is_none() {
                name = symbol.name().map(|n| n.to_string());
            }
            if location.is_none() {
                if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                    location = Some(format!("{}:{}", file.display(), line));
                }
            }
        });

        match name {
            Some(name) if INTERNAL_FRAMES.iter().any(|f| name.contains(f)) => continue,
            Some(name) => {
                let _ = writeln!(out, "{name}");
                let _ = writeln!(
                    out,
                    "\t{}",
                    location.unwrap_or_else(|| format!("{ip:#x}"))
                );
            }
            None => {
                let _ = writeln!(out, "{ip:#x}");
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_is_never_empty_and_has_no_null_frames() {
        let frames = capture();
        assert!(!frames.is_empty());
        assert!(frames.iter().all(|f| *f != 0));
    }

    #[test]
    fn capture_respects_depth_limit() {
        fn recurse(n: usize) -> Vec<usize> {
            if n == 0 {
                capture()
            } else {
                let frames = recurse(n - 1);
                std::hint::black_box(frames)
            }
        }

        assert!(recurse(MAX_DEPTH * 2).len() <= MAX_DEPTH);
    }

    #[test]
    fn render_falls_back_to_raw_address() {
        assert_eq!(render(&[0x1]), "0x1\n");
    }
}
