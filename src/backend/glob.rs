//! Glob matching
//!
//! Byte-oriented glob matcher with the backend's SCAN/HSCAN semantics:
//! - `*` any run of bytes (including none)
//! - `?` exactly one byte
//! - `[abc]`, `[a-z]`, `[^abc]` byte classes
//! - `\x` the literal byte `x`

/// True if `text` matches `pattern` in full
///
/// Runs in O(pattern * text): only the most recent `*` is ever resumed, since
/// every other token consumes exactly one byte.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let mut pi = 0;
    let mut si = 0;
    // Pattern position after the last `*`, and the text position it resumes from
    let mut resume: Option<(usize, usize)> = None;

    while si < text.len() {
        if pi < pattern.len() && pattern[pi] == b'*' {
            pi += 1;
            resume = Some((pi, si));
            continue;
        }

        if pi < pattern.len() {
            if let Some(width) = match_token(&pattern[pi..], text[si]) {
                pi += width;
                si += 1;
                continue;
            }
        }

        match resume {
            Some((star_pi, star_si)) => {
                pi = star_pi;
                si = star_si + 1;
                resume = Some((star_pi, si));
            }
            None => return false,
        }
    }

    while pi < pattern.len() && pattern[pi] == b'*' {
        pi += 1;
    }
    pi == pattern.len()
}

/// Match one byte against the non-`*` token at the start of `pattern`
///
/// Returns how many pattern bytes the token used, or `None` on mismatch.
fn match_token(pattern: &[u8], byte: u8) -> Option<usize> {
    match pattern[0] {
        b'?' => Some(1),
        b'[' => {
            let (matched, consumed) = match_class(&pattern[1..], byte);
            if matched {
                Some(1 + consumed)
            } else {
                None
            }
        }
        b'\\' if pattern.len() > 1 => {
            if pattern[1] == byte {
                Some(2)
            } else {
                None
            }
        }
        literal => {
            if literal == byte {
                Some(1)
            } else {
                None
            }
        }
    }
}

/// Match one byte against a class body (the bytes after `[`)
///
/// Returns whether it matched and how many pattern bytes the class used,
/// closing `]` included. An unterminated class runs to the end of pattern.
fn match_class(class: &[u8], byte: u8) -> (bool, usize) {
    let mut i = 0;
    let negate = class.first() == Some(&b'^');
    if negate {
        i = 1;
    }

    let mut matched = false;
    while i < class.len() {
        match class[i] {
            b']' => {
                i += 1;
                return (matched != negate, i);
            }
            b'\\' if i + 1 < class.len() => {
                matched |= class[i + 1] == byte;
                i += 2;
            }
            start if i + 2 < class.len() && class[i + 1] == b'-' => {
                let end = class[i + 2];
                let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
                matched |= lo <= byte && byte <= hi;
                i += 3;
            }
            single => {
                matched |= single == byte;
                i += 1;
            }
        }
    }

    (matched != negate, i)
}
