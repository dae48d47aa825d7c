/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Lexical path utilities.
//!
//! Paths are slash-separated strings; `'/'` is the only separator and no
//! host translation is ever applied. Everything here is purely lexical:
//! no function consults a filesystem.

use crate::errors::{ErrorKind, VfsResult};

/// The path separator.
pub const SEPARATOR: char = '/';

/// Reports whether `c` is the path separator.
pub fn is_path_separator(c: char) -> bool {
    c == SEPARATOR
}

/// Reports whether the path is absolute.
pub fn is_abs(path: &str) -> bool {
    path.starts_with(SEPARATOR)
}

/// Returns the shortest path name equivalent to `path` by purely lexical
/// processing:
///
/// 1. replace multiple separators with a single one;
/// 2. eliminate each `.` path name element;
/// 3. eliminate each inner `..` element along with the non-`..` element
///    that precedes it;
/// 4. eliminate `..` elements that begin a rooted path.
///
/// The returned path ends in a separator only if it is the root `"/"`.
/// If the result would be empty, `"."` is returned.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return String::from(".");
    }

    let bytes = path.as_bytes();
    let n = bytes.len();
    let rooted = bytes[0] == b'/';

    let mut out = String::with_capacity(n);
    let mut r = 0;
    let mut dotdot = 0;
    if rooted {
        out.push('/');
        r = 1;
        dotdot = 1;
    }

    while r < n {
        if bytes[r] == b'/' {
            // empty path element
            r += 1;
        } else if bytes[r] == b'.' && (r + 1 == n || bytes[r + 1] == b'/') {
            // . element
            r += 1;
        } else if bytes[r] == b'.'
            && r + 1 < n
            && bytes[r + 1] == b'.'
            && (r + 2 == n || bytes[r + 2] == b'/')
        {
            // .. element: remove to last separator
            r += 2;
            if out.len() > dotdot {
                let tail = &out.as_bytes()[dotdot..];
                let cut = tail.iter().rposition(|&b| b == b'/').map(|i| dotdot + i);
                out.truncate(cut.unwrap_or(dotdot));
            } else if !rooted {
                // cannot backtrack: keep the ..
                if !out.is_empty() {
                    out.push('/');
                }
                out.push_str("..");
                dotdot = out.len();
            }
        } else {
            // real path element
            if (rooted && out.len() != 1) || (!rooted && !out.is_empty()) {
                out.push('/');
            }
            let start = r;
            while r < n && bytes[r] != b'/' {
                r += 1;
            }
            out.push_str(&path[start..r]);
        }
    }

    if out.is_empty() {
        return String::from(".");
    }
    out
}

/// Returns the last element of `path`, after stripping trailing separators.
/// The empty path yields `"."`; a path of only separators yields `"/"`.
pub fn base(path: &str) -> String {
    if path.is_empty() {
        return String::from(".");
    }
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        return String::from("/");
    }
    match trimmed.rfind(SEPARATOR) {
        Some(i) => String::from(&trimmed[i + 1..]),
        None => String::from(trimmed),
    }
}

/// Returns all but the last element of `path`, cleaned. A path without a
/// separator yields `"."`.
pub fn dir_name(path: &str) -> String {
    match path.rfind(SEPARATOR) {
        Some(i) => clean(&path[..=i]),
        None => String::from("."),
    }
}

/// Splits `path` immediately after the final separator into a directory and
/// a file name component. The directory keeps its trailing separator. If
/// there is no separator, the directory is empty.
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind(SEPARATOR) {
        Some(i) => (&path[..=i], &path[i + 1..]),
        None => ("", path),
    }
}

/// Joins any number of path elements into a single path, cleaning the
/// result. Empty elements are ignored; if every element is empty the result
/// is the empty string.
pub fn join(elems: &[&str]) -> String {
    let parts: Vec<&str> = elems.iter().copied().filter(|e| !e.is_empty()).collect();
    if parts.is_empty() {
        return String::new();
    }
    clean(&parts.join("/"))
}

/// Returns the end of the path segment beginning at `start` and whether it
/// is the last one: `end` is the index of the next separator at or after
/// `start`, or the length of `path` if there is none.
pub fn segment_path(path: &str, start: usize) -> (usize, bool) {
    match path[start..].find(SEPARATOR) {
        Some(i) => (start + i, false),
        None => (path.len(), true),
    }
}

/// Returns a relative path that is lexically equivalent to `targpath` when
/// joined to `basepath`. Fails with [`ErrorKind::InvalidArgument`] when one
/// path is rooted and the other is not, or when producing the answer would
/// require knowing the current directory.
pub fn rel(basepath: &str, targpath: &str) -> VfsResult<String> {
    let base = clean(basepath);
    let targ = clean(targpath);
    if targ == base {
        return Ok(String::from("."));
    }
    let base = if base == "." { "" } else { base.as_str() };
    let base_rooted = base.starts_with('/');
    let targ_rooted = targ.starts_with('/');
    if base_rooted != targ_rooted {
        return Err(ErrorKind::InvalidArgument.into());
    }

    // Position b[b0..bi] and t[t0..ti] at the first differing elements.
    let b = base.as_bytes();
    let t = targ.as_bytes();
    let bl = b.len();
    let tl = t.len();
    let (mut b0, mut bi, mut t0, mut ti) = (0usize, 0usize, 0usize, 0usize);
    loop {
        while bi < bl && b[bi] != b'/' {
            bi += 1;
        }
        while ti < tl && t[ti] != b'/' {
            ti += 1;
        }
        if b[b0..bi] != t[t0..ti] {
            break;
        }
        if bi < bl {
            bi += 1;
        }
        if ti < tl {
            ti += 1;
        }
        b0 = bi;
        t0 = ti;
    }
    if &base[b0..bi] == ".." {
        return Err(ErrorKind::InvalidArgument.into());
    }

    if b0 != bl {
        // base has elements the target lacks: climb out of them
        let seps = base[b0..bl].matches('/').count();
        let mut out = String::from("..");
        for _ in 0..seps {
            out.push_str("/..");
        }
        if t0 != tl {
            out.push('/');
            out.push_str(&targ[t0..]);
        }
        return Ok(out);
    }
    Ok(String::from(&targ[t0..]))
}

/// Identity on this Unix-style core: no separator translation is performed.
pub fn from_slash(path: &str) -> String {
    String::from(path)
}

/// Identity on this Unix-style core: no separator translation is performed.
pub fn to_slash(path: &str) -> String {
    String::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        let cases = [
            // already clean
            ("abc", "abc"),
            ("abc/def", "abc/def"),
            ("a/b/c", "a/b/c"),
            (".", "."),
            ("..", ".."),
            ("../..", "../.."),
            ("../../abc", "../../abc"),
            ("/abc", "/abc"),
            ("/", "/"),
            // empty is current dir
            ("", "."),
            // remove trailing slash
            ("abc/", "abc"),
            ("abc/def/", "abc/def"),
            ("a/b/c/", "a/b/c"),
            ("./", "."),
            ("../", ".."),
            ("../../", "../.."),
            ("/abc/", "/abc"),
            // remove doubled slash
            ("abc//def//ghi", "abc/def/ghi"),
            ("//abc", "/abc"),
            ("///abc", "/abc"),
            ("//abc//", "/abc"),
            ("abc//", "abc"),
            // remove . elements
            ("abc/./def", "abc/def"),
            ("/./abc/def", "/abc/def"),
            ("abc/.", "abc"),
            // remove .. elements
            ("abc/def/ghi/../jkl", "abc/def/jkl"),
            ("abc/def/../ghi/../jkl", "abc/jkl"),
            ("abc/def/..", "abc"),
            ("abc/def/../..", "."),
            ("/abc/def/../..", "/"),
            ("abc/def/../../..", ".."),
            ("/abc/def/../../..", "/"),
            ("abc/def/../../../ghi/jkl/../../../mno", "../../mno"),
            // combinations
            ("abc/./../def", "def"),
            ("abc//./../def", "def"),
            ("abc/../../././../def", "../../def"),
        ];
        for (input, want) in cases {
            assert_eq!(want, clean(input), "clean({:?})", input);
            // idempotence
            assert_eq!(want, clean(&clean(input)), "clean(clean({:?}))", input);
            // cleaning never changes rootedness
            assert_eq!(is_abs(input), is_abs(&clean(input)), "is_abs({:?})", input);
        }
    }

    #[test]
    fn test_base() {
        let cases = [
            ("", "."),
            (".", "."),
            ("/.", "."),
            ("/", "/"),
            ("////", "/"),
            ("x/", "x"),
            ("abc", "abc"),
            ("abc/def", "def"),
            ("a/b/.x", ".x"),
            ("a/b/c.", "c."),
            ("a/b/c.x", "c.x"),
        ];
        for (input, want) in cases {
            assert_eq!(want, base(input), "base({:?})", input);
        }
    }

    #[test]
    fn test_dir_name() {
        let cases = [
            ("", "."),
            (".", "."),
            ("/.", "/"),
            ("/", "/"),
            ("////", "/"),
            ("/foo", "/"),
            ("x/", "x"),
            ("abc", "."),
            ("abc/def", "abc"),
            ("a/b/.x", "a/b"),
            ("a/b/c.", "a/b"),
            ("a/b/c.x", "a/b"),
        ];
        for (input, want) in cases {
            assert_eq!(want, dir_name(input), "dir_name({:?})", input);
        }
    }

    #[test]
    fn test_split() {
        let cases = [
            ("a/b", "a/", "b"),
            ("a/b/", "a/b/", ""),
            ("a/", "a/", ""),
            ("a", "", "a"),
            ("/", "/", ""),
        ];
        for (input, dir, file) in cases {
            assert_eq!((dir, file), split(input), "split({:?})", input);
        }
    }

    #[test]
    fn test_join() {
        let cases: [(&[&str], &str); 11] = [
            (&[], ""),
            (&[""], ""),
            (&["", ""], ""),
            (&["a"], "a"),
            (&["a", "b"], "a/b"),
            (&["a", ""], "a"),
            (&["", "a"], "a"),
            (&["a/", "b"], "a/b"),
            (&["a/", ""], "a"),
            (&["/", "a"], "/a"),
            (&["a", "b/c", "d"], "a/b/c/d"),
        ];
        for (elems, want) in cases {
            assert_eq!(want, join(elems), "join({:?})", elems);
        }
    }

    #[test]
    fn test_segment_path() {
        assert_eq!((2, false), segment_path("/a/b/c", 1));
        assert_eq!((4, false), segment_path("/a/b/c", 3));
        assert_eq!((6, true), segment_path("/a/b/c", 5));
        assert_eq!((1, true), segment_path("/", 1));
        assert_eq!((3, true), segment_path("abc", 0));
    }

    #[test]
    fn test_rel() {
        let cases = [
            ("a/b", "a/b", "."),
            ("a/b/.", "a/b", "."),
            ("a/b", "a/b/.", "."),
            ("./a/b", "a/b", "."),
            ("a/b", "./a/b", "."),
            ("ab/cd", "ab/cde", "../cde"),
            ("ab/cd", "ab/c", "../c"),
            ("a/b", "a/b/c/d", "c/d"),
            ("a/b", "a/b/../c", "../c"),
            ("a/b/../c", "a/b", "../b"),
            ("a/b/c", "a/c/d", "../../c/d"),
            ("a/b", "c/d", "../../c/d"),
            ("a/b/c/d", "a/b", "../.."),
            ("a/b/c/d", "a/b/", "../.."),
            ("a/b/c/d/", "a/b", "../.."),
            ("a/b/c/d/", "a/b/", "../.."),
            ("../../a/b", "../../a/b/c/d", "c/d"),
            ("/a/b", "/a/b", "."),
            ("/a/b/.", "/a/b", "."),
            ("/ab/cd", "/ab/cde", "../cde"),
            ("/a/b", "/a/b/c/d", "c/d"),
            ("/a/b", "/c/d", "../../c/d"),
            ("/a/b/c/d", "/a/b", "../.."),
            ("/../../a/b", "/a/b/c/d", "c/d"),
            (".", "a/b", "a/b"),
            (".", "..", ".."),
        ];
        for (base, targ, want) in cases {
            let got = rel(base, targ);
            assert_eq!(Ok(String::from(want)), got, "rel({:?}, {:?})", base, targ);
        }
    }

    #[test]
    fn test_rel_join_roundtrip() {
        let cases = [
            ("/a", "/a/b/c"),
            ("/a/b", "/a/c"),
            ("/", "/x/y"),
            ("a/b", "a/b/c/d"),
            ("a/b/c", "a/d"),
        ];
        for (base, targ) in cases {
            let relative = rel(base, targ).unwrap();
            assert_eq!(
                clean(targ),
                join(&[base, &relative]),
                "rel({:?}, {:?}) = {:?}",
                base,
                targ,
                relative
            );
        }
    }

    #[test]
    fn test_rel_errors() {
        let cases = [
            ("..", "."),
            ("..", "a"),
            ("../..", ".."),
            ("a", "/a"),
            ("/a", "a"),
        ];
        for (base, targ) in cases {
            let got = rel(base, targ);
            assert!(got.is_err(), "rel({:?}, {:?}) = {:?}", base, targ, got);
        }
    }

    #[test]
    fn test_slash_identity() {
        assert_eq!("a/b", from_slash("a/b"));
        assert_eq!("a/b", to_slash("a/b"));
        assert!(is_path_separator('/'));
        assert!(!is_path_separator('\\'));
    }
}
