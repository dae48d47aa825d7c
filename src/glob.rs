/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Shell-style pattern matching, globbing and tree walking over a [`Vfs`].

use crate::errors::{ErrorKind, VfsError, VfsResult};
use crate::path;
use crate::vfs::{FileInfo, Vfs};

/// Directive returned by a [`walk`] callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStep {
    /// Keep walking.
    Continue,
    /// Skip the contents of the directory the callback was invoked on (or,
    /// for a non-directory, the remainder of the containing directory).
    SkipDir,
}

enum Flow {
    Continue,
    SkipDir,
}

/// Reports whether `name` matches the shell pattern. The pattern grammar:
///
/// ```text
/// pattern: { term }
/// term:    '*'          matches any sequence of non-separator characters
///          '?'          matches any single non-separator character
///          '[' [ '^' ] { character-range } ']'   character class
///          c            matches character c (c != '*', '?', '\\', '[')
///          '\\' c       matches character c
/// ```
///
/// Matching is over the entire name, not a substring. The only possible
/// error is [`ErrorKind::BadPattern`] for a malformed pattern.
pub fn match_pattern(pattern: &str, name: &str) -> VfsResult<bool> {
    let mut pattern = pattern;
    let mut name = name;
    'pattern: while !pattern.is_empty() {
        let (star, chunk, rest) = scan_chunk(pattern);
        pattern = rest;
        if star && chunk.is_empty() {
            // trailing * matches the rest of the name, separators excluded
            return Ok(!name.contains('/'));
        }
        if let Some(t) = match_chunk(chunk, name)? {
            if t.is_empty() || !pattern.is_empty() {
                name = t;
                continue;
            }
        }
        if star {
            // try the chunk at every position after the star
            let mut i = 0;
            let bytes = name.as_bytes();
            while i < bytes.len() && bytes[i] != b'/' {
                i += next_char_len(&name[i..]);
                if let Some(t) = match_chunk(chunk, &name[i..])? {
                    if pattern.is_empty() && !t.is_empty() {
                        continue;
                    }
                    name = t;
                    continue 'pattern;
                }
            }
        }
        // check that the rest of the pattern is still well-formed
        while !pattern.is_empty() {
            let (_, chunk, rest) = scan_chunk(pattern);
            pattern = rest;
            match_chunk(chunk, "")?;
        }
        return Ok(false);
    }
    Ok(name.is_empty())
}

/// Splits the pattern into a leading star run, the next literal chunk and
/// the remainder.
fn scan_chunk(pattern: &str) -> (bool, &str, &str) {
    let mut star = false;
    let mut pattern = pattern;
    while pattern.starts_with('*') {
        pattern = &pattern[1..];
        star = true;
    }
    let bytes = pattern.as_bytes();
    let mut in_range = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                if i + 1 < bytes.len() {
                    i += 1;
                }
            }
            b'[' => in_range = true,
            b']' => in_range = false,
            b'*' => {
                if !in_range {
                    break;
                }
            }
            _ => {}
        }
        i += 1;
    }
    (star, &pattern[..i], &pattern[i..])
}

/// Matches `chunk` against a prefix of `s`, returning the unmatched tail of
/// `s` on success and `None` on a plain mismatch. After a mismatch the
/// remaining chunk is still parsed so malformed patterns are reported.
fn match_chunk<'a>(chunk: &str, s: &'a str) -> VfsResult<Option<&'a str>> {
    let mut chunk = chunk;
    let mut s = s;
    let mut failed = false;
    while !chunk.is_empty() {
        if !failed && s.is_empty() {
            failed = true;
        }
        match chunk.as_bytes()[0] {
            b'[' => {
                let mut r = '\0';
                if !failed {
                    r = first_char(s);
                    s = &s[r.len_utf8()..];
                }
                chunk = &chunk[1..];
                let negated = chunk.starts_with('^');
                if negated {
                    chunk = &chunk[1..];
                }
                let mut matched = false;
                let mut nrange = 0;
                loop {
                    if chunk.starts_with(']') && nrange > 0 {
                        chunk = &chunk[1..];
                        break;
                    }
                    let (lo, rest) = get_esc(chunk)?;
                    chunk = rest;
                    let mut hi = lo;
                    if chunk.starts_with('-') {
                        let (h, rest) = get_esc(&chunk[1..])?;
                        hi = h;
                        chunk = rest;
                    }
                    if lo <= r && r <= hi {
                        matched = true;
                    }
                    nrange += 1;
                }
                if matched == negated {
                    failed = true;
                }
            }
            b'?' => {
                if !failed {
                    let r = first_char(s);
                    if r == '/' {
                        failed = true;
                    } else {
                        s = &s[r.len_utf8()..];
                    }
                }
                chunk = &chunk[1..];
            }
            b'\\' => {
                chunk = &chunk[1..];
                if chunk.is_empty() {
                    return Err(ErrorKind::BadPattern.into());
                }
                let c = first_char(chunk);
                if !failed {
                    if first_char(s) != c {
                        failed = true;
                    } else {
                        s = &s[c.len_utf8()..];
                    }
                }
                chunk = &chunk[c.len_utf8()..];
            }
            _ => {
                let c = first_char(chunk);
                if !failed {
                    if first_char(s) != c {
                        failed = true;
                    } else {
                        s = &s[c.len_utf8()..];
                    }
                }
                chunk = &chunk[c.len_utf8()..];
            }
        }
    }
    if failed {
        Ok(None)
    } else {
        Ok(Some(s))
    }
}

/// Reads a possibly-escaped character from a class body.
fn get_esc(chunk: &str) -> VfsResult<(char, &str)> {
    if chunk.is_empty() || chunk.starts_with('-') || chunk.starts_with(']') {
        return Err(ErrorKind::BadPattern.into());
    }
    let mut chunk = chunk;
    if chunk.starts_with('\\') {
        chunk = &chunk[1..];
        if chunk.is_empty() {
            return Err(ErrorKind::BadPattern.into());
        }
    }
    let c = first_char(chunk);
    let rest = &chunk[c.len_utf8()..];
    if rest.is_empty() {
        return Err(ErrorKind::BadPattern.into());
    }
    Ok((c, rest))
}

fn first_char(s: &str) -> char {
    s.chars().next().unwrap_or('\0')
}

fn next_char_len(s: &str) -> usize {
    s.chars().next().map(char::len_utf8).unwrap_or(1)
}

/// Returns the names of all files matching `pattern` on `vfs`, in lexical
/// order; an empty list when nothing matches. I/O errors during traversal
/// are ignored; the only possible error is a malformed pattern.
pub fn glob(vfs: &dyn Vfs, pattern: &str) -> VfsResult<Vec<String>> {
    // reject malformed patterns even when nothing would be matched
    match_pattern(pattern, "")?;
    let mut matches = Vec::new();
    glob_pattern(vfs, pattern, &mut matches)?;
    Ok(matches)
}

fn glob_pattern(vfs: &dyn Vfs, pattern: &str, matches: &mut Vec<String>) -> VfsResult<()> {
    if !has_meta(pattern) {
        if vfs.lstat(pattern).is_ok() {
            matches.push(String::from(pattern));
        }
        return Ok(());
    }

    let (dir, file) = path::split(pattern);
    let dir = clean_glob_path(dir);

    if !has_meta(&dir) {
        return glob_dir(vfs, &dir, file, matches);
    }
    // the directory part itself contains metacharacters
    if dir == pattern {
        return Err(ErrorKind::BadPattern.into());
    }
    let mut dirs = Vec::new();
    glob_pattern(vfs, &dir, &mut dirs)?;
    for d in dirs {
        glob_dir(vfs, &d, file, matches)?;
    }
    Ok(())
}

/// Appends to `matches` the entries of `dir` matching `pattern`. Stat and
/// read errors are ignored silently.
fn glob_dir(
    vfs: &dyn Vfs,
    dir: &str,
    pattern: &str,
    matches: &mut Vec<String>,
) -> VfsResult<()> {
    match vfs.stat(dir) {
        Ok(fi) if fi.mode.is_dir() => {}
        _ => return Ok(()),
    }
    let entries = match vfs.read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(()),
    };
    for entry in entries {
        if match_pattern(pattern, &entry.name)? {
            matches.push(path::join(&[dir, &entry.name]));
        }
    }
    Ok(())
}

/// Prepares a glob directory component for lookup: `""` is the current
/// directory and a trailing separator is kept only on the root.
fn clean_glob_path(dir: &str) -> String {
    match dir {
        "" => String::from("."),
        "/" => String::from("/"),
        _ => String::from(&dir[..dir.len() - 1]),
    }
}

fn has_meta(pattern: &str) -> bool {
    pattern.contains(&['*', '?', '[', '\\'][..])
}

/// Walks the tree rooted at `root` in lexical depth-first order, calling
/// `f` for every file and directory, symbolic links not followed. The
/// callback receives the path and either the node's [`FileInfo`] or the
/// error that prevented obtaining it, and may prune directories by
/// returning [`WalkStep::SkipDir`].
pub fn walk(
    vfs: &dyn Vfs,
    root: &str,
    f: &mut dyn FnMut(&str, Result<&FileInfo, &VfsError>) -> VfsResult<WalkStep>,
) -> VfsResult<()> {
    match vfs.lstat(root) {
        Ok(info) => {
            walk_tree(vfs, root, &info, f)?;
        }
        Err(err) => {
            f(root, Err(&err))?;
        }
    }
    Ok(())
}

fn walk_tree(
    vfs: &dyn Vfs,
    node_path: &str,
    info: &FileInfo,
    f: &mut dyn FnMut(&str, Result<&FileInfo, &VfsError>) -> VfsResult<WalkStep>,
) -> VfsResult<Flow> {
    if !info.mode.is_dir() {
        return Ok(match f(node_path, Ok(info))? {
            WalkStep::SkipDir => Flow::SkipDir,
            WalkStep::Continue => Flow::Continue,
        });
    }

    let entries = vfs.read_dir(node_path);
    let step = match &entries {
        Ok(_) => f(node_path, Ok(info))?,
        Err(err) => f(node_path, Err(err))?,
    };
    if matches!(step, WalkStep::SkipDir) {
        return Ok(Flow::Continue);
    }
    let Ok(entries) = entries else {
        // unreadable directory already reported through the callback
        return Ok(Flow::Continue);
    };

    for entry in entries {
        let child = path::join(&[node_path, &entry.name]);
        match vfs.lstat(&child) {
            Err(err) => {
                f(&child, Err(&err))?;
            }
            Ok(child_info) => {
                if let Flow::SkipDir = walk_tree(vfs, &child, &child_info, f)? {
                    if !child_info.mode.is_dir() {
                        // a file returning SkipDir prunes the rest of its directory
                        return Ok(Flow::Continue);
                    }
                }
            }
        }
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_pattern() {
        let cases = [
            ("abc", "abc", true),
            ("*", "abc", true),
            ("*c", "abc", true),
            ("a*", "a", true),
            ("a*", "abc", true),
            ("a*", "ab/c", false),
            ("a*/b", "abc/b", true),
            ("a*/b", "a/c/b", false),
            ("a*b*c*d*e*/f", "axbxcxdxe/f", true),
            ("a*b*c*d*e*/f", "axbxcxdxexxx/f", true),
            ("a*b*c*d*e*/f", "axbxcxdxe/xxx/f", false),
            ("a*b*c*d*e*/f", "axbxcxdxexxx/fff", false),
            ("a*b?c*x", "abxbbxdbxebxczzx", true),
            ("a*b?c*x", "abxbbxdbxebxczzy", false),
            ("ab[c]", "abc", true),
            ("ab[b-d]", "abc", true),
            ("ab[e-g]", "abc", false),
            ("ab[^c]", "abc", false),
            ("ab[^b-d]", "abc", false),
            ("ab[^e-g]", "abc", true),
            ("a\\*b", "a*b", true),
            ("a\\*b", "ab", false),
            ("a?b", "a☺b", true),
            ("a[^a]b", "a☺b", true),
            ("a???b", "a☺b", false),
            ("a[^a][^a][^a]b", "a☺b", false),
            ("[a-ζ]*", "α", true),
            ("*[a-ζ]", "A", false),
            ("a?b", "a/b", false),
            ("a*b", "a/b", false),
            ("[\\]a]", "]", true),
            ("[\\-]", "-", true),
            ("[x\\-]", "x", true),
            ("[x\\-]", "-", true),
            ("[x\\-]", "z", false),
            ("[\\-x]", "x", true),
            ("[\\-x]", "-", true),
            ("[\\-x]", "a", false),
            ("*x", "xxx", true),
        ];
        for (pattern, name, want) in cases {
            let got = match_pattern(pattern, name);
            assert_eq!(Ok(want), got, "match_pattern({:?}, {:?})", pattern, name);
        }
    }

    use crate::memfs::MemFs;
    use crate::vfs::{FileMode, Vfs};

    fn tree() -> MemFs {
        let fs = MemFs::new();
        fs.mkdir_all("/src/deep", FileMode::new(0o755)).unwrap();
        fs.mkdir_all("/docs", FileMode::new(0o755)).unwrap();
        for file in ["/src/a.rs", "/src/b.rs", "/src/notes.md", "/src/deep/c.rs", "/docs/x.md"]
        {
            fs.write_file(file, b"x", FileMode::new(0o644)).unwrap();
        }
        fs
    }

    #[test]
    fn test_glob_literal() {
        let fs = tree();
        assert_eq!(vec!["/src/a.rs"], glob(&fs, "/src/a.rs").unwrap());
        assert!(glob(&fs, "/src/missing.rs").unwrap().is_empty());
    }

    #[test]
    fn test_glob_star() {
        let fs = tree();
        assert_eq!(vec!["/src/a.rs", "/src/b.rs"], glob(&fs, "/src/*.rs").unwrap());
        assert_eq!(
            vec!["/src/a.rs", "/src/b.rs", "/src/deep", "/src/notes.md"],
            glob(&fs, "/src/*").unwrap()
        );
    }

    #[test]
    fn test_glob_class_and_question() {
        let fs = tree();
        assert_eq!(vec!["/src/a.rs", "/src/b.rs"], glob(&fs, "/src/[a-b].rs").unwrap());
        assert_eq!(vec!["/src/a.rs"], glob(&fs, "/src/a.r?").unwrap());
        assert_eq!(vec!["/src/b.rs"], glob(&fs, "/src/[^a].rs").unwrap());
    }

    #[test]
    fn test_glob_meta_in_directory_part() {
        let fs = tree();
        assert_eq!(
            vec!["/docs/x.md", "/src/notes.md"],
            glob(&fs, "/*/*.md").unwrap()
        );
        assert_eq!(vec!["/src/deep/c.rs"], glob(&fs, "/src/*/*.rs").unwrap());
    }

    #[test]
    fn test_glob_bad_pattern_without_matches() {
        let fs = MemFs::new();
        assert_eq!(
            Err(VfsError::Kind(ErrorKind::BadPattern)),
            glob(&fs, "/missing/[")
        );
    }

    #[test]
    fn test_walk_lexical_depth_first() {
        let fs = tree();
        let mut seen = Vec::new();
        walk(&fs, "/src", &mut |p, info| {
            assert!(info.is_ok());
            seen.push(String::from(p));
            Ok(WalkStep::Continue)
        })
        .unwrap();
        assert_eq!(
            vec!["/src", "/src/a.rs", "/src/b.rs", "/src/deep", "/src/deep/c.rs", "/src/notes.md"],
            seen
        );
    }

    #[test]
    fn test_walk_does_not_follow_symlinks() {
        let fs = tree();
        fs.symlink("/src", "/docs/loop").unwrap();
        let mut seen = Vec::new();
        walk(&fs, "/docs", &mut |p, info| {
            if let Ok(info) = info {
                if info.mode.is_symlink() {
                    assert_eq!("/docs/loop", p);
                }
            }
            seen.push(String::from(p));
            Ok(WalkStep::Continue)
        })
        .unwrap();
        assert_eq!(vec!["/docs", "/docs/loop", "/docs/x.md"], seen);
    }

    #[test]
    fn test_walk_skip_dir() {
        let fs = tree();
        let mut seen = Vec::new();
        walk(&fs, "/", &mut |p, _| {
            seen.push(String::from(p));
            if p == "/src" {
                return Ok(WalkStep::SkipDir);
            }
            Ok(WalkStep::Continue)
        })
        .unwrap();
        assert_eq!(vec!["/", "/docs", "/docs/x.md", "/src"], seen);
    }

    #[test]
    fn test_walk_missing_root_reports_error() {
        let fs = MemFs::new();
        let mut reported = Vec::new();
        walk(&fs, "/missing", &mut |p, info| {
            reported.push((String::from(p), info.err().map(|e| e.kind())));
            Ok(WalkStep::Continue)
        })
        .unwrap();
        assert_eq!(
            vec![(String::from("/missing"), Some(ErrorKind::NotFound))],
            reported
        );
    }

    #[test]
    fn test_walk_callback_error_stops() {
        let fs = tree();
        let mut count = 0;
        let err = walk(&fs, "/src", &mut |_, _| {
            count += 1;
            if count == 2 {
                return Err(ErrorKind::InvalidArgument.into());
            }
            Ok(WalkStep::Continue)
        })
        .unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
        assert_eq!(2, count);
    }

    #[test]
    fn test_match_pattern_malformed() {
        let cases = [
            ("[]a]", "]"),
            ("[-]", "-"),
            ("[x-]", "x"),
            ("[x-]", "-"),
            ("[-x]", "x"),
            ("[-x]", "-"),
            ("\\", "a"),
            ("[a-b-c]", "a"),
            ("[", "a"),
            ("[^", "a"),
            ("[^bc", "a"),
            ("a[", "a"),
            ("a[", "ab"),
            ("a[", "x"),
            ("a/b[", "x"),
        ];
        for (pattern, name) in cases {
            let got = match_pattern(pattern, name);
            assert_eq!(
                Err(VfsError::Kind(ErrorKind::BadPattern)),
                got,
                "match_pattern({:?}, {:?})",
                pattern,
                name
            );
        }
    }
}
