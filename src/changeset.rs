/// classification of a single path in `git status --porcelain` output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Modified,
    Added,
    Deleted,
    Untracked,
    Other,
}

impl StatusCode {
    /// decode the two-character `XY` prefix of a porcelain line
    pub fn from_code(code: &str) -> Self {
        if code == "??" {
            Self::Untracked
        } else if code.contains('M') {
            Self::Modified
        } else if code.contains('A') {
            Self::Added
        } else if code.contains('D') {
            Self::Deleted
        } else {
            Self::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Modified => "modified",
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Untracked => "new",
            Self::Other => "changed",
        }
    }
}

/// represents a single changed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    pub status: StatusCode,
    pub code: String, // raw porcelain code, eg. " M" or "??"
    pub path: String, // for renames, the destination path
}

/// pending modifications of a working tree at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub entries: Vec<ChangeEntry>,
}

impl ChangeSet {
    /// parse the full stdout of `git status --porcelain`
    pub fn from_porcelain(output: &str) -> Self {
        let entries = output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(parse_line)
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

fn parse_line(line: &str) -> Option<ChangeEntry> {
    // porcelain v1: two status characters, a space, then the path
    let code = line.get(..2)?;
    let rest = line.get(3..).unwrap_or("").trim_end();

    // renames and copies are reported as "old -> new"
    let path = match rest.split_once(" -> ") {
        Some((_, new_path)) => new_path,
        None => rest,
    };

    Some(ChangeEntry {
        status: StatusCode::from_code(code),
        code: code.to_string(),
        path: unquote(path),
    })
}

/// git wraps paths containing special characters in double quotes, using C
/// escapes and octal bytes for anything outside printable ascii
fn unquote(path: &str) -> String {
    let Some(inner) = path
        .strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
    else {
        return path.to_string();
    };

    let bytes = inner.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        i += 1;
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let Some(&next) = bytes.get(i) else {
            out.push(b'\\');
            break;
        };
        i += 1;
        match next {
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0b),
            b'0'..=b'7' => {
                // up to three octal digits make one byte
                let mut value = u32::from(next - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match bytes.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push(value as u8);
            }
            other => out.push(other),
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
