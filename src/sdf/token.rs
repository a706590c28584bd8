//! Process-wide interned strings.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use parking_lot::RwLock;

/// Append-only intern table. Entries are never removed, so every handle
/// handed out stays valid for the life of the process.
struct Interner {
    strings: Vec<&'static str>,
    lookup: HashMap<&'static str, u32>,
}

impl Interner {
    fn new() -> Self {
        let mut lookup = HashMap::new();
        lookup.insert("", 0);
        Self {
            strings: vec![""],
            lookup,
        }
    }
}

fn table() -> &'static RwLock<Interner> {
    static TABLE: OnceLock<RwLock<Interner>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(Interner::new()))
}

/// Interned string handle. Handle `0` is the empty token.
///
/// Equality and hashing compare handles; ordering compares the strings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Token(u32);

impl Token {
    /// The empty token.
    pub const EMPTY: Token = Token(0);

    /// Intern `s`, returning the existing handle if already present.
    pub fn new(s: &str) -> Self {
        if let Some(&id) = table().read().lookup.get(s) {
            return Token(id);
        }
        let mut t = table().write();
        if let Some(&id) = t.lookup.get(s) {
            return Token(id);
        }
        let id = t.strings.len() as u32;
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        t.strings.push(leaked);
        t.lookup.insert(leaked, id);
        Token(id)
    }

    /// The interned string.
    pub fn as_str(&self) -> &'static str {
        table().read().strings.get(self.0 as usize).copied().unwrap_or("")
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Raw handle value.
    #[inline]
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            return Ordering::Equal;
        }
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?})", self.as_str())
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::new(s)
    }
}

impl From<&String> for Token {
    fn from(s: &String) -> Self {
        Token::new(s)
    }
}

impl PartialEq<str> for Token {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
