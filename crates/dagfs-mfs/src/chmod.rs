//! Mode changes.
//!
//! Accepts an octal mode (`755`, `0644`, `1777`) or a comma-separated list
//! of symbolic clauses in the style of chmod(1):
//!
//! ```text
//! clause := who* (op perm*)+
//! who    := u | g | o | a
//! op     := + | - | =
//! perm   := r | w | x | X | s | t
//! ```
//!
//! An empty `who` means `a`. `X` grants execute only to directories and
//! to files that already have an execute bit somewhere.

use std::fmt;
use std::str::FromStr;

use crate::error::FilesError;

const USER: u32 = 0o4700;
const GROUP: u32 = 0o2070;
const OTHER: u32 = 0o1007;
const ANY_EXEC: u32 = 0o111;
const ALL: u32 = 0o7777;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Add,
    Remove,
    Set,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Action {
    op: Op,
    perms: String,
}

/// One symbolic clause such as `go-w`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clause {
    /// Bits the clause may touch, as a union of `USER`, `GROUP`, `OTHER`.
    who: u32,
    actions: Vec<Action>,
}

/// A parsed mode argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModeSpec {
    Absolute(u32),
    Symbolic(Vec<Clause>),
}

impl ModeSpec {
    /// The mode that results from applying this change to `current`.
    pub fn apply(&self, current: u32, is_dir: bool) -> u32 {
        let clauses = match self {
            ModeSpec::Absolute(mode) => return mode & ALL,
            ModeSpec::Symbolic(clauses) => clauses,
        };
        let mut mode = current & ALL;
        for clause in clauses {
            for action in &clause.actions {
                let bits = perm_bits(&action.perms, mode, is_dir) & clause.who;
                mode = match action.op {
                    Op::Add => mode | bits,
                    Op::Remove => mode & !bits,
                    // `=` leaves the sticky bit alone unless `t` is named.
                    Op::Set => {
                        let sticky = if action.perms.contains('t') { 0 } else { 0o1000 };
                        (mode & !(clause.who & !sticky)) | bits
                    }
                };
            }
        }
        mode
    }
}

fn perm_bits(perms: &str, current: u32, is_dir: bool) -> u32 {
    perms.chars().fold(0, |acc, p| {
        acc | match p {
            'r' => 0o444,
            'w' => 0o222,
            'x' => 0o111,
            'X' if is_dir || current & ANY_EXEC != 0 => 0o111,
            's' => 0o6000,
            't' => 0o1000,
            _ => 0,
        }
    })
}

impl From<u32> for ModeSpec {
    fn from(mode: u32) -> Self {
        ModeSpec::Absolute(mode & ALL)
    }
}

impl FromStr for ModeSpec {
    type Err = FilesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || FilesError::InvalidArgument(format!("invalid mode {s:?}"));
        if !s.is_empty() && s.len() <= 5 && s.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            let mode = u32::from_str_radix(s, 8).map_err(|_| bad())?;
            return if mode <= ALL { Ok(ModeSpec::Absolute(mode)) } else { Err(bad()) };
        }

        let mut clauses = Vec::new();
        for text in s.split(',') {
            let mut chars = text.chars().peekable();
            let mut who = 0;
            while let Some(&c) = chars.peek() {
                who |= match c {
                    'u' => USER,
                    'g' => GROUP,
                    'o' => OTHER,
                    'a' => USER | GROUP | OTHER,
                    _ => break,
                };
                chars.next();
            }
            if who == 0 {
                who = USER | GROUP | OTHER;
            }

            let mut actions: Vec<Action> = Vec::new();
            for c in chars {
                match c {
                    '+' | '-' | '=' => actions.push(Action {
                        op: match c {
                            '+' => Op::Add,
                            '-' => Op::Remove,
                            _ => Op::Set,
                        },
                        perms: String::new(),
                    }),
                    'r' | 'w' | 'x' | 'X' | 's' | 't' => {
                        actions.last_mut().ok_or_else(bad)?.perms.push(c);
                    }
                    _ => return Err(bad()),
                }
            }
            if actions.is_empty() {
                return Err(bad());
            }
            clauses.push(Clause { who, actions });
        }
        Ok(ModeSpec::Symbolic(clauses))
    }
}

impl fmt::Display for ModeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeSpec::Absolute(mode) => write!(f, "{mode:04o}"),
            ModeSpec::Symbolic(clauses) => {
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    for (bit, name) in [(USER, 'u'), (GROUP, 'g'), (OTHER, 'o')] {
                        if clause.who & bit == bit {
                            write!(f, "{name}")?;
                        }
                    }
                    for action in &clause.actions {
                        let op = match action.op {
                            Op::Add => '+',
                            Op::Remove => '-',
                            Op::Set => '=',
                        };
                        write!(f, "{op}{}", action.perms)?;
                    }
                }
                Ok(())
            }
        }
    }
}
