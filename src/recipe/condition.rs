// src/recipe/condition.rs

//! Host predicates for conditional patches
//!
//! Some patches only make sense on one platform (a stack-size fix that only
//! musl needs, for example). A patch may carry a `condition` such as `musl`,
//! `linux`, `macos`, `x86_64`, `aarch64`, or a negation like `!musl`.

use crate::error::{Error, Result};
use std::fmt;

/// Facts about the machine a recipe is cooked on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    /// Operating system as in `std::env::consts::OS`
    pub os: String,
    /// CPU architecture as in `std::env::consts::ARCH`
    pub arch: String,
    /// C library flavour ("musl", "gnu", or empty)
    pub libc: String,
}

impl HostFacts {
    /// Facts for the running process
    pub fn detect() -> Self {
        let libc = if cfg!(target_env = "musl") {
            "musl"
        } else if cfg!(target_env = "gnu") {
            "gnu"
        } else {
            ""
        };

        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            libc: libc.to_string(),
        }
    }
}

impl Default for HostFacts {
    fn default() -> Self {
        Self::detect()
    }
}

/// A parsed patch condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCondition {
    negated: bool,
    atom: Atom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Atom {
    Os(String),
    Arch(String),
    Libc(String),
}

impl HostCondition {
    /// Parse a condition string
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (negated, name) = match s.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, s),
        };

        let atom = match name {
            "linux" | "macos" | "freebsd" | "windows" => Atom::Os(name.to_string()),
            "x86_64" | "aarch64" | "x86" | "arm" | "riscv64" => Atom::Arch(name.to_string()),
            "musl" => Atom::Libc("musl".to_string()),
            "glibc" | "gnu" => Atom::Libc("gnu".to_string()),
            _ => {
                return Err(Error::MalformedRecipe(format!(
                    "unknown patch condition: {}",
                    s
                )));
            }
        };

        Ok(Self { negated, atom })
    }

    /// Evaluate against a host
    pub fn holds(&self, host: &HostFacts) -> bool {
        let value = match &self.atom {
            Atom::Os(os) => host.os == *os,
            Atom::Arch(arch) => host.arch == *arch,
            Atom::Libc(libc) => host.libc == *libc,
        };
        value != self.negated
    }
}

impl fmt::Display for HostCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.atom {
            Atom::Os(s) | Atom::Arch(s) => s.as_str(),
            Atom::Libc(s) if s == "gnu" => "glibc",
            Atom::Libc(s) => s.as_str(),
        };
        if self.negated {
            write!(f, "!{}", name)
        } else {
            f.write_str(name)
        }
    }
}
