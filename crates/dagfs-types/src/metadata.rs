use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Permission bits reported for a file that carries no explicit mode.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Permission bits reported for a directory that carries no explicit mode.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Modification time stored in a UnixFS node.
///
/// Seconds are relative to the Unix epoch and may be negative. The
/// fractional part is always below one second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Mtime {
    pub secs: i64,
    pub nsecs: u32,
}

impl Mtime {
    /// Create an mtime, carrying whole seconds out of `nsecs`.
    pub fn new(secs: i64, nsecs: u32) -> Self {
        let carry = i64::from(nsecs / 1_000_000_000);
        Self {
            secs: secs.saturating_add(carry),
            nsecs: nsecs % 1_000_000_000,
        }
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }
}

impl From<SystemTime> for Mtime {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self::new(after.as_secs() as i64, after.subsec_nanos()),
            Err(before) => {
                let d = before.duration();
                if d.subsec_nanos() == 0 {
                    Self::new(-(d.as_secs() as i64), 0)
                } else {
                    Self::new(-(d.as_secs() as i64) - 1, 1_000_000_000 - d.subsec_nanos())
                }
            }
        }
    }
}

impl From<Mtime> for SystemTime {
    fn from(mtime: Mtime) -> Self {
        let nanos = Duration::from_nanos(u64::from(mtime.nsecs));
        if mtime.secs >= 0 {
            UNIX_EPOCH + Duration::from_secs(mtime.secs as u64) + nanos
        } else {
            UNIX_EPOCH - Duration::from_secs(mtime.secs.unsigned_abs()) + nanos
        }
    }
}

impl fmt::Display for Mtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nsecs == 0 {
            write!(f, "{}", self.secs)
        } else {
            write!(f, "{}.{:09}", self.secs, self.nsecs)
        }
    }
}

/// Render permission bits `ls -l` style, e.g. `drwxr-xr-x`.
pub fn format_mode(mode: u32, is_dir: bool) -> String {
    let mut out = String::with_capacity(10);
    out.push(if is_dir { 'd' } else { '-' });
    let specials = [(0o4000, 's', 'S'), (0o2000, 's', 'S'), (0o1000, 't', 'T')];
    for (i, shift) in [6u32, 3, 0].into_iter().enumerate() {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        let (flag, with_x, without_x) = specials[i];
        let exec = bits & 0o1 != 0;
        out.push(match (mode & flag != 0, exec) {
            (true, true) => with_x,
            (true, false) => without_x,
            (false, true) => 'x',
            (false, false) => '-',
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_carries_nanoseconds() {
        let m = Mtime::new(5, 2_500_000_000);
        assert_eq!(m, Mtime { secs: 7, nsecs: 500_000_000 });
    }

    #[test]
    fn system_time_roundtrip() {
        let t = UNIX_EPOCH + Duration::new(1_600_000_000, 123);
        let m = Mtime::from(t);
        assert_eq!(m, Mtime::new(1_600_000_000, 123));
        assert_eq!(SystemTime::from(m), t);
    }

    #[test]
    fn before_epoch() {
        let t = UNIX_EPOCH - Duration::new(1, 250_000_000);
        let m = Mtime::from(t);
        assert_eq!(m, Mtime::new(-2, 750_000_000));
        assert_eq!(SystemTime::from(m), t);
    }

    #[test]
    fn display() {
        assert_eq!(Mtime::new(10, 0).to_string(), "10");
        assert_eq!(Mtime::new(10, 5).to_string(), "10.000000005");
    }

    #[test]
    fn format_modes() {
        assert_eq!(format_mode(DEFAULT_DIR_MODE, true), "drwxr-xr-x");
        assert_eq!(format_mode(DEFAULT_FILE_MODE, false), "-rw-r--r--");
        assert_eq!(format_mode(0o4755, false), "-rwsr-xr-x");
        assert_eq!(format_mode(0o1777, true), "drwxrwxrwt");
        assert_eq!(format_mode(0o1666, true), "drw-rw-rwT");
    }

    proptest! {
        #[test]
        fn mtime_survives_system_time(secs in -1_000_000_000i64..4_000_000_000i64, nsecs in 0u32..1_000_000_000) {
            let m = Mtime::new(secs, nsecs);
            prop_assert_eq!(Mtime::from(SystemTime::from(m)), m);
        }
    }
}
