#![cfg(feature = "memtrace")]

//! Opt-in transfer timeline: one row per copy or kernel, dumped as CSV.

use once_cell::sync::Lazy;
use std::{fs::File, io, io::Write, sync::Mutex, time::Instant};

/// Transfer direction, or a kernel submission.
#[derive(Clone, Copy)]
pub enum Dir {
    H2D,
    D2H,
    Kernel,
}

impl Dir {
    fn as_str(self) -> &'static str {
        match self {
            Dir::H2D => "H2D",
            Dir::D2H => "D2H",
            Dir::Kernel => "Kernel",
        }
    }
}

/// Zero point, fixed at the first `start()`.
static T0: Lazy<Instant> = Lazy::new(Instant::now);

/// Rows of (start, end, bytes, dir, idle) in µs since `T0`.
static LOG: Lazy<Mutex<Vec<(u128, u128, usize, &'static str, u128)>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

/// Open interval: started when the operation is queued, finished when its
/// event guard observes completion.
pub struct CopyToken {
    start: Instant,
    bytes: usize,
    dir: Dir,
}

pub fn start(dir: Dir, bytes: usize) -> CopyToken {
    Lazy::force(&T0);
    CopyToken {
        start: Instant::now(),
        bytes,
        dir,
    }
}

impl CopyToken {
    /// Closes the interval; idle time is the gap to the previous row.
    pub fn finish(self) {
        let t0 = *T0;
        let s = self.start.duration_since(t0).as_micros();
        let e = Instant::now().duration_since(t0).as_micros();

        let mut log = LOG.lock().unwrap();
        let prev_end = log.last().map(|entry| entry.1).unwrap_or(0);
        let idle = s.saturating_sub(prev_end);

        log.push((s, e, self.bytes, self.dir.as_str(), idle));
    }
}

/// Writes `memtrace.csv` in the working directory.
pub fn flush_csv() -> io::Result<()> {
    let mut f = File::create("memtrace.csv")?;
    writeln!(f, "t_start_us,t_end_us,bytes,dir,idle_us")?;
    for (s, e, b, d, idle) in LOG.lock().unwrap().iter() {
        writeln!(f, "{},{},{},{},{}", s, e, b, d, idle)?;
    }
    Ok(())
}
