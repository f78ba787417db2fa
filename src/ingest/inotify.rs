// src/ingest/inotify.rs
// Thin inotify wrapper: one descriptor, one pump thread forwarding events
use std::io;
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    /// Entry created or moved into a watched directory
    Created,
    /// Watch removed by the kernel (directory deleted or unmounted)
    Ignored,
    /// Kernel queue overflowed; events were lost
    Overflow,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub wd: i32,
    pub kind: RawEventKind,
    pub is_dir: bool,
    pub name: String,
}

#[derive(Debug)]
pub enum PumpMessage {
    Event(RawEvent),
    Error(io::Error),
}

#[cfg(target_os = "linux")]
mod platform {
    use super::{PumpMessage, RawEvent, RawEventKind};
    use std::ffi::CString;
    use std::io;
    use std::mem;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedSender;

    use libc::{
        inotify_add_watch, inotify_event, inotify_init1, poll, pollfd, read, IN_CLOEXEC,
        IN_CREATE, IN_IGNORED, IN_ISDIR, IN_MOVED_TO, IN_NONBLOCK, IN_Q_OVERFLOW, POLLIN,
    };

    const POLL_TIMEOUT_MS: i32 = 100;

    /// The pump thread shares the descriptor, so it stays open until the
    /// thread notices shutdown and exits on its own.
    pub struct Inotify {
        fd: Arc<OwnedFd>,
        shutdown: Arc<AtomicBool>,
    }

    impl Inotify {
        pub fn new(tx: UnboundedSender<PumpMessage>) -> io::Result<Self> {
            let raw = unsafe { inotify_init1(IN_CLOEXEC | IN_NONBLOCK) };
            if raw < 0 {
                return Err(io::Error::last_os_error());
            }
            let fd = Arc::new(unsafe { OwnedFd::from_raw_fd(raw) });
            let shutdown = Arc::new(AtomicBool::new(false));

            let pump_fd = Arc::clone(&fd);
            let pump_shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("inotify-pump".to_string())
                .spawn(move || pump_events(&pump_fd, &pump_shutdown, &tx))?;

            Ok(Self { fd, shutdown })
        }

        pub fn add_watch(&self, dir: &Path) -> io::Result<i32> {
            let dir_cstr = CString::new(dir.as_os_str().as_bytes()).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "watch path contains NUL")
            })?;
            let mask = IN_CREATE | IN_MOVED_TO;
            let wd = unsafe { inotify_add_watch(self.fd.as_raw_fd(), dir_cstr.as_ptr(), mask) };
            if wd < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(wd)
        }
    }

    impl Drop for Inotify {
        // No join: this runs on an async worker and the pump may sit in poll
        fn drop(&mut self) {
            self.shutdown.store(true, Ordering::Release);
        }
    }

    fn pump_events(fd: &OwnedFd, shutdown: &AtomicBool, tx: &UnboundedSender<PumpMessage>) {
        let mut buffer = vec![0u8; 4096];
        let mut pfd = pollfd {
            fd: fd.as_raw_fd(),
            events: POLLIN,
            revents: 0,
        };

        loop {
            if shutdown.load(Ordering::Acquire) || tx.is_closed() {
                break;
            }
            let res = unsafe { poll(&mut pfd, 1, POLL_TIMEOUT_MS) };
            if res < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                if tx.send(PumpMessage::Error(err)).is_err() {
                    break;
                }
                thread::sleep(Duration::from_millis(50));
                continue;
            }
            if res == 0 || (pfd.revents & POLLIN) == 0 {
                continue;
            }

            let len = unsafe { read(fd.as_raw_fd(), buffer.as_mut_ptr() as *mut _, buffer.len()) };
            if len < 0 {
                let err = io::Error::last_os_error();
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) {
                    continue;
                }
                if tx.send(PumpMessage::Error(err)).is_err() {
                    break;
                }
                continue;
            }

            for event in parse_events(&buffer[..len as usize]) {
                if tx.send(PumpMessage::Event(event)).is_err() {
                    return;
                }
            }
        }
    }

    pub fn parse_events(buf: &[u8]) -> Vec<RawEvent> {
        let header_size = mem::size_of::<inotify_event>();
        let mut events = Vec::new();
        let mut offset = 0usize;

        while offset + header_size <= buf.len() {
            let header = &buf[offset..offset + header_size];
            let Some((wd, mask, name_len)) = parse_event_header(header) else {
                break;
            };
            let name_start = offset + header_size;
            let name_end = name_start.saturating_add(name_len as usize);
            if name_end > buf.len() {
                break;
            }
            let name_bytes = &buf[name_start..name_end];
            let nul = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
            let name = String::from_utf8_lossy(&name_bytes[..nul]).into_owned();

            let kind = if mask & IN_Q_OVERFLOW != 0 {
                RawEventKind::Overflow
            } else if mask & IN_IGNORED != 0 {
                RawEventKind::Ignored
            } else if mask & (IN_CREATE | IN_MOVED_TO) != 0 {
                RawEventKind::Created
            } else {
                RawEventKind::Other
            };

            events.push(RawEvent {
                wd,
                kind,
                is_dir: mask & IN_ISDIR != 0,
                name,
            });
            offset = name_end;
        }
        events
    }

    fn parse_event_header(buf: &[u8]) -> Option<(i32, u32, u32)> {
        if buf.len() < mem::size_of::<inotify_event>() {
            return None;
        }
        let wd = i32::from_ne_bytes(buf[0..4].try_into().ok()?);
        let mask = u32::from_ne_bytes(buf[4..8].try_into().ok()?);
        let len = u32::from_ne_bytes(buf[12..16].try_into().ok()?);
        Some((wd, mask, len))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn encode(wd: i32, mask: u32, name: &str) -> Vec<u8> {
            let mut padded = name.as_bytes().to_vec();
            if !padded.is_empty() {
                padded.resize(name.len() + (16 - name.len() % 16), 0);
            }
            let mut buf = Vec::new();
            buf.extend_from_slice(&wd.to_ne_bytes());
            buf.extend_from_slice(&mask.to_ne_bytes());
            buf.extend_from_slice(&0u32.to_ne_bytes());
            buf.extend_from_slice(&(padded.len() as u32).to_ne_bytes());
            buf.extend_from_slice(&padded);
            buf
        }

        #[test]
        fn parses_consecutive_events() {
            let mut buf = encode(1, IN_CREATE | IN_ISDIR, "20250329");
            buf.extend(encode(2, IN_MOVED_TO, "10"));
            buf.extend(encode(3, IN_IGNORED, ""));
            buf.extend(encode(-1, IN_Q_OVERFLOW, ""));

            let events = parse_events(&buf);
            assert_eq!(events.len(), 4);
            assert_eq!(
                events[0],
                RawEvent {
                    wd: 1,
                    kind: RawEventKind::Created,
                    is_dir: true,
                    name: "20250329".to_string(),
                }
            );
            assert_eq!(events[1].kind, RawEventKind::Created);
            assert!(!events[1].is_dir);
            assert_eq!(events[1].name, "10");
            assert_eq!(events[2].kind, RawEventKind::Ignored);
            assert_eq!(events[3].kind, RawEventKind::Overflow);
        }

        #[test]
        fn drop_does_not_wait_for_the_pump() {
            let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
            let inotify = Inotify::new(tx).expect("inotify");
            // let the pump settle into its poll timeout
            thread::sleep(Duration::from_millis(10));

            let started = std::time::Instant::now();
            drop(inotify);
            assert!(
                started.elapsed() < Duration::from_millis(POLL_TIMEOUT_MS as u64 / 2),
                "drop blocked for {:?}",
                started.elapsed()
            );
        }

        #[test]
        fn truncated_event_is_not_parsed() {
            let buf = encode(1, IN_CREATE, "data");
            assert!(parse_events(&buf[..buf.len() - 4]).is_empty());
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    use super::PumpMessage;
    use std::io;
    use std::path::Path;
    use tokio::sync::mpsc::UnboundedSender;

    pub struct Inotify;

    impl Inotify {
        pub fn new(_tx: UnboundedSender<PumpMessage>) -> io::Result<Self> {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "filesystem watching requires inotify (linux)",
            ))
        }

        pub fn add_watch(&self, _dir: &Path) -> io::Result<i32> {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "filesystem watching requires inotify (linux)",
            ))
        }
    }
}

/// Inotify descriptor plus the thread that drains it into `tx`
pub struct Watcher {
    inner: platform::Inotify,
}

impl Watcher {
    pub fn new(tx: UnboundedSender<PumpMessage>) -> io::Result<Self> {
        Ok(Self {
            inner: platform::Inotify::new(tx)?,
        })
    }

    /// Watch `dir` for entries created or moved into it
    pub fn add_watch(&self, dir: &Path) -> io::Result<i32> {
        self.inner.add_watch(dir)
    }
}
