//! macOS reader loop: kqueue on the PTY master.
//!
//! Same shape as the Linux loop with kqueue in place of epoll; `EV_EOF`
//! plays the role of `EPOLLHUP`. The loop owns the master descriptor and
//! drops it on exit.

use std::os::fd::{AsRawFd, OwnedFd};
use std::ptr;
use std::sync::Arc;

use nix::errno::Errno;
use tracing::{debug, error};

use super::window::OutputWindow;
use crate::config::READ_BUFFER_SIZE;

const EVENT_SLOTS: usize = 8;

pub(super) fn read_output_loop(master: OwnedFd, window: Arc<OutputWindow>) {
    let master_fd = master.as_raw_fd();

    let kqueue_fd = unsafe { libc::kqueue() };
    if kqueue_fd == -1 {
        error!(err = %Errno::last(), "kqueue failed, task output will be lost");
        return;
    }

    let registration = libc::kevent {
        ident: master_fd as usize,
        filter: libc::EVFILT_READ,
        flags: libc::EV_ADD | libc::EV_ENABLE,
        fflags: 0,
        data: 0,
        udata: ptr::null_mut(),
    };

    let mut events: [libc::kevent; EVENT_SLOTS] = unsafe { std::mem::zeroed() };
    let mut buf = [0u8; READ_BUFFER_SIZE];

    'outer: loop {
        let count = unsafe {
            libc::kevent(
                kqueue_fd,
                &registration,
                1,
                events.as_mut_ptr(),
                EVENT_SLOTS as i32,
                ptr::null(),
            )
        };
        if count == -1 {
            if Errno::last() == Errno::EINTR {
                continue;
            }
            error!(err = %Errno::last(), "kevent failed");
            break;
        }

        for event in &events[..count as usize] {
            if event.ident != master_fd as usize {
                continue;
            }

            if drain_ready(master_fd, &mut buf, &window).is_break() {
                break 'outer;
            }

            if event.flags & libc::EV_EOF != 0 {
                let _ = drain_ready(master_fd, &mut buf, &window);
                debug!(fd = master_fd, "pty hangup");
                break 'outer;
            }
        }
    }

    unsafe { libc::close(kqueue_fd) };
    // `master` drops here, closing the descriptor.
}

/// Read until the descriptor would block; `Break` means EOF or a hard error.
fn drain_ready(
    fd: i32,
    buf: &mut [u8],
    window: &OutputWindow,
) -> std::ops::ControlFlow<()> {
    loop {
        match nix::unistd::read(fd, buf) {
            Ok(0) => {
                debug!(fd, "pty read returned EOF");
                return std::ops::ControlFlow::Break(());
            }
            Ok(count) => window.push(buf[..count].to_vec()),
            Err(Errno::EAGAIN) => return std::ops::ControlFlow::Continue(()),
            Err(Errno::EINTR) => continue,
            Err(err) => {
                debug!(fd, %err, "pty read failed");
                return std::ops::ControlFlow::Break(());
            }
        }
    }
}
