//! Linux reader loop: epoll on the PTY master.
//!
//! Edge-triggered in style if not in registration: each wakeup drains the
//! descriptor until the kernel reports `EAGAIN`, so a level-triggered
//! registration never spins. The loop owns the master descriptor and exits
//! on EOF, `EIO` (slave side gone) or HUP/ERR, which is what child exit
//! looks like from the master end.

use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::Arc;

use nix::errno::Errno;
use tracing::{debug, error};

use super::window::OutputWindow;
use crate::config::READ_BUFFER_SIZE;

const EVENT_SLOTS: usize = 8;

pub(super) fn read_output_loop(master: OwnedFd, window: Arc<OutputWindow>) {
    let master_fd = master.as_raw_fd();

    let epoll_fd = unsafe { libc::epoll_create1(0) };
    if epoll_fd == -1 {
        error!(err = %Errno::last(), "epoll_create1 failed, task output will be lost");
        return;
    }

    let mut registration = libc::epoll_event {
        events: libc::EPOLLIN as u32,
        u64: master_fd as u64,
    };
    if unsafe { libc::epoll_ctl(epoll_fd, libc::EPOLL_CTL_ADD, master_fd, &mut registration) } == -1
    {
        error!(err = %Errno::last(), "epoll_ctl failed, task output will be lost");
        unsafe { libc::close(epoll_fd) };
        return;
    }

    let mut events = [libc::epoll_event { events: 0, u64: 0 }; EVENT_SLOTS];
    let mut buf = [0u8; READ_BUFFER_SIZE];

    'outer: loop {
        let count = unsafe {
            libc::epoll_wait(epoll_fd, events.as_mut_ptr(), EVENT_SLOTS as i32, -1)
        };
        if count == -1 {
            if Errno::last() == Errno::EINTR {
                continue;
            }
            error!(err = %Errno::last(), "epoll_wait failed");
            break;
        }

        for event in &events[..count as usize] {
            if event.events & libc::EPOLLIN as u32 != 0
                && drain_ready(master_fd, &mut buf, &window).is_break()
            {
                break 'outer;
            }

            if event.events & (libc::EPOLLHUP | libc::EPOLLERR) as u32 != 0 {
                // The child side is gone; pick up anything still queued.
                let _ = drain_ready(master_fd, &mut buf, &window);
                debug!(fd = master_fd, "pty hangup");
                break 'outer;
            }
        }
    }

    unsafe { libc::close(epoll_fd) };
    // `master` drops here, closing the descriptor.
}

/// Read until the descriptor would block. `Break` means the descriptor is
/// finished (EOF or a hard error) and the loop should end.
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
                // EIO when the slave closes; either way output is best-effort.
                debug!(fd, %err, "pty read failed");
                return std::ops::ControlFlow::Break(());
            }
        }
    }
}
