//! Scroll-wheel and pointer synthesis via CoreGraphics events, plus the
//! scroll listener used during calibration. macOS only.

use std::cell::RefCell;
use std::rc::Rc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CGMouseButton, EventField, ScrollEventUnit,
};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::CGPoint;
use tokio_util::sync::CancellationToken;

use crate::error::HarvestError;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

const PIN_REFRESH: Duration = Duration::from_millis(50);
// The system clamps oversized wheel deltas, so large jumps go out in
// bursts of at most this many ticks.
const MAX_TICKS_PER_EVENT: i64 = 10;
const BURST_GAP: Duration = Duration::from_millis(8);

fn event_source() -> Result<CGEventSource, HarvestError> {
    CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|_| HarvestError::Capture("could not create a HID event source".into()))
}

fn post_scroll(ticks: i32) -> Result<(), HarvestError> {
    let source = event_source()?;
    let event = CGEvent::new_scroll_event(source, ScrollEventUnit::LINE, 1, ticks, 0, 0)
        .map_err(|_| HarvestError::Capture("could not create a scroll event".into()))?;
    event.post(CGEventTapLocation::HID);
    Ok(())
}

/// Advance the content under the pointer by `ticks` wheel lines
/// (negative scrolls down, positive up), then wait `settle_delay` for the
/// panel to finish rendering. Best effort: a failed post is logged and
/// the remainder of the burst abandoned.
pub fn scroll_by(ticks: i64, settle_delay: Duration) {
    let mut remaining = ticks;
    while remaining != 0 {
        let chunk = remaining.clamp(-MAX_TICKS_PER_EVENT, MAX_TICKS_PER_EVENT);
        if let Err(err) = post_scroll(chunk as i32) {
            log_warn!("scroll burst abandoned with {remaining} ticks left: {err}");
            break;
        }
        remaining -= chunk;
        thread::sleep(BURST_GAP);
    }
    thread::sleep(settle_delay);
}

/// Warp the pointer to an absolute screen position.
pub fn move_pointer(x: f64, y: f64) {
    let Ok(source) = event_source() else {
        return;
    };
    if let Ok(event) = CGEvent::new_mouse_event(
        source,
        CGEventType::MouseMoved,
        CGPoint::new(x, y),
        CGMouseButton::Left,
    ) {
        event.post(CGEventTapLocation::HID);
    }
}

/// Keeps the pointer parked at a fixed position while one capture/scroll
/// step runs, compensating for recognition and scroll targeting drifting
/// when the pointer wanders into certain window regions.
///
/// Started immediately before a step and joined right after, so at most
/// one pin thread is ever alive. The thread also observes the session
/// token, so a user cancellation releases the pointer promptly.
pub struct PointerPin {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PointerPin {
    pub fn start(x: f64, y: f64, session_token: &CancellationToken) -> Self {
        let token = session_token.child_token();
        let thread_token = token.clone();
        let handle = thread::spawn(move || {
            while !thread_token.is_cancelled() {
                move_pointer(x, y);
                thread::sleep(PIN_REFRESH);
            }
        });
        Self {
            token,
            handle: Some(handle),
        }
    }

    pub fn request_stop(&self) {
        self.token.cancel();
    }

    pub fn join(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PointerPin {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Sum scroll-wheel deltas while the user performs the manual reference
/// scroll.
///
/// Listening ends once the wheel has been idle for `idle_window` after
/// the first tick, or at `max_wait` overall. Returns the signed net delta
/// in wheel lines; zero means the user never scrolled.
pub fn measure_manual_scroll(
    max_wait: Duration,
    idle_window: Duration,
) -> Result<i64, HarvestError> {
    let total: Rc<RefCell<i64>> = Rc::new(RefCell::new(0));
    let last_tick: Rc<RefCell<Option<Instant>>> = Rc::new(RefCell::new(None));

    let cb_total = Rc::clone(&total);
    let cb_last = Rc::clone(&last_tick);
    let tap = CGEventTap::new(
        CGEventTapLocation::HID,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::ScrollWheel],
        move |_proxy, _kind, event| {
            let delta = event.get_integer_value_field(EventField::SCROLL_WHEEL_EVENT_DELTA_AXIS_1);
            *cb_total.borrow_mut() += delta;
            *cb_last.borrow_mut() = Some(Instant::now());
            None
        },
    )
    .map_err(|_| {
        HarvestError::Calibration(
            "could not install the scroll listener; grant accessibility permission".into(),
        )
    })?;

    let source = tap
        .mach_port
        .create_runloop_source(0)
        .map_err(|_| HarvestError::Calibration("could not attach the scroll listener".into()))?;
    let run_loop = CFRunLoop::get_current();
    run_loop.add_source(&source, unsafe { kCFRunLoopDefaultMode });
    tap.enable();

    let started = Instant::now();
    loop {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopDefaultMode },
            Duration::from_millis(200),
            false,
        );
        let now = Instant::now();
        if now.duration_since(started) >= max_wait {
            break;
        }
        let idle_since = *last_tick.borrow();
        if let Some(last) = idle_since {
            if now.duration_since(last) >= idle_window {
                break;
            }
        }
    }

    run_loop.remove_source(&source, unsafe { kCFRunLoopDefaultMode });
    Ok(*total.borrow())
}
