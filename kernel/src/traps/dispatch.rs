//! Vector-indexed handler registry and the dispatch policy.
//!
//! One optional handler per vector, stored as an atomic pointer so
//! registration does not need a lock. Registration is a boot-time
//! activity in practice: swapping a handler while its vector is mid
//! flight is not atomic with respect to the in-progress dispatch, and
//! the registry makes no attempt to serialize against it.
//!
//! Dispatch policy differs by vector class:
//!
//! * exceptions (0-31): the handler runs if present; a missing handler
//!   is fatal, since resuming from an unknown fault state is unsound.
//! * hardware IRQs (32-47): the handler runs if present, a missing one
//!   is a benign no-op, and the controller is acknowledged afterward
//!   either way.
//! * software vectors (anything else): handler if present, no
//!   acknowledgment.

use core::fmt;
use core::sync::atomic::{AtomicPtr, Ordering};

use halcyon_hw::pic::ChainedPics;
use halcyon_hw::port::PortBus;

use crate::sync::IrqSpinLock;
use crate::traps::frame::TrapFrame;

pub const VECTOR_COUNT: usize = 256;

/// A registered trap handler. Receives the full register snapshot and
/// may mutate it; the mutated frame is what `iretq` restores.
pub type TrapHandler = fn(&mut TrapFrame);

/// Errors from registry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapError {
    /// The vector already has a handler; unregister it first. Silent
    /// replacement would let one subsystem steal another's line.
    AlreadyRegistered { vector: u8 },
}

impl fmt::Display for TrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRegistered { vector } => {
                write!(f, "vector {vector} already has a registered handler")
            }
        }
    }
}

/// The per-vector handler table.
pub struct TrapRegistry {
    handlers: [AtomicPtr<()>; VECTOR_COUNT],
}

impl TrapRegistry {
    pub const fn new() -> Self {
        const EMPTY: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());
        Self {
            handlers: [EMPTY; VECTOR_COUNT],
        }
    }

    /// Installs `handler` for `vector`. Fails if the slot is taken.
    pub fn register(&self, vector: u8, handler: TrapHandler) -> Result<(), TrapError> {
        let slot = &self.handlers[vector as usize];
        slot.compare_exchange(
            core::ptr::null_mut(),
            handler as *mut (),
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .map(|_| ())
        .map_err(|_| TrapError::AlreadyRegistered { vector })
    }

    /// Removes the handler for `vector`, if any. Removing from an empty
    /// slot is a no-op.
    pub fn unregister(&self, vector: u8) {
        self.handlers[vector as usize].store(core::ptr::null_mut(), Ordering::Release);
    }

    fn handler(&self, vector: usize) -> Option<TrapHandler> {
        let raw = self.handlers[vector].load(Ordering::Acquire);
        if raw.is_null() {
            None
        } else {
            // SAFETY: The only non-null values ever stored are fn
            // pointers of type TrapHandler, written by register().
            Some(unsafe { core::mem::transmute::<*mut (), TrapHandler>(raw) })
        }
    }

    /// Routes one trap according to the vector-class policy and sends
    /// end-of-interrupt for hardware lines.
    pub fn service<B: PortBus>(&self, pics: &IrqSpinLock<ChainedPics<B>>, frame: &mut TrapFrame) {
        let vector = frame.vector as usize;
        if vector >= VECTOR_COUNT {
            panic!("trap with impossible vector {vector}");
        }

        let handler = self.handler(vector);

        if vector < 32 {
            match handler {
                Some(handler) => handler(frame),
                None => panic!("unhandled CPU exception\n{frame}"),
            }
            return;
        }

        if let Some(handler) = handler {
            handler(frame);
        }

        // Acknowledge after the handler so a slow handler cannot be
        // re-entered by its own line. Non-hardware vectors need none.
        if ChainedPics::<B>::handles(vector as u8) {
            pics.lock().acknowledge(vector as u8);
        }
    }
}

impl Default for TrapRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Shared recording bus so tests can inspect writes while the PIC
    /// owns the bus value.
    #[derive(Clone)]
    struct SharedBus(std::sync::Arc<Mutex<Vec<(u16, u8)>>>);

    impl SharedBus {
        fn new() -> Self {
            Self(std::sync::Arc::new(Mutex::new(Vec::new())))
        }

        fn writes(&self) -> Vec<(u16, u8)> {
            self.0.lock().unwrap().clone()
        }
    }

    impl PortBus for SharedBus {
        fn read(&mut self, _port: u16) -> u8 {
            0
        }

        fn write(&mut self, port: u16, value: u8) {
            self.0.lock().unwrap().push((port, value));
        }
    }

    fn test_pics() -> (SharedBus, IrqSpinLock<ChainedPics<SharedBus>>) {
        let bus = SharedBus::new();
        (bus.clone(), IrqSpinLock::new(ChainedPics::new(bus)))
    }

    fn frame_for(vector: u64) -> TrapFrame {
        let mut frame = TrapFrame::empty();
        frame.vector = vector;
        frame
    }

    static OBSERVED: Mutex<Vec<u64>> = Mutex::new(Vec::new());

    fn observing_handler(frame: &mut TrapFrame) {
        OBSERVED.lock().unwrap().push(frame.vector);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = TrapRegistry::new();
        registry.register(33, observing_handler).unwrap();
        assert_eq!(
            registry.register(33, observing_handler),
            Err(TrapError::AlreadyRegistered { vector: 33 })
        );
    }

    #[test]
    fn unregister_frees_the_slot_and_tolerates_empty_slots() {
        let registry = TrapRegistry::new();
        registry.register(34, observing_handler).unwrap();
        registry.unregister(34);
        registry.register(34, observing_handler).unwrap();
        registry.unregister(200);
    }

    #[test]
    fn unregistered_irq_is_a_no_op_but_still_acknowledged() {
        let (bus, pics) = test_pics();
        let registry = TrapRegistry::new();

        registry.service(&pics, &mut frame_for(35));

        // No handler ran; the master still got its end-of-interrupt.
        assert_eq!(bus.writes(), vec![(0x20, 0x20)]);
    }

    #[test]
    fn slave_irq_dispatch_acknowledges_both_controllers() {
        let (bus, pics) = test_pics();
        let registry = TrapRegistry::new();

        registry.service(&pics, &mut frame_for(41));

        assert_eq!(bus.writes(), vec![(0xA0, 0x20), (0x20, 0x20)]);
    }

    #[test]
    fn registered_irq_handler_runs_before_acknowledgment() {
        let (bus, pics) = test_pics();
        let registry = TrapRegistry::new();
        registry.register(36, observing_handler).unwrap();

        registry.service(&pics, &mut frame_for(36));

        assert!(OBSERVED.lock().unwrap().contains(&36));
        assert_eq!(bus.writes(), vec![(0x20, 0x20)]);
    }

    #[test]
    fn software_vector_gets_no_acknowledgment() {
        let (bus, pics) = test_pics();
        let registry = TrapRegistry::new();
        registry.register(0x80, observing_handler).unwrap();

        registry.service(&pics, &mut frame_for(0x80));

        assert!(OBSERVED.lock().unwrap().contains(&0x80));
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn handled_exception_resumes_without_acknowledgment() {
        let (bus, pics) = test_pics();
        let registry = TrapRegistry::new();
        registry.register(3, observing_handler).unwrap();

        registry.service(&pics, &mut frame_for(3));

        assert!(OBSERVED.lock().unwrap().contains(&3));
        assert!(bus.writes().is_empty());
    }

    #[test]
    #[should_panic(expected = "unhandled CPU exception")]
    fn unhandled_exception_is_fatal() {
        let (_bus, pics) = test_pics();
        let registry = TrapRegistry::new();
        registry.service(&pics, &mut frame_for(13));
    }
}
