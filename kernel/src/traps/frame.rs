//! The register snapshot handed to every handler.

use core::fmt;

/// Saved CPU state at the point of a trap.
///
/// Field order mirrors the trampoline's push sequence exactly: the
/// general-purpose registers saved last sit lowest on the stack, then
/// the vector and error code pushed by the stub, then the frame the
/// CPU pushed itself. Reordering fields here breaks `iretq`.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct TrapFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    /// Vector number, pushed by the stub.
    pub vector: u64,
    /// Error code pushed by the CPU, or zero for vectors without one.
    pub error_code: u64,
    // Pushed by the CPU on interrupt entry.
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl TrapFrame {
    /// An all-zero frame, for tests and for synthesizing dispatches.
    pub const fn empty() -> Self {
        Self {
            r15: 0,
            r14: 0,
            r13: 0,
            r12: 0,
            r11: 0,
            r10: 0,
            r9: 0,
            r8: 0,
            rbp: 0,
            rdi: 0,
            rsi: 0,
            rdx: 0,
            rcx: 0,
            rbx: 0,
            rax: 0,
            vector: 0,
            error_code: 0,
            rip: 0,
            cs: 0,
            rflags: 0,
            rsp: 0,
            ss: 0,
        }
    }
}

impl fmt::Display for TrapFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "vector={:#04x} error={:#x} rip={:#018x} cs={:#x} rflags={:#x}",
            self.vector, self.error_code, self.rip, self.cs, self.rflags
        )?;
        writeln!(
            f,
            "rax={:#018x} rbx={:#018x} rcx={:#018x} rdx={:#018x}",
            self.rax, self.rbx, self.rcx, self.rdx
        )?;
        writeln!(
            f,
            "rsi={:#018x} rdi={:#018x} rbp={:#018x} rsp={:#018x}",
            self.rsi, self.rdi, self.rbp, self.rsp
        )?;
        writeln!(
            f,
            "r8 ={:#018x} r9 ={:#018x} r10={:#018x} r11={:#018x}",
            self.r8, self.r9, self.r10, self.r11
        )?;
        write!(
            f,
            "r12={:#018x} r13={:#018x} r14={:#018x} r15={:#018x}",
            self.r12, self.r13, self.r14, self.r15
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_twenty_two_words() {
        // 15 saved GPRs + vector + error code + 5 CPU-pushed words.
        assert_eq!(core::mem::size_of::<TrapFrame>(), 22 * 8);
    }

    #[test]
    fn display_includes_vector_and_rip() {
        let mut frame = TrapFrame::empty();
        frame.vector = 14;
        frame.rip = 0xDEAD_BEEF;
        let text = format!("{frame}");
        assert!(text.contains("vector=0x0e"));
        assert!(text.contains("deadbeef"));
    }
}
