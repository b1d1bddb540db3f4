//! Assembly trampolines between the CPU's interrupt delivery and the
//! Rust dispatch entry point.
//!
//! The CPU pushes an error code for some exception vectors and not for
//! others; each stub normalizes the stack by pushing a zero where the
//! CPU did not, then pushes its own vector number and jumps to the
//! shared tail. The tail saves the general-purpose registers so the
//! frame layout matches [`TrapFrame`](crate::traps::TrapFrame), hands
//! a pointer to it to [`trap_entry`](crate::traps::trap_entry), and
//! unwinds the whole thing with `iretq`.
//!
//! The stubs are naked: any compiler-generated prologue would clobber
//! registers before they are saved.

/// Shared trampoline tail. Expects `[error_code, vector]` already
/// pushed below the CPU-provided frame.
#[unsafe(naked)]
unsafe extern "C" fn trap_common() {
    core::arch::naked_asm!(
        "push rax",
        "push rbx",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push rbp",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        // First argument: pointer to the saved frame.
        "mov rdi, rsp",
        "cld",
        "call {entry}",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rbp",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rbx",
        "pop rax",
        // Discard vector and error code.
        "add rsp, 16",
        "iretq",
        entry = sym crate::traps::trap_entry,
    );
}

/// Stub for a vector where the CPU pushes no error code.
macro_rules! stub {
    ($name:ident, $vector:literal) => {
        #[unsafe(naked)]
        unsafe extern "C" fn $name() {
            core::arch::naked_asm!(
                "push 0",
                "push {vector}",
                "jmp {common}",
                vector = const $vector,
                common = sym trap_common,
            );
        }
    };
}

/// Stub for a vector where the CPU pushes an error code itself.
macro_rules! stub_err {
    ($name:ident, $vector:literal) => {
        #[unsafe(naked)]
        unsafe extern "C" fn $name() {
            core::arch::naked_asm!(
                "push {vector}",
                "jmp {common}",
                vector = const $vector,
                common = sym trap_common,
            );
        }
    };
}

stub!(vec0, 0);
stub!(vec1, 1);
stub!(vec2, 2);
stub!(vec3, 3);
stub!(vec4, 4);
stub!(vec5, 5);
stub!(vec6, 6);
stub!(vec7, 7);
stub_err!(vec8, 8);
stub!(vec9, 9);
stub_err!(vec10, 10);
stub_err!(vec11, 11);
stub_err!(vec12, 12);
stub_err!(vec13, 13);
stub_err!(vec14, 14);
stub!(vec15, 15);
stub!(vec16, 16);
stub_err!(vec17, 17);
stub!(vec18, 18);
stub!(vec19, 19);
stub!(vec20, 20);
stub!(vec21, 21);
stub!(vec22, 22);
stub!(vec23, 23);
stub!(vec24, 24);
stub!(vec25, 25);
stub!(vec26, 26);
stub!(vec27, 27);
stub!(vec28, 28);
stub!(vec29, 29);
stub_err!(vec30, 30);
stub!(vec31, 31);
stub!(vec32, 32);
stub!(vec33, 33);
stub!(vec34, 34);
stub!(vec35, 35);
stub!(vec36, 36);
stub!(vec37, 37);
stub!(vec38, 38);
stub!(vec39, 39);
stub!(vec40, 40);
stub!(vec41, 41);
stub!(vec42, 42);
stub!(vec43, 43);
stub!(vec44, 44);
stub!(vec45, 45);
stub!(vec46, 46);
stub!(vec47, 47);
stub!(vec128, 128);

/// The trampoline for `vector`, or `None` for vectors that have no
/// gate installed (unused upper range).
pub fn stub_for(vector: u8) -> Option<unsafe extern "C" fn()> {
    let stub: unsafe extern "C" fn() = match vector {
        0 => vec0,
        1 => vec1,
        2 => vec2,
        3 => vec3,
        4 => vec4,
        5 => vec5,
        6 => vec6,
        7 => vec7,
        8 => vec8,
        9 => vec9,
        10 => vec10,
        11 => vec11,
        12 => vec12,
        13 => vec13,
        14 => vec14,
        15 => vec15,
        16 => vec16,
        17 => vec17,
        18 => vec18,
        19 => vec19,
        20 => vec20,
        21 => vec21,
        22 => vec22,
        23 => vec23,
        24 => vec24,
        25 => vec25,
        26 => vec26,
        27 => vec27,
        28 => vec28,
        29 => vec29,
        30 => vec30,
        31 => vec31,
        32 => vec32,
        33 => vec33,
        34 => vec34,
        35 => vec35,
        36 => vec36,
        37 => vec37,
        38 => vec38,
        39 => vec39,
        40 => vec40,
        41 => vec41,
        42 => vec42,
        43 => vec43,
        44 => vec44,
        45 => vec45,
        46 => vec46,
        47 => vec47,
        128 => vec128,
        _ => return None,
    };
    Some(stub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_exception_and_irq_vector_has_a_stub() {
        for vector in 0..=47u8 {
            assert!(stub_for(vector).is_some(), "vector {vector}");
        }
        assert!(stub_for(128).is_some());
    }

    #[test]
    fn unused_vectors_have_no_stub() {
        assert!(stub_for(48).is_none());
        assert!(stub_for(127).is_none());
        assert!(stub_for(255).is_none());
    }
}
