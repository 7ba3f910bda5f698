//! Kernel binary entry point.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod boot {
    use core::panic::PanicInfo;

    use lumen_kernel::{arch, drivers, fs, log_service, mm, println, serial_println};

    #[no_mangle]
    pub extern "C" fn _start() -> ! {
        kernel_main()
    }

    fn kernel_main() -> ! {
        // Privileged CPU state first: segments, TSS, and the gate table.
        arch::x86::gdt::init();
        arch::x86::idt::init();

        arch::x86::vga::clear_screen();
        log_service::init();
        println!("Lumen v{}", env!("CARGO_PKG_VERSION"));

        // Memory: frame bitmap, then the bump heap (the filesystem mount
        // below allocates from it), then the identity map.
        mm::pmm::init();
        mm::heap::init();
        arch::x86::paging::init();

        if let Err(err) = fs::init() {
            println!("fs: {}", err);
        }

        // Timer, interrupt controllers, keyboard; then open the gates.
        arch::x86::pit::init();
        arch::x86::pic::init();
        drivers::keyboard::init();
        arch::x86::enable_interrupts();

        println!("Lumen ready (FS mounted)");
        log::info!("boot complete, entering idle loop");

        loop {
            arch::x86::wait_for_interrupt();
        }
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        println!("[KERNEL PANIC] {}", info);
        serial_println!("[KERNEL PANIC] {}", info);
        arch::halt();
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("lumen-kernel is a freestanding kernel; build it for a bare-metal x86 target");
}
