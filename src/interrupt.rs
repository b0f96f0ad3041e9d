mod interrupt_frame;

pub use interrupt_frame::InterruptFrame;

#[cfg(target_arch = "x86")]
use core::arch::asm;

pub fn irq_enable() {
	#[cfg(target_arch = "x86")]
	unsafe {
		asm!("sti")
	};
}

pub fn irq_disable() {
	#[cfg(target_arch = "x86")]
	unsafe {
		asm!("cli")
	};
}

#[must_use]
pub fn irq_save() -> bool {
	let iflag = get_interrupt_flag();
	irq_disable();

	iflag
}

pub fn irq_restore(iflag: bool) {
	if iflag {
		irq_enable();
	} else {
		irq_disable();
	}
}

#[cfg(target_arch = "x86")]
fn get_interrupt_flag() -> bool {
	let flag_mask = 1 << 9;
	let mut eflags: usize;
	unsafe {
		asm!(
			"pushfd",
			"pop eax",
			out("eax") eflags
		)
	};

	eflags & flag_mask == flag_mask
}

#[cfg(not(target_arch = "x86"))]
fn get_interrupt_flag() -> bool {
	false
}
