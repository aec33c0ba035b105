// Layout checks for the slot: the state word sits at offset 0 and padded
// slots never share a cache line. Observed values are printed to help when a
// platform disagrees.
use crossbeam_utils::CachePadded;
use memoffset::offset_of;
use std::mem::{align_of, size_of};
use std::sync::atomic::AtomicU64;
use stbuffer::STBuffer::Ring::layout::{
    SlotState, FLAG_BITS, FLAG_MASK, HAS_DELIMITER, INSTALLED, MAX_GENERATION, SYNTHETIC,
};
use stbuffer::STBuffer::Ring::Slot;

#[test]
fn test_slot_layout() {
    let size = size_of::<Slot>();
    let align = align_of::<Slot>();
    let off_state = offset_of!(Slot, state);

    println!(
        "Slot => size: {size}, align: {align}, offsets: [state:{off_state}], state word: {} bytes",
        size_of::<AtomicU64>()
    );

    assert_eq!(off_state, 0);
    assert!(align >= align_of::<AtomicU64>());
}

#[test]
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
fn test_padded_slot_fills_a_cache_line() {
    let size = size_of::<CachePadded<Slot>>();
    let align = align_of::<CachePadded<Slot>>();
    println!("CachePadded<Slot> => size: {size}, align: {align}");

    assert!(align >= 64);
    assert_eq!(size % align, 0);
}

#[test]
fn test_state_word_packing() {
    println!("flag bits: {FLAG_BITS}, flag mask: {FLAG_MASK:#x}, max generation: {MAX_GENERATION}");
    assert_eq!(FLAG_MASK, 0xff);
    assert_eq!(MAX_GENERATION << FLAG_BITS >> FLAG_BITS, MAX_GENERATION);

    let top = SlotState::new(MAX_GENERATION, INSTALLED | HAS_DELIMITER | SYNTHETIC);
    assert_eq!(top.generation(), MAX_GENERATION);
    assert_eq!(top.flags(), INSTALLED | HAS_DELIMITER | SYNTHETIC);

    // flags outside the mask never leak into the generation
    let masked = SlotState::new(1, 1 << FLAG_BITS);
    assert_eq!(masked.generation(), 1);
    assert_eq!(masked.flags(), 0);
}
