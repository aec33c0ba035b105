// Slot and ring level tests: index arithmetic, install outcomes, trailing
// offsets and the claim gate, driven without the façade.
use bytes::Bytes;
use stbuffer::Core::scan::{check_unit_len, delimiter_offsets, split_records, MAX_UNIT_LEN};
use stbuffer::FormatError;
use stbuffer::STBuffer::Ring::layout::{
    SlotState, HAS_DELIMITER, INSTALLED, LEADING_RELEASED, TRAILING_CLAIMED, TRAILING_KNOWN,
    TRAILING_RELEASED,
};
use stbuffer::STBuffer::Ring::{ClaimGate, SlotRing, TrySet};
use stbuffer::STBuffer::{DelimiterOffsets, SequencedUnit};

#[test]
fn index_and_generation_wraps_per_lap() {
    let ring = SlotRing::new(8);
    assert_eq!(ring.index_and_generation(0), (0, 1));
    assert_eq!(ring.index_and_generation(7), (7, 1));
    assert_eq!(ring.index_and_generation(8), (0, 2));
    assert_eq!(ring.index_and_generation(17), (1, 3));

    for sequence in [0u64, 5, 8, 63, 1_000_003] {
        let (index, generation) = ring.index_and_generation(sequence);
        assert_eq!(ring.sequence_at(index, generation), sequence);
    }
}

#[test]
fn install_publishes_flags_once() {
    let ring = SlotRing::new(8);
    let unit = SequencedUnit::scan(3, "a,b\nc", b'\n');
    let (index, generation) = ring.index_and_generation(3);

    assert_eq!(ring.try_set_with_delimiter(index, generation, &unit), TrySet::Installed);
    let state = ring.slot(index).load();
    println!("state after install: {:?}", state);
    assert!(state.is_installed_at(generation));
    assert!(state.has(INSTALLED | HAS_DELIMITER | TRAILING_KNOWN));
    assert!(!state.is_free());

    let again = ring.try_set_with_delimiter(index, generation, &unit);
    assert!(matches!(again, TrySet::Duplicate { .. }));
}

#[test]
fn earlier_lap_blocks_until_released() {
    let ring = SlotRing::new(4);
    let first = SequencedUnit::undelimited(1, "xy");
    let (index, generation) = ring.index_and_generation(1);
    assert_eq!(ring.try_set_without_delimiter(index, generation, &first), TrySet::Installed);

    let next_lap = SequencedUnit::undelimited(5, "zz");
    let (next_index, next_generation) = ring.index_and_generation(5);
    assert_eq!(next_index, index);
    let outcome = ring.try_set_without_delimiter(next_index, next_generation, &next_lap);
    assert!(matches!(outcome, TrySet::Occupied { .. }));
}

#[test]
fn older_generation_is_stale() {
    let ring = SlotRing::new(4);
    let later = SequencedUnit::undelimited(7, "later");
    let (index, generation) = ring.index_and_generation(7);
    assert_eq!(generation, 2);
    assert_eq!(ring.try_set_without_delimiter(index, generation, &later), TrySet::Installed);

    let earlier = SequencedUnit::undelimited(3, "earlier");
    let outcome = ring.try_set_without_delimiter(index, 1, &earlier);
    assert!(matches!(outcome, TrySet::Stale { .. }));
}

#[test]
fn trailing_offset_is_recorded_once() {
    let ring = SlotRing::new(8);
    let unit = SequencedUnit::delimited(2, "a\nb\nc", 1, None).unwrap();
    let (index, generation) = ring.index_and_generation(2);
    ring.try_set_with_delimiter(index, generation, &unit);
    assert!(!ring.slot(index).load().has(TRAILING_KNOWN));

    ring.set_trailing_offset(index, generation, 3).unwrap();
    assert!(ring.slot(index).load().has(TRAILING_KNOWN));

    // same value again is fine, a different one is not
    ring.set_trailing_offset(index, generation, 3).unwrap();
    assert!(matches!(
        ring.set_trailing_offset(index, generation, 1),
        Err(FormatError::InvalidOffsets { sequence: 2, .. })
    ));
}

#[test]
fn trailing_offset_rejects_bad_targets() {
    let ring = SlotRing::new(8);

    assert!(matches!(
        ring.set_trailing_offset(1, 1, 0),
        Err(FormatError::NotInstalled { sequence: 1 })
    ));

    let undelimited = SequencedUnit::undelimited(1, "abc");
    ring.try_set_without_delimiter(1, 1, &undelimited);
    assert!(matches!(
        ring.set_trailing_offset(1, 1, 0),
        Err(FormatError::NotDelimited { sequence: 1 })
    ));

    let delimited = SequencedUnit::delimited(2, "a\nb", 1, None).unwrap();
    ring.try_set_with_delimiter(2, 1, &delimited);
    assert!(matches!(
        ring.set_trailing_offset(2, 1, 3),
        Err(FormatError::InvalidOffsets { .. })
    ));
    assert!(matches!(
        ring.set_trailing_offset(2, 1, 0),
        Err(FormatError::InvalidOffsets { .. })
    ));
}

#[test]
fn claim_gate_opens_once() {
    let ring = SlotRing::new(8);
    let unit = SequencedUnit::delimited(4, "a\nb", 1, None).unwrap();
    let (index, generation) = ring.index_and_generation(4);
    ring.try_set_with_delimiter(index, generation, &unit);
    let slot = ring.slot(index);

    assert_eq!(slot.try_claim_span(generation), ClaimGate::NotReady);
    ring.set_trailing_offset(index, generation, 1).unwrap();
    assert_eq!(slot.try_claim_span(generation + 1), ClaimGate::Vanished);
    assert_eq!(slot.try_claim_span(generation), ClaimGate::Won);
    assert_eq!(slot.try_claim_span(generation), ClaimGate::AlreadyClaimed);
    assert!(slot.load().has(TRAILING_CLAIMED));
}

#[test]
fn slot_state_packs_generation_and_flags() {
    let state = SlotState::new(42, INSTALLED | HAS_DELIMITER);
    assert_eq!(state.generation(), 42);
    assert_eq!(state.flags(), INSTALLED | HAS_DELIMITER);
    assert!(state.is_installed_at(42));
    assert!(!state.is_installed_at(41));
    assert!(!state.is_released());

    let released = state.with(LEADING_RELEASED | TRAILING_KNOWN | TRAILING_CLAIMED | TRAILING_RELEASED);
    assert!(released.is_released());
    assert!(released.is_free());
    assert!(!released.can_start_span());

    let undelimited = SlotState::new(3, INSTALLED | LEADING_RELEASED);
    assert!(undelimited.is_released());
    assert!(SlotState::EMPTY.is_free());
}

#[test]
fn unit_offsets_and_complete_records() {
    let unit = SequencedUnit::scan(1, "4\n56,7\n", b'\n');
    assert_eq!(
        unit.delimiters(),
        Some(DelimiterOffsets {
            first: 1,
            last: Some(6)
        })
    );
    assert_eq!(unit.complete_records(), Some(Bytes::from_static(b"56,7\n")));

    let single = SequencedUnit::scan(2, "ab\ncd", b'\n');
    assert_eq!(single.complete_records(), Some(Bytes::new()));

    let none = SequencedUnit::scan(3, "abcd", b'\n');
    assert!(!none.has_delimiter());
    assert_eq!(none.complete_records(), None);

    let open = SequencedUnit::delimited(4, "a\nb\n", 1, None).unwrap();
    assert_eq!(open.complete_records(), None);
}

#[test]
fn unit_rejects_offsets_outside_data() {
    assert!(matches!(
        SequencedUnit::delimited(1, "abc", 3, None),
        Err(FormatError::InvalidOffsets { sequence: 1, .. })
    ));
    assert!(matches!(
        SequencedUnit::delimited(1, "a\nb\n", 3, Some(1)),
        Err(FormatError::InvalidOffsets { .. })
    ));
    assert!(SequencedUnit::delimited(1, "a\nb\n", 1, Some(3)).is_ok());
}

#[test]
fn scan_helpers() {
    assert_eq!(delimiter_offsets(b"no delimiter", b'\n'), None);
    assert_eq!(
        delimiter_offsets(b"\n", b'\n'),
        Some(DelimiterOffsets {
            first: 0,
            last: Some(0)
        })
    );

    let records: Vec<Bytes> = split_records(Bytes::from_static(b"a,b\n\nc\ntail"), b'\n').collect();
    assert_eq!(
        records,
        vec![
            Bytes::from_static(b"a,b"),
            Bytes::new(),
            Bytes::from_static(b"c")
        ]
    );
}

#[test]
#[cfg(target_pointer_width = "64")]
fn units_must_fit_u32_offsets() {
    assert!(check_unit_len(1, 0).is_ok());
    assert!(check_unit_len(1, MAX_UNIT_LEN).is_ok());
    assert!(matches!(
        check_unit_len(7, MAX_UNIT_LEN + 1),
        Err(FormatError::UnitTooLarge { sequence: 7, max, .. }) if max == u32::MAX as usize
    ));
    assert!(!FormatError::UnitTooLarge {
        sequence: 7,
        len: MAX_UNIT_LEN + 1,
        max: MAX_UNIT_LEN
    }
    .is_retryable());
}
