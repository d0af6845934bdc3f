//! 수신측 재조립 버퍼
//!
//! 시퀀스 번호 → 페이로드 명시적 매핑 (BTreeMap)
//! 슬롯은 처음 쓰인 값이 유지됨 (first-writer-wins), 덮어쓰거나 지우지 않음

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::segment::SeqNum;

/// 슬롯 삽입 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// 빈 슬롯에 새로 기록
    Inserted,

    /// 이미 채워진 슬롯 (중복 세그먼트)
    Duplicate,

    /// 시퀀스 공간 상한 초과
    OutOfRange,
}

/// 재조립 버퍼
#[derive(Debug, Clone)]
pub struct ReassemblyBuffer {
    /// 채워진 슬롯
    slots: BTreeMap<SeqNum, Bytes>,

    /// 0..contiguous 구간은 빈틈 없이 채워짐
    contiguous: SeqNum,

    /// 지금까지 본 가장 큰 시퀀스 번호
    highest_seen: Option<SeqNum>,

    /// 시퀀스 공간 상한 (이 값 이상은 거부)
    max_segments: SeqNum,
}

impl ReassemblyBuffer {
    pub fn new(max_segments: SeqNum) -> Self {
        Self {
            slots: BTreeMap::new(),
            contiguous: 0,
            highest_seen: None,
            max_segments,
        }
    }

    /// 슬롯에 페이로드 기록
    pub fn insert(&mut self, seq: SeqNum, payload: Bytes) -> InsertOutcome {
        if seq >= self.max_segments {
            return InsertOutcome::OutOfRange;
        }
        if self.slots.contains_key(&seq) {
            return InsertOutcome::Duplicate;
        }

        self.slots.insert(seq, payload);
        self.highest_seen = Some(self.highest_seen.map_or(seq, |h| h.max(seq)));

        while self.slots.contains_key(&self.contiguous) {
            self.contiguous += 1;
        }

        InsertOutcome::Inserted
    }

    pub fn contains(&self, seq: SeqNum) -> bool {
        self.slots.contains_key(&seq)
    }

    pub fn get(&self, seq: SeqNum) -> Option<&Bytes> {
        self.slots.get(&seq)
    }

    /// 앞에서부터 빈틈 없이 채워진 슬롯 수 (= 첫 번째 빈 슬롯 인덱스)
    pub fn contiguous_count(&self) -> SeqNum {
        self.contiguous
    }

    pub fn highest_seen(&self) -> Option<SeqNum> {
        self.highest_seen
    }

    pub fn max_segments(&self) -> SeqNum {
        self.max_segments
    }

    /// 채워진 슬롯 수
    pub fn filled_count(&self) -> usize {
        self.slots.len()
    }

    /// 누락된 시퀀스 번호 목록 (본 것 중 가장 큰 번호 아래의 빈 슬롯)
    pub fn missing(&self) -> Vec<SeqNum> {
        self.missing_until(0)
    }

    /// `frontier`까지 포함한 누락 목록
    ///
    /// 가장 큰 번호 아래의 빈 슬롯에 더해 [highest + 1, frontier) 구간의 빈 슬롯
    /// (아직 아무것도 못 받았으면 frontier가 있어도 빈 목록)
    pub fn missing_until(&self, frontier: SeqNum) -> Vec<SeqNum> {
        let Some(highest) = self.highest_seen else {
            return Vec::new();
        };

        let end = frontier.min(self.max_segments).max(highest);
        (self.contiguous..end)
            .filter(|seq| !self.slots.contains_key(seq))
            .collect()
    }

    /// 빈틈 없음 여부
    pub fn is_complete(&self) -> bool {
        self.highest_seen
            .map_or(true, |highest| highest < self.contiguous)
    }

    /// [from, contiguous) 구간 페이로드 (순서대로)
    pub fn in_order_from(&self, from: SeqNum) -> impl Iterator<Item = &Bytes> + '_ {
        self.slots
            .range(from..self.contiguous.max(from))
            .map(|(_, payload)| payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[test]
    fn empty_buffer_is_complete() {
        let buffer = ReassemblyBuffer::new(100);
        assert!(buffer.is_complete());
        assert!(buffer.missing().is_empty());
        assert_eq!(buffer.contiguous_count(), 0);
        assert_eq!(buffer.highest_seen(), None);
    }

    #[test]
    fn gap_detected_and_filled() {
        let mut buffer = ReassemblyBuffer::new(100);
        assert_eq!(buffer.insert(0, payload("ABCD")), InsertOutcome::Inserted);
        assert_eq!(buffer.insert(2, payload("IJ")), InsertOutcome::Inserted);

        assert!(!buffer.is_complete());
        assert_eq!(buffer.missing(), vec![1]);
        assert_eq!(buffer.contiguous_count(), 1);

        assert_eq!(buffer.insert(1, payload("EFGH")), InsertOutcome::Inserted);
        assert!(buffer.is_complete());
        assert_eq!(buffer.contiguous_count(), 3);

        let assembled: Vec<u8> = buffer.in_order_from(0).flatten().copied().collect();
        assert_eq!(assembled, b"ABCDEFGHIJ");
    }

    #[test]
    fn first_writer_wins() {
        let mut buffer = ReassemblyBuffer::new(100);
        buffer.insert(0, payload("ABCD"));
        assert_eq!(buffer.insert(0, payload("ZZZZ")), InsertOutcome::Duplicate);
        assert_eq!(buffer.get(0), Some(&payload("ABCD")));
        assert_eq!(buffer.filled_count(), 1);
    }

    #[test]
    fn out_of_range_never_slotted() {
        let mut buffer = ReassemblyBuffer::new(4);
        assert_eq!(buffer.insert(4, payload("XX")), InsertOutcome::OutOfRange);
        assert!(!buffer.contains(4));
        assert_eq!(buffer.highest_seen(), None);
    }

    #[test]
    fn missing_lists_every_hole() {
        let mut buffer = ReassemblyBuffer::new(100);
        buffer.insert(5, payload("F"));
        buffer.insert(2, payload("C"));
        assert_eq!(buffer.missing(), vec![0, 1, 3, 4]);
    }

    #[test]
    fn missing_until_extends_past_highest() {
        let mut buffer = ReassemblyBuffer::new(100);
        buffer.insert(0, payload("A"));
        buffer.insert(2, payload("C"));

        assert_eq!(buffer.missing_until(0), vec![1]);
        assert_eq!(buffer.missing_until(6), vec![1, 3, 4, 5]);
        assert_eq!(ReassemblyBuffer::new(100).missing_until(6), Vec::<SeqNum>::new());
    }

    #[test]
    fn missing_until_respects_sequence_bound() {
        let mut buffer = ReassemblyBuffer::new(4);
        buffer.insert(1, payload("B"));
        assert_eq!(buffer.missing_until(8), vec![0, 2, 3]);
    }

    #[test]
    fn in_order_from_skips_delivered_prefix() {
        let mut buffer = ReassemblyBuffer::new(100);
        for (seq, p) in [(0, "A"), (1, "B"), (2, "C"), (4, "E")] {
            buffer.insert(seq, payload(p));
        }
        let rest: Vec<u8> = buffer.in_order_from(1).flatten().copied().collect();
        assert_eq!(rest, b"BC");
        assert_eq!(buffer.in_order_from(5).count(), 0);
    }
}
