//! 송신 윈도우 상태
//!
//! ```text
//!  lowest outstanding      next_seq_to_send           total
//!        │                        │                     │
//!  ──────┼────────────────────────┼─────────────────────┼──▶ seq
//!        │ <── outstanding ──────▶│ <── unsent ────────▶│
//! ```
//!
//! 불변식: `outstanding.len() <= window_segments`
//! 재전송 요청 표시는 `next_seq_to_send` 미만에만 붙고 ACK되면 같이 지워짐

use std::collections::BTreeSet;

use crate::segment::SeqNum;

/// 송신측 슬라이딩 윈도우
#[derive(Debug, Clone)]
pub struct SendWindow {
    /// 다음에 보낼 새 시퀀스 번호
    next_seq_to_send: SeqNum,

    /// 최대 in-flight 세그먼트 수
    window_segments: usize,

    /// 전체 세그먼트 수
    total_segments: SeqNum,

    /// 전송했지만 ACK 받지 못한 시퀀스 번호
    outstanding: BTreeSet<SeqNum>,

    /// 재전송 요청 받은 시퀀스 번호
    retransmit: BTreeSet<SeqNum>,
}

impl SendWindow {
    pub fn new(window_segments: usize, total_segments: SeqNum) -> Self {
        Self {
            next_seq_to_send: 0,
            window_segments,
            total_segments,
            outstanding: BTreeSet::new(),
            retransmit: BTreeSet::new(),
        }
    }

    pub fn next_seq_to_send(&self) -> SeqNum {
        self.next_seq_to_send
    }

    pub fn window_segments(&self) -> usize {
        self.window_segments
    }

    pub fn total_segments(&self) -> SeqNum {
        self.total_segments
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_outstanding(&self, seq: SeqNum) -> bool {
        self.outstanding.contains(&seq)
    }

    /// outstanding 시퀀스 번호 (오름차순)
    pub fn outstanding(&self) -> impl Iterator<Item = SeqNum> + '_ {
        self.outstanding.iter().copied()
    }

    /// 윈도우 여유가 있고 아직 안 보낸 데이터가 남았는지
    pub fn can_send_more(&self) -> bool {
        self.outstanding.len() < self.window_segments && self.has_unsent()
    }

    pub fn has_unsent(&self) -> bool {
        self.next_seq_to_send < self.total_segments
    }

    pub fn is_full(&self) -> bool {
        self.outstanding.len() >= self.window_segments
    }

    /// 모두 전송 + 모두 ACK됨
    pub fn is_drained(&self) -> bool {
        !self.has_unsent() && self.outstanding.is_empty()
    }

    /// 전송 기록
    ///
    /// 새 세그먼트(`seq == next_seq_to_send`)는 윈도우 여유가 있을 때만 받아들이고
    /// 이미 outstanding인 세그먼트(재전송)는 상태 변화 없음
    pub fn mark_sent(&mut self, seq: SeqNum) -> bool {
        if self.outstanding.contains(&seq) {
            return true;
        }
        if seq != self.next_seq_to_send || !self.can_send_more() {
            return false;
        }

        self.outstanding.insert(seq);
        self.next_seq_to_send += 1;
        true
    }

    /// 다음 새 시퀀스 번호를 할당하고 전송 기록
    pub fn take_next(&mut self) -> Option<SeqNum> {
        let seq = self.next_seq_to_send;
        self.mark_sent(seq).then_some(seq)
    }

    /// 재전송 요청 표시
    ///
    /// 아직 한 번도 보내지 않은 번호는 거부
    pub fn request_retransmit(&mut self, seq: SeqNum) -> bool {
        if seq >= self.next_seq_to_send {
            return false;
        }
        self.retransmit.insert(seq);
        true
    }

    pub fn is_retransmit_pending(&self, seq: SeqNum) -> bool {
        self.retransmit.contains(&seq)
    }

    /// 재전송 표시 제거 (표시가 있었는지 반환)
    pub fn clear_retransmit(&mut self, seq: SeqNum) -> bool {
        self.retransmit.remove(&seq)
    }

    /// 다음에 보낼 시퀀스 번호
    ///
    /// 재전송 요청된 번호 중 가장 낮은 것이 우선, 없으면 윈도우 여유가 있을 때 새 번호
    pub fn next_missing_or_next_new(&self) -> Option<SeqNum> {
        match self.retransmit.first() {
            Some(&seq) => Some(seq),
            None => self.can_send_more().then_some(self.next_seq_to_send),
        }
    }

    /// 개별 ACK 처리
    ///
    /// outstanding이었으면 true, 이미 확인된 번호는 아무 변화 없음
    pub fn mark_acked(&mut self, seq: SeqNum) -> bool {
        self.retransmit.remove(&seq);
        self.outstanding.remove(&seq)
    }

    /// 누적 ACK 처리: `ack` 미만 모두 확인됨
    ///
    /// 새로 확인된 세그먼트 수 반환
    pub fn mark_acked_below(&mut self, ack: SeqNum) -> usize {
        let acked: Vec<SeqNum> = self.outstanding.range(..ack).copied().collect();
        self.retransmit.retain(|&seq| seq >= ack);
        acked.into_iter().filter(|&seq| self.mark_acked(seq)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state() {
        let w = SendWindow::new(3, 5);
        assert_eq!(w.next_seq_to_send(), 0);
        assert_eq!(w.outstanding_count(), 0);
        assert!(w.can_send_more());
        assert!(!w.is_drained());
    }

    #[test]
    fn fills_up_to_window() {
        let mut w = SendWindow::new(3, 10);
        assert_eq!(w.take_next(), Some(0));
        assert_eq!(w.take_next(), Some(1));
        assert_eq!(w.take_next(), Some(2));
        assert_eq!(w.take_next(), None);

        assert!(w.is_full());
        assert!(!w.can_send_more());
        assert_eq!(w.outstanding_count(), 3);
        assert_eq!(w.next_seq_to_send(), 3);
    }

    #[test]
    fn bounded_by_remaining_data() {
        let mut w = SendWindow::new(3, 2);
        assert_eq!(w.take_next(), Some(0));
        assert_eq!(w.take_next(), Some(1));
        assert_eq!(w.take_next(), None);
        assert!(!w.is_full());
        assert!(!w.has_unsent());
    }

    #[test]
    fn mark_sent_rejects_skipping_ahead() {
        let mut w = SendWindow::new(3, 10);
        assert!(!w.mark_sent(2));
        assert!(w.mark_sent(0));
        // 재전송은 상태를 바꾸지 않음
        assert!(w.mark_sent(0));
        assert_eq!(w.next_seq_to_send(), 1);
        assert_eq!(w.outstanding_count(), 1);
    }

    #[test]
    fn cumulative_ack_slides() {
        let mut w = SendWindow::new(3, 5);
        while w.take_next().is_some() {}

        assert_eq!(w.mark_acked_below(2), 2);
        assert_eq!(w.outstanding().collect::<Vec<_>>(), vec![2]);
        assert_eq!(w.mark_acked_below(2), 0);

        assert_eq!(w.take_next(), Some(3));
        assert_eq!(w.take_next(), Some(4));
        assert_eq!(w.take_next(), None);

        assert_eq!(w.mark_acked_below(5), 3);
        assert!(w.is_drained());
    }

    #[test]
    fn stale_cumulative_ack_is_noop() {
        let mut w = SendWindow::new(3, 10);
        while w.take_next().is_some() {}
        assert_eq!(w.mark_acked_below(3), 3);
        while w.take_next().is_some() {}

        assert_eq!(w.mark_acked_below(1), 0);
        assert_eq!(w.outstanding().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert!(w.is_outstanding(4));
    }

    #[test]
    fn mark_acked_is_idempotent() {
        let mut w = SendWindow::new(3, 10);
        while w.take_next().is_some() {}

        assert!(w.mark_acked(1));
        assert!(!w.mark_acked(1));
        assert!(!w.mark_acked(7));
        assert_eq!(w.outstanding().collect::<Vec<_>>(), vec![0, 2]);

        // 개별 ACK로 생긴 여유에는 다음 새 번호가 들어감
        assert_eq!(w.next_missing_or_next_new(), Some(3));
    }

    #[test]
    fn retransmit_requests_come_before_new_data() {
        let mut w = SendWindow::new(3, 10);
        while w.take_next().is_some() {}
        assert_eq!(w.next_missing_or_next_new(), None);

        assert!(w.request_retransmit(2));
        assert!(w.request_retransmit(0));
        assert!(!w.request_retransmit(3));
        assert_eq!(w.next_missing_or_next_new(), Some(0));

        assert!(w.clear_retransmit(0));
        assert_eq!(w.next_missing_or_next_new(), Some(2));

        // ACK된 번호는 재전송 대상에서도 빠짐
        assert_eq!(w.mark_acked_below(3), 3);
        assert!(!w.is_retransmit_pending(2));
        assert_eq!(w.next_missing_or_next_new(), Some(3));
    }

    #[test]
    fn drained_window_still_accepts_late_requests() {
        let mut w = SendWindow::new(3, 2);
        while w.take_next().is_some() {}
        w.mark_acked_below(2);
        assert!(w.is_drained());

        assert!(w.request_retransmit(1));
        assert_eq!(w.next_missing_or_next_new(), Some(1));
        assert!(!w.request_retransmit(2));
    }

    #[test]
    fn empty_transfer_is_drained() {
        let w = SendWindow::new(3, 0);
        assert!(w.is_drained());
        assert!(!w.can_send_more());
    }
}
